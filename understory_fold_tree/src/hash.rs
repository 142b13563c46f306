// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;
use alloc::vec::Vec;

/// 32-bit rolling hash of `content`, rendered in base 36.
///
/// Iterates UTF-16 code units so keys match those produced by browser hosts for the
/// same content.
pub(crate) fn content_hash(content: &str) -> String {
    let mut hash: i32 = 0;
    for unit in content.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    #[allow(
        clippy::cast_sign_loss,
        reason = "Reinterpreting the signed accumulator as unsigned is the point."
    )]
    to_base36(hash as u32)
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return String::from("0");
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_hashes_to_zero() {
        assert_eq!(content_hash(""), "0");
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        // "a" is code unit 97.
        assert_eq!(content_hash("a"), "2p");
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("hellp"));
    }
}
