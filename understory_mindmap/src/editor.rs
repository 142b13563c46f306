// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-place editing of node content.
//!
//! The engine owns at most one live [`EditorSession`]. An edit gesture asks the configured
//! [`InlineEditor`] to open a session; the host then feeds it [`EditorEvent`]s through
//! [`Markmap::editor_event`](crate::Markmap::editor_event) until the session reports an
//! [`EditOutcome`]. Outcomes go to the [`EditableOptions`] callbacks; the engine never
//! rewrites the model on its own.

use std::fmt;
use std::rc::Rc;

use kurbo::Rect;
use understory_fold_tree::NodeId;

use crate::options::{NodeFn, NodeRef};

/// Keyboard modifiers held during an input event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Control.
    pub ctrl: bool,
    /// Command on macOS, the Windows key elsewhere.
    pub meta: bool,
    /// Shift.
    pub shift: bool,
}

impl Modifiers {
    /// The platform's primary shortcut modifier: Command on macOS, Control elsewhere.
    pub fn platform(self) -> bool {
        if cfg!(target_os = "macos") {
            self.meta
        } else {
            self.ctrl
        }
    }
}

/// Keys an editor session reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKey {
    /// Enter or Return.
    Enter,
    /// Escape.
    Escape,
    /// Anything else.
    Other,
}

/// A key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key.
    pub key: EditKey,
    /// Modifiers held.
    pub modifiers: Modifiers,
}

/// Input routed to the live session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorEvent {
    /// The edited text changed; carries the whole new text.
    Input(String),
    /// A key was pressed.
    Key(KeyEvent),
    /// The editor lost focus.
    Blur,
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Keep the edited text.
    Commit(String),
    /// Discard the edit.
    Cancel,
}

/// Everything an editor needs to open over a node.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorArgs {
    /// Engine id of the edited node.
    pub node: NodeId,
    /// Identifier handed to the commit and cancel callbacks.
    pub node_id: String,
    /// Content box of the node in viewport coordinates.
    pub rect: Rect,
    /// Current zoom scale.
    pub scale: f64,
    /// Horizontal content padding.
    pub padding_x: f64,
    /// Content markup when editing started.
    pub initial_content: String,
    /// Plain Enter inserts a newline; committing needs the platform modifier.
    pub multiline: bool,
    /// Losing focus commits rather than cancels.
    pub commit_on_blur: bool,
}

/// An open editor.
pub trait EditorSession {
    /// Handles one event. Returns the outcome once the session is finished.
    fn handle(&mut self, event: &EditorEvent) -> Option<EditOutcome>;

    /// Tears the session down. `cancel` restores whatever the session displaced.
    fn close(&mut self, cancel: bool);

    /// Text shown while the session is live.
    fn text(&self) -> &str;
}

/// Opens editor sessions.
pub trait InlineEditor {
    /// Opens a session over the node described by `args`.
    fn open(&self, args: EditorArgs) -> Box<dyn EditorSession>;

    /// While a session from this editor is live, clicks on the diagram are ignored.
    fn locks_pointer_events(&self) -> bool {
        false
    }
}

/// Called with the resolved node id, the committed text, and the node.
pub type CommitFn = Rc<dyn Fn(&str, &str, NodeRef<'_>)>;
/// Called with the resolved node id and the node.
pub type CancelFn = Rc<dyn Fn(&str, NodeRef<'_>)>;

/// Editing configuration.
#[derive(Clone)]
pub struct EditableOptions {
    /// Double clicks open an editor.
    pub enabled: bool,
    /// See [`EditorArgs::multiline`].
    pub multiline: bool,
    /// See [`EditorArgs::commit_on_blur`].
    pub commit_on_blur: bool,
    /// Editor to use. [`PlainTextEditor`] when `None`.
    pub editor: Option<Rc<dyn InlineEditor>>,
    /// Resolves the identifier passed to the callbacks. Defaults to the payload's
    /// `node_id`, then the engine id.
    pub node_id: Option<NodeFn<String>>,
    /// Commit callback.
    pub on_commit: Option<CommitFn>,
    /// Cancel callback.
    pub on_cancel: Option<CancelFn>,
}

impl Default for EditableOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            multiline: false,
            commit_on_blur: true,
            editor: None,
            node_id: None,
            on_commit: None,
            on_cancel: None,
        }
    }
}

impl fmt::Debug for EditableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableOptions")
            .field("enabled", &self.enabled)
            .field("multiline", &self.multiline)
            .field("commit_on_blur", &self.commit_on_blur)
            .field("editor", &self.editor.is_some())
            .finish_non_exhaustive()
    }
}

impl EditableOptions {
    /// Identifier reported for `node`.
    pub fn resolve_node_id(&self, node: NodeRef<'_>) -> String {
        if let Some(resolve) = &self.node_id {
            return resolve(node);
        }
        node.node
            .payload
            .node_id
            .clone()
            .unwrap_or_else(|| node.state.id.to_string())
    }
}

/// Reduces markup to its text: tags are dropped, common entities decoded.
pub fn markup_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        if c == '<' {
            match rest.find('>') {
                Some(end) => {
                    let tag = &rest[1..end];
                    if tag.eq_ignore_ascii_case("br") || tag.eq_ignore_ascii_case("br/") {
                        text.push('\n');
                    }
                    rest = &rest[end + 1..];
                }
                None => {
                    text.push_str(rest);
                    break;
                }
            }
        } else if c == '&' {
            let entity = ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;", "&nbsp;"]
                .iter()
                .position(|e| rest.starts_with(e));
            match entity {
                Some(i) => {
                    text.push(['&', '<', '>', '"', '\'', ' '][i]);
                    rest = &rest[[5, 4, 4, 6, 5, 6][i]..];
                }
                None => {
                    text.push('&');
                    rest = &rest[1..];
                }
            }
        } else {
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    text
}

/// The stock editor: edits the node's text in place.
///
/// Enter commits. In multiline mode Enter inserts a newline and the platform modifier
/// plus Enter commits. Escape cancels. Blur commits or cancels per
/// [`EditorArgs::commit_on_blur`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextEditor;

impl InlineEditor for PlainTextEditor {
    fn open(&self, args: EditorArgs) -> Box<dyn EditorSession> {
        Box::new(PlainTextSession {
            text: markup_text(&args.initial_content),
            multiline: args.multiline,
            commit_on_blur: args.commit_on_blur,
            done: false,
        })
    }
}

#[derive(Debug)]
struct PlainTextSession {
    text: String,
    multiline: bool,
    commit_on_blur: bool,
    done: bool,
}

impl PlainTextSession {
    fn finish(&mut self, outcome: EditOutcome) -> Option<EditOutcome> {
        self.done = true;
        Some(outcome)
    }
}

impl EditorSession for PlainTextSession {
    fn handle(&mut self, event: &EditorEvent) -> Option<EditOutcome> {
        if self.done {
            return None;
        }
        match event {
            EditorEvent::Input(text) => {
                self.text.clone_from(text);
                None
            }
            EditorEvent::Key(KeyEvent {
                key: EditKey::Enter,
                modifiers,
            }) => {
                if self.multiline && !modifiers.platform() {
                    self.text.push('\n');
                    None
                } else {
                    let text = self.text.clone();
                    self.finish(EditOutcome::Commit(text))
                }
            }
            EditorEvent::Key(KeyEvent {
                key: EditKey::Escape,
                ..
            }) => self.finish(EditOutcome::Cancel),
            EditorEvent::Key(_) => None,
            EditorEvent::Blur => {
                if self.commit_on_blur {
                    let text = self.text.clone();
                    self.finish(EditOutcome::Commit(text))
                } else {
                    self.finish(EditOutcome::Cancel)
                }
            }
        }
    }

    fn close(&mut self, _cancel: bool) {
        self.done = true;
    }

    fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(multiline: bool, commit_on_blur: bool) -> EditorArgs {
        EditorArgs {
            node: NodeId(1),
            node_id: "1".into(),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            scale: 1.0,
            padding_x: 8.0,
            initial_content: "<strong>Tom</strong> &amp; Jerry".into(),
            multiline,
            commit_on_blur,
        }
    }

    fn key(key: EditKey, modifiers: Modifiers) -> EditorEvent {
        EditorEvent::Key(KeyEvent { key, modifiers })
    }

    #[test]
    fn markup_is_reduced_to_text() {
        assert_eq!(markup_text("<em>a</em>&lt;b&gt;<br>c"), "a<b>\nc");
        assert_eq!(markup_text("x & y"), "x & y");
    }

    #[test]
    fn enter_commits_the_current_text() {
        let mut session = PlainTextEditor.open(args(false, true));
        assert_eq!(session.text(), "Tom & Jerry");
        assert_eq!(session.handle(&EditorEvent::Input("Spike".into())), None);
        assert_eq!(
            session.handle(&key(EditKey::Enter, Modifiers::default())),
            Some(EditOutcome::Commit("Spike".into()))
        );
        assert_eq!(session.handle(&EditorEvent::Blur), None, "finished sessions are inert");
    }

    #[test]
    fn multiline_needs_the_platform_modifier() {
        let mut session = PlainTextEditor.open(args(true, true));
        session.handle(&EditorEvent::Input("a".into()));
        assert_eq!(session.handle(&key(EditKey::Enter, Modifiers::default())), None);
        assert_eq!(session.text(), "a\n");
        let both = Modifiers {
            ctrl: true,
            meta: true,
            shift: false,
        };
        assert_eq!(
            session.handle(&key(EditKey::Enter, both)),
            Some(EditOutcome::Commit("a\n".into()))
        );
    }

    #[test]
    fn escape_and_blur() {
        let mut session = PlainTextEditor.open(args(false, false));
        assert_eq!(session.handle(&key(EditKey::Other, Modifiers::default())), None);
        assert_eq!(session.handle(&EditorEvent::Blur), Some(EditOutcome::Cancel));

        let mut session = PlainTextEditor.open(args(false, true));
        assert_eq!(
            session.handle(&key(EditKey::Escape, Modifiers::default())),
            Some(EditOutcome::Cancel)
        );
    }
}
