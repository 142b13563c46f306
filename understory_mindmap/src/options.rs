// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration: [`MarkmapOptions`] and its portable subset [`JsonOptions`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use hashbrown::HashMap;
use understory_fold_tree::{Node, NodeId, NodeState, NodeTree};
use understory_scene::Color;

use crate::editor::EditableOptions;

/// A node as seen by option callbacks.
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a> {
    /// Content and payload.
    pub node: &'a Node,
    /// Derived state: id, depth, path, key.
    pub state: &'a NodeState,
}

impl<'a> NodeRef<'a> {
    /// Looks `id` up in `tree`.
    pub fn new(tree: &'a NodeTree, id: NodeId) -> Option<Self> {
        Some(Self {
            node: tree.node(id)?,
            state: tree.state(id)?,
        })
    }
}

/// Per-node callback stored in [`MarkmapOptions`].
pub type NodeFn<T> = Rc<dyn Fn(NodeRef<'_>) -> T>;

/// The categorical palette used when no colors are configured.
pub const DEFAULT_PALETTE: [Color; 10] = [
    Color::from_rgb8(0x1f, 0x77, 0xb4),
    Color::from_rgb8(0xff, 0x7f, 0x0e),
    Color::from_rgb8(0x2c, 0xa0, 0x2c),
    Color::from_rgb8(0xd6, 0x27, 0x28),
    Color::from_rgb8(0x94, 0x67, 0xbd),
    Color::from_rgb8(0x8c, 0x56, 0x4b),
    Color::from_rgb8(0xe3, 0x77, 0xc2),
    Color::from_rgb8(0x7f, 0x7f, 0x7f),
    Color::from_rgb8(0xbc, 0xbd, 0x22),
    Color::from_rgb8(0x17, 0xbe, 0xcf),
];

/// Assigns palette entries to keys in order of first request.
///
/// The first key asked for gets the first color, the next new key the second, and so
/// on, wrapping around. Asking again for a known key returns the same color.
#[derive(Debug)]
pub struct OrdinalScale {
    range: Vec<Color>,
    domain: RefCell<HashMap<String, usize>>,
}

impl OrdinalScale {
    /// Creates a scale over `range`.
    pub fn new(range: impl Into<Vec<Color>>) -> Self {
        Self {
            range: range.into(),
            domain: RefCell::new(HashMap::new()),
        }
    }

    /// The color for `key`. Black for an empty range.
    pub fn get(&self, key: &str) -> Color {
        if self.range.is_empty() {
            return Color::BLACK;
        }
        let mut domain = self.domain.borrow_mut();
        let next = domain.len();
        let index = *domain.entry(key.to_owned()).or_insert(next);
        self.range[index % self.range.len()]
    }
}

/// Keeps the first `level` segments of a dot-joined path. `0` keeps everything.
pub fn freeze_path(path: &str, level: u32) -> &str {
    if level == 0 {
        return path;
    }
    match path.match_indices('.').nth(level as usize - 1) {
        Some((end, _)) => &path[..end],
        None => path,
    }
}

/// Engine options.
///
/// Plain data plus a few per-node callbacks. [`Default`] gives the stock look.
#[derive(Clone)]
pub struct MarkmapOptions {
    /// Instance id. Generated when `None`.
    pub id: Option<String>,
    /// Fit the viewport after every full render.
    pub auto_fit: bool,
    /// Duration shared by every transition.
    pub duration: Duration,
    /// Share of the viewport the content may cover when fitting.
    pub fit_ratio: f64,
    /// Levels below the root that start expanded; negative expands everything.
    pub initial_expand_level: i32,
    /// Scale cap applied by [`fit`](crate::Markmap::fit) when none is passed.
    pub max_initial_scale: f64,
    /// Content width limit passed to measurement; `0` means unlimited.
    pub max_width: f64,
    /// Measured content heights are raised to at least this value.
    pub node_min_height: f64,
    /// Horizontal padding on each side of node content.
    pub padding_x: f64,
    /// Gap between a node and its children.
    pub spacing_horizontal: f64,
    /// Gap between siblings.
    pub spacing_vertical: f64,
    /// Indicator clicks toggle recursively unless the platform modifier is held.
    pub toggle_recursively: bool,
    /// Branch color of a node.
    pub color: NodeFn<Color>,
    /// Branch stroke width of a node.
    pub line_width: NodeFn<f64>,
    /// Renders a node's content to markup. Defaults to the raw content.
    pub node_content: Option<NodeFn<String>>,
    /// In-place editing.
    pub editable: EditableOptions,
    /// Quiet period before a content resize triggers a render.
    pub resize_debounce: Duration,
}

impl fmt::Debug for MarkmapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkmapOptions")
            .field("id", &self.id)
            .field("auto_fit", &self.auto_fit)
            .field("duration", &self.duration)
            .field("fit_ratio", &self.fit_ratio)
            .field("initial_expand_level", &self.initial_expand_level)
            .field("max_initial_scale", &self.max_initial_scale)
            .field("max_width", &self.max_width)
            .field("node_min_height", &self.node_min_height)
            .field("padding_x", &self.padding_x)
            .field("spacing_horizontal", &self.spacing_horizontal)
            .field("spacing_vertical", &self.spacing_vertical)
            .field("toggle_recursively", &self.toggle_recursively)
            .field("editable", &self.editable)
            .field("resize_debounce", &self.resize_debounce)
            .finish_non_exhaustive()
    }
}

impl Default for MarkmapOptions {
    fn default() -> Self {
        let scale = Rc::new(OrdinalScale::new(DEFAULT_PALETTE));
        Self {
            id: None,
            auto_fit: false,
            duration: Duration::from_millis(500),
            fit_ratio: 0.95,
            initial_expand_level: -1,
            max_initial_scale: 2.0,
            max_width: 0.0,
            node_min_height: 16.0,
            padding_x: 8.0,
            spacing_horizontal: 80.0,
            spacing_vertical: 5.0,
            toggle_recursively: false,
            color: Rc::new(move |node| scale.get(&node.state.path)),
            line_width: Rc::new(|_| 1.0),
            node_content: None,
            editable: EditableOptions::default(),
            resize_debounce: Duration::from_millis(100),
        }
    }
}

impl MarkmapOptions {
    /// The markup drawn for a node.
    pub fn content_of(&self, node: NodeRef<'_>) -> String {
        match &self.node_content {
            Some(render) => render(node),
            None => node.node.content.clone(),
        }
    }
}

/// Stroke width configuration in [`JsonOptions`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum LineWidth {
    /// Same width everywhere.
    Uniform(f64),
    /// Width per depth, root first. Deeper nodes reuse the last entry.
    PerDepth(Vec<f64>),
}

/// The portable option subset, as found in document front matter.
///
/// Every field is optional; [`JsonOptions::apply_to`] only overrides what is set.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonOptions {
    /// Palette as `#rrggbb` strings. A single entry colors every branch the same.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<String>>,
    /// Descendants deeper than this level reuse their ancestor's color. `0` disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_freeze_level: Option<u32>,
    /// Transition duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// See [`MarkmapOptions::fit_ratio`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_ratio: Option<f64>,
    /// See [`MarkmapOptions::initial_expand_level`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_expand_level: Option<i32>,
    /// See [`MarkmapOptions::max_initial_scale`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_initial_scale: Option<f64>,
    /// See [`MarkmapOptions::max_width`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    /// See [`MarkmapOptions::node_min_height`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_min_height: Option<f64>,
    /// See [`MarkmapOptions::padding_x`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_x: Option<f64>,
    /// See [`MarkmapOptions::spacing_horizontal`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_horizontal: Option<f64>,
    /// See [`MarkmapOptions::spacing_vertical`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_vertical: Option<f64>,
    /// Branch stroke width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<LineWidth>,
}

impl JsonOptions {
    /// Parses options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Full options: the defaults with every set field applied.
    pub fn derive(&self) -> MarkmapOptions {
        self.apply_to(MarkmapOptions::default())
    }

    /// Applies every set field on top of `base`.
    ///
    /// Palette entries that are not valid hex colors are skipped.
    pub fn apply_to(&self, mut base: MarkmapOptions) -> MarkmapOptions {
        if let Some(palette) = &self.color {
            let colors: Vec<Color> = palette.iter().filter_map(|c| Color::from_hex(c)).collect();
            match colors.as_slice() {
                [] => {}
                [solid] => {
                    let solid = *solid;
                    base.color = Rc::new(move |_| solid);
                }
                _ => {
                    let scale = Rc::new(OrdinalScale::new(colors));
                    base.color = Rc::new(move |node| scale.get(&node.state.path));
                }
            }
        }
        if let Some(level) = self.color_freeze_level.filter(|l| *l > 0) {
            let inner = base.color.clone();
            base.color = Rc::new(move |node| {
                let frozen = NodeState {
                    path: freeze_path(&node.state.path, level).to_owned(),
                    ..node.state.clone()
                };
                inner(NodeRef {
                    node: node.node,
                    state: &frozen,
                })
            });
        }
        if let Some(ms) = self.duration {
            base.duration = Duration::from_millis(ms);
        }
        if let Some(v) = self.fit_ratio {
            base.fit_ratio = v;
        }
        if let Some(v) = self.initial_expand_level {
            base.initial_expand_level = v;
        }
        if let Some(v) = self.max_initial_scale {
            base.max_initial_scale = v;
        }
        if let Some(v) = self.max_width {
            base.max_width = v;
        }
        if let Some(v) = self.node_min_height {
            base.node_min_height = v;
        }
        if let Some(v) = self.padding_x {
            base.padding_x = v;
        }
        if let Some(v) = self.spacing_horizontal {
            base.spacing_horizontal = v;
        }
        if let Some(v) = self.spacing_vertical {
            base.spacing_vertical = v;
        }
        match self.line_width.clone() {
            Some(LineWidth::Uniform(width)) => base.line_width = Rc::new(move |_| width),
            Some(LineWidth::PerDepth(widths)) if !widths.is_empty() => {
                base.line_width = Rc::new(move |node| {
                    let i = (node.state.depth as usize).saturating_sub(1);
                    widths[i.min(widths.len() - 1)]
                });
            }
            _ => {}
        }
        base
    }
}
