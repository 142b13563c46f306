// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine handle.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use kurbo::{Point, Rect, Size, TranslateScale, Vec2};
use understory_fold_tree::{Fold, FoldPolicy, NodeId, NodeTree, PureNode};
use understory_scene::{
    Element, ElementFlags, ElementId, HighlightElement, HitPart, Indicator, LinkElement,
    LinkVisual, NodeElement, NodeVisual, QueryFilter, Scene,
};
use understory_tidy_layout::{Anchor, LayoutOptions, layout_tree};

use crate::animation::{self, Transition, Tween, lerp_camera};
use crate::editor::{
    EditOutcome, EditorArgs, EditorEvent, EditorSession, InlineEditor, Modifiers, PlainTextEditor,
};
use crate::error::{Error, LoadError};
use crate::host::Host;
use crate::options::{MarkmapOptions, NodeRef};
use crate::planner::{OriginMap, VisiblePlan, plan_visible};
use crate::reconcile::{Diff, LinkBinding, NodeBinding, Reconciler};
use crate::refresh::{RefreshHook, Subscription};
use crate::resize::{ResizeDebouncer, ResizeHandle};
use crate::viewport::{self, Padding};

const Z_HIGHLIGHT: i32 = -1;
const Z_LINK: i32 = 0;
const Z_NODE: i32 = 1;
const INDICATOR_RADIUS: f64 = 6.0;
const INDICATOR_STROKE: f64 = 1.5;
const HIGHLIGHT_PADDING: f64 = 4.0;

/// Supplies children of nodes whose children were not sent up front.
pub trait NodeLoader {
    /// Fetches the children of the node identified by `node_id`: its payload's
    /// `node_id`, or its engine id.
    fn load_children(&self, node_id: &str) -> LocalBoxFuture<'_, Result<Vec<PureNode>, LoadError>>;
}

/// An entering node and the rectangle it grew out of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entered {
    /// The node.
    pub node: NodeId,
    /// Rectangle of its origin before the pass.
    pub from: Rect,
}

/// What a render pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    /// Nodes drawn after the pass.
    pub visible: usize,
    /// Nodes that got a new element.
    pub entered: Vec<Entered>,
    /// Nodes whose element was kept.
    pub updated: usize,
    /// Nodes whose element was retired.
    pub exited: Vec<NodeId>,
    /// Frames waited, measurement included.
    pub frames: u32,
}

impl RenderReport {
    /// The entering record of `node`.
    pub fn entered(&self, node: NodeId) -> Option<&Entered> {
        self.entered.iter().find(|e| e.node == node)
    }
}

struct ActiveEdit {
    node: NodeId,
    node_id: String,
    element: Option<ElementId>,
    original: String,
    locks_pointer: bool,
    session: Box<dyn EditorSession>,
}

/// A foldable mind map: model, scene, camera, and the passes that keep them in sync.
///
/// Every mutating operation takes `&mut self`, so one logical mutation finishes before
/// the next can start. Operations on a destroyed instance fail with [`Error::Destroyed`].
pub struct Markmap<H: Host> {
    host: H,
    options: MarkmapOptions,
    id: String,
    tree: Option<NodeTree>,
    highlight: Option<NodeId>,
    bounds: Rect,
    scene: Scene,
    reconciler: Reconciler,
    highlight_element: Option<ElementId>,
    camera: TranslateScale,
    loader: Option<Rc<dyn NodeLoader>>,
    editing: Option<ActiveEdit>,
    resize: ResizeDebouncer,
    refresh: Option<Subscription>,
    refresh_requested: Rc<Cell<bool>>,
    destroyed: bool,
}

impl<H: Host> fmt::Debug for Markmap<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Markmap")
            .field("id", &self.id)
            .field("nodes", &self.tree.as_ref().map_or(0, NodeTree::len))
            .field("highlight", &self.highlight)
            .field("bounds", &self.bounds)
            .field("elements", &self.scene.len())
            .field("camera", &self.camera)
            .field("editing", &self.editing.as_ref().map(|e| e.node))
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl<H: Host> Markmap<H> {
    /// An empty mind map drawing through `host`, with id `options.id` or `"mm"`.
    pub fn new(host: H, options: MarkmapOptions) -> Self {
        let id = options.id.clone().unwrap_or_else(|| "mm".to_owned());
        Self::with_id(host, options, id)
    }

    /// An empty mind map subscribed to `hook`; a refresh makes the next
    /// [`poll`](Self::poll) render.
    ///
    /// Without `options.id`, the id is numbered by the hook's subscriptions, so instances
    /// sharing a hook get distinct ids.
    pub fn with_refresh_hook(host: H, options: MarkmapOptions, hook: &RefreshHook) -> Self {
        let requested = Rc::new(Cell::new(false));
        let flag = requested.clone();
        let subscription = hook.tap(move || flag.set(true));
        let id = options
            .id
            .clone()
            .unwrap_or_else(|| format!("mm-{}", subscription.id() + 1));
        let mut map = Self::with_id(host, options, id);
        map.refresh = Some(subscription);
        map.refresh_requested = requested;
        map
    }

    fn with_id(host: H, options: MarkmapOptions, id: String) -> Self {
        let resize = ResizeDebouncer::new(options.resize_debounce);
        Self {
            host,
            options,
            id,
            tree: None,
            highlight: None,
            bounds: Rect::ZERO,
            scene: Scene::new(),
            reconciler: Reconciler::new(),
            highlight_element: None,
            camera: TranslateScale::default(),
            loader: None,
            editing: None,
            resize,
            refresh: None,
            refresh_requested: Rc::new(Cell::new(false)),
            destroyed: false,
        }
    }

    /// Creates a mind map and, when `data` is given, renders it and fits it to the viewport.
    pub async fn create(
        host: H,
        options: MarkmapOptions,
        data: Option<&PureNode>,
    ) -> Result<Self, Error> {
        let mut map = Self::new(host, options);
        if let Some(data) = data {
            map.set_data(data).await?;
            map.fit(None).await?;
        }
        Ok(map)
    }

    /// Instance id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current options.
    pub fn options(&self) -> &MarkmapOptions {
        &self.options
    }

    /// Replaces the options. Takes effect on the next pass.
    pub fn set_options(&mut self, options: MarkmapOptions) {
        self.resize.set_quiet(options.resize_debounce);
        self.options = options;
    }

    /// Registers the loader used for nodes whose children are not loaded yet.
    pub fn set_loader(&mut self, loader: Option<Rc<dyn NodeLoader>>) {
        self.loader = loader;
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The model, once data was set.
    pub fn tree(&self) -> Option<&NodeTree> {
        self.tree.as_ref()
    }

    /// The drawn elements.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene element drawing `node`, if it is drawn.
    pub fn element_of(&self, node: NodeId) -> Option<ElementId> {
        let key = self.tree.as_ref()?.key(node)?;
        self.reconciler.node(key).map(|b| b.element)
    }

    /// The scene element of the highlight box.
    pub fn highlight_element(&self) -> Option<ElementId> {
        self.highlight_element
    }

    /// The highlighted node.
    pub fn highlight(&self) -> Option<NodeId> {
        self.highlight
    }

    /// Bounding box of the last layout.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Current camera.
    pub fn camera(&self) -> TranslateScale {
        self.camera
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Copies a subtree out in the caller-facing shape, for example to add it to another
    /// instance with [`add_node`](Self::add_node).
    pub fn to_pure(&self, node: NodeId) -> Option<PureNode> {
        self.tree.as_ref()?.to_pure(node)
    }

    /// A sender for content size change notifications.
    pub fn resize_handle(&self) -> ResizeHandle {
        self.resize.handle()
    }

    fn ensure_live(&self) -> Result<(), Error> {
        if self.destroyed {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    fn tree_ref(&self) -> Result<&NodeTree, Error> {
        self.tree.as_ref().ok_or(Error::NoData)
    }

    fn tree_mut(&mut self) -> Result<&mut NodeTree, Error> {
        self.tree.as_mut().ok_or(Error::NoData)
    }

    fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            spacing_horizontal: self.options.spacing_horizontal,
            spacing_vertical: self.options.spacing_vertical,
            padding_x: self.options.padding_x,
        }
    }

    /// Replaces the model with `data` and renders it.
    ///
    /// Ids restart at 1 and the initial fold policy is applied. Any highlight is dropped.
    pub async fn set_data(&mut self, data: &PureNode) -> Result<RenderReport, Error> {
        self.ensure_live()?;
        let policy = FoldPolicy {
            initial_expand_level: self.options.initial_expand_level,
        };
        let tree = NodeTree::initialize(data, policy);
        // Palette entries are handed out in pre-order, whatever gets drawn first.
        for id in tree.descendants(tree.root()) {
            if let Some(node) = NodeRef::new(&tree, id) {
                (self.options.color)(node);
            }
        }
        tracing::debug!(nodes = tree.len(), "data set");
        self.tree = Some(tree);
        self.highlight = None;
        self.render(None).await
    }

    /// Applies `options`, then [`set_data`](Self::set_data).
    pub async fn set_data_with(
        &mut self,
        data: &PureNode,
        options: MarkmapOptions,
    ) -> Result<RenderReport, Error> {
        self.set_options(options);
        self.set_data(data).await
    }

    /// Draws the current model again.
    pub async fn refresh(&mut self) -> Result<RenderReport, Error> {
        self.render(None).await
    }

    /// Highlights `node` and renders.
    pub async fn set_highlight(&mut self, node: Option<NodeId>) -> Result<RenderReport, Error> {
        self.ensure_live()?;
        self.highlight = node;
        self.render(None).await
    }

    /// Highlights `node`, moving only the highlight box.
    ///
    /// A node that is unknown or not drawn clears the highlight instead.
    pub async fn set_highlight_incremental(&mut self, node: Option<NodeId>) -> Result<(), Error> {
        self.ensure_live()?;
        let pad = self.highlight_pad();
        let tree = self.tree_ref()?;
        let target = node
            .filter(|id| plan_visible(tree, tree.root()).contains(*id))
            .and_then(|id| tree.state(id))
            .map(|s| s.rect.inflate(pad, pad));
        let Some(to) = target else {
            if let Some(id) = node {
                tracing::debug!(node = %id, "highlight cleared, node not visible");
            }
            self.highlight = None;
            if let Some(element) = self.highlight_element.take() {
                self.scene.remove(element);
                self.scene.commit();
            }
            return Ok(());
        };
        self.highlight = node;
        let element = self.highlight_box(to);
        let from = highlight_rect(&self.scene, element).unwrap_or(to);
        let mut transition = Transition::new();
        transition.push(Tween::Highlight { element, from, to });
        let scene = &mut self.scene;
        animation::drive(&mut self.host, self.options.duration, |t| {
            transition.apply(scene, t);
        })
        .await;
        transition.finish(&mut self.scene);
        self.scene.commit();
        Ok(())
    }

    fn highlight_pad(&self) -> f64 {
        HIGHLIGHT_PADDING / self.camera.scale
    }

    /// The highlight element, created at `rect` if missing.
    fn highlight_box(&mut self, rect: Rect) -> ElementId {
        match self.highlight_element {
            Some(element) if self.scene.is_alive(element) => element,
            _ => {
                let element = self.scene.insert(
                    "highlight",
                    Z_HIGHLIGHT,
                    Element::Highlight(HighlightElement { rect }),
                );
                self.scene.set_flags(element, ElementFlags::VISIBLE);
                self.highlight_element = Some(element);
                element
            }
        }
    }

    /// Flips the fold of `node`, or of its whole subtree when `recursive`, and renders
    /// with `node` as the animation origin.
    ///
    /// A node whose children were not loaded yet asks the loader first and opens once
    /// they arrive, along with the loaded subtree when `recursive`. If the loader fails the
    /// node keeps its fold and the error is returned.
    pub async fn toggle_node(
        &mut self,
        node: NodeId,
        recursive: bool,
    ) -> Result<RenderReport, Error> {
        self.ensure_live()?;
        let tree = self.tree_ref()?;
        let current = tree.node(node).ok_or(Error::UnknownNode(node))?;
        let lazy = current.payload.loader.needs_load();
        match self.loader.clone() {
            Some(loader) if lazy => {
                let node_id = current
                    .payload
                    .node_id
                    .clone()
                    .unwrap_or_else(|| node.to_string());
                let children = match loader.load_children(&node_id).await {
                    Ok(children) => children,
                    Err(source) => {
                        tracing::warn!(node = %node, error = %source, "loading children failed");
                        return Err(Error::Load { node, source });
                    }
                };
                let tree = self.tree_mut()?;
                let dropped = tree.attach_children(node, &children)?;
                let opened = if recursive {
                    tree.descendants(node)
                } else {
                    vec![node]
                };
                for id in opened {
                    tree.set_fold(id, Fold::Expanded)?;
                }
                tracing::debug!(
                    node = %node,
                    loaded = children.len(),
                    dropped = dropped.len(),
                    "children loaded"
                );
                if let Some(h) = self.highlight
                    && dropped.contains(&h)
                {
                    self.highlight = None;
                }
            }
            _ => {
                let fold = if current.is_folded() {
                    Fold::Expanded
                } else {
                    Fold::Collapsed
                };
                let targets = if recursive {
                    tree.descendants(node)
                } else {
                    vec![node]
                };
                let tree = self.tree_mut()?;
                for id in &targets {
                    tree.set_fold(*id, fold)?;
                }
                tracing::debug!(node = %node, ?fold, count = targets.len(), "toggled");
            }
        }
        self.render(Some(node)).await
    }

    /// Inserts `nodes` under `parent` (the root when `None`) at `index`, appending when the
    /// index is missing or out of range, and animates only that subtree.
    ///
    /// The rest of the diagram keeps its place; the parent's rectangle anchors the new
    /// layout of its subtree. When the parent is not drawn, only the model changes.
    /// Returns the ids of the inserted subtree roots.
    pub async fn add_node(
        &mut self,
        parent: Option<NodeId>,
        nodes: &[PureNode],
        index: Option<usize>,
    ) -> Result<Vec<NodeId>, Error> {
        self.ensure_live()?;
        let _quiet = self.resize.suspend();
        let tree = self.tree_mut()?;
        let parent = parent.unwrap_or_else(|| tree.root());
        let ids = tree.insert_subtree(parent, index, nodes)?;
        tracing::debug!(parent = %parent, inserted = ids.len(), "incremental insert");

        let tree = self.tree_ref()?;
        if !plan_visible(tree, tree.root()).contains(parent) {
            tracing::debug!(parent = %parent, "parent not drawn, model only");
            return Ok(ids);
        }
        let plan = plan_visible(tree, parent);
        let diff = self.reconciler.diff_partial(tree, &plan);
        self.bind(&plan, &diff);
        self.host.next_frame().await;
        let entering: Vec<NodeId> = diff.entered.iter().map(|k| k.id).collect();
        self.measure(&entering)?;

        let options = self.layout_options();
        let tree = self.tree_ref()?;
        let parent_prior = diff
            .prior
            .get(&parent)
            .copied()
            .or_else(|| tree.state(parent).map(|s| s.rect))
            .unwrap_or(Rect::ZERO);
        let line_width = |id| line_width_of(&self.options, tree, id);
        let Some(layout) = layout_tree(tree, parent, &options, line_width, Anchor::KeepRoot) else {
            return Err(Error::UnknownNode(parent));
        };
        let tree = self.tree_mut()?;
        layout.apply(tree);
        self.bounds = self.bounds.union(layout.bounds());

        let mut origins = OriginMap::new();
        origins.claim(self.tree_ref()?, parent);
        let (mut transition, _) = self.build_transition(&plan, &diff, &origins, parent_prior);
        let pad = self.highlight_pad();
        let highlight_to = self
            .highlight
            .filter(|h| plan.contains(*h))
            .and_then(|h| self.tree.as_ref()?.state(h))
            .map(|s| s.rect.inflate(pad, pad));
        if let Some(to) = highlight_to {
            let element = self.highlight_box(to);
            let from = highlight_rect(&self.scene, element).unwrap_or(to);
            transition.push(Tween::Highlight { element, from, to });
        }
        self.run(transition).await;
        if self.options.auto_fit {
            self.fit(None).await?;
        }
        Ok(ids)
    }

    /// Replaces the subtree at `node` with `replacement` and renders with its parent as
    /// the animation origin. Returns the id of the new subtree root.
    ///
    /// The replacement is checked first; on error nothing changes.
    pub async fn replace_subtree(
        &mut self,
        node: NodeId,
        replacement: &PureNode,
    ) -> Result<NodeId, Error> {
        self.ensure_live()?;
        let tree = self.tree_mut()?;
        let (new_id, removed) = tree.replace_subtree(node, replacement)?;
        let parent = tree.parent(new_id);
        if let Some(h) = self.highlight
            && removed.contains(&h)
        {
            tracing::debug!(node = %h, "highlighted node replaced");
            self.highlight = None;
        }
        let edited_gone = self
            .editing
            .as_ref()
            .is_some_and(|e| removed.contains(&e.node));
        if edited_gone {
            self.close_editor();
        }
        self.render(parent.or(Some(new_id))).await?;
        Ok(new_id)
    }

    /// Runs one full pass: plan, bind, wait a frame, measure, lay out, animate.
    ///
    /// `origin` is the node whose subtree enters from and exits into it; other entering
    /// nodes grow out of their nearest drawn ancestor.
    pub async fn render(&mut self, origin: Option<NodeId>) -> Result<RenderReport, Error> {
        self.ensure_live()?;
        let tree = self.tree.as_ref().ok_or(Error::NoData)?;
        let root = tree.root();
        let plan = plan_visible(tree, root);
        if let Some(h) = self.highlight
            && !plan.contains(h)
        {
            tracing::debug!(node = %h, "highlight cleared, node not visible");
            self.highlight = None;
        }
        let diff = self.reconciler.diff(tree, &plan);

        let mut origins = OriginMap::new();
        if let Some(origin) = origin.filter(|o| tree.contains(*o)) {
            origins.claim(tree, origin);
        }
        for entered in &diff.entered {
            if let Some(parent) = plan.parent(entered.id) {
                origins.claim(tree, parent);
            }
        }
        let root_prior = diff
            .prior
            .get(&root)
            .copied()
            .or_else(|| tree.state(root).map(|s| s.rect))
            .unwrap_or(Rect::ZERO);

        // The highlight starts from the node's old place.
        let highlight_from = self
            .highlight
            .and_then(|h| tree.state(h))
            .map(|s| s.rect.inflate(self.highlight_pad(), self.highlight_pad()));

        self.bind(&plan, &diff);
        self.host.next_frame().await;
        self.measure(plan.nodes())?;

        let options = self.layout_options();
        let tree = self.tree_ref()?;
        let line_width = |id| line_width_of(&self.options, tree, id);
        let Some(layout) = layout_tree(tree, root, &options, line_width, Anchor::Origin) else {
            return Err(Error::UnknownNode(root));
        };
        let tree = self.tree_mut()?;
        layout.apply(tree);
        self.bounds = layout.bounds();

        let (mut transition, entered) = self.build_transition(&plan, &diff, &origins, root_prior);
        let highlight_to = self
            .highlight
            .and_then(|h| self.tree.as_ref()?.state(h))
            .map(|s| s.rect.inflate(self.highlight_pad(), self.highlight_pad()));
        match highlight_to {
            Some(to) => {
                let element = self.highlight_box(highlight_from.unwrap_or(to));
                let from = highlight_rect(&self.scene, element).unwrap_or(to);
                transition.push(Tween::Highlight { element, from, to });
            }
            None => {
                if let Some(element) = self.highlight_element.take() {
                    self.scene.remove(element);
                }
            }
        }
        let frames = self.run(transition).await + 1;

        let report = RenderReport {
            visible: plan.len(),
            entered,
            updated: diff.updated.len(),
            exited: diff.exited.iter().map(|(_, b)| b.node).collect(),
            frames,
        };
        tracing::debug!(
            visible = report.visible,
            entered = report.entered.len(),
            updated = report.updated,
            exited = report.exited.len(),
            "render pass"
        );
        if self.options.auto_fit {
            self.fit(None).await?;
        }
        Ok(report)
    }

    /// Creates hidden elements for entering nodes and links and retires exiting ones.
    fn bind(&mut self, plan: &VisiblePlan, diff: &Diff) {
        let Some(tree) = self.tree.as_ref() else {
            return;
        };
        for entered in &diff.entered {
            let Some(element) = node_element(&self.options, tree, entered.id) else {
                continue;
            };
            let id = self.scene.insert(entered.key.clone(), Z_NODE, Element::Node(element));
            self.scene.set_flags(id, ElementFlags::empty());
            self.reconciler.bind_node(
                entered.key.clone(),
                NodeBinding {
                    element: id,
                    node: entered.id,
                    parent: tree.parent(entered.id),
                    rect: Rect::ZERO,
                },
            );
        }
        for (key, parent, child) in &diff.links_entered {
            let Some(child_ref) = NodeRef::new(tree, *child) else {
                continue;
            };
            let element = Element::Link(LinkElement {
                color: (self.options.color)(child_ref),
                visual: LinkVisual {
                    source: Point::ZERO,
                    target: Point::ZERO,
                    stroke_width: 0.0,
                },
            });
            let id = self.scene.insert(key.clone(), Z_LINK, element);
            self.scene.set_flags(id, ElementFlags::empty());
            self.reconciler.bind_link(
                key.clone(),
                LinkBinding {
                    element: id,
                    parent: *parent,
                    child: *child,
                },
            );
        }
        for (key, binding) in &diff.exited {
            self.reconciler.unbind_node(key);
            self.scene
                .set_flags(binding.element, ElementFlags::VISIBLE | ElementFlags::EXITING);
        }
        for (key, binding) in &diff.links_exited {
            self.reconciler.unbind_link(key);
            self.scene
                .set_flags(binding.element, ElementFlags::VISIBLE | ElementFlags::EXITING);
        }
        tracing::trace!(bound = plan.len(), "elements bound");
    }

    /// Measures the content of `nodes` through the host.
    fn measure(&mut self, nodes: &[NodeId]) -> Result<(), Error> {
        let tree = self.tree.as_mut().ok_or(Error::NoData)?;
        for id in nodes {
            let Some(node) = NodeRef::new(tree, *id) else {
                continue;
            };
            let content = self.options.content_of(node);
            let measured = self.host.measure(&content, self.options.max_width);
            let size = Size::new(
                measured.width,
                measured.height.max(self.options.node_min_height),
            );
            tree.set_size(*id, size);
        }
        Ok(())
    }

    /// Tweens every element touched by `diff` from where it is to where the new layout
    /// puts it.
    fn build_transition(
        &mut self,
        plan: &VisiblePlan,
        diff: &Diff,
        origins: &OriginMap,
        root_prior: Rect,
    ) -> (Transition, Vec<Entered>) {
        let mut transition = Transition::new();
        let mut entered = Vec::with_capacity(diff.entered.len());
        let Some(tree) = self.tree.as_ref() else {
            return (transition, entered);
        };

        let passes = diff
            .entered
            .iter()
            .map(|k| (k, true))
            .chain(diff.updated.iter().map(|k| (k, false)));
        for (keyed, is_new) in passes {
            let Some(binding) = self.reconciler.node(&keyed.key).copied() else {
                continue;
            };
            let Some(state) = tree.state(keyed.id) else {
                continue;
            };
            let rect = state.rect;
            let Some(fresh) = node_element(&self.options, tree, keyed.id) else {
                continue;
            };
            let to = settled_visual(rect, fresh.line_width, fresh.indicator.is_some());
            let Some(Element::Node(element)) = self.scene.get_mut(binding.element) else {
                continue;
            };
            let from = if is_new {
                let source = origins.source_rect(keyed.id, &diff.prior, root_prior);
                entered.push(Entered {
                    node: keyed.id,
                    from: source,
                });
                collapsed_visual(rect.size(), source)
            } else {
                element.visual
            };
            // A vanishing indicator shrinks before it is dropped.
            let indicator = fresh.indicator.or_else(|| element.indicator.take());
            *element = NodeElement {
                size: rect.size(),
                indicator,
                visual: from,
                ..fresh
            };
            let editing = self
                .scene
                .flags(binding.element)
                .map_or(ElementFlags::empty(), |f| f & ElementFlags::EDITING);
            self.scene.set_flags(
                binding.element,
                ElementFlags::VISIBLE | ElementFlags::PICKABLE | editing,
            );
            self.reconciler.set_rect(&keyed.key, rect);
            transition.push(Tween::Node {
                element: binding.element,
                from,
                to,
            });
        }

        for (_, binding) in &diff.exited {
            let target = origins.target_rect(binding.node, binding.parent, plan, tree);
            let Some(Element::Node(element)) = self.scene.get(binding.element) else {
                continue;
            };
            let from = element.visual;
            let to = NodeVisual {
                line_x2: from.line_x2,
                ..collapsed_visual(binding.rect.size(), target)
            };
            transition.push(Tween::Node {
                element: binding.element,
                from,
                to,
            });
            transition.remove_on_finish(binding.element);
        }

        for (key, parent, child) in diff.links_entered.iter().chain(&diff.links_updated) {
            let Some(binding) = self.reconciler.link(key).copied() else {
                continue;
            };
            let (Some(source), Some(target)) = (tree.state(*parent), tree.state(*child)) else {
                continue;
            };
            let Some(child_ref) = NodeRef::new(tree, *child) else {
                continue;
            };
            let source_width = line_width_of(&self.options, tree, *parent);
            let target_width = (self.options.line_width)(child_ref);
            let to = LinkVisual {
                source: Point::new(source.rect.x1, source.rect.y1 + source_width / 2.0),
                target: Point::new(target.rect.x0, target.rect.y1 + target_width / 2.0),
                stroke_width: target_width,
            };
            let color = (self.options.color)(child_ref);
            let hidden = self
                .scene
                .flags(binding.element)
                .is_some_and(|f| !f.contains(ElementFlags::VISIBLE));
            let Some(Element::Link(link)) = self.scene.get_mut(binding.element) else {
                continue;
            };
            let from = if hidden {
                let origin = origins.source_rect(*child, &diff.prior, root_prior);
                let point = Point::new(origin.x1, origin.y1);
                LinkVisual {
                    source: point,
                    target: point,
                    stroke_width: 0.0,
                }
            } else {
                link.visual
            };
            link.color = color;
            link.visual = from;
            self.scene.set_flags(binding.element, ElementFlags::VISIBLE);
            transition.push(Tween::Link {
                element: binding.element,
                from,
                to,
            });
        }

        for (_, binding) in &diff.links_exited {
            let target = origins.target_rect(binding.child, Some(binding.parent), plan, tree);
            let Some(Element::Link(link)) = self.scene.get(binding.element) else {
                continue;
            };
            let width = NodeRef::new(tree, binding.child)
                .map_or(link.visual.stroke_width, |n| (self.options.line_width)(n));
            let point = Point::new(target.x1, target.y1 + width / 2.0);
            transition.push(Tween::Link {
                element: binding.element,
                from: link.visual,
                to: LinkVisual {
                    source: point,
                    target: point,
                    stroke_width: 0.0,
                },
            });
            transition.remove_on_finish(binding.element);
        }

        (transition, entered)
    }

    /// Plays `transition` to the end and settles the scene. Returns the frames waited.
    async fn run(&mut self, transition: Transition) -> u32 {
        let scene = &mut self.scene;
        let frames = animation::drive(&mut self.host, self.options.duration, |t| {
            let skipped = transition.apply(scene, t);
            if skipped > 0 {
                tracing::trace!(skipped, "tweens skipped, elements gone");
            }
        })
        .await;
        transition.finish(&mut self.scene);
        self.drop_vanished_indicators();
        self.scene.commit();
        frames
    }

    fn drop_vanished_indicators(&mut self) {
        let Some(tree) = self.tree.as_ref() else {
            return;
        };
        for (_, binding) in self.reconciler.nodes() {
            let Some(Element::Node(element)) = self.scene.get(binding.element) else {
                continue;
            };
            if element.indicator.is_some()
                && indicator_of(tree, binding.node).is_none()
                && let Some(Element::Node(element)) = self.scene.get_mut(binding.element)
            {
                element.indicator = None;
            }
        }
    }

    async fn animate_camera(&mut self, to: TranslateScale) {
        let from = self.camera;
        let camera = &mut self.camera;
        animation::drive(&mut self.host, self.options.duration, |t| {
            *camera = lerp_camera(from, to, t);
        })
        .await;
        self.camera = to;
    }

    /// Scales and centers the whole diagram in the viewport, zooming in at most to
    /// `max_scale` (the configured maximum when `None`).
    pub async fn fit(&mut self, max_scale: Option<f64>) -> Result<(), Error> {
        self.ensure_live()?;
        let max_scale = max_scale.unwrap_or(self.options.max_initial_scale);
        let to = viewport::fit(
            self.bounds,
            self.host.viewport_size(),
            self.options.fit_ratio,
            max_scale,
        );
        self.animate_camera(to).await;
        Ok(())
    }

    /// Fits the diagram, centers it horizontally, and places it vertically by
    /// `target_pos` between top-aligned (`0`) and bottom-aligned (`1`).
    pub async fn center_svg(
        &mut self,
        target_pos: f64,
        max_scale: Option<f64>,
    ) -> Result<(), Error> {
        self.ensure_live()?;
        let max_scale = max_scale.unwrap_or(self.options.max_initial_scale);
        let to = viewport::center_svg(
            self.bounds,
            self.host.viewport_size(),
            target_pos,
            self.options.fit_ratio,
            max_scale,
        );
        self.animate_camera(to).await;
        Ok(())
    }

    /// Rectangle of a drawn node; `None` when it is in the model but not drawn.
    fn drawn_rect(&self, node: NodeId) -> Result<Option<Rect>, Error> {
        let tree = self.tree_ref()?;
        let key = tree.key(node).ok_or(Error::UnknownNode(node))?;
        Ok(self.reconciler.node(key).map(|b| b.rect))
    }

    /// Pans the least distance that shows `node` inside the padded viewport. Does nothing
    /// when it is already visible or not drawn.
    pub async fn ensure_visible(&mut self, node: NodeId, padding: Padding) -> Result<(), Error> {
        self.ensure_live()?;
        let Some(rect) = self.drawn_rect(node)? else {
            return Ok(());
        };
        if let Some(to) =
            viewport::ensure_visible(self.camera, rect, self.host.viewport_size(), padding)
        {
            self.animate_camera(to).await;
        }
        Ok(())
    }

    /// Pans `node` to the center of the padded viewport.
    pub async fn center_node(&mut self, node: NodeId, padding: Padding) -> Result<(), Error> {
        self.ensure_live()?;
        let Some(rect) = self.drawn_rect(node)? else {
            return Ok(());
        };
        if let Some(to) =
            viewport::center_node(self.camera, rect, self.host.viewport_size(), padding)
        {
            self.animate_camera(to).await;
        }
        Ok(())
    }

    /// Zooms by `factor` around the viewport center.
    pub async fn rescale(&mut self, factor: f64) -> Result<(), Error> {
        self.ensure_live()?;
        let to = viewport::rescale(self.camera, self.host.viewport_size(), factor);
        self.animate_camera(to).await;
        Ok(())
    }

    /// Scrolls by a wheel delta in viewport pixels, without animation.
    pub fn pan_by(&mut self, delta: Vec2) -> Result<(), Error> {
        self.ensure_live()?;
        self.camera = viewport::pan(self.camera, -delta);
        Ok(())
    }

    /// The drawn node under a viewport point.
    fn node_at(&self, point: Point) -> Option<(NodeId, HitPart)> {
        let scene_point = self.camera.inverse() * point;
        let filter = QueryFilter::new().visible().pickable().settled();
        let hit = self.scene.hit_test_point(scene_point, filter)?;
        let key = self.scene.key(hit.element)?;
        let binding = self.reconciler.node(key)?;
        Some((binding.node, hit.part))
    }

    /// Routes a click at a viewport point. A click on an expansion indicator toggles that
    /// node, recursively when `toggle_recursively` differs from the platform modifier.
    ///
    /// Returns the toggled node.
    pub async fn click_at(
        &mut self,
        point: Point,
        modifiers: Modifiers,
    ) -> Result<Option<NodeId>, Error> {
        self.ensure_live()?;
        if self.editing.as_ref().is_some_and(|e| e.locks_pointer) {
            return Ok(None);
        }
        let Some((node, HitPart::Indicator)) = self.node_at(point) else {
            return Ok(None);
        };
        let recursive = self.options.toggle_recursively != modifiers.platform();
        self.toggle_node(node, recursive).await?;
        Ok(Some(node))
    }

    /// Opens the editor on the node under a viewport point, if editing is enabled.
    pub fn double_click_at(&mut self, point: Point) -> Result<Option<NodeId>, Error> {
        self.ensure_live()?;
        if !self.options.editable.enabled {
            return Ok(None);
        }
        let Some((node, _)) = self.node_at(point) else {
            return Ok(None);
        };
        self.open_editor(node)?;
        Ok(Some(node))
    }

    /// Opens the configured editor on `node`, cancelling any session already open.
    pub fn open_editor(&mut self, node: NodeId) -> Result<(), Error> {
        self.ensure_live()?;
        self.close_editor();
        let tree = self.tree_ref()?;
        let node_ref = NodeRef::new(tree, node).ok_or(Error::UnknownNode(node))?;
        let node_id = self.options.editable.resolve_node_id(node_ref);
        let element = self.element_of(node);
        let box_rect = element
            .and_then(|e| self.scene.get(e))
            .and_then(Element::as_node)
            .map_or(node_ref.state.rect, NodeElement::content_rect);
        let padding_x = self.options.padding_x;
        let content_box = Rect::new(
            box_rect.x0 + padding_x,
            box_rect.y0,
            (box_rect.x1 - padding_x).max(box_rect.x0 + padding_x),
            box_rect.y1,
        );
        let args = EditorArgs {
            node,
            node_id: node_id.clone(),
            rect: self.camera * content_box,
            scale: self.camera.scale,
            padding_x,
            initial_content: node_ref.node.content.clone(),
            multiline: self.options.editable.multiline,
            commit_on_blur: self.options.editable.commit_on_blur,
        };
        let original = element
            .and_then(|e| self.scene.get(e))
            .and_then(Element::as_node)
            .map_or_else(|| args.initial_content.clone(), |n| n.content.clone());
        let (session, locks_pointer) = match &self.options.editable.editor {
            Some(editor) => (editor.open(args), editor.locks_pointer_events()),
            None => (PlainTextEditor.open(args), false),
        };
        if let Some(element) = element
            && let Some(flags) = self.scene.flags(element)
        {
            self.scene.set_flags(element, flags | ElementFlags::EDITING);
        }
        tracing::debug!(node = %node, "editor opened");
        self.editing = Some(ActiveEdit {
            node,
            node_id,
            element,
            original,
            locks_pointer,
            session,
        });
        Ok(())
    }

    /// Forwards an input event to the open editor. Returns the outcome once the session
    /// ends; the commit or cancel callback has run by then.
    pub fn editor_event(&mut self, event: &EditorEvent) -> Result<Option<EditOutcome>, Error> {
        self.ensure_live()?;
        let Some(edit) = self.editing.as_mut() else {
            return Ok(None);
        };
        let Some(outcome) = edit.session.handle(event) else {
            if let Some(element) = edit.element
                && let Some(Element::Node(node)) = self.scene.get_mut(element)
            {
                node.content = edit.session.text().to_owned();
            }
            return Ok(None);
        };
        if let Some(edit) = self.editing.take() {
            self.finish_edit(edit, &outcome);
        }
        Ok(Some(outcome))
    }

    /// Cancels the open editor session, if any.
    pub fn close_editor(&mut self) {
        if let Some(mut edit) = self.editing.take() {
            edit.session.close(true);
            self.finish_edit(edit, &EditOutcome::Cancel);
        }
    }

    /// Returns `true` while an editor session is open.
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn finish_edit(&mut self, edit: ActiveEdit, outcome: &EditOutcome) {
        if let Some(element) = edit.element {
            if let Some(flags) = self.scene.flags(element) {
                self.scene.set_flags(element, flags - ElementFlags::EDITING);
            }
            if let Some(Element::Node(node)) = self.scene.get_mut(element) {
                node.content = match outcome {
                    EditOutcome::Commit(text) => text.clone(),
                    EditOutcome::Cancel => edit.original.clone(),
                };
            }
        }
        let Some(node) = self.tree.as_ref().and_then(|t| NodeRef::new(t, edit.node)) else {
            return;
        };
        match outcome {
            EditOutcome::Commit(text) => {
                tracing::debug!(node = %edit.node, "edit committed");
                if let Some(on_commit) = &self.options.editable.on_commit {
                    on_commit(&edit.node_id, text, node);
                }
            }
            EditOutcome::Cancel => {
                tracing::debug!(node = %edit.node, "edit cancelled");
                if let Some(on_cancel) = &self.options.editable.on_cancel {
                    on_cancel(&edit.node_id, node);
                }
            }
        }
    }

    /// Renders when a refresh was requested through the hook or the resize quiet period
    /// has passed. Returns whether it rendered.
    pub async fn poll(&mut self) -> Result<bool, Error> {
        self.ensure_live()?;
        let refresh = self.refresh_requested.replace(false);
        let resized = self.resize.poll(self.host.now());
        if (refresh || resized) && self.tree.is_some() {
            self.render(None).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Detaches from the refresh hook, cancels editing and pending resizes, and clears
    /// the scene. Later calls do nothing; other operations fail with
    /// [`Error::Destroyed`].
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.close_editor();
        self.refresh = None;
        self.resize.cancel();
        self.scene.clear();
        self.scene.commit();
        self.reconciler.clear();
        self.highlight_element = None;
        self.highlight = None;
        self.destroyed = true;
        tracing::debug!(id = %self.id, "destroyed");
    }
}

fn highlight_rect(scene: &Scene, element: ElementId) -> Option<Rect> {
    match scene.get(element)? {
        Element::Highlight(h) => Some(h.rect),
        _ => None,
    }
}

fn line_width_of(options: &MarkmapOptions, tree: &NodeTree, id: NodeId) -> f64 {
    NodeRef::new(tree, id).map_or(0.0, |n| (options.line_width)(n))
}

fn indicator_of(tree: &NodeTree, id: NodeId) -> Option<Indicator> {
    let node = tree.node(id)?;
    let hints = &node.payload.loader;
    let has_children = !node.children().is_empty() || hints.has_children == Some(true);
    has_children.then(|| Indicator {
        filled: hints.show_children_indicator,
        label: hints.children_count.map(|c| c.to_string()),
    })
}

/// Element data of `id` at rest, before layout: zero size, zero visual.
fn node_element(options: &MarkmapOptions, tree: &NodeTree, id: NodeId) -> Option<NodeElement> {
    let node = NodeRef::new(tree, id)?;
    Some(NodeElement {
        size: Size::ZERO,
        line_width: (options.line_width)(node),
        content: options.content_of(node),
        color: (options.color)(node),
        depth: node.state.depth,
        path: node.state.path.clone(),
        indicator: indicator_of(tree, id),
        visual: collapsed_visual(Size::ZERO, Rect::ZERO),
    })
}

/// A node at rest at `rect`.
fn settled_visual(rect: Rect, line_width: f64, indicator: bool) -> NodeVisual {
    let (indicator_radius, indicator_stroke) = if indicator {
        (INDICATOR_RADIUS, INDICATOR_STROKE)
    } else {
        (0.0, 0.0)
    };
    NodeVisual {
        offset: rect.origin().to_vec2(),
        content_opacity: 1.0,
        line_x1: -1.0,
        line_x2: rect.width() + 2.0,
        line_stroke: line_width,
        indicator_radius,
        indicator_stroke,
    }
}

/// A node of `size` shrunk into the bottom-right corner of `anchor`.
fn collapsed_visual(size: Size, anchor: Rect) -> NodeVisual {
    NodeVisual {
        offset: Vec2::new(anchor.x1 - size.width, anchor.y1 - size.height),
        content_opacity: 0.0,
        line_x1: size.width,
        line_x2: size.width,
        line_stroke: 0.0,
        indicator_radius: 0.0,
        indicator_stroke: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;
    use futures::executor::block_on;
    use std::time::Duration;

    fn abc() -> PureNode {
        PureNode::new("A").with_children([
            PureNode::new("Bee").with_children([PureNode::new("D")]),
            PureNode::new("C"),
        ])
    }

    fn instant() -> MarkmapOptions {
        MarkmapOptions {
            duration: Duration::ZERO,
            ..MarkmapOptions::default()
        }
    }

    fn node_visual(map: &Markmap<StaticHost>, id: NodeId) -> NodeVisual {
        let element = map.element_of(id).unwrap();
        map.scene().get(element).and_then(Element::as_node).unwrap().visual
    }

    #[test]
    fn first_render_settles_every_node() {
        let mut map = Markmap::new(StaticHost::default(), instant());
        let report = block_on(map.set_data(&abc())).unwrap();
        assert_eq!(report.visible, 4);
        assert_eq!(report.entered.len(), 4);
        assert!(report.exited.is_empty());
        assert_eq!(report.frames, 1, "one frame for measurement, none for a zero duration");

        let tree = map.tree().unwrap();
        for id in tree.descendants(tree.root()) {
            let rect = tree.state(id).unwrap().rect;
            let visual = node_visual(&map, id);
            assert_eq!(visual.offset, rect.origin().to_vec2());
            assert_eq!(visual.content_opacity, 1.0);
        }
        // A, its two links, the other nodes.
        assert_eq!(map.scene().len(), 4 + 3);
        let root = map.tree().unwrap().state(NodeId(1)).unwrap().rect;
        assert_eq!(root.height(), 20.0, "measured height");
        assert_eq!(root.width(), 8.0 + 16.0, "one character plus padding");
    }

    #[test]
    fn collapsing_retires_descendants() {
        let mut map = Markmap::new(StaticHost::default(), instant());
        block_on(map.set_data(&abc())).unwrap();
        let report = block_on(map.toggle_node(NodeId(2), false)).unwrap();
        assert_eq!(report.exited, [NodeId(3)]);
        assert!(map.element_of(NodeId(3)).is_none());
        assert_eq!(map.scene().len(), 3 + 2, "D and its link are gone");
        let bee = map.element_of(NodeId(2)).unwrap();
        let indicator = map
            .scene()
            .get(bee)
            .and_then(Element::as_node)
            .and_then(|n| n.indicator.clone())
            .unwrap();
        assert!(indicator.filled, "a collapsed node with children shows a filled indicator");
    }

    #[test]
    fn stale_highlight_is_cleared() {
        let mut map = Markmap::new(StaticHost::default(), instant());
        block_on(map.set_data(&abc())).unwrap();
        block_on(map.set_highlight(Some(NodeId(3)))).unwrap();
        let element = map.highlight_element().unwrap();
        let rect = highlight_rect(map.scene(), element).unwrap();
        let d = map.tree().unwrap().state(NodeId(3)).unwrap().rect;
        assert_eq!(rect, d.inflate(4.0, 4.0));

        block_on(map.toggle_node(NodeId(2), false)).unwrap();
        assert_eq!(map.highlight(), None);
        assert!(map.highlight_element().is_none());
        assert!(!map.scene().is_alive(element));
    }

    #[test]
    fn transitions_take_the_configured_time() {
        let options = MarkmapOptions {
            duration: Duration::from_millis(160),
            ..MarkmapOptions::default()
        };
        let mut map = Markmap::new(StaticHost::default(), options);
        let report = block_on(map.set_data(&abc())).unwrap();
        assert_eq!(report.frames, 1 + 10);
        assert_eq!(map.host().frames(), 11);
    }

    #[test]
    fn indicator_click_toggles() {
        let mut map = Markmap::new(StaticHost::default(), instant());
        block_on(map.set_data(&abc())).unwrap();
        let bee = map.tree().unwrap().state(NodeId(2)).unwrap().rect;
        let line = 1.0;
        let center = Point::new(bee.x1, bee.y1 + line / 2.0);
        let toggled = block_on(map.click_at(center, Modifiers::default())).unwrap();
        assert_eq!(toggled, Some(NodeId(2)));
        assert!(map.tree().unwrap().node(NodeId(2)).unwrap().is_folded());

        let far = Point::new(-500.0, -500.0);
        let miss = block_on(map.click_at(far, Modifiers::default())).unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn camera_operations() {
        let mut map = Markmap::new(StaticHost::new(Size::new(800.0, 600.0)), instant());
        block_on(map.set_data(&abc())).unwrap();
        block_on(map.fit(None)).unwrap();
        let fitted = map.camera();
        assert!(fitted.scale <= 2.0, "capped by max_initial_scale");
        let bounds = fitted * map.bounds();
        assert!(bounds.x0 >= 0.0 && bounds.x1 <= 800.0);
        assert!((bounds.center().x - 400.0).abs() < 1e-9);

        block_on(map.rescale(0.5)).unwrap();
        assert_eq!(map.camera().scale, fitted.scale * 0.5);

        let before = map.camera().translation;
        map.pan_by(Vec2::new(10.0, 0.0)).unwrap();
        assert_eq!(
            map.camera().translation,
            before - Vec2::new(10.0, 0.0),
            "wheel right pans left"
        );

        block_on(map.center_node(NodeId(3), Padding::default())).unwrap();
        let d = map.tree().unwrap().state(NodeId(3)).unwrap().rect;
        let center = map.camera() * d.center();
        assert!((center.x - 400.0).abs() < 1e-9 && (center.y - 300.0).abs() < 1e-9);

        block_on(map.ensure_visible(NodeId(3), Padding::default())).unwrap();
        assert_eq!(map.camera() * d.center(), center, "already visible");
    }

    #[test]
    fn destroy_is_idempotent() {
        let hook = RefreshHook::new();
        let mut map = Markmap::with_refresh_hook(StaticHost::default(), instant(), &hook);
        block_on(map.set_data(&abc())).unwrap();
        assert_eq!(hook.len(), 1);

        map.destroy();
        map.destroy();
        assert!(map.is_destroyed());
        assert!(map.scene().is_empty());
        assert!(hook.is_empty(), "the subscription is released");
        assert_eq!(block_on(map.refresh()), Err(Error::Destroyed));
    }

    #[test]
    fn refresh_hook_and_resize_trigger_a_render() {
        let hook = RefreshHook::new();
        let mut map = Markmap::with_refresh_hook(StaticHost::default(), instant(), &hook);
        block_on(map.set_data(&abc())).unwrap();
        assert!(!block_on(map.poll()).unwrap());

        hook.refresh_all();
        assert!(block_on(map.poll()).unwrap());
        assert!(!block_on(map.poll()).unwrap(), "one refresh, one render");

        let handle = map.resize_handle();
        assert!(handle.notify(map.host().now()));
        assert!(!block_on(map.poll()).unwrap(), "still inside the quiet period");
        map.host_mut().advance(Duration::from_millis(200));
        assert!(block_on(map.poll()).unwrap());
    }
}
