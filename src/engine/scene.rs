//! Scenes own their nodes, click listeners, lifecycle hooks and dialog.
//!
//! Nodes live in an arena indexed by `NodeId`. Roots are drawn in ascending
//! layer order, children after their parent in the order they were adopted.

use std::fmt;
use std::mem;

use log::{debug, warn};

use crate::engine::dialog::{DialogCursor, DialogEvent, DialogStep, Progress, RunningScript, Script, ScriptState};
use crate::engine::nodes::{Draw, ImageState, Node, NodeId};
use crate::engine::surface::Surface;
use crate::engine::{Context, FrameTime};
use crate::error::{Result, StageError};
use crate::types::Point;

pub type SceneHook = Box<dyn FnMut(&mut Scene, &mut Context) -> Result<()>>;
pub type ClickHandler = Box<dyn FnMut(&mut Scene, &mut Context, NodeId) -> Result<()>>;

/// Named lifecycle points a scene can hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneEvent {
    Initialization,
    BeforeTransition,
    EnterTransition,
    AfterTransition,
    ExitTransition,
    /// Fired every time the player advances past the last dialog step.
    Finished,
}

#[derive(Default)]
struct Hooks {
    initialization: Option<SceneHook>,
    before_transition: Option<SceneHook>,
    enter_transition: Option<SceneHook>,
    after_transition: Option<SceneHook>,
    exit_transition: Option<SceneHook>,
    finished: Option<SceneHook>,
}

impl Hooks {
    fn slot(&mut self, event: SceneEvent) -> &mut Option<SceneHook> {
        match event {
            SceneEvent::Initialization => &mut self.initialization,
            SceneEvent::BeforeTransition => &mut self.before_transition,
            SceneEvent::EnterTransition => &mut self.enter_transition,
            SceneEvent::AfterTransition => &mut self.after_transition,
            SceneEvent::ExitTransition => &mut self.exit_transition,
            SceneEvent::Finished => &mut self.finished,
        }
    }
}

struct ClickListener {
    node: NodeId,
    handler: ClickHandler,
}

pub struct Scene {
    name: String,
    started_at: f64,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    listeners: Vec<ClickListener>,
    // Bumped on unload so a dispatch in progress does not restore listeners.
    generation: u64,
    hooks: Hooks,
    scripts: Vec<RunningScript>,
    dialog: Option<DialogCursor>,
    event: Option<DialogEvent>,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("started_at", &self.started_at)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("listeners", &self.listeners.len())
            .field("scripts", &self.scripts.len())
            .field("dialog", &self.dialog)
            .finish()
    }
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Scene {
            name: name.to_string(),
            started_at: 0.0,
            nodes: Vec::new(),
            roots: Vec::new(),
            listeners: Vec::new(),
            generation: 0,
            hooks: Hooks::default(),
            scripts: Vec::new(),
            dialog: None,
            event: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Put a node in the arena without registering it as a root.
    pub fn spawn(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Spawn a node and register it as a root.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.spawn(node);
        self.roots.push(id);
        id
    }

    /// Register an existing, parentless node as a root.
    pub fn add_root(&mut self, id: NodeId) -> Result<()> {
        if self.get(id)?.parent().is_some() {
            return Err(StageError::AlreadyParented(id));
        }
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
        Ok(())
    }

    /// Drop a node from the root set. It stays in the arena and can be
    /// adopted or re-added later.
    pub fn remove(&mut self, id: NodeId) {
        self.roots.retain(|r| *r != id);
    }

    /// Adopt `child` under `parent`, detaching it from any previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(parent)?;
        self.get(child)?;
        if self.roots.contains(&child) {
            return Err(StageError::AlreadyRoot(child));
        }
        if self.ancestors(parent).any(|a| a == child) || parent == child {
            return Err(StageError::Cycle { child, parent });
        }
        if let Some(old) = self.nodes[child.0].parent() {
            self.nodes[old.0].remove_child(child);
        }
        self.nodes[child.0].set_parent(Some(parent));
        self.nodes[parent.0].push_child(child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(child)?;
        self.get_mut(parent)?.remove_child(child);
        if self.nodes[child.0].parent() == Some(parent) {
            self.nodes[child.0].set_parent(None);
        }
        Ok(())
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(id.0).and_then(Node::parent), |p| {
            self.nodes.get(p.0).and_then(Node::parent)
        })
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(StageError::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(StageError::UnknownNode(id))
    }

    /// First node carrying `tag`.
    pub fn find(&self, tag: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.tag.as_deref() == Some(tag))
            .map(NodeId)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Point a sprite or character at a new image and ask the loader for it.
    pub fn set_sprite(&mut self, ctx: &mut Context, id: NodeId, src: &str, ratio: Option<f64>) -> Result<()> {
        let sprite = self
            .get_mut(id)?
            .kind
            .sprite_mut()
            .ok_or(StageError::WrongKind { id, expected: "sprite" })?;
        sprite.set_source(src, ratio);
        if let Some(src) = sprite.take_queued() {
            ctx.loader_mut().request(src);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Clicks
    // -----------------------------------------------------------------------

    pub fn add_on_click(
        &mut self,
        id: NodeId,
        handler: impl FnMut(&mut Scene, &mut Context, NodeId) -> Result<()> + 'static,
    ) -> Result<()> {
        self.get(id)?;
        self.listeners.push(ClickListener {
            node: id,
            handler: Box::new(handler),
        });
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Run every listener whose node contains `point`. Returns how many fired.
    pub fn dispatch_click(&mut self, ctx: &mut Context, point: Point) -> usize {
        let generation = self.generation;
        let mut listeners = mem::take(&mut self.listeners);
        let mut fired = 0;
        for listener in &mut listeners {
            let Some(node) = self.nodes.get(listener.node.0) else {
                continue;
            };
            if !node.hit_rect().contains(point) {
                continue;
            }
            fired += 1;
            if let Err(e) = (listener.handler)(self, ctx, listener.node) {
                warn!("click handler on {} failed: {e}", listener.node);
            }
            if self.generation != generation {
                break;
            }
        }
        if self.generation == generation {
            listeners.append(&mut self.listeners);
            self.listeners = listeners;
        }
        fired
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn on(
        &mut self,
        event: SceneEvent,
        hook: impl FnMut(&mut Scene, &mut Context) -> Result<()> + 'static,
    ) -> &mut Self {
        *self.hooks.slot(event) = Some(Box::new(hook));
        self
    }

    fn run_hook(&mut self, event: SceneEvent, ctx: &mut Context) -> Result<()> {
        let Some(mut hook) = self.hooks.slot(event).take() else {
            return Ok(());
        };
        let result = hook(self, ctx);
        let slot = self.hooks.slot(event);
        if slot.is_none() {
            *slot = Some(hook);
        }
        result
    }

    /// Stamp the start time, run the entry hooks in order and show the first
    /// dialog step.
    pub fn start(&mut self, ctx: &mut Context) -> Result<()> {
        self.started_at = ctx.now();
        debug!("starting scene {:?} at {}", self.name, self.started_at);
        self.run_hook(SceneEvent::Initialization, ctx)?;
        self.run_hook(SceneEvent::BeforeTransition, ctx)?;
        self.run_hook(SceneEvent::EnterTransition, ctx)?;
        self.run_hook(SceneEvent::AfterTransition, ctx)?;
        if self.dialog.is_some() {
            self.progress_dialog(ctx)?;
        }
        Ok(())
    }

    /// Run the exit transition and unload every node.
    pub fn on_exit(&mut self, ctx: &mut Context) -> Result<()> {
        let result = self.run_hook(SceneEvent::ExitTransition, ctx);
        self.unload();
        result
    }

    /// Drop every node, listener and running script.
    pub fn unload(&mut self) {
        debug!(
            "unloading scene {:?}: {} nodes, {} click listeners",
            self.name,
            self.nodes.len(),
            self.listeners.len()
        );
        self.generation += 1;
        self.listeners.clear();
        self.roots.clear();
        self.nodes.clear();
        self.scripts.clear();
    }

    // -----------------------------------------------------------------------
    // Dialog
    // -----------------------------------------------------------------------

    pub fn set_dialog_list(&mut self, steps: Vec<DialogStep>) -> &mut Self {
        self.dialog = Some(DialogCursor::new(steps));
        self.event = None;
        self
    }

    /// Build the dialog list right away, with access to the scene and the
    /// attached textbox.
    pub fn set_dialog_factory(
        &mut self,
        ctx: &mut Context,
        factory: impl FnOnce(&mut Scene, &mut Context) -> Vec<DialogStep>,
    ) -> Result<&mut Self> {
        if ctx.textbox().is_none() {
            return Err(StageError::NoTextbox);
        }
        let steps = factory(self, ctx);
        Ok(self.set_dialog_list(steps))
    }

    pub fn has_dialog(&self) -> bool {
        self.dialog.is_some()
    }

    pub fn dialog_position(&self) -> Option<usize> {
        self.dialog.as_ref().map(DialogCursor::position)
    }

    /// Scripts still waiting on something.
    pub fn running_scripts(&self) -> usize {
        self.scripts.len()
    }

    /// Fast-forward the line on screen, or advance to the next step.
    pub fn progress_dialog(&mut self, ctx: &mut Context) -> Result<Progress> {
        let textbox = ctx.textbox_mut().ok_or(StageError::NoTextbox)?;
        let cursor = self.dialog.as_mut().ok_or(StageError::NoDialog)?;

        if !textbox.finished() {
            textbox.fast_forward();
            return Ok(Progress::FastForwarded);
        }

        if let Some(previous) = &self.event {
            previous.mark_proceeded();
        }
        let event = DialogEvent::new();
        self.event = Some(event.clone());

        let index = cursor.position();
        let Some(step) = cursor.pull() else {
            debug!("dialog of scene {:?} finished", self.name);
            self.run_hook(SceneEvent::Finished, ctx)?;
            return Ok(Progress::Finished);
        };
        let script = step.invoke(&event);
        debug!("dialog step {index} of scene {:?}: {} cues", self.name, script.len());
        self.run_script(ctx, script, event);
        Ok(Progress::Advanced(index))
    }

    /// Start a script outside the dialog list, e.g. from a click handler.
    pub fn run_script(&mut self, ctx: &mut Context, script: Script, event: DialogEvent) {
        let mut running = RunningScript::new(script, event);
        if running.advance(self, ctx, 0.0) == ScriptState::Pending {
            self.scripts.push(running);
        }
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Advance timers and scripts, then update and draw every root in layer
    /// order.
    pub fn tick(&mut self, ctx: &mut Context, frame: &FrameTime, surface: &mut dyn Surface) {
        self.poll_images(ctx);

        let cadence = ctx.config.move_cadence_ms;
        for node in &mut self.nodes {
            node.advance_movement(frame.delta, cadence);
        }

        let mut scripts = mem::take(&mut self.scripts);
        scripts.retain_mut(|s| s.advance(self, ctx, frame.delta) == ScriptState::Pending);
        scripts.append(&mut self.scripts);
        self.scripts = scripts;

        let nodes = &self.nodes;
        self.roots.sort_by_key(|id| nodes.get(id.0).map_or(0, |n| n.props.layer));
        for root in self.roots.clone() {
            self.update_tree(root, frame);
            self.draw_tree(root, Point::ZERO, surface);
        }
    }

    fn poll_images(&mut self, ctx: &mut Context) {
        for node in &mut self.nodes {
            let Some(sprite) = node.kind.sprite_mut() else {
                continue;
            };
            if let Some(src) = sprite.take_queued() {
                ctx.loader_mut().request(src);
            }
            if *sprite.state() != ImageState::Loading {
                continue;
            }
            let Some(src) = sprite.src.clone() else {
                continue;
            };
            let state = ctx.loader_mut().poll(&src);
            if let Some(reason) = sprite.apply_load(state) {
                warn!("sprite {src} failed to load: {reason}");
            }
        }
    }

    fn update_tree(&mut self, id: NodeId, frame: &FrameTime) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.run_updater(frame);
        node.update_animation(frame);
        for child in node.children().to_vec() {
            self.update_tree(child, frame);
        }
    }

    fn draw_tree(&mut self, id: NodeId, parent: Point, surface: &mut dyn Surface) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.props.resolve_absolute(parent);
        node.kind.draw(&mut node.props, surface);
        let absolute = node.absolute();
        for child in node.children().to_vec() {
            self.draw_tree(child, absolute, surface);
        }
    }
}
