//! Active nodes and their draw implementations.
//!
//! Every node shares one capability record (`Props`) and carries a
//! variant-specific payload (`NodeKind`). Each variant lives in its own module
//! with its payload and `Draw` implementation side by side.

mod character;
mod movement;
mod sprite;
mod text;

pub use character::{Character, continue_dialog, say};
pub use movement::{MoveTo, Movement};
pub use sprite::{ImageState, Sprite};
pub use text::TextContent;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::FrameTime;
use crate::engine::animation::Animation;
use crate::engine::surface::Surface;
use crate::error::Result;
use crate::types::{Axis, Color, Paint, Point, Rect, Size};

/// Handle to a node inside a scene's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub x: Axis,
    pub y: Axis,
}

impl Origin {
    pub fn new(x: impl Into<Axis>, y: impl Into<Axis>) -> Self {
        Origin {
            x: x.into(),
            y: y.into(),
        }
    }
}

/// Memoized origin offset. Only recomputed when the origin or the basis it
/// resolves against changes.
#[derive(Debug, Clone, Copy, Default)]
struct OriginCache {
    key: Option<(Origin, Size)>,
    offset: Point,
}

/// The capability record every node variant shares.
#[derive(Debug, Clone)]
pub struct Props {
    /// Parent-relative position.
    pub position: Point,
    pub origin: Origin,
    pub layer: i32,
    pub size: Size,
    pub paint: Paint,
    pub color: Color,
    absolute: Point,
    origin_cache: OriginCache,
}

impl Props {
    /// Absolute position as of the last draw.
    pub fn absolute(&self) -> Point {
        self.absolute
    }

    /// Resolve the origin against `basis`, reusing the cached offset when
    /// neither changed since the last call.
    pub fn origin_offset(&mut self, basis: Size) -> Point {
        let key = (self.origin, basis);
        if self.origin_cache.key != Some(key) {
            self.origin_cache = OriginCache {
                key: Some(key),
                offset: Point::new(self.origin.x.resolve(basis.width), self.origin.y.resolve(basis.height)),
            };
        }
        self.origin_cache.offset
    }

    /// Offset from the last resolution, without recomputing.
    pub fn cached_origin_offset(&self) -> Point {
        self.origin_cache.offset
    }

    /// The rectangle this node occupies on the surface for a given footprint.
    pub fn anchored_rect(&mut self, footprint: Size) -> Rect {
        let offset = self.origin_offset(footprint);
        Rect::from_origin(self.absolute - offset, footprint)
    }

    pub(crate) fn resolve_absolute(&mut self, parent: Point) {
        self.absolute = self.position + parent;
    }

    /// Paint a single rectangle per the node's paint style.
    pub fn paint_rect(&self, surface: &mut dyn Surface, rect: Rect) {
        match self.paint {
            Paint::Fill => surface.fill_rect(rect, self.color),
            Paint::Stroke => surface.stroke_rect(rect, self.color, 1.0),
        }
    }
}

/// Construction options shared by every variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeOptions {
    pub tag: Option<String>,
    pub x: f64,
    pub y: f64,
    pub origin: Origin,
    pub layer: i32,
    pub width: f64,
    pub height: f64,
    pub paint: Paint,
    pub color: Option<Color>,
}

impl NodeOptions {
    pub fn tagged(tag: &str) -> Self {
        NodeOptions {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Box,
    Sprite(Sprite),
    Character(Character),
    Text(TextContent),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Box => "box",
            NodeKind::Sprite(_) => "sprite",
            NodeKind::Character(_) => "character",
            NodeKind::Text(_) => "text",
        }
    }

    pub fn sprite(&self) -> Option<&Sprite> {
        match self {
            NodeKind::Sprite(s) => Some(s),
            NodeKind::Character(c) => Some(&c.sprite),
            _ => None,
        }
    }

    pub fn sprite_mut(&mut self) -> Option<&mut Sprite> {
        match self {
            NodeKind::Sprite(s) => Some(s),
            NodeKind::Character(c) => Some(&mut c.sprite),
            _ => None,
        }
    }
}

/// Draw a node variant given its shared record. Positions are already
/// resolved when this is called.
pub trait Draw {
    fn draw(&mut self, props: &mut Props, surface: &mut dyn Surface);

    /// Size used for click hit-testing.
    fn footprint(&self, props: &Props) -> Size;
}

impl Draw for NodeKind {
    fn draw(&mut self, props: &mut Props, surface: &mut dyn Surface) {
        match self {
            NodeKind::Box => {
                let rect = props.anchored_rect(props.size);
                props.paint_rect(surface, rect);
            }
            NodeKind::Sprite(s) => s.draw(props, surface),
            NodeKind::Character(c) => c.sprite.draw(props, surface),
            NodeKind::Text(t) => t.draw(props, surface),
        }
    }

    fn footprint(&self, props: &Props) -> Size {
        match self {
            NodeKind::Box => props.size,
            NodeKind::Sprite(s) => s.footprint(props),
            NodeKind::Character(c) => c.sprite.footprint(props),
            NodeKind::Text(t) => t.footprint(props),
        }
    }
}

/// Per-frame hook called before the node is drawn.
pub type Updater = Box<dyn FnMut(&mut Node, &FrameTime)>;

pub struct Node {
    pub tag: Option<String>,
    pub props: Props,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    animation: Option<Box<dyn Animation>>,
    animation_running: bool,
    animation_started_at: f64,
    movement: Option<Movement>,
    updater: Option<Updater>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("tag", &self.tag)
            .field("kind", &self.kind.name())
            .field("position", &self.props.position)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("animation_running", &self.animation_running)
            .field("moving", &self.movement.is_some())
            .finish()
    }
}

impl Node {
    pub fn new(options: NodeOptions, kind: NodeKind) -> Self {
        let position = Point::new(options.x, options.y);
        Node {
            tag: options.tag,
            props: Props {
                position,
                origin: options.origin,
                layer: options.layer,
                size: Size::new(options.width, options.height),
                paint: options.paint,
                color: options.color.unwrap_or(Color::BLACK),
                absolute: position,
                origin_cache: OriginCache::default(),
            },
            kind,
            parent: None,
            children: Vec::new(),
            animation: None,
            animation_running: false,
            animation_started_at: 0.0,
            movement: None,
            updater: None,
        }
    }

    /// A plain rectangle.
    pub fn boxed(options: NodeOptions) -> Self {
        Node::new(options, NodeKind::Box)
    }

    /// An image box. `ratio` is a percentage of the image's size.
    pub fn sprite(options: NodeOptions, src: Option<&str>, ratio: Option<f64>) -> Self {
        Node::new(options, NodeKind::Sprite(Sprite::new(src, ratio)))
    }

    /// A named sprite. Without an explicit color it takes
    /// `Character::DEFAULT_COLOR`, which its dialog titles use.
    pub fn character(options: NodeOptions, name: &str, src: Option<&str>, ratio: Option<f64>) -> Self {
        let options = NodeOptions {
            color: options.color.or(Some(Character::DEFAULT_COLOR)),
            ..options
        };
        Node::new(options, NodeKind::Character(Character::new(name, Sprite::new(src, ratio))))
    }

    pub fn text(options: NodeOptions, content: TextContent) -> Self {
        Node::new(options, NodeKind::Text(content))
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }

    pub fn absolute(&self) -> Point {
        self.props.absolute
    }

    /// The rectangle clicks are tested against, from the last draw.
    pub fn hit_rect(&self) -> Rect {
        let footprint = self.kind.footprint(&self.props);
        Rect::from_origin(self.props.absolute - self.props.cached_origin_offset(), footprint)
    }

    pub fn on_update(&mut self, updater: impl FnMut(&mut Node, &FrameTime) + 'static) -> &mut Self {
        self.updater = Some(Box::new(updater));
        self
    }

    pub(crate) fn run_updater(&mut self, frame: &FrameTime) {
        if let Some(mut updater) = self.updater.take() {
            updater(self, frame);
            if self.updater.is_none() {
                self.updater = Some(updater);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Animation
    // -----------------------------------------------------------------------

    /// Attach an animation. It does not start until `start_animation`; a
    /// running animation is stopped first so its state is restored.
    pub fn set_animation(&mut self, animation: impl Animation + 'static) -> &mut Self {
        self.set_boxed_animation(Box::new(animation))
    }

    pub fn set_boxed_animation(&mut self, animation: Box<dyn Animation>) -> &mut Self {
        if self.animation_running {
            self.stop_animation();
        }
        self.animation = Some(animation);
        self
    }

    pub fn start_animation(&mut self, now: f64) -> &mut Self {
        if self.animation_running {
            self.stop_animation();
        }
        if let Some(mut animation) = self.animation.take() {
            animation.on_start(self);
            self.animation = Some(animation);
        }
        self.animation_running = true;
        self.animation_started_at = now;
        self
    }

    pub fn stop_animation(&mut self) -> &mut Self {
        self.animation_running = false;
        if let Some(mut animation) = self.animation.take() {
            animation.on_stop(self);
            self.animation = Some(animation);
        }
        self
    }

    pub fn animation_running(&self) -> bool {
        self.animation_running
    }

    pub(crate) fn update_animation(&mut self, frame: &FrameTime) {
        if !self.animation_running {
            return;
        }
        let elapsed = frame.time - self.animation_started_at;
        if let Some(mut animation) = self.animation.take() {
            animation.update(self, frame, elapsed);
            if self.animation.is_none() {
                self.animation = Some(animation);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Start easing toward the requested axes. A move already in flight is
    /// replaced; callers wanting both should wait for the first to finish.
    pub fn move_to(&mut self, target: MoveTo) -> Result<()> {
        self.movement = Some(Movement::new(&target)?);
        Ok(())
    }

    pub fn is_moving(&self) -> bool {
        self.movement.is_some()
    }

    /// Advance the pending movement by `dt` milliseconds. Returns `true` on
    /// the call that lands the node on its target.
    pub fn advance_movement(&mut self, dt: f64, cadence: f64) -> bool {
        let Some(movement) = self.movement.as_mut() else {
            return false;
        };
        let arrived = movement.advance(&mut self.props.position, dt, cadence);
        if arrived {
            self.movement = None;
        }
        arrived
    }
}
