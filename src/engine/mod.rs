//! Engine: the owner of the running scene and everything it shares.
//!
//! One `tick` per host frame advances timers, runs dialog scripts, and
//! records the frame into the command buffer. The engine never deals with
//! terminals, ANSI codes, or grids; the renderer does.

pub mod animation;
pub mod dialog;
pub mod loader;
pub mod nodes;
pub mod scene;
pub mod surface;
pub mod textbox;

use log::{debug, info, warn};

use crate::config::StageConfig;
use crate::error::{Result, StageError};
use crate::types::{Color, DrawCommand, Font, Point, Rect, Size};
use dialog::Progress;
use loader::ImageLoader;
use nodes::Draw;
use scene::Scene;
use surface::{CommandBuffer, GlyphMetrics, Surface};
use textbox::Textbox;

/// Timing handed to per-frame hooks, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    pub delta: f64,
    pub time: f64,
}

/// State shared by the scene, its scripts and its hooks.
pub struct Context {
    pub config: StageConfig,
    now: f64,
    textbox: Option<Textbox>,
    paused: bool,
    loader: Box<dyn ImageLoader>,
    pending_scene: Option<Scene>,
}

impl Context {
    pub fn new(config: StageConfig, loader: Box<dyn ImageLoader>) -> Self {
        Context {
            config,
            now: 0.0,
            textbox: None,
            paused: false,
            loader,
            pending_scene: None,
        }
    }

    /// Time of the current tick.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn size(&self) -> Size {
        Size::new(self.config.width as f64, self.config.height as f64)
    }

    pub fn set_textbox(&mut self, textbox: Textbox) {
        self.textbox = Some(textbox);
    }

    pub fn textbox(&self) -> Option<&Textbox> {
        self.textbox.as_ref()
    }

    pub fn textbox_mut(&mut self) -> Option<&mut Textbox> {
        self.textbox.as_mut()
    }

    /// Stop clicks from advancing dialog until `resume_progression`.
    pub fn pause_progression(&mut self) {
        self.paused = true;
    }

    pub fn resume_progression(&mut self) {
        self.paused = false;
    }

    pub fn progression_paused(&self) -> bool {
        self.paused
    }

    pub fn loader_mut(&mut self) -> &mut dyn ImageLoader {
        self.loader.as_mut()
    }

    /// Ask the engine to switch to `scene` once the current dispatch returns.
    pub fn request_scene(&mut self, scene: Scene) {
        self.pending_scene = Some(scene);
    }

    pub fn has_pending_scene(&self) -> bool {
        self.pending_scene.is_some()
    }
}

pub struct Engine {
    ctx: Context,
    scene: Option<Scene>,
    surface: CommandBuffer,
    last_time: Option<f64>,
    delta: f64,
}

impl Engine {
    pub fn new(config: StageConfig, loader: Box<dyn ImageLoader>) -> Self {
        let size = Size::new(config.width as f64, config.height as f64);
        Engine {
            ctx: Context::new(config, loader),
            scene: None,
            surface: CommandBuffer::new(size, GlyphMetrics::Proportional { ratio: 0.5 }),
            last_time: None,
            delta: 0.0,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn set_textbox(&mut self, textbox: Textbox) {
        self.ctx.set_textbox(textbox);
    }

    pub fn textbox(&self) -> Option<&Textbox> {
        self.ctx.textbox()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    /// Mutable access to the scene and the context together, for setting up
    /// dialog factories or running scripts from outside a tick.
    pub fn scene_and_context(&mut self) -> Option<(&mut Scene, &mut Context)> {
        let scene = self.scene.as_mut()?;
        Some((scene, &mut self.ctx))
    }

    pub fn set_glyph_metrics(&mut self, metrics: GlyphMetrics) {
        self.surface.set_metrics(metrics);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.ctx.config.debug = debug;
    }

    pub fn toggle_debug(&mut self) {
        self.ctx.config.debug = !self.ctx.config.debug;
    }

    /// Draw commands recorded by the last tick.
    pub fn commands(&self) -> &[DrawCommand] {
        self.surface.commands()
    }

    pub fn surface(&self) -> &CommandBuffer {
        &self.surface
    }

    /// Exit the running scene, then install and start `scene`.
    pub fn set_scene(&mut self, scene: Scene) -> Result<()> {
        self.ctx.request_scene(scene);
        self.apply_pending_scene()
    }

    /// A failing exit hook does not stop the switch. A failing start leaves
    /// the incoming scene installed and reports the error.
    fn apply_pending_scene(&mut self) -> Result<()> {
        while let Some(mut next) = self.ctx.pending_scene.take() {
            if let Some(mut current) = self.scene.take() {
                if let Err(e) = current.on_exit(&mut self.ctx) {
                    warn!("exit transition of scene {:?} failed: {e}", current.name());
                }
            }
            info!("switching to scene {:?}", next.name());
            let started = next.start(&mut self.ctx);
            self.scene = Some(next);
            started?;
        }
        Ok(())
    }

    /// Record one frame at `time` milliseconds.
    pub fn tick(&mut self, time: f64) -> Result<()> {
        self.delta = self.last_time.map_or(0.0, |last| (time - last).max(0.0));
        self.last_time = Some(time);
        self.ctx.now = time;
        let frame = FrameTime {
            delta: self.delta,
            time,
        };

        self.surface.clear();
        if let Some(scene) = self.scene.as_mut() {
            scene.tick(&mut self.ctx, &frame, &mut self.surface);
        }

        let interval = self.ctx.config.reveal_interval_ms;
        if let Some(textbox) = self.ctx.textbox.as_mut() {
            textbox.advance(frame.delta, interval);
            textbox.draw(&mut self.surface);
        }

        if self.ctx.config.debug {
            self.draw_debug(&frame);
        }

        self.apply_pending_scene()
    }

    /// Route a click at a surface point: listeners first, then dialog unless
    /// progression is paused.
    pub fn click(&mut self, point: Point) -> Result<Option<Progress>> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(None);
        };
        let fired = scene.dispatch_click(&mut self.ctx, point);
        debug!("click at ({}, {}) hit {fired} listeners", point.x, point.y);

        let progress = if self.ctx.progression_paused() || !scene.has_dialog() || self.ctx.has_pending_scene() {
            None
        } else {
            Some(scene.progress_dialog(&mut self.ctx)?)
        };
        self.apply_pending_scene()?;
        Ok(progress)
    }

    /// Advance the dialog directly. Ignores the pause flag.
    pub fn progress_dialog(&mut self) -> Result<Progress> {
        let scene = self.scene.as_mut().ok_or(StageError::NoScene)?;
        let progress = scene.progress_dialog(&mut self.ctx)?;
        self.apply_pending_scene()?;
        Ok(progress)
    }

    /// The point keyboard hosts click at to advance dialog.
    pub fn textbox_anchor(&self) -> Point {
        let size = self.surface.size();
        Point::new(size.width / 2.0, size.height - 100.0)
    }

    fn draw_debug(&mut self, frame: &FrameTime) {
        let font = Font {
            size: 12.0,
            family: "monospace".into(),
            ..Font::default()
        };
        let color = Color::rgb(0x00, 0xff, 0x00);
        let fps = if frame.delta > 0.0 { 1000.0 / frame.delta } else { 0.0 };
        let mut lines = vec![
            format!("fps {fps:.0}"),
            format!("delta {:.1}ms", frame.delta),
            format!("time {:.0}ms", frame.time),
        ];

        if let Some(scene) = &self.scene {
            lines.push(format!("scene {}", scene.name()));
            for (id, node) in scene.iter() {
                let p = node.absolute();
                lines.push(format!("{id} {} ({:.0}, {:.0})", node.kind.name(), p.x, p.y));
                let footprint = node.kind.footprint(&node.props);
                let marker = Rect::new(p.x - 2.0, p.y - 2.0, 4.0, 4.0);
                self.surface.fill_rect(marker, Color::rgb(0xff, 0x00, 0x00));
                if !footprint.is_zero() {
                    self.surface.stroke_rect(node.hit_rect(), color, 1.0);
                }
            }
        }

        for (i, line) in lines.iter().enumerate() {
            let at = Point::new(4.0, 4.0 + i as f64 * (font.size + 2.0));
            self.surface.fill_text(line, at, &font, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dialog::Script;
    use crate::engine::loader::MemoryLoader;

    fn engine() -> Engine {
        let mut engine = Engine::new(StageConfig::default(), Box::new(MemoryLoader::new()));
        engine.set_textbox(Textbox::opened());
        engine
    }

    #[test]
    fn first_tick_has_zero_delta() {
        let mut engine = engine();
        engine.tick(1000.0).unwrap();
        assert_eq!(engine.delta, 0.0);
        engine.tick(1016.0).unwrap();
        assert_eq!(engine.delta, 16.0);
    }

    #[test]
    fn paused_progression_ignores_clicks_but_not_direct_calls() {
        let mut engine = engine();
        let mut scene = Scene::new("paused");
        scene.set_dialog_list(vec![
            Script::new().pause_progression().into(),
            Script::new().into(),
            Script::new().into(),
        ]);
        engine.set_scene(scene).unwrap();
        assert!(engine.context().progression_paused());

        assert_eq!(engine.click(Point::new(0.0, 0.0)).unwrap(), None);
        assert_eq!(engine.scene().unwrap().dialog_position(), Some(1));

        assert_eq!(engine.progress_dialog().unwrap(), Progress::Advanced(1));
        engine.context_mut().resume_progression();
        assert_eq!(engine.click(Point::new(0.0, 0.0)).unwrap(), Some(Progress::Advanced(2)));
    }

    #[test]
    fn failing_exit_hook_still_installs_the_next_scene() {
        let mut engine = engine();
        let mut first = Scene::new("first");
        first.on(scene::SceneEvent::ExitTransition, |_, _| Err(StageError::Step("exit broke".into())));
        engine.set_scene(first).unwrap();

        engine.set_scene(Scene::new("second")).unwrap();
        assert_eq!(engine.scene().map(|s| s.name()), Some("second"));
    }

    #[test]
    fn failing_start_keeps_the_incoming_scene() {
        let mut engine = engine();
        let mut broken = Scene::new("broken");
        broken.on(scene::SceneEvent::Initialization, |_, _| Err(StageError::Step("init broke".into())));

        assert!(engine.set_scene(broken).is_err());
        assert_eq!(engine.scene().map(|s| s.name()), Some("broken"));
    }

    #[test]
    fn debug_overlay_lists_nodes() {
        let mut engine = engine();
        let mut scene = Scene::new("overlay");
        scene.add(nodes::Node::boxed(nodes::NodeOptions::tagged("bg")));
        engine.set_scene(scene).unwrap();
        engine.set_debug(true);
        engine.tick(0.0).unwrap();
        let texts = engine.surface().texts();
        assert!(texts.contains(&"scene overlay"));
        assert!(texts.iter().any(|t| t.starts_with("#0 box")));
    }

    #[test]
    fn progress_without_scene_fails() {
        let mut engine = engine();
        assert!(matches!(engine.progress_dialog(), Err(StageError::NoScene)));
    }
}
