//! Per-node animation strategies.
//!
//! A strategy captures whatever it needs in `on_start`, mutates the node on
//! every tick while running, and puts everything back in `on_stop`.

use crate::engine::FrameTime;
use crate::engine::nodes::Node;
use crate::types::Point;

pub trait Animation {
    /// Called every tick while running. `elapsed` is milliseconds since the
    /// animation was started.
    fn update(&mut self, node: &mut Node, frame: &FrameTime, elapsed: f64);

    fn on_start(&mut self, _node: &mut Node) {}

    fn on_stop(&mut self, _node: &mut Node) {}
}

/// Small jitter on both axes.
#[derive(Debug, Clone)]
pub struct ShakingAnimation {
    pub frequency: f64,
    original: Point,
}

impl ShakingAnimation {
    pub fn new(frequency: f64) -> Self {
        ShakingAnimation {
            frequency,
            original: Point::ZERO,
        }
    }
}

impl Default for ShakingAnimation {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl Animation for ShakingAnimation {
    fn update(&mut self, node: &mut Node, _frame: &FrameTime, elapsed: f64) {
        let p = &mut node.props.position;
        p.x += (elapsed / self.frequency).sin() * 0.5;
        p.y += (elapsed / (self.frequency * 3.0)).sin() * 0.5;
    }

    fn on_start(&mut self, node: &mut Node) {
        self.original = node.props.position;
    }

    fn on_stop(&mut self, node: &mut Node) {
        node.props.position = self.original;
    }
}

/// Rise slowly for a second (scaled by speed), then drop back quickly.
#[derive(Debug, Clone)]
pub struct SighAnimation {
    pub speed: f64,
    original_y: f64,
}

impl SighAnimation {
    pub fn new(speed: f64) -> Self {
        SighAnimation {
            speed,
            original_y: 0.0,
        }
    }
}

impl Default for SighAnimation {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Animation for SighAnimation {
    fn update(&mut self, node: &mut Node, _frame: &FrameTime, elapsed: f64) {
        let y = &mut node.props.position.y;
        if elapsed <= 1000.0 / self.speed {
            *y -= self.speed / 10.0;
        } else if *y < self.original_y {
            *y = (*y + self.speed / 2.0).min(self.original_y);
        } else if *y > self.original_y {
            *y = self.original_y;
        }
    }

    fn on_start(&mut self, node: &mut Node) {
        self.original_y = node.props.position.y;
    }

    fn on_stop(&mut self, node: &mut Node) {
        node.props.position.y = self.original_y;
    }
}

/// Gentle vertical bob.
#[derive(Debug, Clone, Default)]
pub struct UpDownAnimation {
    original_y: f64,
}

impl UpDownAnimation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Animation for UpDownAnimation {
    fn update(&mut self, node: &mut Node, _frame: &FrameTime, elapsed: f64) {
        node.props.position.y += (elapsed / 200.0).sin() * 0.5;
    }

    fn on_start(&mut self, node: &mut Node) {
        self.original_y = node.props.position.y;
    }

    fn on_stop(&mut self, node: &mut Node) {
        node.props.position.y = self.original_y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::nodes::NodeOptions;

    fn run(node: &mut Node, frames: usize) {
        for i in 0..frames {
            let t = (i as f64 + 1.0) * 16.0;
            node.update_animation(&FrameTime { delta: 16.0, time: t });
        }
    }

    #[test]
    fn stop_restores_position_after_shaking() {
        let mut node = Node::boxed(NodeOptions {
            x: 123.5,
            y: 77.25,
            ..Default::default()
        });
        node.set_animation(ShakingAnimation::default());
        node.start_animation(0.0);
        run(&mut node, 40);
        assert_ne!(node.props.position, Point::new(123.5, 77.25));
        node.stop_animation();
        assert_eq!(node.props.position, Point::new(123.5, 77.25));
    }

    #[test]
    fn restarting_restores_before_recapturing() {
        let mut node = Node::boxed(NodeOptions {
            y: 10.0,
            ..Default::default()
        });
        node.set_animation(SighAnimation::default());
        node.start_animation(0.0);
        run(&mut node, 10);
        node.start_animation(160.0);
        node.stop_animation();
        assert_eq!(node.props.position.y, 10.0);
    }

    #[test]
    fn replacing_a_running_animation_stops_it() {
        let mut node = Node::boxed(NodeOptions {
            y: 50.0,
            ..Default::default()
        });
        node.set_animation(UpDownAnimation::new());
        node.start_animation(0.0);
        run(&mut node, 30);
        node.set_animation(ShakingAnimation::default());
        assert!(!node.animation_running());
        assert_eq!(node.props.position.y, 50.0);
    }

    #[test]
    fn sigh_rises_then_settles() {
        let mut node = Node::boxed(NodeOptions {
            y: 100.0,
            ..Default::default()
        });
        node.set_animation(SighAnimation::new(1.0));
        node.start_animation(0.0);
        node.update_animation(&FrameTime { delta: 16.0, time: 500.0 });
        assert!(node.props.position.y < 100.0);
        for i in 0..100 {
            node.update_animation(&FrameTime {
                delta: 16.0,
                time: 1100.0 + i as f64 * 16.0,
            });
        }
        assert_eq!(node.props.position.y, 100.0);
    }
}
