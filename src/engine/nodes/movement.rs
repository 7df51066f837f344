use crate::error::{Result, StageError};
use crate::types::Point;

/// Within this distance an axis snaps straight to its target.
const SNAP_DISTANCE: f64 = 2.0;

/// A requested smooth move. Only the axes that are set will move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTo {
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Each easing step covers `remaining / delay_steps`. Higher is slower;
    /// `1` lands in a single step.
    pub delay_steps: u32,
    /// Milliseconds to wait before the first step.
    pub after_ms: f64,
}

impl Default for MoveTo {
    fn default() -> Self {
        MoveTo {
            x: None,
            y: None,
            delay_steps: 25,
            after_ms: 0.0,
        }
    }
}

impl MoveTo {
    pub fn x(x: f64) -> Self {
        MoveTo {
            x: Some(x),
            ..Default::default()
        }
    }

    pub fn y(y: f64) -> Self {
        MoveTo {
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        MoveTo {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn delay_steps(mut self, steps: u32) -> Self {
        self.delay_steps = steps;
        self
    }

    pub fn after(mut self, ms: f64) -> Self {
        self.after_ms = ms;
        self
    }
}

/// Pending movement record, advanced by elapsed time at a fixed cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    target_x: Option<f64>,
    target_y: Option<f64>,
    divisor: f64,
    wait_ms: f64,
    carry: f64,
    stepped: bool,
}

fn ease_axis(current: &mut f64, target: f64, divisor: f64) {
    if *current == target {
        return;
    }
    if (target - *current).abs() > SNAP_DISTANCE {
        *current += (target - *current) / divisor;
    } else {
        *current = target;
    }
}

impl Movement {
    pub fn new(request: &MoveTo) -> Result<Self> {
        if request.delay_steps < 1 {
            return Err(StageError::InvalidDelay(request.delay_steps));
        }
        Ok(Movement {
            target_x: request.x,
            target_y: request.y,
            divisor: request.delay_steps as f64,
            wait_ms: request.after_ms.max(0.0),
            carry: 0.0,
            stepped: false,
        })
    }

    pub fn arrived(&self, pos: Point) -> bool {
        self.target_x.is_none_or(|x| pos.x == x) && self.target_y.is_none_or(|y| pos.y == y)
    }

    /// One easing step. Returns `true` once every requested axis is exactly
    /// on target.
    pub fn step(&self, pos: &mut Point) -> bool {
        if let Some(x) = self.target_x {
            ease_axis(&mut pos.x, x, self.divisor);
        }
        if let Some(y) = self.target_y {
            ease_axis(&mut pos.y, y, self.divisor);
        }
        self.arrived(*pos)
    }

    /// Advance by `dt` milliseconds. The first step fires as soon as the
    /// initial wait has elapsed, later ones every `cadence` milliseconds.
    pub fn advance(&mut self, pos: &mut Point, dt: f64, cadence: f64) -> bool {
        let mut budget = dt.max(0.0);
        if self.wait_ms > 0.0 {
            let used = budget.min(self.wait_ms);
            self.wait_ms -= used;
            budget -= used;
            if self.wait_ms > 0.0 {
                return false;
            }
        }
        if !self.stepped {
            self.stepped = true;
            if self.step(pos) {
                return true;
            }
        }
        self.carry += budget;
        while self.carry >= cadence {
            self.carry -= cadence;
            if self.step(pos) {
                return true;
            }
        }
        false
    }
}
