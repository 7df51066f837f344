//! Dialog steps and the scripts they run.
//!
//! A step is invoked once when the player advances onto it and returns a
//! `Script`: an ordered queue of cues. Cues that take time (moves, delays,
//! image loads, text reveal) suspend the script; the scene resumes it on
//! later ticks. Scripts run independently of each other and of the cursor,
//! so the player may advance while an older script is still in flight.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use crate::engine::Context;
use crate::engine::animation::Animation;
use crate::engine::nodes::{ImageState, MoveTo, NodeId, NodeKind};
use crate::engine::scene::Scene;
use crate::engine::textbox::{TextBody, TextInput, TextStyle};
use crate::error::{Result, StageError};

/// Per-advance token. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct DialogEvent {
    proceeded: Rc<Cell<bool>>,
}

impl DialogEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the player has advanced past the step this event was handed to.
    pub fn has_proceeded(&self) -> bool {
        self.proceeded.get()
    }

    pub(crate) fn mark_proceeded(&self) {
        self.proceeded.set(true);
    }
}

/// One entry in a scene's dialog list.
pub struct DialogStep(Box<dyn FnMut(&DialogEvent) -> Script>);

impl DialogStep {
    pub fn new(step: impl FnMut(&DialogEvent) -> Script + 'static) -> Self {
        DialogStep(Box::new(step))
    }

    pub fn invoke(&mut self, event: &DialogEvent) -> Script {
        (self.0)(event)
    }
}

impl From<Script> for DialogStep {
    fn from(script: Script) -> Self {
        let mut slot = Some(script);
        DialogStep::new(move |_| slot.take().unwrap_or_default())
    }
}

impl fmt::Debug for DialogStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DialogStep(..)")
    }
}

/// Forward-only cursor over the dialog list.
#[derive(Debug, Default)]
pub struct DialogCursor {
    steps: Vec<DialogStep>,
    next: usize,
}

impl DialogCursor {
    pub fn new(steps: Vec<DialogStep>) -> Self {
        DialogCursor { steps, next: 0 }
    }

    /// Pull the next step, or `None` once the list is exhausted.
    pub fn pull(&mut self) -> Option<&mut DialogStep> {
        let step = self.steps.get_mut(self.next)?;
        self.next += 1;
        Some(step)
    }

    pub fn position(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.steps.len() - self.next
    }
}

/// What a call to `progress_dialog` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The line was still revealing; it is now complete.
    FastForwarded,
    /// The step at this index was started.
    Advanced(usize),
    /// The list is exhausted; the finished hook ran.
    Finished,
}

pub type ScriptFn = Box<dyn FnOnce(&mut Scene, &mut Context, &DialogEvent) -> Result<()>>;

pub enum Cue {
    Display {
        text: TextBody,
        title: Option<TextInput>,
        defaults: TextStyle,
    },
    Continue(TextBody),
    Say {
        speaker: NodeId,
        text: TextBody,
    },
    MoveTo {
        node: NodeId,
        target: MoveTo,
    },
    Wait(f64),
    SetSprite {
        node: NodeId,
        src: String,
        ratio: Option<f64>,
    },
    WaitForReveal,
    SetAnimation {
        node: NodeId,
        animation: Box<dyn Animation>,
    },
    StartAnimation(NodeId),
    StopAnimation(NodeId),
    PauseProgression,
    ResumeProgression,
    /// Stop the script quietly if the player has moved on.
    SkipIfProceeded,
    Run(ScriptFn),
}

impl fmt::Debug for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::Display { text, .. } => f.debug_struct("Display").field("text", text).finish(),
            Cue::Continue(text) => f.debug_tuple("Continue").field(text).finish(),
            Cue::Say { speaker, .. } => f.debug_struct("Say").field("speaker", speaker).finish(),
            Cue::MoveTo { node, target } => f.debug_struct("MoveTo").field("node", node).field("target", target).finish(),
            Cue::Wait(ms) => f.debug_tuple("Wait").field(ms).finish(),
            Cue::SetSprite { node, src, .. } => f.debug_struct("SetSprite").field("node", node).field("src", src).finish(),
            Cue::WaitForReveal => f.write_str("WaitForReveal"),
            Cue::SetAnimation { node, .. } => f.debug_struct("SetAnimation").field("node", node).finish(),
            Cue::StartAnimation(node) => f.debug_tuple("StartAnimation").field(node).finish(),
            Cue::StopAnimation(node) => f.debug_tuple("StopAnimation").field(node).finish(),
            Cue::PauseProgression => f.write_str("PauseProgression"),
            Cue::ResumeProgression => f.write_str("ResumeProgression"),
            Cue::SkipIfProceeded => f.write_str("SkipIfProceeded"),
            Cue::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// Builder for the cue queue a step returns.
#[derive(Debug, Default)]
pub struct Script {
    cues: VecDeque<Cue>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, cue: Cue) -> Self {
        self.cues.push_back(cue);
        self
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn display(self, text: impl Into<TextBody>) -> Self {
        self.display_with(text, None, TextStyle::default())
    }

    pub fn display_titled(self, text: impl Into<TextBody>, title: impl Into<TextInput>) -> Self {
        self.display_with(text, Some(title.into()), TextStyle::default())
    }

    pub fn display_with(self, text: impl Into<TextBody>, title: Option<TextInput>, defaults: TextStyle) -> Self {
        self.push(Cue::Display {
            text: text.into(),
            title,
            defaults,
        })
    }

    pub fn continue_dialog(self, text: impl Into<TextBody>) -> Self {
        self.push(Cue::Continue(text.into()))
    }

    /// Display `text` titled with the speaking character's name.
    pub fn say(self, speaker: NodeId, text: impl Into<TextBody>) -> Self {
        self.push(Cue::Say {
            speaker,
            text: text.into(),
        })
    }

    /// Start a move and wait for it to land.
    pub fn move_to(self, node: NodeId, target: MoveTo) -> Self {
        self.push(Cue::MoveTo { node, target })
    }

    pub fn wait(self, ms: f64) -> Self {
        self.push(Cue::Wait(ms))
    }

    /// Swap a sprite's image and wait for it to load. A failed load halts the
    /// script.
    pub fn set_sprite(self, node: NodeId, src: &str, ratio: Option<f64>) -> Self {
        self.push(Cue::SetSprite {
            node,
            src: src.to_string(),
            ratio,
        })
    }

    pub fn wait_for_reveal(self) -> Self {
        self.push(Cue::WaitForReveal)
    }

    pub fn set_animation(self, node: NodeId, animation: impl Animation + 'static) -> Self {
        self.push(Cue::SetAnimation {
            node,
            animation: Box::new(animation),
        })
    }

    pub fn start_animation(self, node: NodeId) -> Self {
        self.push(Cue::StartAnimation(node))
    }

    pub fn stop_animation(self, node: NodeId) -> Self {
        self.push(Cue::StopAnimation(node))
    }

    pub fn pause_progression(self) -> Self {
        self.push(Cue::PauseProgression)
    }

    pub fn resume_progression(self) -> Self {
        self.push(Cue::ResumeProgression)
    }

    pub fn unless_proceeded(self) -> Self {
        self.push(Cue::SkipIfProceeded)
    }

    pub fn then(self, f: impl FnOnce(&mut Scene, &mut Context, &DialogEvent) -> Result<()> + 'static) -> Self {
        self.push(Cue::Run(Box::new(f)))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Wait {
    Delay(f64),
    Movement(NodeId),
    Sprite(NodeId),
    Reveal,
}

enum Flow {
    Next,
    Suspend(Wait),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Pending,
    Done,
}

/// A script in flight, bound to the event of the step that produced it.
#[derive(Debug)]
pub struct RunningScript {
    cues: VecDeque<Cue>,
    event: DialogEvent,
    waiting: Option<Wait>,
}

impl RunningScript {
    pub fn new(script: Script, event: DialogEvent) -> Self {
        RunningScript {
            cues: script.cues,
            event,
            waiting: None,
        }
    }

    /// Run cues until one suspends or the queue empties. `dt` is the time
    /// elapsed since the last call; only delays consume it.
    pub fn advance(&mut self, scene: &mut Scene, ctx: &mut Context, dt: f64) -> ScriptState {
        let mut budget = dt;
        loop {
            if let Some(wait) = self.waiting.take() {
                match self.poll_wait(wait, scene, ctx, &mut budget) {
                    Ok(None) => {}
                    Ok(Some(still)) => {
                        self.waiting = Some(still);
                        return ScriptState::Pending;
                    }
                    Err(e) => {
                        warn!("dialog script halted: {e}");
                        return ScriptState::Done;
                    }
                }
            }

            let Some(cue) = self.cues.pop_front() else {
                return ScriptState::Done;
            };
            match self.apply(cue, scene, ctx) {
                Ok(Flow::Next) => {}
                Ok(Flow::Suspend(wait)) => self.waiting = Some(wait),
                Ok(Flow::Stop) => return ScriptState::Done,
                Err(e) => {
                    warn!("dialog script halted: {e}");
                    return ScriptState::Done;
                }
            }
        }
    }

    fn poll_wait(&self, wait: Wait, scene: &Scene, ctx: &Context, budget: &mut f64) -> Result<Option<Wait>> {
        match wait {
            Wait::Delay(remaining) => {
                if *budget >= remaining {
                    *budget -= remaining;
                    Ok(None)
                } else {
                    let left = remaining - *budget;
                    *budget = 0.0;
                    Ok(Some(Wait::Delay(left)))
                }
            }
            Wait::Movement(id) => Ok(scene.get(id)?.is_moving().then_some(Wait::Movement(id))),
            Wait::Sprite(id) => {
                let sprite = scene.get(id)?.kind.sprite().ok_or(StageError::WrongKind { id, expected: "sprite" })?;
                match sprite.state() {
                    ImageState::Queued | ImageState::Loading => Ok(Some(Wait::Sprite(id))),
                    ImageState::Failed(reason) => Err(StageError::ImageLoad {
                        src: sprite.src.clone().unwrap_or_default(),
                        reason: reason.clone(),
                    }),
                    ImageState::Ready(_) | ImageState::Unset => Ok(None),
                }
            }
            Wait::Reveal => {
                let textbox = ctx.textbox().ok_or(StageError::NoTextbox)?;
                Ok((!textbox.finished()).then_some(Wait::Reveal))
            }
        }
    }

    fn apply(&self, cue: Cue, scene: &mut Scene, ctx: &mut Context) -> Result<Flow> {
        match cue {
            Cue::Display { text, title, defaults } => {
                ctx.textbox_mut().ok_or(StageError::NoTextbox)?.display(text, title, &defaults);
            }
            Cue::Continue(text) => {
                ctx.textbox_mut().ok_or(StageError::NoTextbox)?.continue_dialog(text);
            }
            Cue::Say { speaker, text } => {
                let node = scene.get(speaker)?;
                let NodeKind::Character(character) = &node.kind else {
                    return Err(StageError::WrongKind {
                        id: speaker,
                        expected: "character",
                    });
                };
                let title = character.title(node.props.color);
                ctx.textbox_mut()
                    .ok_or(StageError::NoTextbox)?
                    .display(text, Some(title.into()), &TextStyle::default());
            }
            Cue::MoveTo { node, target } => {
                scene.get_mut(node)?.move_to(target)?;
                return Ok(Flow::Suspend(Wait::Movement(node)));
            }
            Cue::Wait(ms) => return Ok(Flow::Suspend(Wait::Delay(ms))),
            Cue::SetSprite { node, src, ratio } => {
                scene.set_sprite(ctx, node, &src, ratio)?;
                return Ok(Flow::Suspend(Wait::Sprite(node)));
            }
            Cue::WaitForReveal => return Ok(Flow::Suspend(Wait::Reveal)),
            Cue::SetAnimation { node, animation } => {
                scene.get_mut(node)?.set_boxed_animation(animation);
            }
            Cue::StartAnimation(node) => {
                let now = ctx.now();
                scene.get_mut(node)?.start_animation(now);
            }
            Cue::StopAnimation(node) => {
                scene.get_mut(node)?.stop_animation();
            }
            Cue::PauseProgression => ctx.pause_progression(),
            Cue::ResumeProgression => ctx.resume_progression(),
            Cue::SkipIfProceeded => {
                if self.event.has_proceeded() {
                    debug!("skipping the rest of a stale dialog script");
                    return Ok(Flow::Stop);
                }
            }
            Cue::Run(f) => f(scene, ctx, &self.event)?,
        }
        Ok(Flow::Next)
    }
}
