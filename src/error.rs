//! Error types for staging scenes and running dialog.

use thiserror::Error;

use crate::engine::nodes::NodeId;

/// Errors raised by the stage.
///
/// Precondition violations are scripting or setup bugs and are returned to
/// the caller immediately; nothing in the engine retries them.
#[derive(Debug, Error)]
pub enum StageError {
    /// Dialog was progressed or built before a textbox was attached
    #[error("No textbox found. Attach one with `Engine::set_textbox` before running dialog.")]
    NoTextbox,

    /// Dialog was progressed before a dialog list was set
    #[error("No dialog found. Call `set_dialog_list` before `progress_dialog`.")]
    NoDialog,

    /// The engine was asked to run dialog with no scene installed
    #[error("No scene is running. Call `Engine::set_scene` first.")]
    NoScene,

    /// A node that already has a parent was registered as a scene root
    #[error("Cannot add node {0} to the scene: it already has a parent")]
    AlreadyParented(NodeId),

    /// A scene root was adopted as a child of another node
    #[error("Cannot adopt node {0}: it is registered as a scene root")]
    AlreadyRoot(NodeId),

    /// Reparenting would make a node its own ancestor
    #[error("Cannot make node {child} a child of {parent}: it would create a cycle")]
    Cycle {
        /// Node that would become the child
        child: NodeId,
        /// Node that would become the parent
        parent: NodeId,
    },

    /// A node id that does not exist in the scene
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    /// The node exists but is not of the kind the operation needs
    #[error("Node {id} is not a {expected}")]
    WrongKind {
        /// Node that was addressed
        id: NodeId,
        /// The kind the operation requires
        expected: &'static str,
    },

    /// `move_to` was asked to divide by less than one step
    #[error("Delay steps must be 1 or greater, got {0}")]
    InvalidDelay(u32),

    /// An unrecognized style string (paint style, color, alignment)
    #[error("Unknown {kind}: {value:?}")]
    InvalidStyle {
        /// What was being parsed
        kind: &'static str,
        /// The rejected input
        value: String,
    },

    /// An image resource failed to load
    #[error("Failed to load image {src}: {reason}")]
    ImageLoad {
        /// Source path of the image
        src: String,
        /// Loader-provided reason
        reason: String,
    },

    /// A step closure gave up
    #[error("Dialog step failed: {0}")]
    Step(String),
}

/// Result alias used across the crate.
pub type Result<T, E = StageError> = std::result::Result<T, E>;
