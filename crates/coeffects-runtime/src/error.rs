//! Runtime errors

use thiserror::Error;

use crate::stack::{FrameId, TaskId};

/// Runtime result type
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(
        "context stack corruption in {task}: released {frame} (pushed by {owner}) but top is {top}"
    )]
    ContextStackCorruption {
        /// Task that attempted the release
        task: TaskId,
        /// Frame being released
        frame: FrameId,
        /// Task the released scope belongs to
        owner: TaskId,
        /// Current top of the stack
        top: TopFrame,
    },

    #[error("context API used outside a coeffect task")]
    NoActiveTask,
}

/// Top of the stack at the time of a failed release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopFrame {
    Empty,
    Frame(FrameId),
}

impl std::fmt::Display for TopFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopFrame::Empty => write!(f, "<empty>"),
            TopFrame::Frame(id) => write!(f, "{}", id),
        }
    }
}
