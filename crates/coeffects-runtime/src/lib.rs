//! Coeffects Runtime
//!
//! Scoped capability entry for async code. Each logical task owns a LIFO
//! stack of entered contexts that survives suspension unchanged and is never
//! observed by another task.
//!
//! - [`stack`] - the stack itself and its value types
//! - [`task`] - task-local installation, scoped entry and lookup

// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod stack;
pub mod task;

pub use error::{Error, Result, TopFrame};
pub use stack::{ContextFrame, ContextSnapshot, ContextStack, ContextValue, FrameId, StackState, TaskId};
pub use task::{
    current, enter, run_task, snapshot, spawn_inheriting, task_id, with_context, ContextScope,
    ReleaseError,
};
