//! The per-task context stack.
//!
//! A [`ContextStack`] is a plain LIFO of [`ContextFrame`]s. It knows nothing
//! about tasks or suspension; [`crate::task`] installs one per logical task
//! and swaps it in and out around every poll.
//!
//! ```text
//!   Idle ──push──▶ Active(1) ──push──▶ Active(2)
//!    ▲                │  ▲                 │
//!    └──────pop───────┘  └───────pop───────┘
//! ```
//!
//! Releases must be strictly LIFO. Releasing anything other than the top
//! frame, or a frame pushed by another task, is a
//! [`Error::ContextStackCorruption`] and leaves the stack untouched.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use coeffects_foundation::CapabilityTag;
use serde::Serialize;
use tracing::trace;

use crate::error::{Error, Result, TopFrame};

static NEXT_TASK: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical task.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate a fresh task identity.
    pub fn next() -> Self {
        Self(NEXT_TASK.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Identity of a frame within one stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId(u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Value carried by a context frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    Unit,
    Int(i64),
    Str(String),
}

impl From<()> for ContextValue {
    fn from(_: ()) -> Self {
        ContextValue::Unit
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Unit => write!(f, "()"),
            ContextValue::Int(value) => write!(f, "{}", value),
            ContextValue::Str(value) => write!(f, "{:?}", value),
        }
    }
}

/// One entered context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFrame {
    pub id: FrameId,
    pub tag: CapabilityTag,
    pub value: ContextValue,
    /// Task that pushed the frame
    pub task: TaskId,
}

/// Coarse stack state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StackState {
    Idle,
    Active(usize),
}

/// Read-only copy of a stack, bottom first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    frames: Vec<(CapabilityTag, ContextValue)>,
}

impl ContextSnapshot {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost value for `tag`.
    pub fn get(&self, tag: CapabilityTag) -> Option<&ContextValue> {
        self.frames
            .iter()
            .rev()
            .find(|(t, _)| *t == tag)
            .map(|(_, value)| value)
    }

    /// Frames from the bottom of the stack to the top.
    pub fn iter(&self) -> impl Iterator<Item = (CapabilityTag, &ContextValue)> {
        self.frames.iter().map(|(tag, value)| (*tag, value))
    }
}

/// LIFO of entered contexts owned by one task.
#[derive(Debug, Clone)]
pub struct ContextStack {
    task: TaskId,
    frames: Vec<ContextFrame>,
    next_frame: u64,
}

impl ContextStack {
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            frames: Vec::new(),
            next_frame: 0,
        }
    }

    /// A stack pre-populated with `initial`, bottom first.
    pub fn with_initial(
        task: TaskId,
        initial: impl IntoIterator<Item = (CapabilityTag, ContextValue)>,
    ) -> Self {
        let mut stack = Self::new(task);
        for (tag, value) in initial {
            stack.push(tag, value);
        }
        stack
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn state(&self) -> StackState {
        match self.frames.len() {
            0 => StackState::Idle,
            depth => StackState::Active(depth),
        }
    }

    pub fn top(&self) -> Option<&ContextFrame> {
        self.frames.last()
    }

    /// Push a frame owned by this stack's task.
    pub fn push(&mut self, tag: CapabilityTag, value: ContextValue) -> FrameId {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        trace!(task = %self.task, frame = %id, %tag, %value, "push");
        self.frames.push(ContextFrame {
            id,
            tag,
            value,
            task: self.task,
        });
        id
    }

    /// Pop `frame`, which `owner` claims to have pushed.
    ///
    /// # Errors
    ///
    /// [`Error::ContextStackCorruption`] when `frame` is not the top of the
    /// stack or was pushed by a different task. The stack is not modified.
    pub fn pop(&mut self, frame: FrameId, owner: TaskId) -> Result<ContextFrame> {
        let matches = self
            .frames
            .last()
            .is_some_and(|top| top.id == frame && top.task == owner && owner == self.task);
        if !matches {
            return Err(Error::ContextStackCorruption {
                task: self.task,
                frame,
                owner,
                top: self.top().map_or(TopFrame::Empty, |top| TopFrame::Frame(top.id)),
            });
        }

        let popped = self.frames.pop().ok_or(Error::ContextStackCorruption {
            task: self.task,
            frame,
            owner,
            top: TopFrame::Empty,
        })?;
        trace!(task = %self.task, frame = %popped.id, tag = %popped.tag, "pop");
        Ok(popped)
    }

    /// Innermost value entered for `tag`.
    pub fn current(&self, tag: CapabilityTag) -> Option<&ContextValue> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.tag == tag)
            .map(|frame| &frame.value)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            frames: self
                .frames
                .iter()
                .map(|frame| (frame.tag, frame.value.clone()))
                .collect(),
        }
    }

    /// Copy this stack for a child task.
    ///
    /// Inherited frames keep their original pusher, so the child can read
    /// them but never release them.
    pub fn fork(&self, child: TaskId) -> Self {
        Self {
            task: child,
            frames: self.frames.clone(),
            next_frame: self.next_frame,
        }
    }
}
