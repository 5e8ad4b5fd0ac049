//! Task-local context entry.
//!
//! Every logical task started with [`run_task`] (or [`spawn_inheriting`])
//! owns one [`ContextStack`]. The stack lives in a tokio task-local, so the
//! executor swaps it in before each poll and out after it: whatever a task
//! entered is visible only while that task runs, and is exactly as it left
//! it when the task resumes after a suspension point.
//!
//! Entering a context returns a [`ContextScope`]. Releasing the scope (or
//! dropping it, including when the task is cancelled) pops its frame.
//!
//! ```text
//! run_task ─▶ enter(policy, 0) ─▶ with_context(policy, 1, fut) ─▶ current(policy) == 1
//!                                         .await
//!                                 ◀── scope released ── current(policy) == 0
//! ```

use std::cell::RefCell;
use std::future::Future;

use coeffects_foundation::CapabilityTag;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::stack::{ContextSnapshot, ContextStack, ContextValue, FrameId, TaskId};

tokio::task_local! {
    static ACTIVE: RefCell<ContextStack>;
}

/// Run `fut` as a logical task whose stack starts as `initial`.
pub fn run_task<F>(
    initial: Vec<(CapabilityTag, ContextValue)>,
    fut: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let stack = ContextStack::with_initial(TaskId::next(), initial);
    debug!(task = %stack.task(), depth = stack.depth(), "starting task");
    ACTIVE.scope(RefCell::new(stack), fut)
}

/// Spawn `fut` on the tokio runtime as a child task.
///
/// The child starts with a copy of the current stack; it can read the
/// inherited frames but only release the ones it enters itself.
///
/// # Errors
///
/// [`Error::NoActiveTask`] outside a logical task.
pub fn spawn_inheriting<F>(fut: F) -> Result<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let child = with_stack(|stack| stack.fork(TaskId::next()))?;
    debug!(task = %child.task(), depth = child.depth(), "spawning child task");
    Ok(tokio::spawn(ACTIVE.scope(RefCell::new(child), fut)))
}

/// Push a frame for `tag` onto the current task's stack.
///
/// # Errors
///
/// [`Error::NoActiveTask`] outside a logical task.
pub fn enter(tag: CapabilityTag, value: ContextValue) -> Result<ContextScope> {
    with_stack_mut(|stack| ContextScope {
        frame: stack.push(tag, value),
        task: stack.task(),
        released: false,
    })
}

/// Innermost value entered for `tag` in the current task.
pub fn current(tag: CapabilityTag) -> Result<Option<ContextValue>> {
    with_stack(|stack| stack.current(tag).cloned())
}

/// Read-only copy of the current task's stack.
pub fn snapshot() -> Result<ContextSnapshot> {
    with_stack(ContextStack::snapshot)
}

/// Id of the current logical task.
pub fn task_id() -> Result<TaskId> {
    with_stack(ContextStack::task)
}

/// Run `fut` with `tag` entered, releasing it when `fut` completes.
///
/// # Errors
///
/// [`Error::NoActiveTask`] outside a logical task, and
/// [`Error::ContextStackCorruption`] if `fut`'s output still holds scopes
/// of its own. The output is then dropped so those scopes unwind first, and
/// the entered context is released after them.
pub async fn with_context<F>(tag: CapabilityTag, value: ContextValue, fut: F) -> Result<F::Output>
where
    F: Future,
{
    let scope = enter(tag, value)?;
    let output = fut.await;
    match scope.release() {
        Ok(()) => Ok(output),
        Err(failed) => {
            drop(output);
            let (error, scope) = failed.into_parts();
            drop(scope);
            Err(error)
        }
    }
}

/// A release that would have corrupted the stack.
///
/// Carries the scope back so it can be released once the frames above it
/// are gone. Dropping the error drops the scope, which panics if the frame
/// is still not on top.
#[derive(Debug)]
pub struct ReleaseError {
    error: Error,
    scope: ContextScope,
}

impl ReleaseError {
    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_scope(self) -> ContextScope {
        self.scope
    }

    pub fn into_parts(self) -> (Error, ContextScope) {
        (self.error, self.scope)
    }
}

impl std::fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for ReleaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Token for one entered context.
///
/// Dropping the scope releases it. A drop that would corrupt the stack
/// panics, unless the thread is already unwinding.
#[derive(Debug)]
#[must_use = "dropping a scope releases its context immediately"]
pub struct ContextScope {
    frame: FrameId,
    task: TaskId,
    released: bool,
}

impl ContextScope {
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Pop this scope's frame.
    ///
    /// # Errors
    ///
    /// A [`ReleaseError`] wrapping [`Error::ContextStackCorruption`] when the
    /// frame is not on top of the current task's stack. The stack is left as
    /// it was and the scope is handed back still armed.
    pub fn release(mut self) -> std::result::Result<(), ReleaseError> {
        match pop(self.frame, self.task) {
            Ok(()) => {
                self.released = true;
                Ok(())
            }
            Err(error) => Err(ReleaseError { error, scope: self }),
        }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match pop(self.frame, self.task) {
            Ok(()) => {}
            // The task-local is already gone; its frames went with it.
            Err(Error::NoActiveTask) => {
                debug!(frame = %self.frame, task = %self.task, "scope dropped after task teardown");
            }
            Err(err) if std::thread::panicking() => {
                error!(error = %err, "context scope dropped out of order while unwinding");
            }
            Err(err) => panic!("{}", err),
        }
    }
}

fn pop(frame: FrameId, task: TaskId) -> Result<()> {
    with_stack_mut(|stack| stack.pop(frame, task).map(|_| ()))?
}

fn with_stack<R>(f: impl FnOnce(&ContextStack) -> R) -> Result<R> {
    ACTIVE
        .try_with(|cell| f(&cell.borrow()))
        .map_err(|_| Error::NoActiveTask)
}

fn with_stack_mut<R>(f: impl FnOnce(&mut ContextStack) -> R) -> Result<R> {
    ACTIVE
        .try_with(|cell| f(&mut cell.borrow_mut()))
        .map_err(|_| Error::NoActiveTask)
}
