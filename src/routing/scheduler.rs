use std::cell::Cell;
use std::rc::Rc;

use super::controller::Task;

/// Cancellation side of a scheduled [`Task`].
///
/// Cloning shares the flag. Schedulers must check [`TaskHandle::is_cancelled`]
/// right before delivering the task.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Delivers a task back to the controller after `delay_ms` (macrotask).
pub trait Scheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> TaskHandle;
}
