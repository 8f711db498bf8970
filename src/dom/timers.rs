use std::cell::RefCell;
use std::rc::Weak;

use gloo_timers::callback::Timeout;
use log::warn;

use crate::routing::controller::{RoutingController, Task};
use crate::routing::scheduler::{Scheduler, TaskHandle};

/// Runs controller tasks on `setTimeout`.
///
/// Timers are forgotten once armed; cancellation goes through the
/// [`TaskHandle`] flag checked when the timer fires.
pub struct TimeoutScheduler {
    controller: Weak<RefCell<RoutingController>>,
}

impl TimeoutScheduler {
    pub fn new(controller: Weak<RefCell<RoutingController>>) -> Self {
        Self { controller }
    }
}

impl Scheduler for TimeoutScheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let guard = handle.clone();
        let controller = self.controller.clone();

        let timeout = Timeout::new(delay_ms, move || {
            if guard.is_cancelled() {
                return;
            }
            let Some(controller) = controller.upgrade() else {
                return;
            };
            match controller.try_borrow_mut() {
                Ok(mut controller) => controller.run_task(task),
                Err(_) => warn!("Router busy, dropped {:?}", task),
            };
        });
        timeout.forget();

        handle
    }
}
