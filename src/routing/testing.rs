//! In-memory stand-ins for the page, used by unit and scenario tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::controller::{AddressBar, HistoryMode, ModalPhase, RoutingController, Task};
use super::error::RouteError;
use super::registry::{ModalDescriptor, ModalRegistry, ModalSurface, SubEntityResolver};
use super::scheduler::{Scheduler, TaskHandle};
use crate::config::{default_routes, RetryPolicy, SubEntities};

#[derive(Debug, Default)]
pub struct FakeSurface {
    mounted: Cell<bool>,
    active: Cell<bool>,
    activations: Cell<u32>,
    deactivations: Cell<u32>,
    scroll_resets: Cell<u32>,
}

impl FakeSurface {
    pub fn mounted() -> Rc<Self> {
        let surface = Self::default();
        surface.mounted.set(true);
        Rc::new(surface)
    }

    pub fn mount(&self) {
        self.mounted.set(true);
    }

    pub fn unmount(&self) {
        self.mounted.set(false);
    }

    pub fn activations(&self) -> u32 {
        self.activations.get()
    }

    pub fn deactivations(&self) -> u32 {
        self.deactivations.get()
    }

    pub fn scroll_resets(&self) -> u32 {
        self.scroll_resets.get()
    }
}

impl ModalSurface for FakeSurface {
    fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    fn is_active(&self) -> bool {
        self.mounted.get() && self.active.get()
    }

    fn activate(&self) {
        self.active.set(true);
        self.activations.set(self.activations.get() + 1);
    }

    fn deactivate(&self) {
        self.active.set(false);
        self.deactivations.set(self.deactivations.get() + 1);
    }

    fn reset_scroll(&self) {
        self.scroll_resets.set(self.scroll_resets.get() + 1);
    }
}

#[derive(Debug, Default)]
struct BarState {
    fragment: String,
    writes: Vec<(String, HistoryMode)>,
}

/// Clones share the same address bar.
#[derive(Debug, Clone, Default)]
pub struct FakeAddressBar {
    state: Rc<RefCell<BarState>>,
}

impl FakeAddressBar {
    /// The user (or the back button) changes the fragment.
    pub fn navigate(&self, fragment: &str) {
        self.state.borrow_mut().fragment = fragment.to_string();
    }

    pub fn fragment_now(&self) -> String {
        self.state.borrow().fragment.clone()
    }

    pub fn writes(&self) -> Vec<(String, HistoryMode)> {
        self.state.borrow().writes.clone()
    }
}

impl AddressBar for FakeAddressBar {
    fn fragment(&self) -> String {
        self.fragment_now()
    }

    fn write_fragment(&self, fragment: &str, mode: HistoryMode) {
        let mut state = self.state.borrow_mut();
        state.fragment = fragment.to_string();
        state.writes.push((fragment.to_string(), mode));
    }
}

struct Queued {
    due: u64,
    seq: u64,
    task: Task,
    handle: TaskHandle,
}

#[derive(Default)]
struct Clock {
    now: u64,
    seq: u64,
    queue: Vec<Queued>,
}

/// Virtual-time scheduler; tasks run only inside [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Rc<RefCell<Clock>>,
}

impl ManualScheduler {
    pub fn now(&self) -> u64 {
        self.clock.borrow().now
    }

    pub fn live_tasks(&self) -> Vec<Task> {
        self.clock
            .borrow()
            .queue
            .iter()
            .filter(|queued| !queued.handle.is_cancelled())
            .map(|queued| queued.task.clone())
            .collect()
    }

    /// Runs every task due within `ms`, in due order, then sets the clock.
    pub fn advance(&self, controller: &mut RoutingController, ms: u64) {
        let target = self.now() + ms;
        loop {
            let next = {
                let mut clock = self.clock.borrow_mut();
                let index = clock
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, queued)| queued.due <= target)
                    .min_by_key(|(_, queued)| (queued.due, queued.seq))
                    .map(|(index, _)| index);
                index.map(|index| {
                    let queued = clock.queue.remove(index);
                    clock.now = queued.due;
                    queued
                })
            };
            let Some(queued) = next else { break };
            if !queued.handle.is_cancelled() {
                controller.run_task(queued.task);
            }
        }
        self.clock.borrow_mut().now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> TaskHandle {
        let mut clock = self.clock.borrow_mut();
        let handle = TaskHandle::new();
        clock.seq += 1;
        let queued = Queued {
            due: clock.now + u64::from(delay_ms),
            seq: clock.seq,
            task,
            handle: handle.clone(),
        };
        clock.queue.push(queued);
        handle
    }
}

/// Resolver that knows a fixed set of sub-paths.
#[derive(Debug, Default)]
pub struct RecordingResolver {
    known: Vec<String>,
    revealed: RefCell<Vec<String>>,
    attempts: Cell<u32>,
}

impl RecordingResolver {
    pub fn knowing(known: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            known: known.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn revealed(&self) -> Vec<String> {
        self.revealed.borrow().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }
}

impl SubEntityResolver for RecordingResolver {
    fn reveal(&self, modal_id: &str, sub_path: &str) -> Result<(), RouteError> {
        self.attempts.set(self.attempts.get() + 1);
        if !self.known.iter().any(|known| known == sub_path) {
            return Err(RouteError::SubEntityNotFound {
                modal_id: modal_id.to_string(),
                sub_path: sub_path.to_string(),
            });
        }
        self.revealed.borrow_mut().push(sub_path.to_string());
        Ok(())
    }
}

/// Controller wired to fakes for every modal of the default route table.
pub struct Harness {
    pub controller: RoutingController,
    pub bar: FakeAddressBar,
    pub scheduler: ManualScheduler,
    pub slides: Rc<RecordingResolver>,
    pub trainers: Rc<RecordingResolver>,
    surfaces: HashMap<String, Rc<FakeSurface>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_boot_delay(0)
    }

    pub fn with_boot_delay(boot_delay_ms: u32) -> Self {
        let bar = FakeAddressBar::default();
        let scheduler = ManualScheduler::default();
        let slides = RecordingResolver::knowing(&["fight", "first-steps", "spa"]);
        let trainers = RecordingResolver::knowing(&["trainer-ivanov", "trainer-savkin"]);
        let mut surfaces = HashMap::new();

        let registry = ModalRegistry::from_routes(&default_routes(), |route| {
            let surface = FakeSurface::mounted();
            surfaces.insert(route.modal_id.clone(), surface.clone());
            let mut descriptor = ModalDescriptor::new(&route.modal_id, &route.token, surface);
            descriptor.aliases = route.aliases.clone();
            match &route.sub_entities {
                Some(SubEntities::Slider { .. }) => descriptor.with_resolver(slides.clone()),
                Some(SubEntities::Trainers) => descriptor.with_resolver(trainers.clone()),
                None => descriptor,
            }
        })
        .expect("default routes are unique");

        let controller = RoutingController::new(
            registry,
            Box::new(bar.clone()),
            Box::new(scheduler.clone()),
            RetryPolicy::default(),
            boot_delay_ms,
        );

        Self {
            controller,
            bar,
            scheduler,
            slides,
            trainers,
            surfaces,
        }
    }

    pub fn surface(&self, modal_id: &str) -> Rc<FakeSurface> {
        self.surfaces[modal_id].clone()
    }

    pub fn assert_single_active(&self) {
        let active: Vec<_> = self
            .controller
            .registry()
            .iter()
            .filter(|d| matches!(self.controller.phase(&d.id), ModalPhase::Opening | ModalPhase::Open))
            .map(|d| d.id.clone())
            .collect();
        assert!(active.len() <= 1, "several modals active: {:?}", active);
    }
}
