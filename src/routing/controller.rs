use std::collections::HashMap;

use log::{debug, info, warn};

use super::error::RouteError;
use super::hash;
use super::registry::{ModalDescriptor, ModalRegistry};
use super::scheduler::{Scheduler, TaskHandle};
use super::stack::NavigationStack;
use crate::config::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPhase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// What the presentation layer reports about a modal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    OpenStarted,
    Opened,
    CloseStarted,
    Closed,
}

/// Who asked for a modal: the address bar or a click on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Hash,
    Ui,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

pub trait AddressBar {
    /// Current fragment without the leading `#`.
    fn fragment(&self) -> String;
    /// Writes the fragment without reloading the page. Empty clears it.
    fn write_fragment(&self, fragment: &str, mode: HistoryMode);
}

/// Deferred work handed to the [`Scheduler`] and delivered to [`RoutingController::run_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    InitialRoute,
    RetryOpen {
        modal_id: String,
        sub_path: Option<String>,
        origin: Origin,
        attempt: u32,
    },
    ReleaseSuppression {
        generation: u64,
    },
}

/// Called with the modal id each time a modal reaches `Open`.
pub type OpenListener = Box<dyn FnMut(&str)>;

struct PendingOpen {
    modal_id: String,
    handle: TaskHandle,
}

/// One-shot marker for a fragment the controller wrote itself.
struct Suppression {
    fragment: String,
    generation: u64,
    release: TaskHandle,
}

/// Keeps the page's modals and the address-bar fragment consistent.
///
/// The controller never owns the animation: it asks a [`ModalSurface`] to
/// (de)activate and only moves to `Open`/`Closed` when the page reports it
/// through [`RoutingController::on_lifecycle`].
///
/// [`ModalSurface`]: super::registry::ModalSurface
pub struct RoutingController {
    registry: ModalRegistry,
    address_bar: Box<dyn AddressBar>,
    scheduler: Box<dyn Scheduler>,
    retry: RetryPolicy,
    boot_delay_ms: u32,
    phases: HashMap<String, ModalPhase>,
    stack: NavigationStack,
    pending: Option<PendingOpen>,
    reveals: HashMap<String, String>,
    suppression: Option<Suppression>,
    generation: u64,
    open_listener: Option<OpenListener>,
}

impl RoutingController {
    pub fn new(
        registry: ModalRegistry,
        address_bar: Box<dyn AddressBar>,
        scheduler: Box<dyn Scheduler>,
        retry: RetryPolicy,
        boot_delay_ms: u32,
    ) -> Self {
        Self {
            registry,
            address_bar,
            scheduler,
            retry,
            boot_delay_ms,
            phases: HashMap::new(),
            stack: NavigationStack::new(),
            pending: None,
            reveals: HashMap::new(),
            suppression: None,
            generation: 0,
            open_listener: None,
        }
    }

    /// The listener must not call back into the controller.
    pub fn set_open_listener(&mut self, listener: OpenListener) {
        self.open_listener = Some(listener);
    }

    pub fn registry(&self) -> &ModalRegistry {
        &self.registry
    }

    pub fn phase(&self, modal_id: &str) -> ModalPhase {
        self.phases.get(modal_id).copied().unwrap_or(ModalPhase::Closed)
    }

    /// The single modal that is `Opening` or `Open`, if any.
    pub fn active(&self) -> Option<&str> {
        self.phases
            .iter()
            .find(|(_, phase)| matches!(phase, ModalPhase::Opening | ModalPhase::Open))
            .map(|(id, _)| id.as_str())
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    /// Modal waiting for its element to be mounted.
    pub fn pending_target(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.modal_id.as_str())
    }

    pub fn is_open(&self, modal_id: &str) -> bool {
        self.registry.by_id(modal_id).is_some_and(ModalDescriptor::is_open)
    }

    /// Routes the fragment the page was loaded with.
    pub fn start(&mut self) {
        if self.boot_delay_ms == 0 {
            self.route_current_fragment();
        } else {
            self.scheduler.schedule(self.boot_delay_ms, Task::InitialRoute);
        }
    }

    pub fn on_hash_change(&mut self) {
        let fragment = self.address_bar.fragment();
        if let Some(suppression) = self.suppression.take() {
            suppression.release.cancel();
            if suppression.fragment == fragment {
                debug!("Ignoring hash change to #{} written by the router", fragment);
                return;
            }
        }
        self.route_fragment(&fragment);
    }

    pub fn open_from_ui(&mut self, modal_id: &str, sub_path: Option<&str>) {
        if self.registry.by_id(modal_id).is_none() {
            warn!("Open requested for unregistered modal {}", modal_id);
            return;
        }
        self.request_open(modal_id, sub_path.map(str::to_string), Origin::Ui, 1);
    }

    /// Explicit close: close button, Escape, overlay click.
    pub fn close(&mut self, modal_id: &str) {
        if self.pending_target() == Some(modal_id) {
            self.cancel_pending();
        }
        let Some(descriptor) = self.registry.by_id(modal_id).cloned() else {
            warn!("Close requested for unregistered modal {}", modal_id);
            return;
        };

        match self.phase(modal_id) {
            ModalPhase::Opening | ModalPhase::Open => {
                info!("Closing modal {}", modal_id);
                self.phases.insert(modal_id.to_string(), ModalPhase::Closing);
                self.reveals.remove(modal_id);
                descriptor.handle.deactivate();
            }
            ModalPhase::Closing | ModalPhase::Closed => {
                if descriptor.is_open() {
                    descriptor.handle.deactivate();
                }
            }
        }
    }

    pub fn close_active(&mut self) {
        self.cancel_pending();
        if let Some(modal_id) = self.active().map(str::to_string) {
            self.close(&modal_id);
        }
    }

    pub fn on_lifecycle(&mut self, modal_id: &str, event: LifecycleEvent) {
        let Some(descriptor) = self.registry.by_id(modal_id).cloned() else {
            debug!("Lifecycle {:?} for unregistered element {}", event, modal_id);
            return;
        };
        if self.pending_target() == Some(modal_id) {
            self.cancel_pending();
        }

        let phase = self.phase(modal_id);
        let paused = self.stack.contains(modal_id);
        match event {
            LifecycleEvent::OpenStarted => match phase {
                ModalPhase::Closing if paused => debug!("Stale open of paused modal {}", modal_id),
                ModalPhase::Closed | ModalPhase::Closing => self.adopt(modal_id),
                ModalPhase::Opening | ModalPhase::Open => {}
            },
            LifecycleEvent::Opened => match phase {
                ModalPhase::Closing if paused => debug!("Stale open of paused modal {}", modal_id),
                ModalPhase::Open => {}
                ModalPhase::Closed | ModalPhase::Closing | ModalPhase::Opening => {
                    if phase != ModalPhase::Opening {
                        self.adopt(modal_id);
                    }
                    self.finish_open(&descriptor);
                }
            },
            LifecycleEvent::CloseStarted => {
                if matches!(phase, ModalPhase::Opening | ModalPhase::Open) {
                    self.phases.insert(modal_id.to_string(), ModalPhase::Closing);
                    self.reveals.remove(modal_id);
                }
            }
            LifecycleEvent::Closed => {
                if phase != ModalPhase::Closed {
                    self.finish_close(&descriptor, paused);
                }
            }
        }
    }

    /// Mirrors the slide currently in view into the fragment.
    pub fn sync_sub_path(&mut self, modal_id: &str, sub_path: &str) {
        if self.phase(modal_id) != ModalPhase::Open {
            return;
        }
        let fragment = hash::encode(&self.registry, modal_id, Some(sub_path));
        self.write_fragment(&fragment, HistoryMode::Replace);
    }

    pub fn run_task(&mut self, task: Task) {
        match task {
            Task::InitialRoute => self.route_current_fragment(),
            Task::RetryOpen {
                modal_id,
                sub_path,
                origin,
                attempt,
            } => {
                let live = self
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.modal_id == modal_id && !p.handle.is_cancelled());
                if !live {
                    debug!("Dropping stale retry for {}", modal_id);
                    return;
                }
                self.pending = None;
                self.request_open(&modal_id, sub_path, origin, attempt);
            }
            Task::ReleaseSuppression { generation } => {
                if self.suppression.as_ref().is_some_and(|s| s.generation == generation) {
                    self.suppression = None;
                }
            }
        }
    }

    fn route_current_fragment(&mut self) {
        let fragment = self.address_bar.fragment();
        self.route_fragment(&fragment);
    }

    fn route_fragment(&mut self, fragment: &str) {
        let Some(route) = hash::decode(fragment) else {
            // An empty hash never closes anything; closing is always explicit.
            self.cancel_pending();
            return;
        };
        let Some(modal_id) = self.registry.resolve(&route.token).map(|d| d.id.clone()) else {
            warn!("{}", RouteError::UnknownRouteToken(route.token));
            return;
        };
        self.request_open(&modal_id, route.sub_path, Origin::Hash, 1);
    }

    fn request_open(&mut self, modal_id: &str, sub_path: Option<String>, origin: Origin, attempt: u32) {
        self.cancel_pending();
        let Some(descriptor) = self.registry.by_id(modal_id).cloned() else {
            return;
        };

        if !descriptor.handle.is_mounted() {
            let max_attempts = self.retry.max_attempts.max(1);
            if attempt >= max_attempts {
                warn!(
                    "{}",
                    RouteError::TargetNotReady {
                        modal_id: modal_id.to_string(),
                        attempts: attempt,
                    }
                );
                return;
            }
            debug!("Modal {} not mounted yet, retry {}/{}", modal_id, attempt + 1, max_attempts);
            let handle = self.scheduler.schedule(
                self.retry.interval_ms,
                Task::RetryOpen {
                    modal_id: modal_id.to_string(),
                    sub_path,
                    origin,
                    attempt: attempt + 1,
                },
            );
            self.pending = Some(PendingOpen {
                modal_id: modal_id.to_string(),
                handle,
            });
            return;
        }

        match self.phase(modal_id) {
            ModalPhase::Open => {
                if let Some(sub) = &sub_path {
                    self.reveal(&descriptor, sub);
                }
            }
            ModalPhase::Opening => {
                if let Some(sub) = &sub_path {
                    self.reveals.insert(modal_id.to_string(), sub.clone());
                }
            }
            ModalPhase::Closed | ModalPhase::Closing => {
                if let Some(current) = self.active().map(str::to_string) {
                    self.pause(&current);
                }
                self.stack.remove(modal_id);
                self.begin_open(&descriptor, sub_path.clone());
            }
        }

        if origin == Origin::Ui {
            let fragment = hash::encode(&self.registry, modal_id, sub_path.as_deref());
            self.write_fragment(&fragment, HistoryMode::Push);
        }
    }

    fn begin_open(&mut self, descriptor: &ModalDescriptor, sub_path: Option<String>) {
        info!("Opening modal {}", descriptor.id);
        self.phases.insert(descriptor.id.clone(), ModalPhase::Opening);
        match sub_path {
            Some(sub) => self.reveals.insert(descriptor.id.clone(), sub),
            None => self.reveals.remove(&descriptor.id),
        };
        descriptor.handle.activate();
    }

    /// Moves the active modal beneath a new one.
    fn pause(&mut self, modal_id: &str) {
        let Some(descriptor) = self.registry.by_id(modal_id).cloned() else {
            return;
        };
        debug!("Pausing modal {}", modal_id);
        self.stack.push(modal_id);
        self.phases.insert(modal_id.to_string(), ModalPhase::Closing);
        self.reveals.remove(modal_id);
        descriptor.handle.deactivate();
    }

    /// Takes over a modal opened by page code outside the router.
    fn adopt(&mut self, modal_id: &str) {
        self.cancel_pending();
        if let Some(current) = self.active().filter(|id| *id != modal_id).map(str::to_string) {
            self.pause(&current);
        }
        self.stack.remove(modal_id);
        self.phases.insert(modal_id.to_string(), ModalPhase::Opening);
    }

    fn finish_open(&mut self, descriptor: &ModalDescriptor) {
        info!("Modal {} open", descriptor.id);
        self.phases.insert(descriptor.id.clone(), ModalPhase::Open);

        let shown = hash::decode(&self.address_bar.fragment())
            .and_then(|route| self.registry.resolve(&route.token))
            .is_some_and(|d| d.id == descriptor.id);
        if !shown {
            let fragment = hash::encode(&self.registry, &descriptor.id, None);
            self.write_fragment(&fragment, HistoryMode::Replace);
        }

        if let Some(sub) = self.reveals.remove(&descriptor.id) {
            self.reveal(descriptor, &sub);
        }
        if let Some(listener) = self.open_listener.as_mut() {
            listener(&descriptor.id);
        }
    }

    fn finish_close(&mut self, descriptor: &ModalDescriptor, paused: bool) {
        info!("Modal {} closed", descriptor.id);
        self.phases.insert(descriptor.id.clone(), ModalPhase::Closed);
        self.reveals.remove(&descriptor.id);
        descriptor.handle.reset_scroll();

        if paused || self.active().is_some() {
            return;
        }
        match self.stack.pop() {
            Some(previous) => self.restore(&previous),
            None => self.write_fragment("", HistoryMode::Push),
        }
    }

    fn restore(&mut self, modal_id: &str) {
        let Some(descriptor) = self.registry.by_id(modal_id).cloned() else {
            return;
        };
        if !descriptor.handle.is_mounted() {
            warn!("Cannot restore modal {}: element is gone", modal_id);
            self.write_fragment("", HistoryMode::Push);
            return;
        }
        debug!("Restoring modal {}", modal_id);
        self.begin_open(&descriptor, None);
        let fragment = hash::encode(&self.registry, modal_id, None);
        self.write_fragment(&fragment, HistoryMode::Replace);
    }

    fn reveal(&self, descriptor: &ModalDescriptor, sub_path: &str) {
        let result = match &descriptor.resolver {
            Some(resolver) => resolver.reveal(&descriptor.id, sub_path),
            None => Err(RouteError::SubEntityNotFound {
                modal_id: descriptor.id.clone(),
                sub_path: sub_path.to_string(),
            }),
        };
        match result {
            Ok(()) => debug!("Revealed {}/{}", descriptor.id, sub_path),
            Err(err) => warn!("{}", err),
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.cancel();
            debug!("Cancelled pending open of {}", pending.modal_id);
        }
    }

    fn write_fragment(&mut self, fragment: &str, mode: HistoryMode) {
        if self.address_bar.fragment() == fragment {
            return;
        }
        if let Some(previous) = self.suppression.take() {
            previous.release.cancel();
        }
        self.generation += 1;
        let release = self
            .scheduler
            .schedule(0, Task::ReleaseSuppression { generation: self.generation });
        self.suppression = Some(Suppression {
            fragment: fragment.to_string(),
            generation: self.generation,
            release,
        });
        self.address_bar.write_fragment(fragment, mode);
        debug!("Hash set to #{}", fragment);
    }
}
