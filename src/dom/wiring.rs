//! Browser events in, controller calls out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::Array;
use web_sys::{Document, Element, Event, HtmlFormElement, KeyboardEvent, MutationObserver, MutationObserverInit, Window};

use super::page::{BrowserSession, HtmlForm, ACTIVE_CLASS};
use super::slider::SliderTracker;
use crate::attribution::store::AttributionStore;
use crate::config::{RouterConfig, SubEntities};
use crate::routing::controller::{LifecycleEvent, RoutingController};

pub type SharedController = Rc<RefCell<RoutingController>>;
pub type SharedAttribution = Rc<AttributionStore<BrowserSession>>;

const CLOSE_SELECTOR: &str = "[id^=\"close\"], .modal-close, .close-btn";
const TRAINER_BUTTON_SELECTOR: &str = ".trainer-book-btn";

fn with_controller(controller: &SharedController, f: impl FnOnce(&mut RoutingController)) {
    match controller.try_borrow_mut() {
        Ok(mut controller) => f(&mut controller),
        Err(_) => warn!("Router busy, event dropped"),
    }
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn closest(element: &Element, selector: &str) -> Option<Element> {
    element.closest(selector).ok().flatten()
}

fn listen(target: &web_sys::EventTarget, name: &str, capture: bool, handler: impl FnMut(Event) + 'static) {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    match target.add_event_listener_with_callback_and_bool(name, closure.as_ref().unchecked_ref(), capture) {
        Ok(()) => closure.forget(),
        Err(_) => warn!("Could not listen for {}", name),
    }
}

pub fn enrich_form(form: HtmlFormElement, attribution: &SharedAttribution) {
    attribution.apply_to(&mut HtmlForm(form));
}

/// Hidden attribution fields for every form under `root`.
pub fn enrich_forms(root: &Element, attribution: &SharedAttribution) {
    let Ok(forms) = root.query_selector_all("form") else {
        return;
    };
    for index in 0..forms.length() {
        if let Some(form) = forms.item(index).and_then(|node| node.dyn_into::<HtmlFormElement>().ok()) {
            enrich_form(form, attribution);
        }
    }
}

/// Forms rendered after boot get their fields on focus or at the latest on submit.
pub fn install_form_listeners(document: &Document, attribution: &SharedAttribution) {
    let on_submit = attribution.clone();
    listen(document, "submit", true, move |event| {
        if let Some(form) = event.target().and_then(|t| t.dyn_into::<HtmlFormElement>().ok()) {
            enrich_form(form, &on_submit);
        }
    });

    let on_focus = attribution.clone();
    listen(document, "focusin", false, move |event| {
        let form = event_element(&event)
            .and_then(|element| closest(&element, "form"))
            .and_then(|form| form.dyn_into::<HtmlFormElement>().ok());
        if let Some(form) = form {
            enrich_form(form, &on_focus);
        }
    });
}

/// Forms inside a modal are enriched each time the router confirms it open.
pub fn enrich_on_open(document: &Document, controller: &SharedController, attribution: &SharedAttribution) {
    let document = document.clone();
    let attribution = attribution.clone();
    controller
        .borrow_mut()
        .set_open_listener(Box::new(move |modal_id: &str| {
            if let Some(modal) = document.get_element_by_id(modal_id) {
                enrich_forms(&modal, &attribution);
            }
        }));
}

/// Address bar, clicks and keys.
pub fn install_navigation(window: &Window, document: &Document, controller: &SharedController, config: &RouterConfig) {
    let on_hash = controller.clone();
    listen(window, "hashchange", false, move |_| {
        with_controller(&on_hash, |c| c.on_hash_change());
    });

    let trainer_modal = config
        .routes
        .iter()
        .find(|route| matches!(route.sub_entities, Some(SubEntities::Trainers)))
        .map(|route| route.modal_id.clone());
    let modal_ids: Vec<String> = config.routes.iter().map(|route| route.modal_id.clone()).collect();
    let on_click = controller.clone();
    listen(document, "click", false, move |event| {
        let Some(target) = event_element(&event) else {
            return;
        };

        if let Some(trigger) = closest(&target, "[data-modal]") {
            let Some(modal_id) = trigger.get_attribute("data-modal") else {
                return;
            };
            event.prevent_default();
            let sub_path = trigger.get_attribute("data-modal-sub").filter(|sub| !sub.is_empty());
            with_controller(&on_click, |c| c.open_from_ui(&modal_id, sub_path.as_deref()));
            return;
        }

        if let (Some(button), Some(modal_id)) = (closest(&target, TRAINER_BUTTON_SELECTOR), &trainer_modal) {
            let trainer = closest(&button, "[data-trainer-id]").and_then(|card| card.get_attribute("data-trainer-id"));
            if let Some(trainer) = trainer {
                event.prevent_default();
                event.stop_propagation();
                let sub_path = format!("trainer-{}", trainer);
                with_controller(&on_click, |c| c.open_from_ui(modal_id, Some(&sub_path)));
            }
            return;
        }

        // Click on the overlay itself, outside the dialog content.
        if modal_ids.iter().any(|id| *id == target.id()) {
            let modal_id = target.id();
            with_controller(&on_click, |c| c.close(&modal_id));
            return;
        }

        if let Some(button) = closest(&target, CLOSE_SELECTOR) {
            let owner = modal_ids
                .iter()
                .find(|id| closest(&button, &format!("#{}", id)).is_some())
                .cloned();
            if let Some(modal_id) = owner {
                with_controller(&on_click, |c| c.close(&modal_id));
            }
        }
    });

    let on_key = controller.clone();
    listen(document, "keydown", false, move |event| {
        let escape = event
            .dyn_ref::<KeyboardEvent>()
            .is_some_and(|key| key.key() == "Escape");
        if escape {
            with_controller(&on_key, |c| c.close_active());
        }
    });
}

/// Turns `active` class flips on modal elements into lifecycle events.
struct ModalWatcher {
    document: Document,
    controller: SharedController,
    shown: HashMap<String, bool>,
    sliders: Vec<SliderTracker>,
}

impl ModalWatcher {
    fn is_shown(&self, modal_id: &str) -> bool {
        self.document
            .get_element_by_id(modal_id)
            .is_some_and(|element| element.class_list().contains(ACTIVE_CLASS))
    }

    fn reconcile(&mut self) {
        let ids: Vec<String> = self.shown.keys().cloned().collect();
        for modal_id in ids {
            let now = self.is_shown(&modal_id);
            if self.shown.insert(modal_id.clone(), now) == Some(now) {
                continue;
            }
            let event = if now {
                LifecycleEvent::Opened
            } else {
                LifecycleEvent::Closed
            };
            debug!("Observed {:?} on {}", event, modal_id);
            with_controller(&self.controller, |c| c.on_lifecycle(&modal_id, event));

            if now {
                for tracker in self.sliders.iter_mut().filter(|t| t.modal_id() == modal_id) {
                    tracker.attach(&self.document, &self.controller);
                }
            }
        }
    }
}

pub fn install_observer(
    document: &Document,
    controller: &SharedController,
    config: &RouterConfig,
) {
    let Some(body) = document.body() else {
        warn!("No <body>, modal state will not be observed");
        return;
    };

    let sliders = config
        .routes
        .iter()
        .filter_map(|route| match &route.sub_entities {
            Some(SubEntities::Slider { slider_id, card_class }) => Some(SliderTracker::new(
                &route.modal_id,
                slider_id,
                card_class,
                config.slider_debounce_ms,
            )),
            _ => None,
        })
        .collect();
    let mut watcher = ModalWatcher {
        document: document.clone(),
        controller: controller.clone(),
        shown: HashMap::new(),
        sliders,
    };
    for route in &config.routes {
        let shown = watcher.is_shown(&route.modal_id);
        watcher.shown.insert(route.modal_id.clone(), shown);
    }
    let watcher = Rc::new(RefCell::new(watcher));

    let callback = Closure::wrap(Box::new(move || {
        if let Ok(mut watcher) = watcher.try_borrow_mut() {
            watcher.reconcile();
        }
    }) as Box<dyn FnMut()>);

    let Ok(observer) = MutationObserver::new(callback.as_ref().unchecked_ref()) else {
        warn!("MutationObserver unavailable, modal state will not be observed");
        return;
    };
    let options = MutationObserverInit::new();
    options.set_subtree(true);
    options.set_child_list(true);
    options.set_attributes(true);
    options.set_attribute_filter(&Array::of1(&JsValue::from_str("class")));

    match observer.observe_with_options(&body, &options) {
        Ok(()) => callback.forget(),
        Err(_) => warn!("Could not observe <body>"),
    }
}
