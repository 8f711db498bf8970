use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{window, Document, Element, Event, HtmlFormElement, HtmlInputElement, Storage, Window};

use super::resolvers::{SlideResolver, TrainerResolver};
use crate::attribution::forms::FormFields;
use crate::attribution::store::SessionStore;
use crate::config::{ModalRouteConfig, SubEntities};
use crate::routing::controller::{AddressBar, HistoryMode};
use crate::routing::error::RouteError;
use crate::routing::registry::{ModalDescriptor, ModalRegistry, ModalSurface};

/// Class the page's animation layer uses to show a modal.
pub const ACTIVE_CLASS: &str = "active";

pub fn document() -> Option<Document> {
    window().and_then(|w| w.document())
}

/// Modal element looked up by id on every call, so late-loaded markup works.
pub struct DomModal {
    element_id: String,
    scroller: Option<String>,
}

impl DomModal {
    pub fn new(element_id: &str, scroller: Option<String>) -> Self {
        Self {
            element_id: element_id.to_string(),
            scroller,
        }
    }

    fn element(&self) -> Option<Element> {
        document()?.get_element_by_id(&self.element_id)
    }
}

fn set_body_overflow(value: &str) {
    if let Some(body) = document().and_then(|d| d.body()) {
        let _ = body.style().set_property("overflow", value);
    }
}

impl ModalSurface for DomModal {
    fn is_mounted(&self) -> bool {
        self.element().is_some()
    }

    fn is_active(&self) -> bool {
        self.element()
            .is_some_and(|element| element.class_list().contains(ACTIVE_CLASS))
    }

    fn activate(&self) {
        let Some(element) = self.element() else {
            return;
        };
        let _ = element.class_list().add_1(ACTIVE_CLASS);
        set_body_overflow("hidden");
        // Premium animations and other page scripts listen for this
        if let Ok(event) = Event::new("modalopen") {
            let _ = element.dispatch_event(&event);
        }
    }

    fn deactivate(&self) {
        if let Some(element) = self.element() {
            let _ = element.class_list().remove_1(ACTIVE_CLASS);
            set_body_overflow("");
        }
    }

    fn reset_scroll(&self) {
        let (Some(element), Some(selector)) = (self.element(), self.scroller.as_deref()) else {
            return;
        };
        if let Ok(Some(scroller)) = element.query_selector(selector) {
            scroller.set_scroll_top(0);
        }
    }
}

/// Descriptors backed by real elements for every configured route.
pub fn registry_from_routes(routes: &[ModalRouteConfig]) -> Result<ModalRegistry, RouteError> {
    ModalRegistry::from_routes(routes, |route| {
        let handle = Rc::new(DomModal::new(&route.modal_id, route.scroller.clone()));
        let descriptor = route
            .aliases
            .iter()
            .fold(ModalDescriptor::new(&route.modal_id, &route.token, handle), |d, alias| {
                d.with_alias(alias)
            });
        match &route.sub_entities {
            Some(SubEntities::Slider { slider_id, .. }) => {
                descriptor.with_resolver(Rc::new(SlideResolver::new(slider_id)))
            }
            Some(SubEntities::Trainers) => descriptor.with_resolver(Rc::new(TrainerResolver)),
            None => descriptor,
        }
    })
}

pub struct WebAddressBar {
    window: Window,
}

impl WebAddressBar {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl AddressBar for WebAddressBar {
    fn fragment(&self) -> String {
        let hash = self.window.location().hash().unwrap_or_default();
        hash.strip_prefix('#').unwrap_or(&hash).to_string()
    }

    fn write_fragment(&self, fragment: &str, mode: HistoryMode) {
        let location = self.window.location();
        let url = if fragment.is_empty() {
            format!(
                "{}{}",
                location.pathname().unwrap_or_default(),
                location.search().unwrap_or_default()
            )
        } else {
            format!("#{}", fragment)
        };

        let Ok(history) = self.window.history() else {
            warn!("History API unavailable, hash not updated");
            return;
        };
        let result = match mode {
            HistoryMode::Push => history.push_state_with_url(&JsValue::NULL, "", Some(&url)),
            HistoryMode::Replace => history.replace_state_with_url(&JsValue::NULL, "", Some(&url)),
        };
        if result.is_err() {
            warn!("Failed to write {} to history", url);
        }
    }
}

/// `sessionStorage`, backed by a page-lifetime map when the browser refuses it
/// or a write fails.
pub struct BrowserSession {
    storage: Option<Storage>,
    memory: RefCell<HashMap<String, String>>,
}

impl BrowserSession {
    pub fn open(window: &Window) -> Self {
        let Some(storage) = window.session_storage().ok().flatten() else {
            warn!("sessionStorage unavailable, attribution kept for this page only");
            return Self::in_memory();
        };
        Self {
            storage: Some(storage),
            memory: RefCell::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            storage: None,
            memory: RefCell::default(),
        }
    }
}

impl SessionStore for BrowserSession {
    fn get(&self, key: &str) -> Option<String> {
        self.storage
            .as_ref()
            .and_then(|storage| storage.get_item(key).ok().flatten())
            .or_else(|| self.memory.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = &self.storage {
            if storage.set_item(key, value).is_ok() {
                return;
            }
            debug!("Could not persist {}, keeping it for this page", key);
        }
        self.memory.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

pub struct HtmlForm(pub HtmlFormElement);

impl HtmlForm {
    fn input(&self, name: &str) -> Option<HtmlInputElement> {
        self.0
            .query_selector(&format!("input[name=\"{}\"]", name))
            .ok()
            .flatten()?
            .dyn_into::<HtmlInputElement>()
            .ok()
    }
}

impl FormFields for HtmlForm {
    fn field_value(&self, name: &str) -> Option<String> {
        self.input(name).map(|input| input.value())
    }

    fn set_field_value(&mut self, name: &str, value: &str) {
        if let Some(input) = self.input(name) {
            input.set_value(value);
        }
    }

    fn append_hidden_field(&mut self, name: &str, value: &str) {
        let Some(document) = document() else {
            return;
        };
        let Ok(input) = document
            .create_element("input")
            .map(|element| element.unchecked_into::<HtmlInputElement>())
        else {
            return;
        };
        input.set_type("hidden");
        input.set_name(name);
        input.set_value(value);
        if self.0.append_child(&input).is_ok() {
            debug!("Added hidden field {}={}", name, value);
        }
    }
}
