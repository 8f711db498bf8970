use std::cell::RefCell;
use std::rc::Rc;

use log::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{window, Document};

mod config;
mod routing {
    pub mod controller;
    pub mod error;
    pub mod hash;
    pub mod registry;
    pub mod scheduler;
    pub mod stack;
    #[cfg(test)]
    pub mod testing;
}
mod attribution {
    pub mod forms;
    pub mod store;
}
mod dom {
    pub mod page;
    pub mod resolvers;
    pub mod slider;
    pub mod timers;
    pub mod wiring;
}
#[cfg(test)]
mod scenarios;

use attribution::store::AttributionStore;
use config::{RouterConfig, CONFIG_ELEMENT_ID};
use dom::page::{registry_from_routes, BrowserSession, WebAddressBar};
use dom::timers::TimeoutScheduler;
use routing::controller::RoutingController;

/// Page-provided route table, falling back to the built-in one.
fn load_config(document: &Document) -> RouterConfig {
    let Some(json) = document
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|element| element.text_content())
    else {
        return RouterConfig::default();
    };
    match RouterConfig::from_json(&json) {
        Ok(config) => config,
        Err(err) => {
            warn!("Ignoring #{}: {}", CONFIG_ELEMENT_ID, err);
            RouterConfig::default()
        }
    }
}

fn boot() {
    let Some(window) = window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let config = load_config(&document);

    let attribution = Rc::new(AttributionStore::new(BrowserSession::open(&window)));
    attribution.capture_from_query(&window.location().search().unwrap_or_default());
    if let Some(root) = document.document_element() {
        dom::wiring::enrich_forms(&root, &attribution);
    }
    dom::wiring::install_form_listeners(&document, &attribution);

    let registry = match registry_from_routes(&config.routes) {
        Ok(registry) => registry,
        Err(err) => {
            error!("Modal routing disabled: {}", err);
            return;
        }
    };
    info!("Routing {} modals", registry.len());

    let controller = Rc::new_cyclic(|weak| {
        RefCell::new(RoutingController::new(
            registry,
            Box::new(WebAddressBar::new(window.clone())),
            Box::new(TimeoutScheduler::new(weak.clone())),
            config.retry,
            config.boot_delay_ms,
        ))
    });

    dom::wiring::install_navigation(&window, &document, &controller, &config);
    dom::wiring::enrich_on_open(&document, &controller, &attribution);
    dom::wiring::install_observer(&document, &controller, &config);
    controller.borrow_mut().start();
}

fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging
    console_log::init_with_level(config::log_level()).expect("error initializing log");

    info!("Starting modal router");
    let Some(document) = window().and_then(|w| w.document()) else {
        return;
    };
    if document.ready_state() != "loading" {
        boot();
        return;
    }

    let on_ready = Closure::wrap(Box::new(boot) as Box<dyn FnMut()>);
    if document
        .add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())
        .is_ok()
    {
        on_ready.forget();
    }
}
