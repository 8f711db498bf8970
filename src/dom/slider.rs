use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::debug;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

use crate::routing::controller::RoutingController;

/// Index of the card whose horizontal center is closest to `center`.
/// Cards are `(left, width)` in viewport coordinates.
pub fn nearest_to_center(center: f64, cards: &[(f64, f64)]) -> Option<usize> {
    cards
        .iter()
        .enumerate()
        .map(|(index, (left, width))| (index, (left + width / 2.0 - center).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

fn centered_slide(slider: &Element, card_class: &str) -> Option<String> {
    let rect = slider.get_bounding_client_rect();
    let center = rect.left() + rect.width() / 2.0;

    let nodes = slider.query_selector_all(&format!(".{}[data-slide-id]", card_class)).ok()?;
    let cards: Vec<Element> = (0..nodes.length())
        .filter_map(|index| nodes.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect();
    let geometry: Vec<(f64, f64)> = cards
        .iter()
        .map(|card| {
            let rect = card.get_bounding_client_rect();
            (rect.left(), rect.width())
        })
        .collect();

    let index = nearest_to_center(center, &geometry)?;
    cards[index].get_attribute("data-slide-id")
}

/// Mirrors the slide in view into the fragment once scrolling settles.
pub struct SliderTracker {
    modal_id: String,
    slider_id: String,
    card_class: String,
    debounce_ms: u32,
    attached: bool,
}

impl SliderTracker {
    pub fn new(modal_id: &str, slider_id: &str, card_class: &str, debounce_ms: u32) -> Self {
        Self {
            modal_id: modal_id.to_string(),
            slider_id: slider_id.to_string(),
            card_class: card_class.to_string(),
            debounce_ms,
            attached: false,
        }
    }

    pub fn modal_id(&self) -> &str {
        &self.modal_id
    }

    /// Hooks the slider's scroll event the first time its element exists.
    pub fn attach(&mut self, document: &Document, controller: &Rc<RefCell<RoutingController>>) {
        if self.attached {
            return;
        }
        let Some(slider) = document.get_element_by_id(&self.slider_id) else {
            return;
        };

        let pending: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));
        let controller = Rc::downgrade(controller);
        let modal_id = self.modal_id.clone();
        let card_class = self.card_class.clone();
        let debounce_ms = self.debounce_ms;
        let target = slider.clone();

        let on_scroll = Closure::wrap(Box::new(move || {
            let controller = controller.clone();
            let modal_id = modal_id.clone();
            let card_class = card_class.clone();
            let slider = target.clone();
            // Replacing the timeout drops and cancels the previous one.
            *pending.borrow_mut() = Some(Timeout::new(debounce_ms, move || {
                let Some(slide) = centered_slide(&slider, &card_class) else {
                    return;
                };
                if let Some(controller) = controller.upgrade() {
                    if let Ok(mut controller) = controller.try_borrow_mut() {
                        controller.sync_sub_path(&modal_id, &slide);
                    }
                }
            }));
        }) as Box<dyn FnMut()>);

        if slider
            .add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
            .is_ok()
        {
            on_scroll.forget();
            self.attached = true;
            debug!("Tracking slides of #{}", self.slider_id);
        }
    }
}
