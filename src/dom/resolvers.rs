use gloo_timers::callback::Timeout;
use log::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition};

use super::page::document;
use crate::routing::error::RouteError;
use crate::routing::registry::SubEntityResolver;

const BOOKING_PANEL_ID: &str = "bookingPanel";
const BOOKING_BACKDROP_ID: &str = "offcanvasBackdrop";

/// `[name="value"]` with the value quoted for a CSS selector.
pub fn attribute_selector(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{}=\"{}\"]", name, escaped)
}

/// `trainer-ivanov` -> `ivanov`.
pub fn trainer_id(sub_path: &str) -> Option<&str> {
    sub_path.strip_prefix("trainer-").filter(|id| !id.is_empty())
}

/// Booking form options to click, each after its delay in ms: gym visit,
/// then "with a trainer", then the trainer. Each step renders the next one.
pub fn booking_choices(trainer_id: &str) -> Vec<(u32, String)> {
    vec![
        (0, attribute_selector("data-value", "gym")),
        (100, attribute_selector("data-value", "trainer")),
        (150, attribute_selector("data-value", trainer_id)),
    ]
}

fn click_in_order(document: Document, mut steps: Vec<(u32, String)>) {
    if steps.is_empty() {
        return;
    }
    let (delay, selector) = steps.remove(0);
    Timeout::new(delay, move || {
        let option = document
            .query_selector(&selector)
            .ok()
            .flatten()
            .and_then(|element| element.dyn_into::<HtmlElement>().ok());
        let Some(option) = option else {
            warn!("Booking option {} not found", selector);
            return;
        };
        option.click();
        click_in_order(document, steps);
    })
    .forget();
}

fn not_found(modal_id: &str, sub_path: &str) -> RouteError {
    RouteError::SubEntityNotFound {
        modal_id: modal_id.to_string(),
        sub_path: sub_path.to_string(),
    }
}

fn scroll_into_view(element: &Element) {
    let options = ScrollIntoViewOptions::new();
    options.set_behavior(ScrollBehavior::Smooth);
    options.set_block(ScrollLogicalPosition::Nearest);
    options.set_inline(ScrollLogicalPosition::Center);
    element.scroll_into_view_with_scroll_into_view_options(&options);
}

/// Scrolls a horizontal slider to the card tagged `data-slide-id`.
pub struct SlideResolver {
    slider_id: String,
}

impl SlideResolver {
    pub fn new(slider_id: &str) -> Self {
        Self {
            slider_id: slider_id.to_string(),
        }
    }
}

impl SubEntityResolver for SlideResolver {
    fn reveal(&self, modal_id: &str, sub_path: &str) -> Result<(), RouteError> {
        let card = document()
            .and_then(|document| document.get_element_by_id(&self.slider_id))
            .and_then(|slider| {
                slider
                    .query_selector(&attribute_selector("data-slide-id", sub_path))
                    .ok()
                    .flatten()
            })
            .ok_or_else(|| not_found(modal_id, sub_path))?;
        scroll_into_view(&card);
        Ok(())
    }
}

/// Brings a trainer card into view and opens the booking panel for it.
pub struct TrainerResolver;

impl SubEntityResolver for TrainerResolver {
    fn reveal(&self, modal_id: &str, sub_path: &str) -> Result<(), RouteError> {
        let id = trainer_id(sub_path).ok_or_else(|| not_found(modal_id, sub_path))?;
        let document = document().ok_or_else(|| not_found(modal_id, sub_path))?;
        let card = document
            .get_element_by_id(modal_id)
            .and_then(|modal| {
                modal
                    .query_selector(&attribute_selector("data-trainer-id", id))
                    .ok()
                    .flatten()
            })
            .ok_or_else(|| not_found(modal_id, sub_path))?;
        scroll_into_view(&card);

        // The panel is optional markup; a missing one still counts as revealed.
        for (element_id, class) in [(BOOKING_PANEL_ID, "active"), (BOOKING_BACKDROP_ID, "show")] {
            match document.get_element_by_id(element_id) {
                Some(element) => {
                    let _ = element.class_list().add_1(class);
                }
                None => debug!("No #{} on this page", element_id),
            }
        }
        click_in_order(document, booking_choices(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_id_requires_prefix_and_name() {
        assert_eq!(trainer_id("trainer-ivanov"), Some("ivanov"));
        assert_eq!(trainer_id("trainer-anna-maria"), Some("anna-maria"));
        assert_eq!(trainer_id("trainer-"), None);
        assert_eq!(trainer_id("ivanov"), None);
    }

    #[test]
    fn booking_preselects_gym_then_trainer() {
        let steps = booking_choices("savkin");
        let selectors: Vec<&str> = steps.iter().map(|(_, selector)| selector.as_str()).collect();
        assert_eq!(
            selectors,
            vec!["[data-value=\"gym\"]", "[data-value=\"trainer\"]", "[data-value=\"savkin\"]"]
        );
        assert_eq!(steps.iter().map(|(delay, _)| *delay).sum::<u32>(), 250);
    }

    #[test]
    fn selector_values_are_quoted() {
        assert_eq!(attribute_selector("data-slide-id", "fight"), "[data-slide-id=\"fight\"]");
        assert_eq!(
            attribute_selector("data-slide-id", "a\"b\\c"),
            "[data-slide-id=\"a\\\"b\\\\c\"]"
        );
    }
}
