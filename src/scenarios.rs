//! Whole-page flows: attribution capture, boot routing and late-mounted modals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::attribution::forms::tests::MemoryForm;
use crate::attribution::store::{AttributionKey, AttributionStore, SessionStore};
use crate::routing::controller::{HistoryMode, LifecycleEvent, ModalPhase};
use crate::routing::testing::Harness;

/// Clones share one tab's storage.
#[derive(Default, Clone)]
struct TabSession(Rc<RefCell<HashMap<String, String>>>);

impl SessionStore for TabSession {
    fn get(&self, key: &str) -> Option<String> {
        self.0.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.0.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

#[test]
fn ad_landing_opens_modal_and_tags_its_form() {
    let attribution = Rc::new(AttributionStore::new(TabSession::default()));
    attribution.capture_from_query("?utm_source=yandex&utm_campaign=winter&yclid=42");

    let forms = Rc::new(RefCell::new(HashMap::from([(
        "sportModal".to_string(),
        MemoryForm::with_field("phone", ""),
    )])));
    let mut h = Harness::with_boot_delay(1200);
    {
        let forms = forms.clone();
        let attribution = attribution.clone();
        h.controller.set_open_listener(Box::new(move |modal_id: &str| {
            if let Some(form) = forms.borrow_mut().get_mut(modal_id) {
                attribution.apply_to(form);
            }
        }));
    }
    h.bar.navigate("sport");
    h.controller.start();
    h.scheduler.advance(&mut h.controller, 1199);
    assert_eq!(h.controller.phase("sportModal"), ModalPhase::Closed);

    h.scheduler.advance(&mut h.controller, 1);
    assert_eq!(h.controller.phase("sportModal"), ModalPhase::Opening);
    h.controller.on_lifecycle("sportModal", LifecycleEvent::Opened);
    assert_eq!(h.controller.phase("sportModal"), ModalPhase::Open);
    assert!(h.bar.writes().is_empty());

    // The lead form inside the modal was enriched when the open was confirmed.
    let form = forms.borrow()["sportModal"].clone();
    assert_eq!(form.len(), 4);
    assert_eq!(form.value("utm_source"), Some("yandex"));
    assert_eq!(form.value("utm_campaign"), Some("winter"));
    assert_eq!(form.value("yclid"), Some("42"));
    assert!(form.is_hidden("yclid"));

    // Later navigation inside the site keeps the first touch.
    attribution.capture_from_query("?utm_source=google");
    assert_eq!(attribution.snapshot().get(AttributionKey::UtmSource), Some("yandex"));
}

#[test]
fn deep_link_waits_for_late_modal_then_reveals_trainer() {
    let mut h = Harness::new();
    h.surface("aboutModal").unmount();
    h.bar.navigate("about/trainer-ivanov");
    h.controller.on_hash_change();

    h.scheduler.advance(&mut h.controller, 600);
    assert_eq!(h.controller.pending_target(), Some("aboutModal"));
    assert_eq!(h.surface("aboutModal").activations(), 0);

    h.surface("aboutModal").mount();
    h.scheduler.advance(&mut h.controller, 200);
    assert_eq!(h.controller.phase("aboutModal"), ModalPhase::Opening);
    assert!(h.trainers.revealed().is_empty());

    h.controller.on_lifecycle("aboutModal", LifecycleEvent::Opened);
    assert_eq!(h.trainers.revealed(), vec!["trainer-ivanov".to_string()]);
    assert_eq!(h.bar.fragment_now(), "about/trainer-ivanov");
    assert!(h.bar.writes().is_empty());
}

#[test]
fn deep_link_to_missing_modal_is_abandoned_quietly() {
    let mut h = Harness::new();
    h.surface("aboutModal").unmount();
    h.bar.navigate("about/trainer-ivanov");
    h.controller.on_hash_change();

    h.scheduler.advance(&mut h.controller, 10_000);
    assert_eq!(h.controller.pending_target(), None);
    assert_eq!(h.controller.phase("aboutModal"), ModalPhase::Closed);
    assert_eq!(h.trainers.attempts(), 0);
    assert!(h.bar.writes().is_empty());
    assert_eq!(h.bar.fragment_now(), "about/trainer-ivanov");
}

#[test]
fn trainer_button_from_another_modal_stacks_and_returns() {
    let mut h = Harness::new();
    h.bar.navigate("kids");
    h.controller.on_hash_change();
    h.controller.on_lifecycle("kidsModal", LifecycleEvent::Opened);

    h.controller.open_from_ui("aboutModal", Some("trainer-savkin"));
    h.controller.on_hash_change();
    h.controller.on_lifecycle("kidsModal", LifecycleEvent::Closed);
    h.controller.on_lifecycle("aboutModal", LifecycleEvent::Opened);
    assert_eq!(h.trainers.revealed(), vec!["trainer-savkin".to_string()]);
    assert_eq!(h.controller.stack().top(), Some("kidsModal"));

    h.controller.close_active();
    h.controller.on_lifecycle("aboutModal", LifecycleEvent::Closed);
    h.controller.on_hash_change();
    h.controller.on_lifecycle("kidsModal", LifecycleEvent::Opened);

    assert_eq!(h.controller.active(), Some("kidsModal"));
    assert_eq!(
        h.bar.writes(),
        vec![
            ("about/trainer-savkin".to_string(), HistoryMode::Push),
            ("kids".to_string(), HistoryMode::Replace),
        ]
    );
    assert_eq!(h.surface("kidsModal").activations(), 2);
}

#[test]
fn scrolling_slider_keeps_fragment_current() {
    let mut h = Harness::new();
    h.controller.open_from_ui("eventsModal", None);
    h.controller.on_hash_change();
    h.controller.on_lifecycle("eventsModal", LifecycleEvent::Opened);

    h.controller.sync_sub_path("eventsModal", "spa");
    h.controller.on_hash_change();
    assert_eq!(h.bar.fragment_now(), "events/spa");
    assert_eq!(h.slides.attempts(), 0);

    // Reload of the copied link lands on the same slide.
    let mut reloaded = Harness::new();
    reloaded.bar.navigate(&h.bar.fragment_now());
    reloaded.controller.start();
    reloaded.controller.on_lifecycle("eventsModal", LifecycleEvent::Opened);
    assert_eq!(reloaded.slides.revealed(), vec!["spa".to_string()]);
}
