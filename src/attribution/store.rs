use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;
use url::form_urlencoded;

use super::forms::{sync_hidden_fields, FormFields};

/// Marketing parameters kept for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionKey {
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    UtmId,
    Gclid,  // Google Ads
    Fbclid, // Facebook Ads
    Yclid,  // Yandex Direct
}

impl AttributionKey {
    pub const ALL: [AttributionKey; 9] = [
        AttributionKey::UtmSource,
        AttributionKey::UtmMedium,
        AttributionKey::UtmCampaign,
        AttributionKey::UtmTerm,
        AttributionKey::UtmContent,
        AttributionKey::UtmId,
        AttributionKey::Gclid,
        AttributionKey::Fbclid,
        AttributionKey::Yclid,
    ];

    /// Query parameter, session storage key and hidden field name.
    pub fn param_name(self) -> &'static str {
        match self {
            AttributionKey::UtmSource => "utm_source",
            AttributionKey::UtmMedium => "utm_medium",
            AttributionKey::UtmCampaign => "utm_campaign",
            AttributionKey::UtmTerm => "utm_term",
            AttributionKey::UtmContent => "utm_content",
            AttributionKey::UtmId => "utm_id",
            AttributionKey::Gclid => "gclid",
            AttributionKey::Fbclid => "fbclid",
            AttributionKey::Yclid => "yclid",
        }
    }

    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.param_name() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributionSnapshot(BTreeMap<AttributionKey, String>);

impl AttributionSnapshot {
    pub fn get(&self, key: AttributionKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributionKey, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-tab storage that outlives in-page navigation but not the session.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// First-touch attribution: a stored key is never overwritten.
pub struct AttributionStore<S> {
    storage: S,
}

impl<S: SessionStore> AttributionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn capture_from_query(&self, query: &str) -> AttributionSnapshot {
        let mut captured = 0;
        for (name, value) in parse_query(query) {
            let Some(key) = AttributionKey::from_param(&name) else {
                continue;
            };
            if value.is_empty() || self.storage.get(key.param_name()).is_some() {
                continue;
            }
            self.storage.set(key.param_name(), &value);
            captured += 1;
        }

        let snapshot = self.snapshot();
        if captured > 0 {
            info!(
                "Captured attribution {}",
                serde_json::to_string(&snapshot).unwrap_or_default()
            );
        }
        snapshot
    }

    pub fn snapshot(&self) -> AttributionSnapshot {
        AttributionSnapshot(
            AttributionKey::ALL
                .into_iter()
                .filter_map(|key| {
                    self.storage
                        .get(key.param_name())
                        .filter(|value| !value.is_empty())
                        .map(|value| (key, value))
                })
                .collect(),
        )
    }

    /// Returns how many fields were created or refreshed.
    pub fn apply_to<F: FormFields + ?Sized>(&self, form: &mut F) -> usize {
        let changed = sync_hidden_fields(form, &self.snapshot());
        if changed > 0 {
            debug!("Attribution: {} form fields updated", changed);
        }
        changed
    }
}

/// `?a=1&b=x+y` pairs, decoded. The first occurrence of a name wins.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()).into_owned() {
        if pairs.iter().any(|(seen, _)| *seen == name) {
            continue;
        }
        pairs.push((name, value));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::attribution::forms::tests::MemoryForm;

    #[derive(Default)]
    struct MemoryStore(RefCell<HashMap<String, String>>);

    impl SessionStore for &MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.0.borrow_mut().insert(key.to_string(), value.to_string());
        }
    }

    #[test]
    fn captures_known_parameters_only() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        let snapshot = store.capture_from_query("?utm_source=yandex&page=2&utm_campaign=winter&yclid=");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(AttributionKey::UtmSource), Some("yandex"));
        assert_eq!(snapshot.get(AttributionKey::UtmCampaign), Some("winter"));
        assert_eq!(storage.0.borrow().get("page"), None);
        assert_eq!(storage.0.borrow().get("yclid"), None);
    }

    #[test]
    fn first_touch_wins() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        store.capture_from_query("utm_source=yandex");
        let snapshot = store.capture_from_query("utm_source=google&utm_medium=cpc");

        assert_eq!(snapshot.get(AttributionKey::UtmSource), Some("yandex"));
        assert_eq!(snapshot.get(AttributionKey::UtmMedium), Some("cpc"));
    }

    #[test]
    fn values_already_in_session_survive_reload() {
        let storage = MemoryStore::default();
        storage.0.borrow_mut().insert("gclid".into(), "abc".into());
        let store = AttributionStore::new(&storage);

        let snapshot = store.capture_from_query("");
        assert_eq!(snapshot.get(AttributionKey::Gclid), Some("abc"));
        assert_eq!(store.snapshot(), snapshot);
    }

    #[test]
    fn decodes_plus_and_percent_escapes() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        let snapshot = store.capture_from_query("utm_term=%D0%B1%D0%B0%D1%81%D1%81%D0%B5%D0%B9%D0%BD+%D0%B4%D0%BB%D1%8F+%D0%B4%D0%B5%D1%82%D0%B5%D0%B9");
        assert_eq!(snapshot.get(AttributionKey::UtmTerm), Some("бассейн для детей"));
    }

    #[test]
    fn invalid_utf8_escape_is_replaced_not_stored_raw() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        let snapshot = store.capture_from_query("?utm_source=%FF&utm_medium=cpc%20ads");

        assert_eq!(snapshot.get(AttributionKey::UtmSource), Some("\u{FFFD}"));
        assert_eq!(snapshot.get(AttributionKey::UtmMedium), Some("cpc ads"));
    }

    #[test]
    fn repeated_parameter_uses_first_value() {
        let pairs = parse_query("?utm_source=a&utm_source=b&flag");
        assert_eq!(
            pairs,
            vec![
                ("utm_source".to_string(), "a".to_string()),
                ("flag".to_string(), String::new())
            ]
        );
    }

    #[test]
    fn snapshot_serializes_with_param_names() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        let snapshot = store.capture_from_query("fbclid=f1&utm_source=vk");
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            r#"{"utm_source":"vk","fbclid":"f1"}"#
        );
    }

    #[test]
    fn key_names_round_trip() {
        for key in AttributionKey::ALL {
            assert_eq!(AttributionKey::from_param(key.param_name()), Some(key));
        }
        assert_eq!(AttributionKey::from_param("utm_campaign_id"), None);
    }

    #[test]
    fn apply_to_is_idempotent() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        store.capture_from_query("utm_source=yandex&utm_campaign=winter");

        let mut form = MemoryForm::with_field("phone", "+7");
        assert_eq!(store.apply_to(&mut form), 2);
        let after_first = form.clone();
        assert_eq!(store.apply_to(&mut form), 0);

        assert_eq!(form, after_first);
        assert_eq!(form.len(), 3);
        assert_eq!(form.value("utm_campaign"), Some("winter"));
    }

    #[test]
    fn apply_to_with_empty_snapshot_leaves_form_alone() {
        let storage = MemoryStore::default();
        let store = AttributionStore::new(&storage);
        let mut form = MemoryForm::default();
        assert_eq!(store.apply_to(&mut form), 0);
        assert_eq!(form.len(), 0);
    }
}
