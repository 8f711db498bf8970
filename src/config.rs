use log::Level;
use serde::Deserialize;

#[cfg(debug_assertions)]
pub fn log_level() -> Level {
    Level::Debug // Verbose routing traces when running a dev build
}

#[cfg(not(debug_assertions))]
pub fn log_level() -> Level {
    Level::Info
}

/// `<script type="application/json" id="...">` holding an optional override.
pub const CONFIG_ELEMENT_ID: &str = "pride-router-config";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid router config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("router config has no routes")]
    NoRoutes,
}

/// Nested entities a modal can deep-link into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubEntities {
    /// Horizontal card slider, cards tagged with `data-slide-id`.
    Slider { slider_id: String, card_class: String },
    /// Trainer cards tagged with `data-trainer-id`, addressed as `trainer-<id>`.
    Trainers,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModalRouteConfig {
    pub modal_id: String,
    pub token: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Selector of the inner scroller reset when the modal closes.
    #[serde(default)]
    pub scroller: Option<String>,
    #[serde(default)]
    pub sub_entities: Option<SubEntities>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub interval_ms: u32,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub routes: Vec<ModalRouteConfig>,
    pub retry: RetryPolicy,
    /// Delay before the initial fragment is routed, so the page's animation
    /// layer has finished wiring its modals.
    pub boot_delay_ms: u32,
    pub slider_debounce_ms: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            routes: default_routes(),
            retry: RetryPolicy::default(),
            boot_delay_ms: 1200,
            slider_debounce_ms: 300,
        }
    }
}

impl RouterConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = serde_json::from_str(raw)?;
        if config.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }
        Ok(config)
    }
}

fn route(modal_id: &str, token: &str, scroller: Option<&str>) -> ModalRouteConfig {
    ModalRouteConfig {
        modal_id: modal_id.to_string(),
        token: token.to_string(),
        aliases: Vec::new(),
        scroller: scroller.map(str::to_string),
        sub_entities: None,
    }
}

fn slider_route(modal_id: &str, token: &str, prefix: &str) -> ModalRouteConfig {
    ModalRouteConfig {
        sub_entities: Some(SubEntities::Slider {
            slider_id: format!("{}Slider", prefix),
            card_class: format!("{}-card", prefix),
        }),
        ..route(modal_id, token, Some(&format!(".{}-content", prefix)))
    }
}

pub fn default_routes() -> Vec<ModalRouteConfig> {
    vec![
        slider_route("sportModal", "sport", "sport"),
        slider_route("kidsModal", "kids", "kids"),
        slider_route("restModal", "rest", "rest"),
        slider_route("eventsModal", "events", "events"),
        route("contactsModal", "contacts", Some(".contacts-content")),
        ModalRouteConfig {
            sub_entities: Some(SubEntities::Trainers),
            ..route("aboutModal", "about", Some(".about-scroller"))
        },
        ModalRouteConfig {
            aliases: vec!["relax".to_string()],
            ..route("relaxModal", "vesotdyh", Some(".relax-scroller"))
        },
        route("iceModal", "ice", Some(".ice-modal-scroller")),
        route("pricingModal", "pricing", Some(".pricing-scroller")),
        route("reviewModal", "review", Some(".review-scroller")),
        route("reviewFormModal", "leave-review", None),
        route("planEventModal", "plan-event", None),
    ]
}
