use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use super::error::RouteError;
use crate::config::ModalRouteConfig;

/// Live view of one modal element owned by the page.
///
/// Implementations must not call back into the controller synchronously;
/// state changes are reported later through lifecycle events.
pub trait ModalSurface {
    /// The element exists in the document (content may be fetched late).
    fn is_mounted(&self) -> bool;
    fn is_active(&self) -> bool;
    fn activate(&self);
    fn deactivate(&self);
    /// Scroll the modal's inner scroller back to the top.
    fn reset_scroll(&self) {}
}

/// Reveals a nested entity (slide, trainer card, ...) addressed by a sub-path.
pub trait SubEntityResolver {
    fn reveal(&self, modal_id: &str, sub_path: &str) -> Result<(), RouteError>;
}

#[derive(Clone)]
pub struct ModalDescriptor {
    pub id: String,
    pub hash_token: String,
    pub aliases: Vec<String>,
    pub handle: Rc<dyn ModalSurface>,
    pub resolver: Option<Rc<dyn SubEntityResolver>>,
}

impl ModalDescriptor {
    pub fn new(id: impl Into<String>, hash_token: impl Into<String>, handle: Rc<dyn ModalSurface>) -> Self {
        Self {
            id: id.into(),
            hash_token: hash_token.into(),
            aliases: Vec::new(),
            handle,
            resolver: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn SubEntityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Read from the element every time, never cached.
    pub fn is_open(&self) -> bool {
        self.handle.is_active()
    }

    fn tokens(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.hash_token).chain(self.aliases.iter())
    }
}

impl fmt::Debug for ModalDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalDescriptor")
            .field("id", &self.id)
            .field("hash_token", &self.hash_token)
            .field("aliases", &self.aliases)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Append-only set of modals known for this page session.
#[derive(Default, Debug)]
pub struct ModalRegistry {
    descriptors: Vec<ModalDescriptor>,
    by_id: HashMap<String, usize>,
    by_token: HashMap<String, usize>,
}

impl ModalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the route table. The first collision aborts.
    pub fn from_routes<F>(routes: &[ModalRouteConfig], mut build: F) -> Result<Self, RouteError>
    where
        F: FnMut(&ModalRouteConfig) -> ModalDescriptor,
    {
        let mut registry = Self::new();
        for route in routes {
            registry.register(build(route))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ModalDescriptor) -> Result<(), RouteError> {
        if self.by_id.contains_key(&descriptor.id) {
            return Err(RouteError::DuplicateRegistration {
                kind: "modal id",
                value: descriptor.id,
            });
        }

        let mut seen = HashSet::new();
        for token in descriptor.tokens() {
            if self.by_token.contains_key(token) || !seen.insert(token.as_str()) {
                return Err(RouteError::DuplicateRegistration {
                    kind: "hash token",
                    value: token.clone(),
                });
            }
        }

        let index = self.descriptors.len();
        self.by_id.insert(descriptor.id.clone(), index);
        for token in descriptor.tokens() {
            self.by_token.insert(token.clone(), index);
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Token or alias lookup.
    pub fn resolve(&self, token: &str) -> Option<&ModalDescriptor> {
        self.by_token.get(token).map(|&i| &self.descriptors[i])
    }

    pub fn by_id(&self, id: &str) -> Option<&ModalDescriptor> {
        self.by_id.get(id).map(|&i| &self.descriptors[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModalDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_routes;
    use crate::routing::testing::FakeSurface;

    fn descriptor(id: &str, token: &str) -> ModalDescriptor {
        ModalDescriptor::new(id, token, FakeSurface::mounted())
    }

    #[test]
    fn resolves_by_token_alias_and_id() {
        let mut registry = ModalRegistry::new();
        registry.register(descriptor("sportModal", "sport")).unwrap();
        registry
            .register(descriptor("relaxModal", "vesotdyh").with_alias("relax"))
            .unwrap();

        assert_eq!(registry.resolve("sport").unwrap().id, "sportModal");
        assert_eq!(registry.resolve("relax").unwrap().id, "relaxModal");
        assert_eq!(registry.resolve("vesotdyh").unwrap().id, "relaxModal");
        assert_eq!(registry.by_id("relaxModal").unwrap().hash_token, "vesotdyh");
        assert!(registry.resolve("sportModal").is_none());
        assert!(registry.by_id("sport").is_none());
    }

    #[test]
    fn rejects_duplicate_id() {
        let mut registry = ModalRegistry::new();
        registry.register(descriptor("sportModal", "sport")).unwrap();
        let err = registry.register(descriptor("sportModal", "fight")).unwrap_err();
        assert_eq!(
            err,
            RouteError::DuplicateRegistration {
                kind: "modal id",
                value: "sportModal".into()
            }
        );
        assert!(registry.resolve("fight").is_none());
    }

    #[test]
    fn rejects_token_colliding_with_existing_alias() {
        let mut registry = ModalRegistry::new();
        registry
            .register(descriptor("relaxModal", "vesotdyh").with_alias("relax"))
            .unwrap();
        let err = registry.register(descriptor("restModal", "relax")).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRegistration { kind: "hash token", .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_alias_repeating_own_token() {
        let mut registry = ModalRegistry::new();
        let err = registry
            .register(descriptor("iceModal", "ice").with_alias("ice"))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRegistration { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn builds_default_route_table() {
        let registry =
            ModalRegistry::from_routes(&default_routes(), |route| {
                descriptor(&route.modal_id, &route.token)
            })
            .unwrap();
        assert_eq!(registry.len(), default_routes().len());
        assert_eq!(registry.resolve("plan-event").unwrap().id, "planEventModal");
    }

    #[test]
    fn from_routes_stops_at_first_collision() {
        let mut routes = default_routes();
        routes.push(routes[0].clone());
        let result = ModalRegistry::from_routes(&routes, |route| descriptor(&route.modal_id, &route.token));
        assert!(result.is_err());
    }
}
