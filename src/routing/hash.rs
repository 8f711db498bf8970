use log::warn;

use super::registry::ModalRegistry;

/// Parsed address-bar fragment: `#<token>` or `#<token>/<sub_path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRoute {
    pub token: String,
    pub sub_path: Option<String>,
}

/// Splits on the first `/`. `None` for an empty fragment.
pub fn decode(fragment: &str) -> Option<HashRoute> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    if fragment.is_empty() {
        return None;
    }

    let (token, rest) = match fragment.split_once('/') {
        Some((token, rest)) => (token, Some(rest)),
        None => (fragment, None),
    };
    if token.is_empty() {
        return None;
    }

    let sub_path = rest.filter(|rest| !rest.is_empty()).map(|rest| {
        urlencoding::decode(rest)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| rest.to_string())
    });

    Some(HashRoute {
        token: token.to_string(),
        sub_path,
    })
}

/// Fragment (without `#`) for a modal. Empty when the id is unknown.
pub fn encode(registry: &ModalRegistry, modal_id: &str, sub_path: Option<&str>) -> String {
    let Some(descriptor) = registry.by_id(modal_id) else {
        warn!("Cannot build hash for unregistered modal {}", modal_id);
        return String::new();
    };

    match sub_path.filter(|sub| !sub.is_empty()) {
        Some(sub) => format!("{}/{}", descriptor.hash_token, urlencoding::encode(sub)),
        None => descriptor.hash_token.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_routes;
    use crate::routing::registry::ModalDescriptor;
    use crate::routing::testing::FakeSurface;

    fn registry() -> ModalRegistry {
        ModalRegistry::from_routes(&default_routes(), |route| {
            let mut descriptor = ModalDescriptor::new(&route.modal_id, &route.token, FakeSurface::mounted());
            descriptor.aliases = route.aliases.clone();
            descriptor
        })
        .unwrap()
    }

    #[test]
    fn decodes_token_and_sub_path() {
        assert_eq!(
            decode("#about/trainer-ivanov"),
            Some(HashRoute {
                token: "about".into(),
                sub_path: Some("trainer-ivanov".into())
            })
        );
        assert_eq!(
            decode("sport"),
            Some(HashRoute {
                token: "sport".into(),
                sub_path: None
            })
        );
    }

    #[test]
    fn empty_fragments_decode_to_nothing() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("#"), None);
        assert_eq!(decode("#/fight"), None);
    }

    #[test]
    fn trailing_slash_has_no_sub_path() {
        assert_eq!(decode("#kids/").unwrap().sub_path, None);
    }

    #[test]
    fn only_first_slash_splits() {
        let route = decode("#events/2024/new-year").unwrap();
        assert_eq!(route.token, "events");
        assert_eq!(route.sub_path.as_deref(), Some("2024/new-year"));
    }

    #[test]
    fn sub_path_is_percent_decoded() {
        let route = decode("#sport/%D0%B1%D0%BE%D0%BA%D1%81").unwrap();
        assert_eq!(route.sub_path.as_deref(), Some("бокс"));
    }

    #[test]
    fn encode_unknown_modal_is_empty() {
        assert_eq!(encode(&registry(), "gymModal", Some("x")), "");
    }

    #[test]
    fn encode_uses_canonical_token() {
        let registry = registry();
        assert_eq!(encode(&registry, "relaxModal", None), "vesotdyh");
        assert_eq!(encode(&registry, "aboutModal", Some("trainer-ivanov")), "about/trainer-ivanov");
        assert_eq!(encode(&registry, "kidsModal", Some("")), "kids");
    }

    #[test]
    fn round_trips_every_registered_modal() {
        let registry = registry();
        let subs = [None, Some("fight"), Some("trainer-ivanov"), Some("a/b"), Some("бокс"), Some("50% off")];
        for descriptor in registry.iter() {
            for sub in subs {
                let route = decode(&encode(&registry, &descriptor.id, sub)).unwrap();
                assert_eq!(route.token, descriptor.hash_token);
                assert_eq!(route.sub_path.as_deref(), sub);
            }
        }
    }
}
