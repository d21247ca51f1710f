//! Override merge
//!
//! Registry order and length are preserved. Overrides keyed by ids the
//! registry does not contain are never consulted.

use super::definition::{LayerDefinition, LayerOverrides};
use super::registry::LayerRegistry;

/// Merge per-call overrides over the registry defaults.
///
/// Returns a fresh list on every call; the registry is left untouched.
pub fn merge_layers(
    registry: &LayerRegistry,
    overrides: Option<&LayerOverrides>,
) -> Vec<LayerDefinition> {
    let Some(overrides) = overrides else {
        return registry.layers().to_vec();
    };

    registry
        .iter()
        .map(|layer| match overrides.get(&layer.id) {
            Some(layer_override) => layer.with_override(layer_override),
            None => layer.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerId, LayerOverride};
    use pretty_assertions::assert_eq;

    fn registry() -> LayerRegistry {
        LayerRegistry::from_json(
            r#"[
                {"id": 1, "name": "One", "agent": "a1", "desc": "d1", "prompt": "p1"},
                {"id": 2, "name": "Two", "agent": "a2", "desc": "d2", "prompt": "p2"},
                {"id": "three", "name": "Three", "agent": "a3", "desc": "d3", "prompt": "p3"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_no_overrides_returns_defaults() {
        let registry = registry();
        assert_eq!(merge_layers(&registry, None), registry.layers().to_vec());
        assert_eq!(
            merge_layers(&registry, Some(&LayerOverrides::new())),
            registry.layers().to_vec()
        );
    }

    #[test]
    fn test_override_applies_field_by_field() {
        let registry = registry();
        let mut overrides = LayerOverrides::new();
        overrides.insert(
            LayerId::from("2"),
            LayerOverride::new().with_agent("critic").with_prompt("be harsh"),
        );

        let merged = merge_layers(&registry, Some(&overrides));

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].agent, "critic");
        assert_eq!(merged[1].prompt, "be harsh");
        assert_eq!(merged[1].name, "Two");
        assert_eq!(merged[1].desc, "d2");
        assert_eq!(merged[0], registry.layers()[0]);
        assert_eq!(merged[2], registry.layers()[2]);
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let registry = registry();
        let mut with_unknown = LayerOverrides::new();
        with_unknown.insert(LayerId::from("1"), LayerOverride::new().with_name("Uno"));
        with_unknown.insert(LayerId::from("99"), LayerOverride::new().with_name("Ghost"));

        let mut without_unknown = with_unknown.clone();
        without_unknown.remove(&LayerId::from("99"));

        assert_eq!(
            merge_layers(&registry, Some(&with_unknown)),
            merge_layers(&registry, Some(&without_unknown))
        );
        assert_eq!(
            registry.unknown_override_ids(&with_unknown),
            vec![&LayerId::from("99")]
        );
    }

    #[test]
    fn test_merge_does_not_mutate_registry() {
        let registry = registry();
        let before = registry.clone();
        let mut overrides = LayerOverrides::new();
        overrides.insert(LayerId::from("three"), LayerOverride::new().with_desc("changed"));

        let merged = registry.merged(Some(&overrides));

        assert_eq!(merged[2].desc, "changed");
        assert_eq!(registry, before);
    }
}
