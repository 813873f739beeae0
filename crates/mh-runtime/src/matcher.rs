use mh_core::EntityHandle;
use mh_parser::KvNode;

use crate::diagnostics::Diagnostics;
use crate::entdata::EntityRecord;
use crate::host::EntityWorld;
use crate::vars::VariableStore;

/// Anything whose key/values can be tested by a `match` block.
pub trait KeyValueSource {
    fn lookup_key_value(&self, key: &str) -> Option<String>;
}

impl KeyValueSource for EntityRecord {
    fn lookup_key_value(&self, key: &str) -> Option<String> {
        self.get_key_value(key).map(str::to_string)
    }
}

/// A live entity viewed through the world that owns it.
pub struct LiveEntity<'a, W: EntityWorld + ?Sized> {
    pub world: &'a W,
    pub entity: EntityHandle,
}

impl<W: EntityWorld + ?Sized> KeyValueSource for LiveEntity<'_, W> {
    fn lookup_key_value(&self, key: &str) -> Option<String> {
        self.world.get_key_value(self.entity, key)
    }
}

/// True when `match_node` has at least one child and every child's
/// (substituted) value equals the source's value for that key.
pub fn has_matches(
    match_node: &KvNode,
    source: &impl KeyValueSource,
    vars: &VariableStore,
    diagnostics: &mut Diagnostics,
) -> bool {
    let children = match_node.children();
    if children.is_empty() {
        return false;
    }
    children.iter().all(|child| {
        let expected = vars.substitute(child.as_text().unwrap_or_default(), diagnostics);
        source
            .lookup_key_value(&child.name)
            .is_some_and(|actual| actual.eq_ignore_ascii_case(&expected))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_core::ValueKind;

    fn record() -> EntityRecord {
        EntityRecord::from_pairs([("classname", "prop_physics"), ("model", "models/crate.mdl")])
    }

    #[test]
    fn every_key_must_match() {
        let vars = VariableStore::default();
        let mut diagnostics = Diagnostics::default();
        let node = KvNode::block(
            "match",
            vec![
                KvNode::text("classname", "PROP_PHYSICS"),
                KvNode::text("model", "models/crate.mdl"),
            ],
        );
        assert!(has_matches(&node, &record(), &vars, &mut diagnostics));

        let node = KvNode::block(
            "match",
            vec![
                KvNode::text("classname", "prop_physics"),
                KvNode::text("targetname", "x"),
            ],
        );
        assert!(!has_matches(&node, &record(), &vars, &mut diagnostics));
    }

    #[test]
    fn empty_match_block_matches_nothing() {
        let vars = VariableStore::default();
        let node = KvNode::block("match", vec![]);
        assert!(!has_matches(&node, &record(), &vars, &mut Diagnostics::default()));
    }

    #[test]
    fn match_values_are_substituted() {
        let mut vars = VariableStore::default();
        vars.register("crate_model", ValueKind::String, "models/crate.mdl");
        let node = KvNode::block("match", vec![KvNode::text("model", "%crate_model")]);
        assert!(has_matches(&node, &record(), &vars, &mut Diagnostics::default()));
    }
}
