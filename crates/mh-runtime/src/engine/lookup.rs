use mh_core::EntityHandle;
use mh_parser::KvNode;

use super::MapHackEngine;
use crate::host::{EntityWorld, GameHost};

/// Players and the world entity are never destroyed or respawned by a
/// directive.
pub fn is_protected_entity<W: EntityWorld + ?Sized>(world: &W, entity: EntityHandle) -> bool {
    world.is_player(entity)
        || world.is_world(entity)
        || world
            .class_name(entity)
            .is_some_and(|class| class.eq_ignore_ascii_case("worldspawn"))
}

impl MapHackEngine {
    /// Interpreter-spawned entities first, then every live entity.
    pub(super) fn entity_by_target_name(
        &self,
        host: &dyn GameHost,
        name: &str,
    ) -> Option<EntityHandle> {
        if let Some(entity) = self
            .spawned
            .get(&name.to_ascii_lowercase())
            .copied()
            .filter(|entity| host.is_alive(*entity))
        {
            return Some(entity);
        }
        host.entities().into_iter().find(|entity| {
            host.target_name(*entity)
                .is_some_and(|target| target.eq_ignore_ascii_case(name))
        })
    }

    pub(super) fn entity_by_class_name(
        &self,
        host: &dyn GameHost,
        class_name: &str,
    ) -> Option<EntityHandle> {
        host.entities().into_iter().find(|entity| {
            host.class_name(*entity)
                .is_some_and(|class| class.eq_ignore_ascii_case(class_name))
        })
    }

    /// Resolves a directive's target: `targetname` first, then a numeric
    /// `id` (hammer id, `-1` meaning none). Protected entities resolve only
    /// when `allow_protected`.
    pub(super) fn resolve_entity(
        &mut self,
        host: &dyn GameHost,
        node: &KvNode,
        allow_protected: bool,
    ) -> Option<EntityHandle> {
        let entity = match node.get_string("targetname") {
            Some(raw) => {
                let name = self.vars.substitute(raw, &mut self.diagnostics);
                self.entity_by_target_name(host, &name)
            }
            None => {
                let raw = node.get_string_or("id", "-1");
                let id = mh_core::parse_int_lenient(&self.vars.substitute(raw, &mut self.diagnostics));
                if id == -1 {
                    None
                } else {
                    host.entities()
                        .into_iter()
                        .find(|entity| host.hammer_id(*entity) == Some(id))
                }
            }
        };
        entity.filter(|entity| allow_protected || !is_protected_entity(host, *entity))
    }

    /// Index of the staged record named by `targetname`, else by `id`.
    pub(super) fn record_index(&mut self, node: &KvNode) -> Option<usize> {
        if let Some(raw) = node.get_string("targetname") {
            let name = self.vars.substitute(raw, &mut self.diagnostics);
            return self.records.iter().position(|record| {
                record
                    .target_name()
                    .is_some_and(|target| target.eq_ignore_ascii_case(&name))
            });
        }
        let raw = node.get_string_or("id", "-1");
        let id = mh_core::parse_int_lenient(&self.vars.substitute(raw, &mut self.diagnostics));
        if id == -1 {
            return None;
        }
        self.records
            .iter()
            .position(|record| record.hammer_id() == Some(id))
    }
}
