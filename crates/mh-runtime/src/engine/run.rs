use mh_core::EntityHandle;
use mh_parser::KvNode;
use tracing::debug;

use super::lifecycle::Phase;
use super::MapHackEngine;
use crate::entdata::EntityRecord;
use crate::function::{is_function_name, FunctionKind};
use crate::host::{GameHost, PrecacheKind};
use crate::MAX_RECURSION_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Transform {
    Position,
    Angles,
}

impl MapHackEngine {
    /// Runs every block child of `node` in order.
    ///
    /// Nesting past the recursion cap aborts the whole chain; the guard
    /// clears once the outermost call returns.
    pub fn run_entities(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        if self.recursion_aborted {
            return;
        }
        if self.recursion_depth >= MAX_RECURSION_DEPTH {
            self.diagnostics.warn(
                "MH_RECURSION_LIMIT",
                format!(
                    "Recursion limit of {} reached while running \"{}\".",
                    MAX_RECURSION_DEPTH, node.name
                ),
            );
            self.recursion_aborted = true;
            return;
        }

        self.recursion_depth += 1;
        for child in node.true_subkeys() {
            if self.recursion_aborted {
                break;
            }
            self.run_node(host, child);
        }
        if self.phase == Phase::Post {
            self.resolve_output_events(host);
        }
        self.recursion_depth -= 1;
        if self.recursion_depth == 0 {
            self.recursion_aborted = false;
        }
    }

    fn run_node(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        if !is_function_name(&node.name) {
            match self.phase {
                Phase::Pre => {
                    debug!(class = node.name.as_str(), "staged entity record");
                    self.records.push(EntityRecord::from_directive(node));
                }
                Phase::Post => self.spawn_entity(host, node),
            }
            return;
        }

        match FunctionKind::from_name(&node.name) {
            Some(kind) => self.call_function(host, kind, node),
            None => self.diagnostics.warn(
                "MH_FUNCTION_UNKNOWN",
                format!("Unknown function \"{}\".", node.name),
            ),
        }
    }

    fn call_function(&mut self, host: &mut dyn GameHost, kind: FunctionKind, node: &KvNode) {
        if self.phase == Phase::Pre && kind.is_post_only() {
            debug!(function = kind.name(), "skipped in pre-entity phase");
            return;
        }
        match kind {
            FunctionKind::If => self.fn_if(host, node),
            FunctionKind::Set => self.fn_set(node),
            FunctionKind::Increment => self.fn_step(node, true),
            FunctionKind::Decrement => self.fn_step(node, false),
            FunctionKind::Rand => self.fn_rand(node),
            FunctionKind::Console => self.fn_console(host, node),
            FunctionKind::Fire => self.fn_fire(host, node),
            FunctionKind::Edit => self.fn_edit(host, node),
            FunctionKind::EditAll => self.fn_edit_all(host, node),
            FunctionKind::Modify => self.fn_modify(host, node),
            FunctionKind::Filter => self.fn_filter(host, node),
            FunctionKind::Trigger => self.fn_trigger(host, node),
            FunctionKind::Start => self.fn_start(host, node),
            FunctionKind::Stop => self.fn_stop(node),
            FunctionKind::Respawn => self.fn_respawn(host, node),
            FunctionKind::Remove => self.fn_remove(host, node),
            FunctionKind::RemoveAll => self.fn_remove_all(host, node),
            FunctionKind::RemoveConnections => self.fn_remove_connections(host, node),
            FunctionKind::GetPos => self.fn_get_transform(host, node, Transform::Position),
            FunctionKind::SetPos => self.fn_set_transform(host, node, Transform::Position),
            FunctionKind::GetAng => self.fn_get_transform(host, node, Transform::Angles),
            FunctionKind::SetAng => self.fn_set_transform(host, node, Transform::Angles),
            FunctionKind::EditField => self.fn_edit_field(host, node),
            FunctionKind::PlaySound => self.fn_play_sound(host, node),
            FunctionKind::Script => self.fn_script(host, node),
        }
    }

    /// Creates a live entity from a directive node. A legacy `keyvalues`
    /// block is applied after the node's own values.
    fn spawn_entity(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(entity) = host.create_entity(&node.name) else {
            self.diagnostics.warn(
                "MH_ENTITY_CREATE_FAILED",
                format!("Could not create entity of class \"{}\".", node.name),
            );
            return;
        };

        self.apply_key_values(host, entity, node);
        if let Some(legacy) = node.find_block("keyvalues") {
            self.apply_key_values(host, entity, legacy);
        }
        host.finalize_spawn(entity);

        if let Some(name) = host.target_name(entity).filter(|name| !name.is_empty()) {
            self.spawned.insert(name.to_ascii_lowercase(), entity);
        }
        debug!(entity = host.debug_name(entity).as_str(), "spawned entity");
    }

    /// Applies substituted key/values to a live entity. `model` is precached
    /// and set before its key/value; `connections` blocks are flattened.
    pub(super) fn apply_key_values(
        &mut self,
        host: &mut dyn GameHost,
        entity: EntityHandle,
        node: &KvNode,
    ) {
        for child in node.children() {
            let Some(raw) = child.as_text() else {
                if child.name.eq_ignore_ascii_case("connections") {
                    self.apply_key_values(host, entity, child);
                }
                continue;
            };
            let value = self.vars.substitute(raw, &mut self.diagnostics);
            if child.name.eq_ignore_ascii_case("model") {
                host.precache(PrecacheKind::Model, &value);
                host.set_model(entity, &value);
            }
            host.apply_key_value(entity, &child.name, &value);
            debug!(
                entity = %entity,
                key = child.name.as_str(),
                value = value.as_str(),
                "changed keyvalue"
            );
        }
    }
}
