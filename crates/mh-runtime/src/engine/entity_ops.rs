use mh_core::{format_vec3, scan_vec3, ValueKind};
use mh_parser::KvNode;
use tracing::debug;

use super::lifecycle::Phase;
use super::lookup::is_protected_entity;
use super::run::Transform;
use super::MapHackEngine;
use crate::entdata::parse_lump;
use crate::host::{GameHost, InputValue};

impl MapHackEngine {
    fn report_missing_target(&mut self, node: &KvNode) {
        let target = node
            .get_string("targetname")
            .or_else(|| node.get_string("id"))
            .unwrap_or("<none>");
        self.diagnostics.warn(
            "MH_ENTITY_NOT_FOUND",
            format!("{}: no entity matches \"{}\".", node.name, target),
        );
    }

    pub(super) fn fn_console(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        if let Some(raw) = node.get_string("cmd") {
            let command = self.vars.substitute(raw, &mut self.diagnostics);
            if self.config.allow_server_command {
                host.execute_command(&format!("{}\n", command));
            } else {
                self.diagnostics.warn(
                    "MH_CONSOLE_CMD_DENIED",
                    format!("Server command \"{}\" is not allowed.", command),
                );
            }
        } else if let Some(raw) = node.get_string("msg") {
            let message = self.vars.substitute(raw, &mut self.diagnostics);
            host.message(&format!("{}\n", message));
        } else if let Some(raw) = node.get_string("warning") {
            let warning = self.vars.substitute(raw, &mut self.diagnostics);
            host.warning(&format!("{}\n", warning));
        }
    }

    /// Sends an input. An explicit `type` wins over the kind of a `%var`
    /// value, which wins over sniffing the value text.
    pub(super) fn fn_fire(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(entity) = self.resolve_entity(host, node, true) else {
            self.report_missing_target(node);
            return;
        };
        let input = self
            .vars
            .substitute(node.get_string_or("input", ""), &mut self.diagnostics);
        let (value, variable_kind) = self
            .vars
            .substitute_typed(node.get_string_or("value", ""), &mut self.diagnostics);
        let declared = node
            .get_string("type")
            .map(ValueKind::from_identifier)
            .filter(|kind| *kind != ValueKind::None);
        let kind = declared
            .or(variable_kind)
            .unwrap_or_else(|| ValueKind::sniff(&value));

        let payload = match kind {
            ValueKind::Int => InputValue::Int(mh_core::parse_int_lenient(&value)),
            ValueKind::Float => InputValue::Float(mh_core::parse_float_lenient(&value)),
            _ => InputValue::String(value),
        };
        debug!(
            entity = host.debug_name(entity).as_str(),
            input = input.as_str(),
            ?payload,
            "fired input"
        );
        host.send_input(entity, &input, payload);
    }

    /// Destroys an entity and spawns it again from the level's raw record
    /// with the same hammer id.
    pub(super) fn fn_respawn(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(entity) = self.resolve_entity(host, node, false) else {
            self.report_missing_target(node);
            return;
        };
        let Some(hammer_id) = host.hammer_id(entity) else {
            self.diagnostics.warn(
                "MH_RESPAWN_NO_ID",
                format!("{} has no hammer id to respawn from.", host.debug_name(entity)),
            );
            return;
        };
        let lump = match &self.patched_lump {
            Some(lump) => lump.clone(),
            None => host.level_entity_lump(),
        };
        let Some(record) = parse_lump(&lump)
            .into_iter()
            .find(|record| record.hammer_id() == Some(hammer_id))
        else {
            self.diagnostics.warn(
                "MH_RESPAWN_NO_RECORD",
                format!("No entity data with hammer id {}.", hammer_id),
            );
            return;
        };

        host.destroy(entity);
        let Some(respawned) = host.spawn_from_record(record.as_str()) else {
            self.diagnostics.warn(
                "MH_RESPAWN_FAILED",
                format!("Could not respawn entity with hammer id {}.", hammer_id),
            );
            return;
        };
        host.finalize_spawn(respawned);
        if let Some(name) = host.target_name(respawned).filter(|name| !name.is_empty()) {
            self.spawned.insert(name.to_ascii_lowercase(), respawned);
        }
        debug!(entity = host.debug_name(respawned).as_str(), hammer_id, "respawned entity");
    }

    pub(super) fn fn_remove(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        if self.phase == Phase::Pre {
            match self.record_index(node) {
                Some(index) => {
                    let record = self.records.remove(index);
                    debug!(class = record.class_name().unwrap_or_default(), "removed entity record");
                }
                None => self.report_missing_target(node),
            }
            return;
        }

        match self.resolve_entity(host, node, false) {
            Some(entity) => {
                debug!(entity = host.debug_name(entity).as_str(), "removed entity");
                host.destroy(entity);
            }
            None => self.report_missing_target(node),
        }
    }

    /// Removes everything with the given `targetname`, or failing that the
    /// given `classname`.
    pub(super) fn fn_remove_all(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let target = node
            .get_string("targetname")
            .map(|raw| self.vars.substitute(raw, &mut self.diagnostics));
        let class = node
            .get_string("classname")
            .map(|raw| self.vars.substitute(raw, &mut self.diagnostics));
        let (key, wanted) = match (target, class) {
            (Some(target), _) => ("targetname", target),
            (None, Some(class)) => ("classname", class),
            (None, None) => {
                self.diagnostics.warn(
                    "MH_REMOVE_ALL_NO_FILTER",
                    "$remove_all needs \"targetname\" or \"classname\".",
                );
                return;
            }
        };

        if self.phase == Phase::Pre {
            let before = self.records.len();
            self.records.retain(|record| {
                !record
                    .get_key_value(key)
                    .is_some_and(|value| value.eq_ignore_ascii_case(&wanted))
            });
            debug!(key, value = wanted.as_str(), removed = before - self.records.len(), "removed entity records");
            return;
        }

        let mut removed = 0usize;
        for entity in host.entities() {
            if is_protected_entity(&*host, entity) {
                continue;
            }
            let value = if key == "targetname" {
                host.target_name(entity)
            } else {
                host.class_name(entity)
            };
            if value.is_some_and(|value| value.eq_ignore_ascii_case(&wanted)) {
                host.destroy(entity);
                removed += 1;
            }
        }
        debug!(key, value = wanted.as_str(), removed, "removed entities");
    }

    /// Copies an entity's origin or angles into a variable's text.
    pub(super) fn fn_get_transform(
        &mut self,
        host: &mut dyn GameHost,
        node: &KvNode,
        transform: Transform,
    ) {
        let Some(name) = node.get_string("var") else {
            self.diagnostics.warn(
                "MH_VAR_NAME_MISSING",
                format!("{} is missing \"var\".", node.name),
            );
            return;
        };
        if !self.vars.contains(name) {
            self.diagnostics.warn(
                "MH_VAR_MISSING",
                format!("{}: variable \"{}\" does not exist.", node.name, name),
            );
            return;
        }
        let Some(entity) = self.resolve_entity(host, node, true) else {
            self.report_missing_target(node);
            return;
        };
        let value = match transform {
            Transform::Position => host.origin(entity),
            Transform::Angles => host.angles(entity),
        }
        .unwrap_or_default();
        if let Some(variable) = self.vars.get_mut(name) {
            variable.set_text(format_vec3(&value));
        }
    }

    /// Sets origin or angles from `value` (`"x y z"` or a `%var` holding
    /// one). Without `value` the current transform is kept.
    pub(super) fn fn_set_transform(
        &mut self,
        host: &mut dyn GameHost,
        node: &KvNode,
        transform: Transform,
    ) {
        let Some(entity) = self.resolve_entity(host, node, true) else {
            self.report_missing_target(node);
            return;
        };
        let current = match transform {
            Transform::Position => host.origin(entity),
            Transform::Angles => host.angles(entity),
        }
        .unwrap_or_default();

        let value = match node.get_string("value") {
            Some(raw) => {
                let text = self.vars.substitute(raw, &mut self.diagnostics);
                match scan_vec3(&text) {
                    Some(value) => value,
                    None => {
                        self.diagnostics.warn(
                            "MH_VECTOR_INVALID",
                            format!("{}: \"{}\" is not an \"x y z\" vector.", node.name, text),
                        );
                        return;
                    }
                }
            }
            None => current,
        };

        match transform {
            Transform::Position => host.set_origin(entity, value),
            Transform::Angles => host.set_angles(entity, value),
        }
        debug!(entity = host.debug_name(entity).as_str(), ?transform, value = format_vec3(&value).as_str(), "moved entity");
    }

    pub(super) fn fn_play_sound(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let name = self
            .vars
            .substitute(node.get_string_or("name", ""), &mut self.diagnostics);
        if !host.sound_exists(&name) {
            self.diagnostics.warn(
                "MH_SOUND_MISSING",
                format!("Sound \"{}\" does not exist.", name),
            );
            return;
        }

        let Some(raw) = node.get_string("source") else {
            host.emit_sound(&name, None);
            return;
        };
        let source = self.vars.substitute(raw, &mut self.diagnostics);
        match self.entity_by_target_name(host, &source) {
            Some(entity) => host.emit_sound(&name, Some(entity)),
            None => self.diagnostics.warn(
                "MH_ENTITY_NOT_FOUND",
                format!("$playsound: no entity named \"{}\".", source),
            ),
        }
    }
}
