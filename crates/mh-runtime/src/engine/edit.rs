use mh_core::EntityHandle;
use mh_parser::KvNode;
use tracing::debug;

use super::lifecycle::Phase;
use super::lookup::is_protected_entity;
use super::MapHackEngine;
use crate::diagnostics::Diagnostics;
use crate::entdata::EntityRecord;
use crate::host::{FieldDesc, FieldKind, FieldValue, GameHost};
use crate::matcher::{has_matches, LiveEntity};
use crate::vars::VariableStore;

/// Writes a block's key/values into a staged record.
///
/// Consecutive repeats of a key address successive instances, so two
/// `"OnTrigger"` lines in a row overwrite the first and second connection.
pub(super) fn edit_record(
    record: &mut EntityRecord,
    node: &KvNode,
    vars: &VariableStore,
    diagnostics: &mut Diagnostics,
) {
    let mut previous: Option<&str> = None;
    let mut instance = 0usize;
    for child in node.children() {
        let Some(raw) = child.as_text() else {
            if child.name.eq_ignore_ascii_case("connections") {
                edit_record(record, child, vars, diagnostics);
            }
            continue;
        };
        instance = match previous {
            Some(key) if key.eq_ignore_ascii_case(&child.name) => instance + 1,
            _ => 0,
        };
        previous = Some(child.name.as_str());
        let value = vars.substitute(raw, diagnostics);
        record.set_key_value(&child.name, &value, instance);
    }
}

fn find_field<'a>(table: &'a [FieldDesc], name: &str) -> Option<&'a FieldDesc> {
    table.iter().find_map(|field| {
        if field.name.eq_ignore_ascii_case(name) {
            Some(field)
        } else {
            find_field(&field.nested, name)
        }
    })
}

fn collect_outputs(table: &[FieldDesc], out: &mut Vec<String>) {
    for field in table {
        if field.kind == FieldKind::Output {
            out.push(field.name.clone());
        }
        collect_outputs(&field.nested, out);
    }
}

fn scan_matrix(text: &str, count: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; count];
    mh_core::scan_floats(text, &mut values);
    values
}

/// Converts `text` for a reflected field of `kind`; `None` for kinds that
/// cannot be assigned from text.
pub(super) fn field_value(kind: FieldKind, text: &str) -> Option<FieldValue> {
    let value = match kind {
        FieldKind::String | FieldKind::ModelName | FieldKind::SoundName => {
            FieldValue::String(text.to_string())
        }
        FieldKind::Time | FieldKind::Float => FieldValue::Float(mh_core::parse_float_lenient(text)),
        FieldKind::Boolean => FieldValue::Boolean(mh_core::parse_int_lenient(text) != 0),
        FieldKind::Character => FieldValue::Character(mh_core::parse_int_lenient(text) as i8),
        FieldKind::Short => FieldValue::Short(mh_core::parse_int_lenient(text) as i16),
        FieldKind::Integer | FieldKind::Tick => FieldValue::Integer(mh_core::parse_int_lenient(text)),
        FieldKind::Vector | FieldKind::PositionVector => {
            let mut vector = [0.0f32; 3];
            mh_core::scan_floats(text, &mut vector);
            FieldValue::Vector(vector)
        }
        FieldKind::VMatrix | FieldKind::VMatrixWorldSpace => FieldValue::Matrix(scan_matrix(text, 16)),
        FieldKind::Matrix3x4WorldSpace => FieldValue::Matrix(scan_matrix(text, 12)),
        FieldKind::Color32 => {
            let mut color = [0u8; 4];
            for (slot, part) in color.iter_mut().zip(text.split_whitespace()) {
                *slot = mh_core::parse_int_lenient(part) as u8;
            }
            FieldValue::Color32(color)
        }
        FieldKind::Interval
        | FieldKind::ClassPtr
        | FieldKind::ModelIndex
        | FieldKind::MaterialIndex
        | FieldKind::Edict
        | FieldKind::Custom
        | FieldKind::Output => return None,
    };
    Some(value)
}

impl MapHackEngine {
    fn edit_staged_record(&mut self, index: usize, node: &KvNode) {
        if let Some(record) = self.records.get_mut(index) {
            edit_record(record, node, &self.vars, &mut self.diagnostics);
        }
    }

    pub(super) fn fn_edit(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(keyvalues) = node.find_block("keyvalues") else {
            self.diagnostics
                .warn("MH_EDIT_NO_KEYVALUES", "$edit is missing its \"keyvalues\" block.");
            return;
        };

        if self.phase == Phase::Pre {
            match self.record_index(node) {
                Some(index) => self.edit_staged_record(index, keyvalues),
                None => self.diagnostics.warn(
                    "MH_RECORD_NOT_FOUND",
                    "$edit: no entity record matches its targetname or id.",
                ),
            }
            return;
        }

        match self.resolve_entity(host, node, true) {
            Some(entity) => self.apply_key_values(host, entity, keyvalues),
            None => self.diagnostics.warn(
                "MH_ENTITY_NOT_FOUND",
                "$edit: no entity matches its targetname or id.",
            ),
        }
    }

    pub(super) fn fn_edit_all(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(raw) = node.get_string("classname") else {
            self.diagnostics
                .warn("MH_EDIT_ALL_NO_CLASS", "$edit_all is missing \"classname\".");
            return;
        };
        let class_name = self.vars.substitute(raw, &mut self.diagnostics);
        let Some(keyvalues) = node.find_block("keyvalues") else {
            self.diagnostics.warn(
                "MH_EDIT_NO_KEYVALUES",
                "$edit_all is missing its \"keyvalues\" block.",
            );
            return;
        };

        if self.phase == Phase::Pre {
            for index in 0..self.records.len() {
                let matches = self.records[index]
                    .class_name()
                    .is_some_and(|class| class.eq_ignore_ascii_case(&class_name));
                if matches {
                    self.edit_staged_record(index, keyvalues);
                }
            }
            return;
        }

        for entity in host.entities() {
            let matches = host
                .class_name(entity)
                .is_some_and(|class| class.eq_ignore_ascii_case(&class_name));
            if matches {
                self.apply_key_values(host, entity, keyvalues);
            }
        }
    }

    /// `match` selects the targets; then `replace`, `delete`, `insert` and
    /// `keyvalues` are applied in that order.
    pub(super) fn fn_modify(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(match_node) = node.find_block("match") else {
            self.diagnostics
                .warn("MH_MODIFY_NO_MATCH", "$modify is missing its \"match\" block.");
            return;
        };

        if self.phase == Phase::Pre {
            for index in 0..self.records.len() {
                if has_matches(match_node, &self.records[index], &self.vars, &mut self.diagnostics) {
                    self.modify_record(index, node);
                }
            }
            return;
        }

        for entity in host.entities() {
            if !host.is_alive(entity) {
                continue;
            }
            let live = LiveEntity {
                world: &*host,
                entity,
            };
            if has_matches(match_node, &live, &self.vars, &mut self.diagnostics) {
                self.modify_entity(host, entity, node);
            }
        }
    }

    fn modify_record(&mut self, index: usize, node: &KvNode) {
        let Some(record) = self.records.get_mut(index) else {
            return;
        };
        let vars = &self.vars;
        let diagnostics = &mut self.diagnostics;

        if let Some(replace) = node.find_block("replace") {
            for entry in replace.values() {
                let value = vars.substitute(entry.as_text().unwrap_or_default(), diagnostics);
                record.set_key_value(&entry.name, &value, 0);
            }
        }
        if let Some(delete) = node.find_block("delete") {
            for entry in delete.values() {
                let value = vars.substitute(entry.as_text().unwrap_or_default(), diagnostics);
                let present = record
                    .get_key_value(&entry.name)
                    .is_some_and(|current| current.eq_ignore_ascii_case(&value));
                if present {
                    record.remove_value(&entry.name);
                }
            }
        }
        if let Some(insert) = node.find_block("insert") {
            for entry in insert.values() {
                let value = vars.substitute(entry.as_text().unwrap_or_default(), diagnostics);
                record.insert_value(&entry.name, &value);
            }
        }
        if let Some(keyvalues) = node.find_block("keyvalues") {
            edit_record(record, keyvalues, vars, diagnostics);
        }
        debug!(class = record.class_name().unwrap_or_default(), "modified entity record");
    }

    fn modify_entity(&mut self, host: &mut dyn GameHost, entity: EntityHandle, node: &KvNode) {
        if let Some(replace) = node.find_block("replace") {
            for entry in replace.values() {
                let value = self
                    .vars
                    .substitute(entry.as_text().unwrap_or_default(), &mut self.diagnostics);
                host.apply_key_value(entity, &entry.name, &value);
            }
        }
        if let Some(delete) = node.find_block("delete") {
            for entry in delete.values() {
                let value = self
                    .vars
                    .substitute(entry.as_text().unwrap_or_default(), &mut self.diagnostics);
                let present = host
                    .get_key_value(entity, &entry.name)
                    .is_some_and(|current| current.eq_ignore_ascii_case(&value));
                if present {
                    host.apply_key_value(entity, &entry.name, "");
                }
            }
        }
        if let Some(insert) = node.find_block("insert") {
            for entry in insert.values() {
                let value = self
                    .vars
                    .substitute(entry.as_text().unwrap_or_default(), &mut self.diagnostics);
                host.apply_key_value(entity, &entry.name, &value);
            }
        }
        if let Some(keyvalues) = node.find_block("keyvalues") {
            self.apply_key_values(host, entity, keyvalues);
        }
        debug!(entity = host.debug_name(entity).as_str(), "modified entity");
    }

    /// The node itself is the match set: matching records are dropped, or
    /// matching unprotected entities destroyed.
    pub(super) fn fn_filter(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        if self.phase == Phase::Pre {
            let before = self.records.len();
            let vars = &self.vars;
            let diagnostics = &mut self.diagnostics;
            self.records
                .retain(|record| !has_matches(node, record, vars, diagnostics));
            debug!(removed = before - self.records.len(), "filtered entity records");
            return;
        }

        for entity in host.entities() {
            if !host.is_alive(entity) || is_protected_entity(&*host, entity) {
                continue;
            }
            let live = LiveEntity {
                world: &*host,
                entity,
            };
            if has_matches(node, &live, &self.vars, &mut self.diagnostics) {
                debug!(entity = host.debug_name(entity).as_str(), "filtered entity");
                host.destroy(entity);
            }
        }
    }

    pub(super) fn fn_remove_connections(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(entity) = self.resolve_entity(host, node, true) else {
            self.diagnostics.warn(
                "MH_ENTITY_NOT_FOUND",
                "$remove_connections: no entity matches its targetname or id.",
            );
            return;
        };
        let mut outputs = Vec::new();
        collect_outputs(&host.field_table(entity), &mut outputs);
        for output in outputs {
            if host.clear_output(entity, &output) {
                debug!(entity = host.debug_name(entity).as_str(), output = output.as_str(), "cleared output");
            }
        }
    }

    /// Writes `value` into a reflected field found by `fieldname`.
    pub(super) fn fn_edit_field(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(entity) = self.resolve_entity(host, node, true) else {
            self.diagnostics.warn(
                "MH_ENTITY_NOT_FOUND",
                "$edit_field: no entity matches its targetname or id.",
            );
            return;
        };
        let key_name = node
            .get_string("keyname")
            .map(|raw| self.vars.substitute(raw, &mut self.diagnostics));
        let field_name = node
            .get_string("fieldname")
            .map(|raw| self.vars.substitute(raw, &mut self.diagnostics));
        let value = self
            .vars
            .substitute(node.get_string_or("value", ""), &mut self.diagnostics);

        let table = host.field_table(entity);
        let Some(field) = field_name
            .as_deref()
            .and_then(|name| find_field(&table, name))
        else {
            if let Some(key_name) = &key_name {
                self.diagnostics.warn(
                    "MH_FIELD_NOT_FOUND",
                    format!("$edit_field: no field for key \"{}\".", key_name),
                );
            }
            if let Some(field_name) = &field_name {
                self.diagnostics.warn(
                    "MH_FIELD_NOT_FOUND",
                    format!("$edit_field: no field named \"{}\".", field_name),
                );
            }
            if key_name.is_none() && field_name.is_none() {
                self.diagnostics.warn(
                    "MH_FIELD_NOT_FOUND",
                    "$edit_field needs \"fieldname\".",
                );
            }
            return;
        };

        let Some(converted) = field_value(field.kind, &value) else {
            self.diagnostics.warn(
                "MH_FIELD_UNSUPPORTED",
                format!("Field \"{}\" of kind {:?} cannot be assigned.", field.name, field.kind),
            );
            return;
        };
        if host.write_field(entity, &field.name, converted) {
            debug!(
                entity = host.debug_name(entity).as_str(),
                field = field.name.as_str(),
                value = value.as_str(),
                "changed field"
            );
        }
    }
}
