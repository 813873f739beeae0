use mh_parser::KvNode;
use tracing::debug;

use super::MapHackEngine;
use crate::condition::evaluate_condition;
use crate::host::GameHost;

impl MapHackEngine {
    /// Name of the variable a directive operates on, reporting a missing
    /// `var` key or an undeclared variable.
    fn target_variable<'a>(&mut self, node: &'a KvNode) -> Option<&'a str> {
        let Some(name) = node.get_string("var") else {
            self.diagnostics.warn(
                "MH_VAR_NAME_MISSING",
                format!("{} is missing \"var\".", node.name),
            );
            return None;
        };
        if !self.vars.contains(name) {
            self.diagnostics.warn(
                "MH_VAR_MISSING",
                format!("{}: variable \"{}\" does not exist.", node.name, name),
            );
            return None;
        }
        Some(name)
    }

    pub(super) fn fn_if(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let Some(condition) = node.get_string("cond") else {
            self.diagnostics
                .warn("MH_IF_NO_CONDITION", "$if is missing \"cond\".");
            return;
        };
        let Some(entities) = node.find_block("entities") else {
            self.diagnostics
                .warn("MH_IF_NO_ENTITIES", "$if is missing its \"entities\" block.");
            return;
        };
        if evaluate_condition(condition, &self.vars, &mut self.diagnostics) {
            debug!(condition, "condition passed");
            self.run_entities(host, entities);
        }
    }

    pub(super) fn fn_set(&mut self, node: &KvNode) {
        let Some(raw) = node.get_string("value") else {
            self.diagnostics
                .warn("MH_SET_NO_VALUE", "$set is missing \"value\".");
            return;
        };
        let Some(name) = self.target_variable(node) else {
            return;
        };
        let value = self.vars.substitute(raw, &mut self.diagnostics);
        self.vars.set_from_literal(name, &value);
        debug!(name, value = value.as_str(), "set variable");
    }

    pub(super) fn fn_step(&mut self, node: &KvNode, increment: bool) {
        let Some(name) = self.target_variable(node) else {
            return;
        };
        if increment {
            self.vars.increment(name);
        } else {
            self.vars.decrement(name);
        }
    }

    pub(super) fn fn_rand(&mut self, node: &KvNode) {
        let Some(name) = self.target_variable(node) else {
            return;
        };
        let min = self
            .vars
            .substitute(node.get_string_or("rand_min", "0"), &mut self.diagnostics);
        let max = self
            .vars
            .substitute(node.get_string_or("rand_max", "1"), &mut self.diagnostics);
        self.vars.randomize(name, &min, &max, &mut self.rng);
    }
}
