use std::collections::BTreeMap;

use mh_core::{Color, TypedValue, ValueKind};
use rand::Rng;

use crate::diagnostics::Diagnostics;

pub const MAX_VARIABLE_NAME_LEN: usize = 127;

/// A named script variable.
///
/// `text` is what substitution yields. It normally mirrors `value`, but
/// position reads overwrite only the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    value: TypedValue,
    text: String,
}

impl Variable {
    pub fn new(name: &str, value: TypedValue) -> Self {
        Self {
            name: name.chars().take(MAX_VARIABLE_NAME_LEN).collect(),
            text: value.render(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_value(&mut self, value: TypedValue) {
        self.text = value.render();
        self.value = value;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Parses `literal` according to the declared kind. A color literal that
    /// does not scan leaves the variable unchanged.
    pub fn assign_literal(&mut self, literal: &str) {
        match TypedValue::parse_as(self.kind(), literal) {
            Some(TypedValue::None) => self.set_text(literal),
            Some(value) => self.set_value(value),
            None => {}
        }
    }
}

/// Variables keyed by case-folded name.
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    vars: BTreeMap<String, Variable>,
}

fn key_of(name: &str) -> String {
    name.chars()
        .take(MAX_VARIABLE_NAME_LEN)
        .collect::<String>()
        .to_ascii_lowercase()
}

impl VariableStore {
    /// Declares (or redeclares) a variable from its literal form.
    pub fn register(&mut self, name: &str, kind: ValueKind, literal: &str) -> &Variable {
        let value = TypedValue::parse_as(kind, literal).unwrap_or_else(|| TypedValue::default_for(kind));
        self.insert(Variable::new(name, value))
    }

    pub fn insert(&mut self, variable: Variable) -> &Variable {
        let key = key_of(variable.name());
        self.vars.insert(key.clone(), variable);
        &self.vars[&key]
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(&key_of(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.vars.get_mut(&key_of(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(&key_of(name))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    /// Returns `false` when the variable does not exist.
    pub fn set_from_literal(&mut self, name: &str, literal: &str) -> bool {
        match self.get_mut(name) {
            Some(variable) => {
                variable.assign_literal(literal);
                true
            }
            None => false,
        }
    }

    pub fn increment(&mut self, name: &str) -> bool {
        self.step(name, 1)
    }

    pub fn decrement(&mut self, name: &str) -> bool {
        self.step(name, -1)
    }

    fn step(&mut self, name: &str, delta: i32) -> bool {
        let Some(variable) = self.get_mut(name) else {
            return false;
        };
        match *variable.value() {
            TypedValue::Int(value) => variable.set_value(TypedValue::Int(value.wrapping_add(delta))),
            TypedValue::Float(value) => variable.set_value(TypedValue::Float(value + delta as f32)),
            _ => {}
        }
        true
    }

    /// Draws a new value for numeric and color variables; other kinds are
    /// left alone. A reversed range is swapped.
    pub fn randomize<R: Rng>(&mut self, name: &str, min: &str, max: &str, rng: &mut R) -> bool {
        let Some(variable) = self.get_mut(name) else {
            return false;
        };
        match variable.kind() {
            ValueKind::Int => {
                let (low, high) = ordered(mh_core::parse_int_lenient(min), mh_core::parse_int_lenient(max));
                variable.set_value(TypedValue::Int(rng.gen_range(low..=high)));
            }
            ValueKind::Float => {
                let (low, high) = ordered(
                    mh_core::parse_float_lenient(min),
                    mh_core::parse_float_lenient(max),
                );
                variable.set_value(TypedValue::Float(low + rng.gen::<f32>() * (high - low)));
            }
            ValueKind::Color => {
                let color = Color::new(rng.gen(), rng.gen(), rng.gen());
                variable.set_value(TypedValue::Color(color));
            }
            ValueKind::String | ValueKind::None => {}
        }
        true
    }

    /// Resolves a `%name` reference to the variable's text, also reporting the
    /// variable's kind. Anything else is returned as-is with no kind.
    pub fn substitute_typed(
        &self,
        literal: &str,
        diagnostics: &mut Diagnostics,
    ) -> (String, Option<ValueKind>) {
        let Some(name) = literal.strip_prefix('%') else {
            return (literal.to_string(), None);
        };
        match self.get(name) {
            Some(variable) => (variable.text().to_string(), Some(variable.kind())),
            None => {
                diagnostics.warn(
                    "MH_VAR_MISSING",
                    format!("Variable \"{}\" does not exist.", name),
                );
                (literal.to_string(), None)
            }
        }
    }

    pub fn substitute(&self, literal: &str, diagnostics: &mut Diagnostics) -> String {
        self.substitute_typed(literal, diagnostics).0
    }

    /// One `name = value` line per variable followed by the total.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for variable in self.vars.values() {
            if variable.kind() == ValueKind::None {
                continue;
            }
            out.push_str(&format!("{} = {}\n", variable.name(), variable.value().render()));
        }
        out.push_str(&format!("\nTotal vars: {}\n", self.vars.len()));
        out
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}
