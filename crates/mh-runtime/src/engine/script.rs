use std::cell::RefCell;
use std::rc::Rc;

use mh_core::TypedValue;
use mh_parser::KvNode;
use rhai::{Dynamic, Engine, ImmutableString, Scope, FLOAT, INT};
use tracing::debug;

use super::MapHackEngine;
use crate::host::GameHost;

const MAX_SCRIPT_OPERATIONS: u64 = 100_000;

pub(super) fn typed_to_dynamic(value: &TypedValue) -> Dynamic {
    match value {
        TypedValue::None => Dynamic::UNIT,
        TypedValue::Int(value) => Dynamic::from_int(*value as INT),
        TypedValue::Float(value) => Dynamic::from_float(*value as FLOAT),
        TypedValue::String(value) => Dynamic::from(value.clone()),
        TypedValue::Color(color) => Dynamic::from(color.to_string()),
    }
}

/// Literal form of a script value, for re-parsing into a variable's kind.
pub(super) fn dynamic_to_literal(value: &Dynamic) -> Option<String> {
    if value.is::<bool>() {
        return Some(if value.clone().cast::<bool>() { "1" } else { "0" }.to_string());
    }
    if value.is::<INT>() {
        return Some(value.clone().cast::<INT>().to_string());
    }
    if value.is::<FLOAT>() {
        return Some(value.clone().cast::<FLOAT>().to_string());
    }
    if value.is::<ImmutableString>() {
        return Some(value.clone().cast::<ImmutableString>().to_string());
    }
    None
}

fn is_script_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

impl MapHackEngine {
    /// `$script`: runs `run` (inline) or the contents of `file` with every
    /// variable bound by name. Variables the script changes are written back
    /// through their declared kind; `print` goes to the console.
    pub(super) fn fn_script(&mut self, host: &mut dyn GameHost, node: &KvNode) {
        let (source, origin) = if let Some(file) = node.get_string("file") {
            let file = self.vars.substitute(file, &mut self.diagnostics);
            match self.script_source.load(&file) {
                Ok(source) => (source, file),
                Err(error) => {
                    self.diagnostics.push(error);
                    return;
                }
            }
        } else if let Some(run) = node.get_string("run") {
            (run.to_string(), "<inline>".to_string())
        } else {
            self.diagnostics
                .warn("MH_SCRIPT_NO_SOURCE", "$script needs \"run\" or \"file\".");
            return;
        };

        let mut scope = Scope::new();
        let mut bound = Vec::new();
        for variable in self.vars.iter() {
            if !is_script_identifier(variable.name()) {
                continue;
            }
            let value = typed_to_dynamic(variable.value());
            bound.push((variable.name().to_string(), dynamic_to_literal(&value)));
            scope.push_dynamic(variable.name().to_string(), value);
        }

        let printed = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = Rc::clone(&printed);
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_operations(MAX_SCRIPT_OPERATIONS);
        engine.on_print(move |text| sink.borrow_mut().push(text.to_string()));

        let result = engine.run_with_scope(&mut scope, &source);
        for line in printed.borrow().iter() {
            host.message(&format!("{}\n", line));
        }
        if let Err(error) = result {
            self.diagnostics.warn(
                "MH_SCRIPT_FAILED",
                format!("Script {} failed: {}", origin, error),
            );
            return;
        }

        for (name, before) in bound {
            let Some(value) = scope.get_value::<Dynamic>(&name) else {
                continue;
            };
            let after = dynamic_to_literal(&value);
            if after.is_none() || after == before {
                continue;
            }
            if let Some(literal) = after {
                self.vars.set_from_literal(&name, &literal);
                debug!(name = name.as_str(), value = literal.as_str(), "script updated variable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_core::Color;

    #[test]
    fn typed_values_round_trip_through_literals() {
        assert_eq!(
            dynamic_to_literal(&typed_to_dynamic(&TypedValue::Int(42))).as_deref(),
            Some("42")
        );
        assert_eq!(
            dynamic_to_literal(&typed_to_dynamic(&TypedValue::String("hi".to_string()))).as_deref(),
            Some("hi")
        );
        assert_eq!(
            dynamic_to_literal(&typed_to_dynamic(&TypedValue::Color(Color::new(1, 2, 3)))).as_deref(),
            Some("1 2 3")
        );
        assert_eq!(dynamic_to_literal(&typed_to_dynamic(&TypedValue::None)), None);
        assert_eq!(dynamic_to_literal(&Dynamic::from_bool(true)).as_deref(), Some("1"));
    }

    #[test]
    fn only_plain_names_are_bound() {
        assert!(is_script_identifier("health"));
        assert!(is_script_identifier("_tmp2"));
        assert!(!is_script_identifier("2fast"));
        assert!(!is_script_identifier("door-open"));
        assert!(!is_script_identifier(""));
    }
}
