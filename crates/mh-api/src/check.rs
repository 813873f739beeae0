use std::collections::BTreeSet;
use std::sync::OnceLock;

use mh_core::{MapHackError, ValueKind};
use mh_parser::{parse_kv_document, KvNode};
use mh_runtime::events::parse_label;
use mh_runtime::{is_keyword, FunctionKind, MAPHACK_ROOT_NAME};
use regex::Regex;
use serde::{Deserialize, Serialize};

const EVENT_TYPES: [&str; 4] = [
    "EVENT_TRIGGER",
    "EVENT_TIMED",
    "EVENT_OUTPUT",
    "EVENT_GAMEEVENT",
];

/// Findings for one script. Errors stop the script from loading or running
/// as written; warnings may be satisfied by an include.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCheck {
    pub errors: Vec<MapHackError>,
    pub warnings: Vec<MapHackError>,
}

impl ScriptCheck {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

fn variable_reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)").expect("variable reference regex must compile")
    })
}

struct Checker {
    variables: BTreeSet<String>,
    events: BTreeSet<String>,
    result: ScriptCheck,
}

/// Statically checks a directive document without running it.
pub fn check_script(source: &str) -> ScriptCheck {
    let document = match parse_kv_document(source) {
        Ok(document) => document,
        Err(error) => {
            return ScriptCheck {
                errors: vec![error],
                warnings: Vec::new(),
            }
        }
    };

    let mut checker = Checker {
        variables: BTreeSet::new(),
        events: BTreeSet::new(),
        result: ScriptCheck::default(),
    };
    if !document.name.eq_ignore_ascii_case(MAPHACK_ROOT_NAME) {
        checker.error(
            "MH_LOAD_BAD_ROOT",
            format!(
                "Root block is \"{}\", expected \"{}\".",
                document.name, MAPHACK_ROOT_NAME
            ),
        );
        return checker.result;
    }

    checker.collect_declarations(&document);
    for block in document.true_subkeys() {
        checker.walk(block);
    }
    checker.result
}

impl Checker {
    fn error(&mut self, code: &str, message: String) {
        self.result.errors.push(MapHackError::new(code, message));
    }

    fn warning(&mut self, code: &str, message: String) {
        self.result.warnings.push(MapHackError::new(code, message));
    }

    fn collect_declarations(&mut self, document: &KvNode) {
        if let Some(vars) = document.find_block("vars") {
            for declaration in vars.true_subkeys() {
                let type_name = declaration.get_string_or("type", "int");
                if ValueKind::from_identifier(type_name) == ValueKind::None {
                    self.error(
                        "MH_VAR_TYPE_UNKNOWN",
                        format!(
                            "Variable \"{}\" has unknown type \"{}\".",
                            declaration.name, type_name
                        ),
                    );
                    continue;
                }
                self.variables.insert(declaration.name.to_ascii_lowercase());
            }
        }

        if let Some(events) = document.find_block("events") {
            for declaration in events.true_subkeys() {
                if is_keyword(&declaration.name) {
                    self.error(
                        "MH_EVENT_KEYWORD",
                        format!("\"{}\" is reserved and cannot name an event.", declaration.name),
                    );
                    continue;
                }
                let type_name = declaration.get_string_or("type", "EVENT_TRIGGER");
                if !EVENT_TYPES
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(type_name))
                {
                    self.warning(
                        "MH_EVENT_TYPE_UNKNOWN",
                        format!(
                            "Event \"{}\" has unknown type \"{}\".",
                            declaration.name, type_name
                        ),
                    );
                }
                self.events.insert(declaration.name.to_ascii_lowercase());
            }
        }

        for block in document.true_subkeys() {
            if is_keyword(&block.name) || block.name.starts_with('$') {
                continue;
            }
            let (name, _) = parse_label(&block.name);
            self.events.insert(name.to_ascii_lowercase());
        }
    }

    fn walk(&mut self, node: &KvNode) {
        if node.name.starts_with('$') {
            match FunctionKind::from_name(&node.name) {
                Some(FunctionKind::Trigger | FunctionKind::Start | FunctionKind::Stop) => {
                    self.check_event_reference(node);
                }
                Some(_) => {}
                None => self.error(
                    "MH_FUNCTION_UNKNOWN",
                    format!("Unknown function \"{}\".", node.name),
                ),
            }
        }

        for child in node.children() {
            match child.as_text() {
                Some(text) => self.check_variable_references(text),
                None => self.walk(child),
            }
        }
    }

    fn check_variable_references(&mut self, text: &str) {
        let missing: Vec<String> = variable_reference_regex()
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .map(|name| name.as_str().to_string())
            .filter(|name| !self.variables.contains(&name.to_ascii_lowercase()))
            .collect();
        for name in missing {
            self.warning(
                "MH_VAR_UNDECLARED",
                format!("Variable \"{}\" is not declared in this script.", name),
            );
        }
    }

    fn check_event_reference(&mut self, node: &KvNode) {
        let Some(event) = node.get_string("event") else {
            self.error(
                "MH_EVENT_NAME_MISSING",
                format!("{} is missing \"event\".", node.name),
            );
            return;
        };
        if event.starts_with('%') || self.events.contains(&event.to_ascii_lowercase()) {
            return;
        }
        self.warning(
            "MH_EVENT_UNDECLARED",
            format!("{} refers to undeclared event \"{}\".", node.name, event),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(entries: &[MapHackError]) -> Vec<&str> {
        entries.iter().map(|entry| entry.code.as_str()).collect()
    }

    #[test]
    fn clean_script_has_no_findings() {
        let check = check_script(
            r#"maphack
{
    "vars" { "hp" { "type" "int" "value" "5" } }
    "events" { "tick" { "type" "EVENT_TIMED" } }
    "tick" { "$if" { "cond" "%hp > 1" "entities" { "$decrement" { "var" "hp" } } } }
    "entities" { "$trigger" { "event" "tick" } }
}"#,
        );
        assert!(check.is_clean(), "{:?}", check);
    }

    #[test]
    fn reports_unknown_functions_and_undeclared_names() {
        let check = check_script(
            r#"maphack
{
    "vars" { "bad" { "type" "vector" } }
    "events" { "odd" { "type" "EVENT_WHATEVER" } }
    "entities"
    {
        "$teleport" { }
        "$console" { "msg" "%missing" }
        "$start" { "event" "nowhere" }
        "$stop" { }
    }
}"#,
        );
        assert_eq!(
            codes(&check.errors),
            vec!["MH_VAR_TYPE_UNKNOWN", "MH_FUNCTION_UNKNOWN", "MH_EVENT_NAME_MISSING"]
        );
        assert_eq!(
            codes(&check.warnings),
            vec!["MH_EVENT_TYPE_UNKNOWN", "MH_VAR_UNDECLARED", "MH_EVENT_UNDECLARED"]
        );
    }

    #[test]
    fn parse_failures_and_wrong_roots_are_errors() {
        let check = check_script("maphack {");
        assert_eq!(codes(&check.errors), vec!["KV_PARSE_ERROR"]);

        let check = check_script("other { }");
        assert_eq!(codes(&check.errors), vec!["MH_LOAD_BAD_ROOT"]);
    }
}
