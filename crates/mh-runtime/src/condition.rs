use mh_core::{TypedValue, ValueKind};

use crate::diagnostics::Diagnostics;
use crate::vars::VariableStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

/// Search order matters: two-character operators come before their prefixes.
const OPERATORS: [(&str, CompareOp); 6] = [
    ("==", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    (">=", CompareOp::Ge),
    (">", CompareOp::Gt),
    ("<=", CompareOp::Le),
    ("<", CompareOp::Lt),
];

impl CompareOp {
    fn apply<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Le => left <= right,
            Self::Lt => left < right,
        }
    }
}

fn operand(raw: &str, vars: &VariableStore) -> TypedValue {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('%').unwrap_or(trimmed).trim();
    match ValueKind::sniff(trimmed) {
        ValueKind::Int => TypedValue::Int(mh_core::parse_int_lenient(trimmed)),
        ValueKind::Float => TypedValue::Float(mh_core::parse_float_lenient(trimmed)),
        _ => match vars.get(trimmed) {
            Some(variable) => variable.value().clone(),
            None => TypedValue::String(trimmed.to_string()),
        },
    }
}

/// Evaluates a single binary comparison such as `"%health >= 50"`.
///
/// Operands only compare when they share a kind; strings support `==` and
/// `!=` only and compare case-insensitively. Anything else is `false`.
pub fn evaluate_condition(condition: &str, vars: &VariableStore, diagnostics: &mut Diagnostics) -> bool {
    let Some((symbol, op)) = OPERATORS
        .iter()
        .find(|(symbol, _)| condition.contains(symbol))
        .copied()
    else {
        diagnostics.warn(
            "MH_COND_NO_OPERATOR",
            format!("Condition \"{}\" has no comparison operator.", condition),
        );
        return false;
    };

    let mut parts = condition.split(symbol);
    let left = operand(parts.next().unwrap_or_default(), vars);
    let right = operand(parts.next().unwrap_or_default(), vars);

    match (left, right) {
        (TypedValue::Int(left), TypedValue::Int(right)) => op.apply(left, right),
        (TypedValue::Float(left), TypedValue::Float(right)) => op.apply(left, right),
        (TypedValue::String(left), TypedValue::String(right)) => match op {
            CompareOp::Eq => left.eq_ignore_ascii_case(&right),
            CompareOp::Ne => !left.eq_ignore_ascii_case(&right),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(condition: &str, vars: &VariableStore) -> bool {
        evaluate_condition(condition, vars, &mut Diagnostics::default())
    }

    #[test]
    fn type_matrix() {
        let vars = VariableStore::default();
        assert!(eval("5 > 3", &vars));
        assert!(eval("5.0 > 3.0", &vars));
        assert!(eval("abc != def", &vars));
        assert!(!eval("5 > abc", &vars));
        assert!(!eval("5 > 3.0", &vars));
        assert!(!eval("abc < def", &vars));
    }

    #[test]
    fn two_character_operators_match_first() {
        let vars = VariableStore::default();
        assert!(eval("3 >= 3", &vars));
        assert!(eval("3 <= 3", &vars));
        assert!(!eval("3 < 3", &vars));
        assert!(eval("7 == 7", &vars));
        assert!(eval("7 != 8", &vars));
    }

    #[test]
    fn non_ascii_operands_compare_as_strings() {
        let mut vars = VariableStore::default();
        vars.register("zone", ValueKind::String, "café");
        assert!(eval("café == café", &vars));
        assert!(eval("%zone != thé", &vars));
        assert!(eval("%zone == café", &vars));
        assert!(!eval("éé > 1", &vars));
        assert!(!eval("1é == 1", &vars));
    }

    #[test]
    fn variables_stand_in_for_named_operands() {
        let mut vars = VariableStore::default();
        vars.register("health", ValueKind::Int, "75");
        vars.register("team", ValueKind::String, "Red");
        assert!(eval("%health > 50", &vars));
        assert!(eval("health <= 75", &vars));
        assert!(eval("%team == red", &vars));
        assert!(!eval("%team == 1", &vars));
    }

    #[test]
    fn missing_operator_is_reported() {
        let vars = VariableStore::default();
        let mut diagnostics = Diagnostics::default();
        assert!(!evaluate_condition("just words", &vars, &mut diagnostics));
        assert!(diagnostics.has_code("MH_COND_NO_OPERATOR"));
    }
}
