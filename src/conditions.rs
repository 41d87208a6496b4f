//! Named boolean conditions gating resources and outputs
//!
//! Conditions are registered by name before anything references them:
//! composites may only name already-registered conditions, which makes the
//! registry a DAG by construction. Evaluation is lazy, deterministic, and
//! side-effect free; composites short-circuit in operand order.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::variables::{ResolvedVariables, Value};

/// Errors raised while defining or evaluating conditions
#[derive(Debug, Error)]
pub enum ConditionError {
    /// A composite operand or an evaluation request named an unregistered
    /// condition
    #[error("undefined condition: {name}")]
    UndefinedCondition { name: String },

    /// A condition name was registered twice
    #[error("duplicate condition: {name}")]
    DuplicateCondition { name: String },

    /// A predicate read a variable that is missing or not a scalar
    #[error("condition '{condition}' references variable '{variable}' which is missing or not a scalar")]
    UnknownVariable { condition: String, variable: String },

    /// A composite declaration is malformed
    #[error("invalid composite condition '{name}': {reason}")]
    InvalidComposite { name: String, reason: String },
}

impl ConditionError {
    pub fn undefined(name: impl Into<String>) -> Self {
        Self::UndefinedCondition { name: name.into() }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateCondition { name: name.into() }
    }

    fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidComposite {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// One side of an equality test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    /// Value of a resolved variable
    Var(String),
    Literal(String),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }
}

/// Boolean test over resolved variables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Predicate {
    Equals(Operand, Operand),
    Not(Box<Predicate>),
}

impl Predicate {
    /// True when the named variable is a non-empty string
    pub fn is_set(variable: impl Into<String>) -> Self {
        Predicate::Not(Box::new(Predicate::Equals(
            Operand::var(variable),
            Operand::literal(""),
        )))
    }
}

/// Combinator for composite conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompositeOp {
    And,
    Or,
    Not,
}

/// A registered condition: either a leaf predicate or a composite over
/// previously registered condition names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionExpr {
    Leaf(Predicate),
    Composite {
        op: CompositeOp,
        operands: Vec<String>,
    },
}

/// Ordered registry of named conditions
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConditionRegistry {
    entries: Vec<(String, ConditionExpr)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf predicate under `name`
    pub fn define(
        &mut self,
        name: impl Into<String>,
        predicate: Predicate,
    ) -> Result<(), ConditionError> {
        self.insert(name.into(), ConditionExpr::Leaf(predicate))
    }

    /// Register a composite over previously registered condition names
    pub fn define_composite(
        &mut self,
        name: impl Into<String>,
        op: CompositeOp,
        operands: &[&str],
    ) -> Result<(), ConditionError> {
        let name = name.into();
        match op {
            CompositeOp::Not if operands.len() != 1 => {
                return Err(ConditionError::invalid(name, "Not takes exactly one operand"));
            }
            CompositeOp::And | CompositeOp::Or if operands.is_empty() => {
                return Err(ConditionError::invalid(name, "no operands"));
            }
            _ => {}
        }
        for operand in operands {
            if !self.contains(operand) {
                return Err(ConditionError::undefined(*operand));
            }
        }
        self.insert(
            name,
            ConditionExpr::Composite {
                op,
                operands: operands.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    fn insert(&mut self, name: String, expr: ConditionExpr) -> Result<(), ConditionError> {
        if self.index.contains_key(&name) {
            return Err(ConditionError::duplicate(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, expr));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConditionExpr> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Registered names in definition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate a named condition against resolved variables.
    ///
    /// Composites short-circuit in operand order; the registry is acyclic by
    /// construction so recursion terminates.
    pub fn evaluate(
        &self,
        name: &str,
        variables: &ResolvedVariables,
    ) -> Result<bool, ConditionError> {
        let expr = self
            .get(name)
            .ok_or_else(|| ConditionError::undefined(name))?;
        match expr {
            ConditionExpr::Leaf(predicate) => eval_predicate(name, predicate, variables),
            ConditionExpr::Composite { op, operands } => match op {
                CompositeOp::And => {
                    for operand in operands {
                        if !self.evaluate(operand, variables)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                CompositeOp::Or => {
                    for operand in operands {
                        if self.evaluate(operand, variables)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                CompositeOp::Not => Ok(!self.evaluate(&operands[0], variables)?),
            },
        }
    }
}

fn eval_predicate(
    condition: &str,
    predicate: &Predicate,
    variables: &ResolvedVariables,
) -> Result<bool, ConditionError> {
    match predicate {
        Predicate::Not(inner) => Ok(!eval_predicate(condition, inner, variables)?),
        Predicate::Equals(left, right) => {
            let left = resolve_operand(condition, left, variables)?;
            let right = resolve_operand(condition, right, variables)?;
            Ok(left == right)
        }
    }
}

fn resolve_operand(
    condition: &str,
    operand: &Operand,
    variables: &ResolvedVariables,
) -> Result<String, ConditionError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Var(name) => match variables.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Int(n)) => Ok(n.to_string()),
            _ => Err(ConditionError::UnknownVariable {
                condition: condition.to_string(),
                variable: name.clone(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{Schema, VariableSpec, VarType};
    use std::collections::BTreeMap;

    fn vars(zone_id: &str, zone_name: &str) -> ResolvedVariables {
        let schema = Schema::new()
            .declare(
                "ZoneId",
                VariableSpec::optional(VarType::String, "Zone id.", ""),
            )
            .declare(
                "ZoneName",
                VariableSpec::optional(VarType::String, "Zone name.", ""),
            );
        let mut supplied = BTreeMap::new();
        supplied.insert("ZoneId".to_string(), Value::from(zone_id));
        supplied.insert("ZoneName".to_string(), Value::from(zone_name));
        schema.resolve(supplied).unwrap()
    }

    #[test]
    fn test_is_set_predicate() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();

        assert!(registry.evaluate("HasZone", &vars("Z123", "")).unwrap());
        assert!(!registry.evaluate("HasZone", &vars("", "")).unwrap());
    }

    #[test]
    fn test_composite_and_short_circuits() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();
        registry.define("HasName", Predicate::is_set("ZoneName")).unwrap();
        registry
            .define_composite("HasBoth", CompositeOp::And, &["HasZone", "HasName"])
            .unwrap();

        assert!(registry.evaluate("HasBoth", &vars("Z123", "internal")).unwrap());
        assert!(!registry.evaluate("HasBoth", &vars("Z123", "")).unwrap());
        assert!(!registry.evaluate("HasBoth", &vars("", "internal")).unwrap());
    }

    #[test]
    fn test_composite_or_and_not() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();
        registry.define("HasName", Predicate::is_set("ZoneName")).unwrap();
        registry
            .define_composite("HasEither", CompositeOp::Or, &["HasZone", "HasName"])
            .unwrap();
        registry
            .define_composite("HasNeither", CompositeOp::Not, &["HasEither"])
            .unwrap();

        assert!(registry.evaluate("HasEither", &vars("", "internal")).unwrap());
        assert!(registry.evaluate("HasNeither", &vars("", "")).unwrap());
    }

    #[test]
    fn test_undefined_operand_rejected_at_definition() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();
        let err = registry
            .define_composite("Broken", CompositeOp::And, &["HasZone", "NoSuch"])
            .unwrap_err();
        match err {
            ConditionError::UndefinedCondition { name } => assert_eq!(name, "NoSuch"),
            other => panic!("expected UndefinedCondition, got {:?}", other),
        }
        // The failed composite must not have been registered.
        assert!(!registry.contains("Broken"));
    }

    #[test]
    fn test_duplicate_condition_rejected() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();
        let err = registry
            .define("HasZone", Predicate::is_set("ZoneName"))
            .unwrap_err();
        assert!(matches!(err, ConditionError::DuplicateCondition { .. }));
    }

    #[test]
    fn test_not_composite_arity() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasZone", Predicate::is_set("ZoneId")).unwrap();
        registry.define("HasName", Predicate::is_set("ZoneName")).unwrap();
        let err = registry
            .define_composite("Bad", CompositeOp::Not, &["HasZone", "HasName"])
            .unwrap_err();
        assert!(matches!(err, ConditionError::InvalidComposite { .. }));
    }

    #[test]
    fn test_unknown_variable_in_predicate() {
        let mut registry = ConditionRegistry::new();
        registry.define("HasThing", Predicate::is_set("NoSuchVar")).unwrap();
        let err = registry.evaluate("HasThing", &vars("", "")).unwrap_err();
        match err {
            ConditionError::UnknownVariable { condition, variable } => {
                assert_eq!(condition, "HasThing");
                assert_eq!(variable, "NoSuchVar");
            }
            other => panic!("expected UnknownVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_names_preserve_definition_order() {
        let mut registry = ConditionRegistry::new();
        registry.define("B", Predicate::is_set("ZoneId")).unwrap();
        registry.define("A", Predicate::is_set("ZoneName")).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
