//! Variable schema declaration and resolution
//!
//! A blueprint declares a [`Schema`] of typed variables; [`Schema::resolve`]
//! validates and coerces the supplied values into an immutable
//! [`ResolvedVariables`] set. Resolution is a pure function: every declared
//! variable appears in the result, defaults fill the gaps, and the first
//! violation aborts with an error naming the offending variable.

pub mod provider;
pub mod value;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

pub use provider::{EventRule, FunctionCode, RuleTarget};
pub use value::{FieldType, ObjectSchema, Value, VarType};

/// Errors raised while resolving supplied values against a schema
#[derive(Debug, Error)]
pub enum VariableError {
    /// A variable without a default was not supplied
    #[error("missing required variable: {variable}")]
    MissingRequiredVariable { variable: String },

    /// A supplied value cannot be coerced to the declared type
    #[error("type mismatch for variable '{variable}': expected {expected}, got {found}")]
    TypeMismatch {
        variable: String,
        expected: String,
        found: String,
    },

    /// A structured object carried a key outside its allowed set
    #[error("unknown field '{field}' for variable '{variable}'")]
    UnknownField { variable: String, field: String },
}

impl VariableError {
    pub fn missing(variable: impl Into<String>) -> Self {
        Self::MissingRequiredVariable {
            variable: variable.into(),
        }
    }

    pub fn mismatch(
        variable: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            variable: variable.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unknown_field(variable: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            variable: variable.into(),
            field: field.into(),
        }
    }
}

/// Declaration of a single variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub ty: VarType,
    pub description: &'static str,
    pub default: Option<Value>,
}

impl VariableSpec {
    /// A variable that must be supplied at resolution time
    pub fn required(ty: VarType, description: &'static str) -> Self {
        Self {
            ty,
            description,
            default: None,
        }
    }

    /// A variable that falls back to `default` when not supplied
    pub fn optional(ty: VarType, description: &'static str, default: impl Into<Value>) -> Self {
        Self {
            ty,
            description,
            default: Some(default.into()),
        }
    }
}

/// Variable declarations for one blueprint, keyed by name. Iteration is in
/// sorted name order, not declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    vars: BTreeMap<String, VariableSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Builder-style so blueprints can chain declarations.
    pub fn declare(mut self, name: impl Into<String>, spec: VariableSpec) -> Self {
        self.vars.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariableSpec> {
        self.vars.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|s| s.as_str())
    }

    /// Validate and coerce supplied values into a complete variable set.
    ///
    /// Every declared variable appears in the result; defaults are coerced
    /// through the same path as supplied values. Supplied keys that no
    /// declaration matches are ignored.
    pub fn resolve(
        &self,
        mut supplied: BTreeMap<String, Value>,
    ) -> Result<ResolvedVariables, VariableError> {
        let mut values = BTreeMap::new();
        for (name, spec) in &self.vars {
            let raw = match supplied.remove(name) {
                Some(value) => value,
                None => match &spec.default {
                    Some(default) => default.clone(),
                    None => return Err(VariableError::missing(name)),
                },
            };
            values.insert(name.clone(), spec.ty.coerce(name, raw)?);
        }
        for name in supplied.keys() {
            tracing::debug!("ignoring undeclared variable '{}'", name);
        }
        Ok(ResolvedVariables { values })
    }
}

/// Type-checked variable values, immutable once produced.
///
/// The typed accessors panic when asked for a name or type the originating
/// schema never declared; that is a blueprint programming error, not a user
/// input error, and `resolve` has already rejected the latter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedVariables {
    values: BTreeMap<String, Value>,
}

impl ResolvedVariables {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String variable value. Panics if `name` was not resolved as a string.
    pub fn string(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(Value::String(s)) => s,
            other => panic!("variable '{}' was not resolved as a string: {:?}", name, other),
        }
    }

    /// Int variable value. Panics if `name` was not resolved as an int.
    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(Value::Int(n)) => *n,
            other => panic!("variable '{}' was not resolved as an int: {:?}", name, other),
        }
    }

    /// Map variable value. Panics if `name` was not resolved as a map.
    pub fn map(&self, name: &str) -> &BTreeMap<String, String> {
        match self.values.get(name) {
            Some(Value::Map(map)) => map,
            other => panic!("variable '{}' was not resolved as a map: {:?}", name, other),
        }
    }

    /// Structured object variable value. Panics if `name` was not resolved as
    /// an object.
    pub fn object(&self, name: &str) -> &BTreeMap<String, Value> {
        match self.values.get(name) {
            Some(Value::Object(fields)) => fields,
            other => panic!("variable '{}' was not resolved as an object: {:?}", name, other),
        }
    }

    /// String-list variable value. Panics on any other resolved shape.
    pub fn string_list(&self, name: &str) -> Vec<&str> {
        match self.values.get(name) {
            Some(Value::List(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.as_str(),
                    other => panic!("variable '{}' holds a non-string entry: {:?}", name, other),
                })
                .collect(),
            other => panic!("variable '{}' was not resolved as a list: {:?}", name, other),
        }
    }

    /// Function code variable value. Panics on any other resolved shape.
    pub fn code(&self, name: &str) -> &FunctionCode {
        match self.values.get(name) {
            Some(Value::Code(code)) => code,
            other => panic!("variable '{}' was not resolved as function code: {:?}", name, other),
        }
    }

    /// Event rule variable value. Panics on any other resolved shape.
    pub fn rule(&self, name: &str) -> &EventRule {
        match self.values.get(name) {
            Some(Value::Rule(rule)) => rule,
            other => panic!("variable '{}' was not resolved as an event rule: {:?}", name, other),
        }
    }
}
