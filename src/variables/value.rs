//! Typed variable values and per-kind coercion

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::provider::{EventRule, FunctionCode};
use super::VariableError;

/// A supplied or resolved variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    /// Flat string-to-string mapping (e.g. environment variables)
    Map(BTreeMap<String, String>),
    List(Vec<Value>),
    /// Structured object with named sub-fields
    Object(BTreeMap<String, Value>),
    /// Provider-native function code location
    Code(FunctionCode),
    /// Provider-native event rule definition
    Rule(EventRule),
}

impl Value {
    /// Human-readable kind name, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Code(_) => "function code",
            Value::Rule(_) => "event rule",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Field kinds allowed inside a structured object variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    StringList,
}

/// Fixed allowed key set for a structured object variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Name used in error messages
    pub name: &'static str,
    pub fields: &'static [(&'static str, FieldType)],
}

impl ObjectSchema {
    fn field(&self, key: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, ty)| *ty)
    }

    fn validate(
        &self,
        variable: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<(), VariableError> {
        for (key, value) in fields {
            let ty = self
                .field(key)
                .ok_or_else(|| VariableError::unknown_field(variable, key))?;
            match (ty, value) {
                (FieldType::String, Value::String(_)) => {}
                (FieldType::StringList, Value::List(items))
                    if items.iter().all(|v| matches!(v, Value::String(_))) => {}
                _ => {
                    return Err(VariableError::mismatch(
                        variable,
                        format!("{} field '{}' of {}", describe_field(ty), key, self.name),
                        value.kind(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn describe_field(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "string",
        FieldType::StringList => "string list",
    }
}

/// Declared kind of a variable: primitives, structured objects with a fixed
/// allowed key set, or provider-native wrappers with nested validation
#[derive(Debug, Clone, PartialEq)]
pub enum VarType {
    String,
    Int,
    Map,
    Object(ObjectSchema),
    Code,
    Rule,
    VpcId,
    SubnetIdList,
}

impl VarType {
    /// What this type expects, for error messages
    pub fn describe(&self) -> String {
        match self {
            VarType::String => "string".to_string(),
            VarType::Int => "int".to_string(),
            VarType::Map => "map of strings".to_string(),
            VarType::Object(schema) => format!("{} object", schema.name),
            VarType::Code => "function code".to_string(),
            VarType::Rule => "event rule".to_string(),
            VarType::VpcId => "EC2 VPC id (vpc-*)".to_string(),
            VarType::SubnetIdList => "list of EC2 subnet ids (subnet-*)".to_string(),
        }
    }

    /// Coerce a supplied value to this type. Total over well-typed inputs:
    /// the result always carries the canonical representation for the kind.
    pub fn coerce(&self, variable: &str, value: Value) -> Result<Value, VariableError> {
        match self {
            VarType::String => match value {
                Value::String(_) => Ok(value),
                Value::Int(n) => Ok(Value::String(n.to_string())),
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::Int => match value {
                Value::Int(_) => Ok(value),
                Value::String(ref s) => match s.trim().parse::<i64>() {
                    Ok(n) => Ok(Value::Int(n)),
                    Err(_) => Err(self.mismatch(variable, &value)),
                },
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::Map => match value {
                Value::Map(_) => Ok(value),
                Value::Object(fields) => {
                    let mut map = BTreeMap::new();
                    for (key, field) in fields {
                        match field {
                            Value::String(s) => {
                                map.insert(key, s);
                            }
                            Value::Int(n) => {
                                map.insert(key, n.to_string());
                            }
                            other => return Err(self.mismatch(variable, &other)),
                        }
                    }
                    Ok(Value::Map(map))
                }
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::Object(schema) => match value {
                Value::Object(ref fields) => {
                    schema.validate(variable, fields)?;
                    Ok(value)
                }
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::Code => match value {
                Value::Code(ref code) => {
                    code.validate(variable)?;
                    Ok(value)
                }
                Value::Object(ref fields) => {
                    let code = FunctionCode::from_object(variable, fields)?;
                    code.validate(variable)?;
                    Ok(Value::Code(code))
                }
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::Rule => match value {
                Value::Rule(ref rule) => {
                    rule.validate(variable)?;
                    Ok(value)
                }
                Value::Object(ref fields) => {
                    let rule = EventRule::from_object(variable, fields)?;
                    rule.validate(variable)?;
                    Ok(Value::Rule(rule))
                }
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::VpcId => match value {
                Value::String(ref s) if s.starts_with("vpc-") => Ok(value),
                other => Err(self.mismatch(variable, &other)),
            },
            VarType::SubnetIdList => {
                let ids: Vec<String> = match value {
                    // Comma-separated form, as the list arrives from flat config
                    Value::String(s) => {
                        s.split(',').map(|id| id.trim().to_string()).collect()
                    }
                    Value::List(items) => {
                        let mut ids = Vec::with_capacity(items.len());
                        for item in items {
                            match item {
                                Value::String(s) => ids.push(s),
                                other => return Err(self.mismatch(variable, &other)),
                            }
                        }
                        ids
                    }
                    other => return Err(self.mismatch(variable, &other)),
                };
                if let Some(bad) = ids.iter().find(|id| !id.starts_with("subnet-")) {
                    return Err(VariableError::mismatch(
                        variable,
                        self.describe(),
                        format!("id '{}'", bad),
                    ));
                }
                Ok(Value::List(ids.into_iter().map(Value::String).collect()))
            }
        }
    }

    fn mismatch(&self, variable: &str, found: &Value) -> VariableError {
        VariableError::mismatch(variable, self.describe(), found.kind())
    }
}
