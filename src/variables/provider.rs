//! Provider-native typed wrappers
//!
//! These carry cloud-provider structures that a plain primitive cannot:
//! function code locations and event rule definitions. Each performs its own
//! nested validation when a variable of the matching kind is resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;
use super::VariableError;

/// Location of a compute function's deployable code: either an inline source
/// string or an S3 object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCode {
    pub s3_bucket: Option<String>,
    pub s3_key: Option<String>,
    pub s3_object_version: Option<String>,
    pub zip_file: Option<String>,
}

impl FunctionCode {
    /// Code stored as an S3 object
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            s3_bucket: Some(bucket.into()),
            s3_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_object_version(mut self, version: impl Into<String>) -> Self {
        self.s3_object_version = Some(version.into());
        self
    }

    /// Code supplied inline
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            zip_file: Some(source.into()),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self, variable: &str) -> Result<(), VariableError> {
        let has_s3 = self.s3_bucket.is_some() || self.s3_key.is_some();
        if self.zip_file.is_some() && has_s3 {
            return Err(VariableError::mismatch(
                variable,
                "function code with either ZipFile or an S3 location",
                "both",
            ));
        }
        if self.zip_file.is_none() && !(self.s3_bucket.is_some() && self.s3_key.is_some()) {
            return Err(VariableError::mismatch(
                variable,
                "function code with ZipFile, or S3Bucket and S3Key",
                "neither",
            ));
        }
        Ok(())
    }

    pub(crate) fn from_object(
        variable: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<Self, VariableError> {
        let mut code = Self::default();
        for (key, value) in fields {
            let s = string_field(variable, key, value)?;
            match key.as_str() {
                "S3Bucket" => code.s3_bucket = Some(s),
                "S3Key" => code.s3_key = Some(s),
                "S3ObjectVersion" => code.s3_object_version = Some(s),
                "ZipFile" => code.zip_file = Some(s),
                _ => return Err(VariableError::unknown_field(variable, key)),
            }
        }
        Ok(code)
    }
}

/// One invocation target of an event rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTarget {
    pub id: String,
    pub arn: String,
    pub input: Option<String>,
}

impl RuleTarget {
    pub fn new(id: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            arn: arn.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// A scheduling rule with its invocation targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRule {
    /// Logical id the rule resource is created under
    pub name: String,
    pub schedule_expression: String,
    pub description: Option<String>,
    pub state: Option<String>,
    pub targets: Vec<RuleTarget>,
}

impl EventRule {
    pub fn new(name: impl Into<String>, schedule_expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule_expression: schedule_expression.into(),
            description: None,
            state: None,
            targets: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_target(mut self, target: RuleTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub(crate) fn validate(&self, variable: &str) -> Result<(), VariableError> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VariableError::mismatch(
                variable,
                "event rule with an alphanumeric logical id",
                format!("'{}'", self.name),
            ));
        }
        if self.schedule_expression.is_empty() {
            return Err(VariableError::mismatch(
                variable,
                "event rule with a schedule expression",
                "empty expression",
            ));
        }
        for target in &self.targets {
            if target.id.is_empty() || target.arn.is_empty() {
                return Err(VariableError::mismatch(
                    variable,
                    "event rule targets with non-empty Id and Arn",
                    format!("target '{}'", target.id),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn from_object(
        variable: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<Self, VariableError> {
        let mut rule = Self::new("", "");
        for (key, value) in fields {
            match key.as_str() {
                "Name" => rule.name = string_field(variable, key, value)?,
                "ScheduleExpression" => {
                    rule.schedule_expression = string_field(variable, key, value)?;
                }
                "Description" => rule.description = Some(string_field(variable, key, value)?),
                "State" => rule.state = Some(string_field(variable, key, value)?),
                "Targets" => rule.targets = targets_field(variable, value)?,
                _ => return Err(VariableError::unknown_field(variable, key)),
            }
        }
        Ok(rule)
    }
}

fn string_field(variable: &str, key: &str, value: &Value) -> Result<String, VariableError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(VariableError::mismatch(
            variable,
            format!("string field '{}'", key),
            other.kind(),
        )),
    }
}

fn targets_field(variable: &str, value: &Value) -> Result<Vec<RuleTarget>, VariableError> {
    let items = match value {
        Value::List(items) => items,
        other => {
            return Err(VariableError::mismatch(
                variable,
                "list field 'Targets'",
                other.kind(),
            ));
        }
    };
    let mut targets = Vec::with_capacity(items.len());
    for item in items {
        let fields = match item {
            Value::Object(fields) => fields,
            other => {
                return Err(VariableError::mismatch(
                    variable,
                    "object entries in 'Targets'",
                    other.kind(),
                ));
            }
        };
        let mut target = RuleTarget::new("", "");
        for (key, field) in fields {
            match key.as_str() {
                "Id" => target.id = string_field(variable, key, field)?,
                "Arn" => target.arn = string_field(variable, key, field)?,
                "Input" => target.input = Some(string_field(variable, key, field)?),
                _ => {
                    return Err(VariableError::unknown_field(
                        variable,
                        format!("Targets.{}", key),
                    ));
                }
            }
        }
        targets.push(target);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_requires_exactly_one_source() {
        assert!(FunctionCode::s3("bucket", "key.zip").validate("Code").is_ok());
        assert!(FunctionCode::inline("def handler(): pass")
            .validate("Code")
            .is_ok());
        assert!(FunctionCode::default().validate("Code").is_err());

        let both = FunctionCode {
            zip_file: Some("src".to_string()),
            ..FunctionCode::s3("bucket", "key.zip")
        };
        assert!(both.validate("Code").is_err());
    }

    #[test]
    fn test_code_from_object_unknown_key() {
        let mut fields = BTreeMap::new();
        fields.insert("S3Bucket".to_string(), Value::from("bucket"));
        fields.insert("Bucket".to_string(), Value::from("typo"));
        let err = FunctionCode::from_object("Code", &fields).unwrap_err();
        assert!(matches!(err, VariableError::UnknownField { .. }));
    }

    #[test]
    fn test_rule_from_object() {
        let mut target = BTreeMap::new();
        target.insert("Id".to_string(), Value::from("nightly-job"));
        target.insert(
            "Arn".to_string(),
            Value::from("arn:aws:lambda:us-east-1:123:function:job"),
        );

        let mut fields = BTreeMap::new();
        fields.insert("Name".to_string(), Value::from("NightlyRule"));
        fields.insert("ScheduleExpression".to_string(), Value::from("rate(1 day)"));
        fields.insert("Targets".to_string(), Value::List(vec![Value::Object(target)]));

        let rule = EventRule::from_object("CloudwatchEventsRule", &fields).unwrap();
        assert_eq!(rule.name, "NightlyRule");
        assert_eq!(rule.targets.len(), 1);
        assert_eq!(rule.targets[0].id, "nightly-job");
        assert!(rule.validate("CloudwatchEventsRule").is_ok());
    }

    #[test]
    fn test_rule_rejects_unsafe_logical_id() {
        let rule = EventRule::new("bad name", "rate(1 day)");
        assert!(rule.validate("CloudwatchEventsRule").is_err());
    }

    #[test]
    fn test_rule_rejects_empty_target_arn() {
        let rule = EventRule::new("Rule", "rate(1 day)").with_target(RuleTarget::new("job", ""));
        assert!(rule.validate("CloudwatchEventsRule").is_err());
    }
}
