//! Append-only resource graph
//!
//! Assembly appends resources and outputs to a [`TemplateGraph`]; nothing is
//! mutated or removed after insertion. Conditional absence is encoded as a
//! guard condition on the entry, never as deletion. Duplicate names are
//! rejected at insertion; dangling references and guard names are caught by
//! [`TemplateGraph::validate`] before the graph is handed to a renderer.

mod props;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

pub use props::{PropValue, PseudoParam};

use crate::conditions::{CompositeOp, ConditionError, ConditionRegistry, Predicate};

/// Errors raised while assembling or validating the graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Two resources were assigned the same logical name
    #[error("duplicate resource name: {name}")]
    DuplicateResourceName { name: String },

    /// Two outputs were assigned the same name
    #[error("duplicate output name: {name}")]
    DuplicateOutputName { name: String },

    /// A property references a resource that is not in the graph
    #[error("unresolved reference from '{owner}' to '{target}'")]
    UnresolvedReference { owner: String, target: String },

    /// A guard condition names an unregistered condition
    #[error("'{owner}' is guarded by undefined condition '{condition}'")]
    UndefinedCondition { owner: String, condition: String },
}

/// Kinds of infrastructure resources this engine assembles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    LambdaFunction,
    LambdaVersion,
    LambdaAlias,
    LambdaPermission,
    IamRole,
    IamPolicy,
    EventsRule,
    DbInstance,
    DbSubnetGroup,
    SecurityGroup,
    RecordSet,
}

impl ResourceKind {
    /// Provider type string the renderer serializes this kind as
    pub fn provider_type(&self) -> &'static str {
        match self {
            ResourceKind::LambdaFunction => "AWS::Lambda::Function",
            ResourceKind::LambdaVersion => "AWS::Lambda::Version",
            ResourceKind::LambdaAlias => "AWS::Lambda::Alias",
            ResourceKind::LambdaPermission => "AWS::Lambda::Permission",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::IamPolicy => "AWS::IAM::Policy",
            ResourceKind::EventsRule => "AWS::Events::Rule",
            ResourceKind::DbInstance => "AWS::RDS::DBInstance",
            ResourceKind::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::RecordSet => "AWS::Route53::RecordSet",
        }
    }
}

/// A single infrastructure object node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, PropValue>,
    /// Guard condition: when present and false at render time, the renderer
    /// omits this resource (render-time elision)
    pub condition: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            condition: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.properties.get(key)
    }
}

/// A named output value derived from the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub name: String,
    pub value: PropValue,
    pub condition: Option<String>,
}

impl Output {
    pub fn new(name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// The write-once resource graph one blueprint render assembles into
#[derive(Debug, Default)]
pub struct TemplateGraph {
    resources: Vec<Resource>,
    resource_index: HashMap<String, usize>,
    outputs: Vec<Output>,
    output_names: HashSet<String>,
    conditions: ConditionRegistry,
}

impl TemplateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named leaf condition
    pub fn define_condition(
        &mut self,
        name: impl Into<String>,
        predicate: Predicate,
    ) -> Result<(), ConditionError> {
        self.conditions.define(name, predicate)
    }

    /// Register a composite condition over already-registered names
    pub fn define_composite(
        &mut self,
        name: impl Into<String>,
        op: CompositeOp,
        operands: &[&str],
    ) -> Result<(), ConditionError> {
        self.conditions.define_composite(name, op, operands)
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    /// Append a resource. Fails if the logical name is already taken.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), GraphError> {
        if self.resource_index.contains_key(&resource.name) {
            return Err(GraphError::DuplicateResourceName {
                name: resource.name,
            });
        }
        self.resource_index
            .insert(resource.name.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Append an output. Fails if the name is already taken.
    pub fn add_output(&mut self, output: Output) -> Result<(), GraphError> {
        if !self.output_names.insert(output.name.clone()) {
            return Err(GraphError::DuplicateOutputName { name: output.name });
        }
        self.outputs.push(output);
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resource_index.get(name).map(|&i| &self.resources[i])
    }

    /// Resources in insertion order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Outputs in declaration order, guard conditions preserved. Idempotent.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Check every reference and guard condition in insertion order,
    /// reporting the first violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        for resource in &self.resources {
            self.check_condition(&resource.name, resource.condition.as_deref())?;
            for value in resource.properties.values() {
                self.check_references(&resource.name, value)?;
            }
        }
        for output in &self.outputs {
            self.check_condition(&output.name, output.condition.as_deref())?;
            self.check_references(&output.name, &output.value)?;
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Resource>, Vec<Output>, ConditionRegistry) {
        (self.resources, self.outputs, self.conditions)
    }

    fn check_condition(&self, owner: &str, condition: Option<&str>) -> Result<(), GraphError> {
        if let Some(condition) = condition {
            if !self.conditions.contains(condition) {
                return Err(GraphError::UndefinedCondition {
                    owner: owner.to_string(),
                    condition: condition.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_references(&self, owner: &str, value: &PropValue) -> Result<(), GraphError> {
        let mut refs = Vec::new();
        value.collect_references(&mut refs);
        for target in refs {
            if !self.resource_index.contains_key(target) {
                return Err(GraphError::UnresolvedReference {
                    owner: owner.to_string(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Sanitize a raw identifier into a valid logical resource name: split on
/// non-alphanumerics and upper-case the first letter of each fragment.
pub fn safe_logical_id(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
