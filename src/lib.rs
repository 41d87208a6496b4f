//! Stacksmith - blueprint-to-resource-graph assembly
//!
//! A blueprint declares a schema of typed input variables and, given resolved
//! values, deterministically assembles a graph of infrastructure resources,
//! conditions, and outputs. The graph is handed to a downstream renderer that
//! serializes it into the target template format and evaluates guard
//! conditions; nothing here touches the network or the filesystem.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use stacksmith::blueprints::Function;
//! use stacksmith::variables::{FunctionCode, Value};
//!
//! let mut values = BTreeMap::new();
//! values.insert(
//!     "Code".to_string(),
//!     Value::Code(FunctionCode::s3("artifacts", "app.zip")),
//! );
//! values.insert("Runtime".to_string(), Value::from("python3.11"));
//!
//! let template = stacksmith::render(&Function::new("app"), values).unwrap();
//! assert!(template.resource("Function").is_some());
//! assert!(template.resource("Role").is_some());
//! ```

pub mod blueprints;
pub mod conditions;
pub mod config;
pub mod graph;
pub mod variables;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

pub use conditions::{CompositeOp, ConditionError, ConditionRegistry, Operand, Predicate};
pub use config::ConfigError;
pub use graph::{
    safe_logical_id, GraphError, Output, PropValue, PseudoParam, Resource, ResourceKind,
    TemplateGraph,
};
pub use variables::{ResolvedVariables, Schema, Value, VarType, VariableError, VariableSpec};

/// Errors that can occur during a blueprint render
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A named, reusable template-generation unit parameterized by a variable
/// schema
pub trait Blueprint {
    /// Instance name, used to derive logical resource names
    fn name(&self) -> &str;

    /// Declared input variables
    fn schema(&self) -> Schema;

    /// Append resources, conditions, and outputs to a fresh graph
    fn assemble(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError>;
}

/// The finished result of one blueprint render, ready for a renderer to
/// serialize. Resources and outputs are in construction order; guard
/// conditions are carried unevaluated together with the resolved variables
/// the renderer needs to evaluate them.
#[derive(Debug, Serialize)]
pub struct RenderedTemplate {
    pub blueprint: String,
    pub resources: Vec<Resource>,
    pub outputs: Vec<Output>,
    pub conditions: ConditionRegistry,
    pub variables: ResolvedVariables,
}

impl RenderedTemplate {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Evaluate a guard condition against this render's resolved variables
    pub fn evaluate_condition(&self, name: &str) -> Result<bool, ConditionError> {
        self.conditions.evaluate(name, &self.variables)
    }

    /// One-line-per-entry textual form, stable across renders
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for resource in &self.resources {
            let _ = write!(
                out,
                "resource {} {}",
                resource.name,
                resource.kind.provider_type()
            );
            match &resource.condition {
                Some(condition) => {
                    let _ = writeln!(out, " [{}]", condition);
                }
                None => out.push('\n'),
            }
        }
        for output in &self.outputs {
            let _ = write!(out, "output {}", output.name);
            match &output.condition {
                Some(condition) => {
                    let _ = writeln!(out, " [{}]", condition);
                }
                None => out.push('\n'),
            }
        }
        out
    }
}

/// Render a blueprint against supplied variable values.
///
/// Resolves and coerces the values, assembles the resource graph, and
/// validates references and guard conditions. A render either fully succeeds
/// or fails with the first violation encountered; the graph is never
/// partially returned.
pub fn render<B: Blueprint + ?Sized>(
    blueprint: &B,
    supplied: BTreeMap<String, Value>,
) -> Result<RenderedTemplate, BlueprintError> {
    let schema = blueprint.schema();
    let variables = schema.resolve(supplied)?;
    tracing::debug!(
        "resolved {} variables for blueprint '{}'",
        variables.len(),
        blueprint.name()
    );

    let mut graph = TemplateGraph::new();
    blueprint.assemble(&variables, &mut graph)?;
    tracing::debug!(
        "assembled {} resources, {} outputs, {} conditions",
        graph.resources().len(),
        graph.outputs().len(),
        graph.conditions().len()
    );

    graph.validate()?;
    let (resources, outputs, conditions) = graph.into_parts();
    Ok(RenderedTemplate {
        blueprint: blueprint.name().to_string(),
        resources,
        outputs,
        conditions,
        variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal blueprint used to exercise the pipeline end to end
    struct Greeter;

    impl Blueprint for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn schema(&self) -> Schema {
            Schema::new()
                .declare("Name", VariableSpec::required(VarType::String, "Name."))
                .declare(
                    "Retries",
                    VariableSpec::optional(VarType::Int, "Retry count.", 3),
                )
        }

        fn assemble(
            &self,
            variables: &ResolvedVariables,
            graph: &mut TemplateGraph,
        ) -> Result<(), BlueprintError> {
            graph.add_resource(
                Resource::new("Function", ResourceKind::LambdaFunction)
                    .with_property("Handler", variables.string("Name")),
            )?;
            graph.add_output(Output::new(
                "FunctionName",
                PropValue::reference("Function"),
            ))?;
            Ok(())
        }
    }

    #[test]
    fn test_render_with_required_and_default() {
        let mut values = BTreeMap::new();
        values.insert("Name".to_string(), Value::from("x"));
        let template = render(&Greeter, values).unwrap();
        assert_eq!(template.variables.string("Name"), "x");
        assert_eq!(template.variables.int("Retries"), 3);
        assert_eq!(template.resources.len(), 1);
        assert_eq!(template.outputs.len(), 1);
    }

    #[test]
    fn test_render_missing_required_fails() {
        let err = render(&Greeter, BTreeMap::new()).unwrap_err();
        match err {
            BlueprintError::Variable(VariableError::MissingRequiredVariable { variable }) => {
                assert_eq!(variable, "Name");
            }
            other => panic!("expected MissingRequiredVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut values = BTreeMap::new();
        values.insert("Name".to_string(), Value::from("x"));
        let a = render(&Greeter, values.clone()).unwrap();
        let b = render(&Greeter, values).unwrap();
        assert_eq!(a.summary(), b.summary());
        assert_eq!(a.resources, b.resources);
        assert_eq!(a.outputs, b.outputs);
    }

    #[test]
    fn test_summary_lists_resources_then_outputs() {
        let mut values = BTreeMap::new();
        values.insert("Name".to_string(), Value::from("x"));
        let template = render(&Greeter, values).unwrap();
        assert_eq!(
            template.summary(),
            "resource Function AWS::Lambda::Function\noutput FunctionName\n"
        );
    }
}
