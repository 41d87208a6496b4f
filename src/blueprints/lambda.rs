//! Compute function blueprints
//!
//! [`Function`] provisions a lambda-style compute function. When the `Role`
//! variable supplies a pre-existing role ARN, the owned role and policy are
//! never constructed and the supplied ARN is wired straight into the
//! function (construction-time elision). [`FunctionScheduler`] provisions a
//! scheduling rule and fans out one permission grant per invocable target.

use std::collections::BTreeMap;

use crate::graph::{
    safe_logical_id, Output, PropValue, PseudoParam, Resource, ResourceKind, TemplateGraph,
};
use crate::variables::{FieldType, FunctionCode, ObjectSchema, Schema, Value, VarType, VariableSpec};
use crate::{Blueprint, BlueprintError, ResolvedVariables};

/// Allowed sub-keys of the `VpcConfig` structured variable
const NETWORK_CONFIG: ObjectSchema = ObjectSchema {
    name: "VpcConfig",
    fields: &[
        ("SecurityGroupIds", FieldType::StringList),
        ("SubnetIds", FieldType::StringList),
    ],
};

/// ARN prefix identifying invocable compute function targets
const LAMBDA_ARN_PREFIX: &str = "arn:aws:lambda:";

/// Blueprint for a single compute function with its execution role
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn create_role(&self, graph: &mut TemplateGraph) -> Result<(), BlueprintError> {
        graph.add_resource(
            Resource::new("Role", ResourceKind::IamRole)
                .with_property("AssumeRolePolicyDocument", assume_role_policy()),
        )?;
        graph.add_output(Output::new("RoleName", PropValue::reference("Role")))?;
        graph.add_output(Output::new("RoleArn", PropValue::get_att("Role", "Arn")))?;
        Ok(())
    }

    fn create_policy(&self, graph: &mut TemplateGraph) -> Result<(), BlueprintError> {
        let log_group = PropValue::join(
            "/",
            vec!["/aws/lambda".into(), PropValue::reference("Function")],
        );
        graph.add_resource(
            Resource::new("Policy", ResourceKind::IamPolicy)
                .with_property("PolicyName", format!("{}-policy", self.name))
                .with_property(
                    "PolicyDocument",
                    PropValue::map([("Statement", basic_execution_statements(log_group))]),
                )
                .with_property("Roles", vec![PropValue::reference("Role")]),
        )?;
        graph.add_output(Output::new("PolicyName", PropValue::reference("Policy")))?;
        Ok(())
    }

    fn create_function(
        &self,
        variables: &ResolvedVariables,
        role_arn: PropValue,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let mut function = Resource::new("Function", ResourceKind::LambdaFunction)
            .with_property("Code", code_properties(variables.code("Code")))
            .with_property("Handler", variables.string("Handler"))
            .with_property("MemorySize", variables.int("MemorySize"))
            .with_property("Role", role_arn)
            .with_property("Runtime", variables.string("Runtime"))
            .with_property("Timeout", variables.int("Timeout"));

        // Optional properties are elided entirely when their input is empty.
        let dead_letter_arn = variables.string("DeadLetterArn");
        if !dead_letter_arn.is_empty() {
            function = function.with_property(
                "DeadLetterConfig",
                PropValue::map([("TargetArn", dead_letter_arn.into())]),
            );
        }
        let description = variables.string("Description");
        if !description.is_empty() {
            function = function.with_property("Description", description);
        }
        let environment = variables.map("Environment");
        if !environment.is_empty() {
            let entries: BTreeMap<String, PropValue> = environment
                .iter()
                .map(|(k, v)| (k.clone(), PropValue::from(v.clone())))
                .collect();
            function = function.with_property(
                "Environment",
                PropValue::map([("Variables", PropValue::Map(entries))]),
            );
        }
        let kms_key_arn = variables.string("KmsKeyArn");
        if !kms_key_arn.is_empty() {
            function = function.with_property("KmsKeyArn", kms_key_arn);
        }
        let vpc_config = variables.object("VpcConfig");
        if !vpc_config.is_empty() {
            function = function.with_property("VpcConfig", network_properties(vpc_config));
        }

        graph.add_resource(function)?;
        graph.add_output(Output::new("FunctionName", PropValue::reference("Function")))?;
        graph.add_output(Output::new(
            "FunctionArn",
            PropValue::get_att("Function", "Arn"),
        ))?;

        graph.add_resource(
            Resource::new("LatestVersion", ResourceKind::LambdaVersion)
                .with_property("FunctionName", PropValue::reference("Function")),
        )?;
        graph.add_output(Output::new(
            "LatestVersion",
            PropValue::reference("LatestVersion"),
        ))?;
        graph.add_output(Output::new(
            "LatestVersionArn",
            PropValue::get_att("LatestVersion", "Version"),
        ))?;

        let alias_name = variables.string("AliasName");
        if !alias_name.is_empty() {
            let alias_version = match variables.string("AliasVersion") {
                "" => "$LATEST",
                version => version,
            };
            graph.add_resource(
                Resource::new("Alias", ResourceKind::LambdaAlias)
                    .with_property("Name", alias_name)
                    .with_property("FunctionName", PropValue::reference("Function"))
                    .with_property("FunctionVersion", alias_version),
            )?;
            graph.add_output(Output::new("AliasArn", PropValue::reference("Alias")))?;
        }
        Ok(())
    }
}

impl Blueprint for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .declare(
                "Code",
                VariableSpec::required(VarType::Code, "Location of the function's code."),
            )
            .declare(
                "DeadLetterArn",
                VariableSpec::optional(
                    VarType::String,
                    "Dead letter queue ARN (SQS, SNS, etc) that failed events are sent to.",
                    "",
                ),
            )
            .declare(
                "Description",
                VariableSpec::optional(VarType::String, "Description of the function.", ""),
            )
            .declare(
                "Environment",
                VariableSpec::optional(
                    VarType::Map,
                    "Key-value pairs made available to the function at run time.",
                    Value::Map(BTreeMap::new()),
                ),
            )
            .declare(
                "Handler",
                VariableSpec::optional(
                    VarType::String,
                    "Name of the function (within the source code) to invoke.",
                    "handler",
                ),
            )
            .declare(
                "KmsKeyArn",
                VariableSpec::optional(
                    VarType::String,
                    "ARN of the KMS key used to encrypt environment variables.",
                    "",
                ),
            )
            .declare(
                "MemorySize",
                VariableSpec::optional(
                    VarType::Int,
                    "Amount of memory, in MB, allocated to the function.",
                    128,
                ),
            )
            .declare(
                "Runtime",
                VariableSpec::required(VarType::String, "Runtime environment for the function."),
            )
            .declare(
                "Timeout",
                VariableSpec::optional(
                    VarType::Int,
                    "Execution time, in seconds, after which the function is terminated.",
                    3,
                ),
            )
            .declare(
                "VpcConfig",
                VariableSpec::optional(
                    VarType::Object(NETWORK_CONFIG),
                    "VPC configuration when the function needs access to VPC resources. \
                     Valid keys: SecurityGroupIds, SubnetIds.",
                    Value::Object(BTreeMap::new()),
                ),
            )
            .declare(
                "Role",
                VariableSpec::optional(
                    VarType::String,
                    "ARN of an existing role to run the function as. When empty, a role \
                     with basic execution permissions is created.",
                    "",
                ),
            )
            .declare(
                "AliasName",
                VariableSpec::optional(VarType::String, "Name of an optional alias.", ""),
            )
            .declare(
                "AliasVersion",
                VariableSpec::optional(
                    VarType::String,
                    "Version string for the alias, without the function ARN prepended.",
                    "$LATEST",
                ),
            )
    }

    fn assemble(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let role_arn = if variables.string("Role").is_empty() {
            self.create_role(graph)?;
            self.create_policy(graph)?;
            PropValue::get_att("Role", "Arn")
        } else {
            PropValue::from(variables.string("Role"))
        };
        self.create_function(variables, role_arn, graph)?;
        Ok(())
    }
}

/// Blueprint for a scheduling rule that invokes compute function targets
#[derive(Debug, Clone)]
pub struct FunctionScheduler {
    name: String,
}

impl FunctionScheduler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Blueprint for FunctionScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Schema {
        Schema::new().declare(
            "CloudwatchEventsRule",
            VariableSpec::required(VarType::Rule, "The scheduling rule and its targets."),
        )
    }

    fn assemble(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let rule = variables.rule("CloudwatchEventsRule");

        let targets: Vec<PropValue> = rule
            .targets
            .iter()
            .map(|target| {
                let mut entry = vec![
                    ("Id", PropValue::from(target.id.clone())),
                    ("Arn", PropValue::from(target.arn.clone())),
                ];
                if let Some(input) = &target.input {
                    entry.push(("Input", PropValue::from(input.clone())));
                }
                PropValue::map(entry)
            })
            .collect();

        let mut resource = Resource::new(rule.name.clone(), ResourceKind::EventsRule)
            .with_property("ScheduleExpression", rule.schedule_expression.clone())
            .with_property("Targets", targets);
        if let Some(description) = &rule.description {
            resource = resource.with_property("Description", description.clone());
        }
        if let Some(state) = &rule.state {
            resource = resource.with_property("State", state.clone());
        }
        graph.add_resource(resource)?;

        // One permission grant per invocable target, in target-list order.
        // Targets whose ids sanitize to the same logical id collide in the
        // graph's duplicate-name check and fail the render.
        for target in &rule.targets {
            if !target.arn.starts_with(LAMBDA_ARN_PREFIX) {
                continue;
            }
            let safe_id = safe_logical_id(&target.id);
            graph.add_resource(
                Resource::new(
                    format!("PermToInvokeFunctionFor{}", safe_id),
                    ResourceKind::LambdaPermission,
                )
                .with_property("Principal", "events.amazonaws.com")
                .with_property("Action", "lambda:InvokeFunction")
                .with_property("FunctionName", target.arn.clone())
                .with_property("SourceArn", PropValue::get_att(rule.name.clone(), "Arn")),
            )?;
        }
        Ok(())
    }
}

/// Policy statements letting a function create and write its log streams
fn basic_execution_statements(log_group: PropValue) -> PropValue {
    let mut arn_parts: Vec<PropValue> = vec![
        "arn:aws:logs:".into(),
        PropValue::Pseudo(PseudoParam::Region),
        ":".into(),
        PropValue::Pseudo(PseudoParam::AccountId),
        ":log-group:".into(),
        log_group,
    ];
    let log_group_arn = PropValue::join("", arn_parts.clone());
    arn_parts.push(":*".into());
    let log_stream_wild = PropValue::join("", arn_parts);

    PropValue::List(vec![PropValue::map([
        ("Effect", "Allow".into()),
        (
            "Action",
            PropValue::List(vec![
                "logs:CreateLogGroup".into(),
                "logs:CreateLogStream".into(),
                "logs:PutLogEvents".into(),
            ]),
        ),
        (
            "Resource",
            PropValue::List(vec![log_group_arn, log_stream_wild]),
        ),
    ])])
}

/// Trust policy allowing the compute service to assume the execution role
fn assume_role_policy() -> PropValue {
    PropValue::map([
        ("Version", "2012-10-17".into()),
        (
            "Statement",
            PropValue::List(vec![PropValue::map([
                ("Effect", "Allow".into()),
                (
                    "Principal",
                    PropValue::map([(
                        "Service",
                        PropValue::List(vec!["lambda.amazonaws.com".into()]),
                    )]),
                ),
                ("Action", PropValue::List(vec!["sts:AssumeRole".into()])),
            ])]),
        ),
    ])
}

fn code_properties(code: &FunctionCode) -> PropValue {
    let mut props = BTreeMap::new();
    if let Some(bucket) = &code.s3_bucket {
        props.insert("S3Bucket".to_string(), PropValue::from(bucket.clone()));
    }
    if let Some(key) = &code.s3_key {
        props.insert("S3Key".to_string(), PropValue::from(key.clone()));
    }
    if let Some(version) = &code.s3_object_version {
        props.insert("S3ObjectVersion".to_string(), PropValue::from(version.clone()));
    }
    if let Some(source) = &code.zip_file {
        props.insert("ZipFile".to_string(), PropValue::from(source.clone()));
    }
    PropValue::Map(props)
}

fn network_properties(fields: &BTreeMap<String, Value>) -> PropValue {
    let mut props = BTreeMap::new();
    for (key, value) in fields {
        let prop = match value {
            Value::String(s) => PropValue::from(s.clone()),
            Value::List(items) => PropValue::List(
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(PropValue::from)
                    .collect(),
            ),
            // The object schema admits only strings and string lists.
            _ => continue,
        };
        props.insert(key.clone(), prop);
    }
    PropValue::Map(props)
}
