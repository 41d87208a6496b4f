//! Integration tests for the compute function blueprints

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use stacksmith::blueprints::{Function, FunctionScheduler};
use stacksmith::variables::{EventRule, FunctionCode, RuleTarget, Value};
use stacksmith::{render, BlueprintError, GraphError, PropValue, ResourceKind};

fn base_values() -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    values.insert(
        "Code".to_string(),
        Value::Code(FunctionCode::s3("artifacts", "app.zip")),
    );
    values.insert("Runtime".to_string(), Value::from("python3.11"));
    values
}

#[test]
fn test_owned_role_is_constructed_and_wired() {
    let template = render(&Function::new("app"), base_values()).expect("Should render");

    let roles: Vec<_> = template
        .resources
        .iter()
        .filter(|r| r.kind == ResourceKind::IamRole)
        .collect();
    let policies: Vec<_> = template
        .resources
        .iter()
        .filter(|r| r.kind == ResourceKind::IamPolicy)
        .collect();
    assert_eq!(roles.len(), 1);
    assert_eq!(policies.len(), 1);

    // The function runs as the generated role's ARN.
    let function = template.resource("Function").expect("Function resource");
    assert_eq!(
        function.property("Role"),
        Some(&PropValue::get_att("Role", "Arn"))
    );

    // The policy attaches to the generated role.
    assert_eq!(
        policies[0].property("Roles"),
        Some(&PropValue::List(vec![PropValue::reference("Role")]))
    );

    assert!(template.output("RoleArn").is_some());
    assert!(template.output("PolicyName").is_some());
}

#[test]
fn test_supplied_role_elides_role_and_policy() {
    let arn = "arn:aws:iam::123456789012:role/service";
    let mut values = base_values();
    values.insert("Role".to_string(), Value::from(arn));

    let template = render(&Function::new("app"), values).expect("Should render");

    // Construction-time elision: the skipped resources never enter the graph.
    assert!(template.resource("Role").is_none());
    assert!(template.resource("Policy").is_none());
    assert!(template.output("RoleArn").is_none());
    assert!(template.output("PolicyName").is_none());

    let function = template.resource("Function").expect("Function resource");
    assert_eq!(function.property("Role"), Some(&PropValue::from(arn)));
}

#[test]
fn test_empty_optional_properties_are_elided() {
    let template = render(&Function::new("app"), base_values()).expect("Should render");
    let function = template.resource("Function").expect("Function resource");

    assert!(function.property("DeadLetterConfig").is_none());
    assert!(function.property("Description").is_none());
    assert!(function.property("Environment").is_none());
    assert!(function.property("KmsKeyArn").is_none());
    assert!(function.property("VpcConfig").is_none());

    // Defaults still apply to the always-present properties.
    assert_eq!(function.property("Handler"), Some(&PropValue::from("handler")));
    assert_eq!(function.property("MemorySize"), Some(&PropValue::Int(128)));
    assert_eq!(function.property("Timeout"), Some(&PropValue::Int(3)));
}

#[test]
fn test_optional_properties_present_when_supplied() {
    let mut values = base_values();
    values.insert(
        "DeadLetterArn".to_string(),
        Value::from("arn:aws:sqs:us-east-1:123456789012:dlq"),
    );
    values.insert("Description".to_string(), Value::from("nightly batch"));
    let mut environment = BTreeMap::new();
    environment.insert("STAGE".to_string(), "prod".to_string());
    values.insert("Environment".to_string(), Value::Map(environment));

    let template = render(&Function::new("app"), values).expect("Should render");
    let function = template.resource("Function").expect("Function resource");

    assert_eq!(
        function.property("DeadLetterConfig"),
        Some(&PropValue::map([(
            "TargetArn",
            PropValue::from("arn:aws:sqs:us-east-1:123456789012:dlq"),
        )]))
    );
    assert_eq!(
        function.property("Description"),
        Some(&PropValue::from("nightly batch"))
    );
    assert!(function.property("Environment").is_some());
}

#[test]
fn test_alias_gated_on_alias_name() {
    let without = render(&Function::new("app"), base_values()).expect("Should render");
    assert!(without.resource("Alias").is_none());
    assert!(without.output("AliasArn").is_none());

    let mut values = base_values();
    values.insert("AliasName".to_string(), Value::from("live"));
    let with = render(&Function::new("app"), values).expect("Should render");
    let alias = with.resource("Alias").expect("Alias resource");
    assert_eq!(alias.property("Name"), Some(&PropValue::from("live")));
    assert_eq!(
        alias.property("FunctionVersion"),
        Some(&PropValue::from("$LATEST"))
    );
    assert!(with.output("AliasArn").is_some());
}

#[test]
fn test_version_resource_and_outputs() {
    let template = render(&Function::new("app"), base_values()).expect("Should render");
    let version = template.resource("LatestVersion").expect("Version resource");
    assert_eq!(version.kind, ResourceKind::LambdaVersion);
    assert_eq!(
        version.property("FunctionName"),
        Some(&PropValue::reference("Function"))
    );
    assert_eq!(
        template.output("LatestVersionArn").map(|o| &o.value),
        Some(&PropValue::get_att("LatestVersion", "Version"))
    );
}

#[test]
fn test_owned_role_render_summary() {
    let template = render(&Function::new("app"), base_values()).expect("Should render");
    insta::assert_snapshot!(template.summary().trim_end(), @r###"
    resource Role AWS::IAM::Role
    resource Policy AWS::IAM::Policy
    resource Function AWS::Lambda::Function
    resource LatestVersion AWS::Lambda::Version
    output RoleName
    output RoleArn
    output PolicyName
    output FunctionName
    output FunctionArn
    output LatestVersion
    output LatestVersionArn
    "###);
}

fn scheduler_values(rule: EventRule) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    values.insert("CloudwatchEventsRule".to_string(), Value::Rule(rule));
    values
}

#[test]
fn test_scheduler_fans_out_permissions_per_lambda_target() {
    let rule = EventRule::new("NightlyRule", "rate(1 day)")
        .with_target(RuleTarget::new(
            "nightly-job",
            "arn:aws:lambda:us-east-1:123456789012:function:job",
        ))
        .with_target(RuleTarget::new(
            "notify",
            "arn:aws:sns:us-east-1:123456789012:alerts",
        ))
        .with_target(RuleTarget::new(
            "weekly-report",
            "arn:aws:lambda:us-east-1:123456789012:function:report",
        ));

    let template =
        render(&FunctionScheduler::new("cron"), scheduler_values(rule)).expect("Should render");

    // Rule first, then one permission per lambda target in target-list order.
    let names: Vec<&str> = template.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "NightlyRule",
            "PermToInvokeFunctionForNightlyJob",
            "PermToInvokeFunctionForWeeklyReport",
        ]
    );

    let permission = template
        .resource("PermToInvokeFunctionForNightlyJob")
        .expect("permission resource");
    assert_eq!(permission.kind, ResourceKind::LambdaPermission);
    assert_eq!(
        permission.property("FunctionName"),
        Some(&PropValue::from(
            "arn:aws:lambda:us-east-1:123456789012:function:job"
        ))
    );
    assert_eq!(
        permission.property("SourceArn"),
        Some(&PropValue::get_att("NightlyRule", "Arn"))
    );
}

#[test]
fn test_scheduler_colliding_sanitized_ids_fail() {
    // Distinct raw ids that sanitize to the same logical id must not be
    // silently merged.
    let rule = EventRule::new("NightlyRule", "rate(1 day)")
        .with_target(RuleTarget::new(
            "nightly-job",
            "arn:aws:lambda:us-east-1:123456789012:function:a",
        ))
        .with_target(RuleTarget::new(
            "nightly.job",
            "arn:aws:lambda:us-east-1:123456789012:function:b",
        ));

    let err = render(&FunctionScheduler::new("cron"), scheduler_values(rule)).unwrap_err();
    match err {
        BlueprintError::Graph(GraphError::DuplicateResourceName { name }) => {
            assert_eq!(name, "PermToInvokeFunctionForNightlyJob");
        }
        other => panic!("expected DuplicateResourceName, got {:?}", other),
    }
}

#[test]
fn test_scheduler_rule_carries_all_targets() {
    let rule = EventRule::new("NightlyRule", "rate(1 day)")
        .with_description("nightly batch kick-off")
        .with_target(RuleTarget::new(
            "nightly-job",
            "arn:aws:lambda:us-east-1:123456789012:function:job",
        ))
        .with_target(RuleTarget::new(
            "notify",
            "arn:aws:sns:us-east-1:123456789012:alerts",
        ));

    let template =
        render(&FunctionScheduler::new("cron"), scheduler_values(rule)).expect("Should render");
    let resource = template.resource("NightlyRule").expect("rule resource");
    assert_eq!(resource.kind, ResourceKind::EventsRule);
    // Permission fan-out filters targets, the rule itself keeps every one.
    match resource.property("Targets") {
        Some(PropValue::List(items)) => assert_eq!(items.len(), 2),
        other => panic!("expected target list, got {:?}", other),
    }
}
