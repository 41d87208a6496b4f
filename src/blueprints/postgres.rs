//! Postgres database blueprint
//!
//! Provisions a subnet group, security group, and database instance
//! unconditionally, plus an internal CNAME record gated by a composite
//! condition over three optional zone inputs. The record and its output stay
//! in the graph either way; the guard condition decides render-time presence.

use crate::conditions::{CompositeOp, Predicate};
use crate::graph::{safe_logical_id, Output, PropValue, Resource, ResourceKind, TemplateGraph};
use crate::variables::{Schema, VarType, VariableSpec};
use crate::{Blueprint, BlueprintError, ResolvedVariables};

const CREATE_INTERNAL_HOSTNAME: &str = "CreateInternalHostname";

/// Blueprint for a Postgres database instance with optional internal DNS
#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    name: String,
}

impl PostgresDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn subnet_group_name(&self) -> String {
        format!("{}SubnetGroup", safe_logical_id(&self.name))
    }

    fn security_group_name(&self) -> String {
        format!("RdsSG{}", safe_logical_id(&self.name))
    }

    fn instance_name(&self) -> String {
        format!("PostgresRDS{}", safe_logical_id(&self.name))
    }

    fn create_conditions(&self, graph: &mut TemplateGraph) -> Result<(), BlueprintError> {
        graph.define_condition("HasInternalZone", Predicate::is_set("InternalZoneId"))?;
        graph.define_condition("HasInternalZoneName", Predicate::is_set("InternalZoneName"))?;
        graph.define_condition("HasInternalHostname", Predicate::is_set("InternalHostname"))?;
        graph.define_composite(
            CREATE_INTERNAL_HOSTNAME,
            CompositeOp::And,
            &["HasInternalZone", "HasInternalZoneName", "HasInternalHostname"],
        )?;
        Ok(())
    }

    fn create_subnet_group(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let subnets: Vec<PropValue> = variables
            .string_list("PrivateSubnets")
            .into_iter()
            .map(PropValue::from)
            .collect();
        graph.add_resource(
            Resource::new(self.subnet_group_name(), ResourceKind::DbSubnetGroup)
                .with_property(
                    "DBSubnetGroupDescription",
                    format!("{} VPC subnet group.", self.name),
                )
                .with_property("SubnetIds", subnets),
        )?;
        Ok(())
    }

    fn create_security_group(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let sg_name = self.security_group_name();
        graph.add_resource(
            Resource::new(&sg_name, ResourceKind::SecurityGroup)
                .with_property(
                    "GroupDescription",
                    format!("{} RDS security group", sg_name),
                )
                .with_property("VpcId", variables.string("VpcId")),
        )?;
        graph.add_output(Output::new("SecurityGroup", PropValue::reference(&sg_name)))?;
        Ok(())
    }

    fn create_database(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        let db_name = self.instance_name();
        graph.add_resource(
            Resource::new(&db_name, ResourceKind::DbInstance)
                .with_property("AllocatedStorage", variables.int("AllocatedStorage"))
                .with_property("AllowMajorVersionUpgrade", false)
                .with_property("AutoMinorVersionUpgrade", true)
                .with_property("BackupRetentionPeriod", 30)
                .with_property("DBName", variables.string("DBName"))
                .with_property("DBInstanceClass", variables.string("InstanceType"))
                .with_property(
                    "DBSubnetGroupName",
                    PropValue::reference(self.subnet_group_name()),
                )
                .with_property("Engine", "postgres")
                .with_property("EngineVersion", "9.3.14")
                .with_property("MasterUsername", variables.string("MasterUser"))
                .with_property("MasterUserPassword", variables.string("MasterUserPassword"))
                .with_property("MultiAZ", true)
                .with_property(
                    "PreferredBackupWindow",
                    variables.string("PreferredBackupWindow"),
                )
                .with_property(
                    "VPCSecurityGroups",
                    vec![PropValue::reference(self.security_group_name())],
                ),
        )?;

        let endpoint = PropValue::get_att(&db_name, "Endpoint.Address");

        // CNAME to the instance endpoint, rendered only when all three zone
        // inputs are present.
        let record_name = format!("{}DnsRecord", db_name);
        graph.add_resource(
            Resource::new(&record_name, ResourceKind::RecordSet)
                .with_condition(CREATE_INTERNAL_HOSTNAME)
                .with_property("HostedZoneId", variables.string("InternalZoneId"))
                .with_property("Comment", "RDS DB CNAME Record")
                .with_property(
                    "Name",
                    PropValue::join(
                        ".",
                        vec![
                            variables.string("InternalHostname").into(),
                            variables.string("InternalZoneName").into(),
                        ],
                    ),
                )
                .with_property("Type", "CNAME")
                .with_property("TTL", "120")
                .with_property("ResourceRecords", vec![endpoint.clone()]),
        )?;

        graph.add_output(Output::new("DBAddress", endpoint))?;
        graph.add_output(
            Output::new("DBCname", PropValue::reference(&record_name))
                .with_condition(CREATE_INTERNAL_HOSTNAME),
        )?;
        Ok(())
    }
}

impl Blueprint for PostgresDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .declare("VpcId", VariableSpec::required(VarType::VpcId, "Vpc Id."))
            .declare(
                "PrivateSubnets",
                VariableSpec::required(
                    VarType::SubnetIdList,
                    "Subnets to deploy private instances in.",
                ),
            )
            .declare(
                "InstanceType",
                VariableSpec::optional(VarType::String, "RDS instance type.", "db.m3.large"),
            )
            .declare(
                "AllocatedStorage",
                VariableSpec::optional(
                    VarType::Int,
                    "Space, in GB, to allocate to the instance.",
                    10,
                ),
            )
            .declare(
                "MasterUser",
                VariableSpec::optional(
                    VarType::String,
                    "Name of the master user in the db.",
                    "dbuser",
                ),
            )
            .declare(
                "MasterUserPassword",
                VariableSpec::required(VarType::String, "Master user password."),
            )
            .declare(
                "PreferredBackupWindow",
                VariableSpec::optional(
                    VarType::String,
                    "A (minimum 30 minute) window in HH:MM-HH:MM format in UTC for backups.",
                    "11:00-12:00",
                ),
            )
            .declare(
                "DBName",
                VariableSpec::required(VarType::String, "Initial db to create in the database."),
            )
            .declare(
                "InternalZoneId",
                VariableSpec::optional(VarType::String, "Internal zone Id, if you have one.", ""),
            )
            .declare(
                "InternalZoneName",
                VariableSpec::optional(VarType::String, "Internal zone name, if you have one.", ""),
            )
            .declare(
                "InternalHostname",
                VariableSpec::optional(
                    VarType::String,
                    "Internal domain name, if you have one.",
                    "",
                ),
            )
    }

    fn assemble(
        &self,
        variables: &ResolvedVariables,
        graph: &mut TemplateGraph,
    ) -> Result<(), BlueprintError> {
        self.create_conditions(graph)?;
        self.create_subnet_group(variables, graph)?;
        self.create_security_group(variables, graph)?;
        self.create_database(variables, graph)?;
        Ok(())
    }
}
