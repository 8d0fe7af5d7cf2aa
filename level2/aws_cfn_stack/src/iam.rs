//! IAM roles and policy documents, used by roles, bucket policies and key policies.

use serde::Serialize;
use serde_json::{json, Value};

use crate::intrinsics::{sub, StrVal};
use crate::CfnResource;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<StrVal>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<StrVal>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.iter().map(|a| a.to_string()).collect(),
            resource: resources,
        }
    }

    pub fn with_principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }
}

pub fn create_policy_doc(statements: Vec<PolicyStatement>) -> PolicyDocument {
    PolicyDocument {
        statements,
        ..Default::default()
    }
}

/// trust policy letting `service` (eg: `lambda.amazonaws.com`) assume a role.
pub fn create_assume_role_policy_doc(service: &str) -> PolicyDocument {
    create_policy_doc(vec![
        PolicyStatement::allow(&["sts:AssumeRole"], vec![]).with_principal(service_principal(service)),
    ])
}

pub fn service_principal(service: &str) -> Value {
    json!({ "Service": service })
}

/// the root of the account the stack is deployed into.
pub fn account_root_principal() -> Value {
    json!({ "AWS": sub("arn:${AWS::Partition}:iam::${AWS::AccountId}:root") })
}

pub fn canonical_user_principal(canonical_user_id: Value) -> Value {
    json!({ "CanonicalUser": canonical_user_id })
}

/// an inline policy attached to a role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<StrVal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        crate::to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.assume_role_policy_document.statements.is_empty() {
            return Err("Role must have at least one trust statement".into());
        }
        if let Some(p) = self.policies.iter().find(|p| p.policy_name.is_empty() || p.policy_name.len() > 128) {
            return Err(format!("Invalid inline policy name {:?}\nMust be between 1 and 128 characters", p.policy_name));
        }
        if let Some(p) = self.policies.iter().find(|p| p.policy_document.statements.is_empty()) {
            return Err(format!("Inline policy {:?} has no statements", p.policy_name));
        }
        Ok(())
    }
}

/// a role `service` can assume, with the given inline statements.
pub fn service_role(description: impl Into<String>, service: &str, statements: Vec<PolicyStatement>, policy_name: &str) -> CfnRole {
    let policies = if statements.is_empty() {
        vec![]
    } else {
        vec![Policy {
            policy_name: policy_name.to_string(),
            policy_document: create_policy_doc(statements),
        }]
    };
    CfnRole {
        description: Some(description.into()),
        assume_role_policy_document: create_assume_role_policy_doc(service),
        policies,
        ..Default::default()
    }
}

pub fn lambda_basic_execution_policy_arn() -> StrVal {
    sub("arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole").into()
}
