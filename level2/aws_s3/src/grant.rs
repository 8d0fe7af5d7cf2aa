//! Read grants on a bucket, either as identity statements for a role or as
//! resource statements collected into the bucket policy.

use aws_cfn_stack::{get_att, PolicyStatement, Resource, StrVal};
use serde_json::Value;

use crate::{CfnBucketPolicy, Outputs};

pub const READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

fn bucket_resources(bucket: &Outputs) -> Vec<StrVal> {
    vec![bucket.arn().into(), bucket.objects_arn().into()]
}

/// statements to attach to a role so it can read `bucket`. An encrypted
/// bucket also needs `kms:Decrypt` on its key.
pub fn read_statements(bucket: &Outputs) -> Vec<PolicyStatement> {
    let mut statements = vec![PolicyStatement::allow(READ_ACTIONS, bucket_resources(bucket))];
    if let Some(key) = &bucket.encryption_key {
        statements.push(PolicyStatement::allow(&["kms:Decrypt"], vec![get_att(key, "Arn").into()]));
    }
    statements
}

/// Collects grants for one bucket and emits a single `AWS::S3::BucketPolicy`.
#[derive(Debug, Clone)]
pub struct BucketPolicyBuilder {
    bucket: Outputs,
    statements: Vec<PolicyStatement>,
}

impl BucketPolicyBuilder {
    pub fn new(bucket: &Outputs) -> Self {
        Self {
            bucket: bucket.clone(),
            statements: vec![],
        }
    }

    pub fn grant_read(mut self, principal: Value) -> Self {
        let statement = PolicyStatement::allow(READ_ACTIONS, bucket_resources(&self.bucket)).with_principal(principal);
        self.statements.push(statement);
        self
    }

    pub fn logical_id(&self) -> String {
        format!("{}Policy", self.bucket.logical_bucket_name)
    }

    /// nothing is declared when no grant was added.
    pub fn config(self, stackinp: &mut aws_cfn_stack::Input) -> Option<String> {
        if self.statements.is_empty() {
            return None;
        }
        let logical_id = self.logical_id();
        let policy = CfnBucketPolicy {
            bucket: self.bucket.name().into(),
            policy_document: aws_cfn_stack::create_policy_doc(self.statements),
        };
        stackinp.push(Resource::new(&logical_id, policy));
        Some(logical_id)
    }
}
