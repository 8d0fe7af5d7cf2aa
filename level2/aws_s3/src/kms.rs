//! Customer managed KMS keys for bucket encryption.

use aws_cfn_stack::{account_root_principal, create_policy_doc, DeletionPolicy, PolicyDocument, PolicyStatement, Resource};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enable_key_rotation: bool,
    pub key_policy: PolicyDocument,
}

aws_cfn_stack::cfn_resource!(CfnKey, "AWS::KMS::Key");

/// the account root gets `kms:*`, so IAM policies in the account decide who
/// else may use the key.
pub fn default_key_policy() -> PolicyDocument {
    create_policy_doc(vec![
        PolicyStatement::allow(&["kms:*"], vec!["*".into()]).with_principal(account_root_principal()),
    ])
}

/// Declares a key and returns its logical id. Keys are retained when the
/// stack goes away, since data encrypted with a deleted key is unrecoverable.
pub fn config(logical_name: &str, description: &str, stackinp: &mut aws_cfn_stack::Input) -> String {
    let key = CfnKey {
        description: if description.is_empty() { None } else { Some(description.to_string()) },
        enable_key_rotation: false,
        key_policy: default_key_policy(),
    };
    stackinp.push(Resource::new(logical_name, key).removal_policy(DeletionPolicy::Retain));
    logical_name.to_string()
}
