use aws_cfn_stack::{get_att, get_ref, sub, to_properties, CfnResource, DeletionPolicy, Resource, StackError, StrVal};
use serde::Serialize;
use serde_json::Value;

pub mod cleanup;
pub mod deployment;
pub mod grant;
pub mod kms;

pub use deployment::{AssetSource, BucketDeployment, SyncReport};
pub use grant::BucketPolicyBuilder;

#[derive(Debug, Clone, Serialize)]
pub struct ServerSideEncryptionByDefault {
    #[serde(rename = "SSEAlgorithm")]
    pub sse_algorithm: String,
    #[serde(rename = "KMSMasterKeyID", skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<StrVal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSideEncryptionRule {
    pub server_side_encryption_by_default: ServerSideEncryptionByDefault,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketEncryption {
    pub server_side_encryption_configuration: Vec<ServerSideEncryptionRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectOwnership {
    BucketOwnerEnforced,
    BucketOwnerPreferred,
    ObjectWriter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OwnershipControlsRule {
    pub object_ownership: ObjectOwnership,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OwnershipControls {
    pub rules: Vec<OwnershipControlsRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebsiteConfiguration {
    pub index_document: String,
    pub error_document: String,
}

impl Default for WebsiteConfiguration {
    fn default() -> Self {
        Self {
            index_document: "index.html".into(),
            error_document: "error.html".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<StrVal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_encryption: Option<BucketEncryption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_controls: Option<OwnershipControls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        match self.bucket_name.as_ref().and_then(StrVal::as_str) {
            Some(name) => verify_bucket_name(name).map_or(Ok(()), Err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucketPolicy {
    pub bucket: StrVal,
    pub policy_document: aws_cfn_stack::PolicyDocument,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.policy_document.statements.is_empty() {
            return Err("Bucket policy must have at least one statement".into());
        }
        if self.policy_document.statements.iter().any(|s| s.principal.is_none()) {
            return Err("Every bucket policy statement needs a principal".into());
        }
        Ok(())
    }
}

pub fn verify_bucket_name(bucket_name: &str) -> Option<String> {
    if bucket_name.len() > 63 || bucket_name.len() < 3 {
        return Some(format!("Invalid bucket name {:?}\nMust be between 3 and 63 characters", bucket_name));
    }
    let valid_char_check = |c: char| -> bool { c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' };
    if !bucket_name.chars().all(valid_char_check) {
        return Some(format!("Invalid bucket name {:?}\nMay only contain lowercase letters, numbers, dots, and dashes", bucket_name));
    }
    let first_ok = bucket_name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let last_ok = bucket_name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if !first_ok || !last_ok {
        return Some(format!("Invalid bucket name {:?}\nFirst and last character must be either lowercase letter, or number", bucket_name));
    }
    if bucket_name.contains("..") {
        return Some(format!("Invalid bucket name {:?}\nMay not contain two consecutive dots", bucket_name));
    }
    None
}

/// Declares one S3 bucket. Encryption, public access, ownership and website
/// hosting are opt-in. A bucket with [`DeletionPolicy::Delete`] also gets a
/// cleanup resource (see [`cleanup`]) so that deleting the stack empties the
/// bucket first; without it CloudFormation cannot delete a non-empty bucket.
pub struct Input {
    /// logical name of the bucket in the template.
    pub logical_name: String,
    /// physical bucket name. Leave empty to let CloudFormation generate one.
    pub bucket_name: String,
    /// logical id of a KMS key declared with [`kms::config`]. When set objects are
    /// encrypted with SSE-KMS using that key, otherwise S3 managed keys are used.
    pub encryption_key: Option<String>,
    pub block_public_access: bool,
    pub object_ownership: Option<ObjectOwnership>,
    /// turns on website hosting. Note that this does not make the bucket public,
    /// pair it with a distribution and an origin access identity.
    pub website: Option<WebsiteConfiguration>,
    /// what CloudFormation does with the bucket when it leaves the stack. Defaults to Retain.
    pub removal_policy: DeletionPolicy,
    /// only meaningful with [`DeletionPolicy::Delete`]. Set to true to skip the
    /// cleanup custom resource, lambda function and role.
    pub dont_create_cleanup_resources: bool,
    /// Node.js runtime of the cleanup function.
    pub cleanup_runtime: String,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_name: String::new(),
            bucket_name: String::new(),
            encryption_key: None,
            block_public_access: false,
            object_ownership: None,
            website: None,
            removal_policy: DeletionPolicy::Retain,
            dont_create_cleanup_resources: false,
            cleanup_runtime: aws_lambda::DEFAULT_RUNTIME.to_string(),
        }
    }
}

/// References to a declared bucket for other resources to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    pub logical_bucket_name: String,
    pub encryption_key: Option<String>,
}

impl Outputs {
    /// the physical bucket name.
    pub fn name(&self) -> Value {
        get_ref(&self.logical_bucket_name)
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_bucket_name, "Arn")
    }

    /// `arn:...:bucket/*`
    pub fn objects_arn(&self) -> Value {
        sub(format!("${{{}.Arn}}/*", self.logical_bucket_name))
    }

    pub fn regional_domain_name(&self) -> Value {
        get_att(&self.logical_bucket_name, "RegionalDomainName")
    }
}

pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, StackError> {
    let logical_bucket_name = myinput.logical_name.clone();
    let mut bucket = CfnBucket {
        bucket_name: if myinput.bucket_name.is_empty() {
            None
        } else {
            Some(myinput.bucket_name.clone().into())
        },
        website_configuration: myinput.website.clone(),
        ..Default::default()
    };
    if let Some(key) = &myinput.encryption_key {
        if !stackinp.contains(key) {
            return Err(StackError::DanglingReference { resource: logical_bucket_name, target: key.clone() });
        }
        bucket.bucket_encryption = Some(BucketEncryption {
            server_side_encryption_configuration: vec![ServerSideEncryptionRule {
                server_side_encryption_by_default: ServerSideEncryptionByDefault {
                    sse_algorithm: "aws:kms".into(),
                    kms_master_key_id: Some(get_att(key, "Arn").into()),
                },
            }],
        });
    }
    if myinput.block_public_access {
        bucket.public_access_block_configuration = Some(PublicAccessBlockConfiguration::block_all());
    }
    if let Some(object_ownership) = myinput.object_ownership {
        bucket.ownership_controls = Some(OwnershipControls {
            rules: vec![OwnershipControlsRule { object_ownership }],
        });
    }
    stackinp.push(Resource::new(&logical_bucket_name, bucket).removal_policy(myinput.removal_policy));

    let outputs = Outputs {
        logical_bucket_name,
        encryption_key: myinput.encryption_key.clone(),
    };
    if myinput.removal_policy == DeletionPolicy::Delete && !myinput.dont_create_cleanup_resources {
        cleanup::config(&outputs, &myinput.cleanup_runtime, stackinp);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::validate_resources_to_template;
    use serde_json::json;

    #[test]
    fn bucket_names() {
        assert!(verify_bucket_name("my-data-bucket").is_none());
        assert!(verify_bucket_name("blog.example.com").is_none());
        assert!(verify_bucket_name("ab").unwrap().contains("Must be between 3 and 63 characters"));
        assert!(verify_bucket_name("Upper").unwrap().contains("lowercase"));
        assert!(verify_bucket_name("something..exact").unwrap().contains("May not contain two consecutive dots"));
        assert!(verify_bucket_name("-dash").unwrap().contains("First and last"));
    }

    #[test]
    fn encrypted_private_bucket() {
        let mut stack = aws_cfn_stack::Input::default();
        let key = kms::config("DataBucketKmsKey", "data bucket key", &mut stack);
        let input = Input {
            logical_name: "DataBucket".into(),
            bucket_name: "my-data-bucket".into(),
            encryption_key: Some(key),
            block_public_access: true,
            object_ownership: Some(ObjectOwnership::BucketOwnerEnforced),
            removal_policy: DeletionPolicy::Delete,
            dont_create_cleanup_resources: true,
            ..Default::default()
        };
        let outputs = config(&input, &mut stack).unwrap();
        let template = validate_resources_to_template(&stack).unwrap();
        let bucket = &template.resources["DataBucket"];
        assert_eq!(bucket.deletion_policy, Some(DeletionPolicy::Delete));
        assert_eq!(bucket.properties["BucketName"], json!("my-data-bucket"));
        assert_eq!(
            bucket.properties["BucketEncryption"]["ServerSideEncryptionConfiguration"][0]["ServerSideEncryptionByDefault"],
            json!({ "SSEAlgorithm": "aws:kms", "KMSMasterKeyID": { "Fn::GetAtt": ["DataBucketKmsKey", "Arn"] } })
        );
        assert_eq!(bucket.properties["PublicAccessBlockConfiguration"]["RestrictPublicBuckets"], json!(true));
        assert_eq!(bucket.properties["OwnershipControls"]["Rules"][0]["ObjectOwnership"], json!("BucketOwnerEnforced"));
        assert_eq!(outputs.objects_arn(), json!({ "Fn::Sub": "${DataBucket.Arn}/*" }));
        // cleanup disabled: key + bucket only
        assert_eq!(template.resources.len(), 2);
    }

    #[test]
    fn missing_key_is_an_error() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = Input {
            logical_name: "DataBucket".into(),
            encryption_key: Some("NoSuchKey".into()),
            ..Default::default()
        };
        assert!(matches!(config(&input, &mut stack), Err(StackError::DanglingReference { .. })));
    }

    #[test]
    fn delete_policy_adds_cleanup_by_default() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = Input {
            logical_name: "SiteBucket".into(),
            bucket_name: "blog.example.com".into(),
            website: Some(WebsiteConfiguration::default()),
            removal_policy: DeletionPolicy::Delete,
            ..Default::default()
        };
        config(&input, &mut stack).unwrap();
        let template = validate_resources_to_template(&stack).unwrap();
        assert_eq!(template.resources_of_type("AWS::S3::Bucket").count(), 1);
        assert_eq!(template.resources_of_type(cleanup::CLEANUP_RESOURCE_TYPE).count(), 1);
        assert_eq!(
            template.resources["SiteBucket"].properties["WebsiteConfiguration"],
            json!({ "IndexDocument": "index.html", "ErrorDocument": "error.html" })
        );
    }

    #[test]
    fn retained_bucket_has_no_cleanup() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = Input { logical_name: "Keep".into(), ..Default::default() };
        config(&input, &mut stack).unwrap();
        assert_eq!(stack.resources.len(), 1);
        assert!(stack.resources[0].properties.properties().unwrap().get("BucketName").is_none());
    }
}
