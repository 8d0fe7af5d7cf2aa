//! Empties a bucket when its stack is deleted.
//!
//! CloudFormation refuses to delete a bucket that still holds objects, so a
//! bucket with a `Delete` policy gets a custom resource backed by a small
//! inline function. On the `Delete` request it lists and removes every object
//! before answering, which lets the bucket deletion that follows succeed.

use aws_cfn_stack::{
    get_att, get_ref, lambda_basic_execution_policy_arn, service_role, to_properties, CfnResource, PolicyStatement,
    Resource, StrVal,
};
use aws_lambda::{CfnFunction, FunctionCode, InlineCode};
use serde::Serialize;
use serde_json::Value;

use crate::Outputs;

pub const CLEANUP_RESOURCE_TYPE: &str = "Custom::CleanupBucket";

const CLEANUP_HANDLER: &str = r#"const { S3Client, ListObjectsV2Command, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(bucket) {
  let token;
  do {
    const page = await s3.send(new ListObjectsV2Command({ Bucket: bucket, ContinuationToken: token }));
    const objects = (page.Contents || []).map((o) => ({ Key: o.Key }));
    if (objects.length > 0) {
      await s3.send(new DeleteObjectsCommand({ Bucket: bucket, Delete: { Objects: objects, Quiet: true } }));
    }
    token = page.IsTruncated ? page.NextContinuationToken : undefined;
  } while (token);
}
exports.handler = async function (event, context) {
  let status = response.SUCCESS;
  if (event.RequestType === 'Delete') {
    try {
      await emptyBucket(event.ResourceProperties.BucketName);
    } catch (err) {
      console.log(err);
      status = response.FAILED;
    }
  }
  await response.send(event, context, status);
};
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CleanupResource {
    pub service_token: StrVal,
    pub bucket_name: StrVal,
}

impl CfnResource for CleanupResource {
    fn type_string(&self) -> &'static str {
        CLEANUP_RESOURCE_TYPE
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
}

pub fn cleanup_logical_ids(logical_bucket_name: &str) -> (String, String, String) {
    (
        format!("CleanupRole{logical_bucket_name}"),
        format!("CleanupFunction{logical_bucket_name}"),
        format!("Cleanup{logical_bucket_name}"),
    )
}

/// the runtime the cleanup function runs on, given the one configured for the
/// stack's own functions. Non Node.js runtimes fall back to the default.
pub fn runtime_for(configured: &str) -> &str {
    if configured.starts_with("nodejs") && aws_lambda::SUPPORTED_RUNTIMES.contains(&configured) {
        configured
    } else {
        aws_lambda::DEFAULT_RUNTIME
    }
}

/// declares the role, function and custom resource that empty `bucket` on delete.
/// `runtime` must be a Node.js runtime, the handler is inline JavaScript.
pub fn config(bucket: &Outputs, runtime: &str, stackinp: &mut aws_cfn_stack::Input) {
    let logical_bucket_name = &bucket.logical_bucket_name;
    let (role_name, function_name, cleanup_name) = cleanup_logical_ids(logical_bucket_name);

    let statements = vec![
        PolicyStatement::allow(&["s3:ListBucket"], vec![bucket.arn().into()]),
        PolicyStatement::allow(&["s3:DeleteObject"], vec![bucket.objects_arn().into()]),
    ];
    let mut role = service_role(
        format!("empties {logical_bucket_name} before it is deleted"),
        "lambda.amazonaws.com",
        statements,
        &format!("cleanup{logical_bucket_name}"),
    );
    role.managed_policy_arns.push(lambda_basic_execution_policy_arn());

    let function = CfnFunction {
        function_name: None,
        runtime: runtime.to_string(),
        handler: "index.handler".to_string(),
        role: get_att(&role_name, "Arn").into(),
        code: FunctionCode::Inline(InlineCode { zip_file: CLEANUP_HANDLER.to_string() }),
        memory_size: 128,
        timeout: 300,
        environment: None,
    };
    let cleanup = CleanupResource {
        service_token: get_att(&function_name, "Arn").into(),
        bucket_name: get_ref(logical_bucket_name).into(),
    };

    stackinp.push(Resource::new(&role_name, role));
    stackinp.push(Resource::new(&function_name, function).depends_on(&role_name));
    stackinp.push(Resource::new(cleanup_name, cleanup));
}
