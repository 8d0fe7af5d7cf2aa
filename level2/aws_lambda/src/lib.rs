use std::collections::BTreeMap;
use std::path::PathBuf;

use aws_cfn_stack::{
    get_att, get_ref, lambda_basic_execution_policy_arn, service_role, to_properties, verify_resource_name,
    CfnResource, PolicyStatement, Resource, StackError, StrVal,
};
use serde::Serialize;
use serde_json::Value;

pub mod package;

pub use package::{LambdaAsset, PackagedAsset};

pub const DEFAULT_RUNTIME: &str = "nodejs22.x";

/// runtimes CloudFormation still accepts for new functions.
pub const SUPPORTED_RUNTIMES: &[&str] = &[
    "nodejs20.x",
    "nodejs22.x",
    "python3.10",
    "python3.11",
    "python3.12",
    "python3.13",
    "java17",
    "java21",
    "dotnet8",
    "ruby3.3",
    "provided.al2",
    "provided.al2023",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Code {
    pub s3_bucket: StrVal,
    pub s3_key: StrVal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlineCode {
    pub zip_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FunctionCode {
    S3(Code),
    Inline(InlineCode),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Environment {
    pub variables: BTreeMap<String, StrVal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub runtime: String,
    pub handler: String,
    pub role: StrVal,
    pub code: FunctionCode,
    pub memory_size: u64,
    pub timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.handler.is_empty() {
            return Err("Must provide a handler, eg: index.handler".into());
        }
        if let FunctionCode::Inline(code) = &self.code {
            if code.zip_file.len() > 4096 {
                return Err("Inline function code must be at most 4096 characters".into());
            }
        }
        if let Some(env) = &self.environment {
            if let Some(bad) = env.variables.keys().find(|k| !is_valid_env_key(k)) {
                return Err(format!("Invalid environment variable name {:?}\nMust start with a letter and contain only letters, numbers, and underscores", bad));
            }
        }
        Ok(())
    }
}

fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnPermission {
    pub action: String,
    pub function_name: StrVal,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_arn: Option<StrVal>,
}

aws_cfn_stack::cfn_resource!(CfnPermission, "AWS::Lambda::Permission");

impl CfnPermission {
    /// lets `service` (eg: `apigateway.amazonaws.com`) invoke the function.
    pub fn invoke_from(function_logical_id: &str, service: &str, source_arn: Option<StrVal>) -> Self {
        Self {
            action: "lambda:InvokeFunction".to_string(),
            function_name: get_att(function_logical_id, "Arn").into(),
            principal: service.to_string(),
            source_arn,
        }
    }
}

pub struct Input {
    /// logical name of the function in the template. Must be alphanumeric, and up to 255 characters.
    pub resource_name: String,
    /// physical name of the function. Leave empty to let CloudFormation generate one.
    /// max 64 characters.
    pub function_name: String,

    /// the region this function will be deployed in. The artifact bucket must be in the same region.
    pub region: String,

    pub runtime: String,

    /// `file.export` entry point inside the asset, eg: `data.handler`
    pub handler: String,

    /// memory to give your function (in MB). Defaults to 128.
    /// Valid values: 128 - 10240
    pub memory_size: u64,

    /// timeout of your function (in seconds). Defaults to 30.
    /// Valid values: 1 - 900
    pub timeout: u32,

    pub environment: BTreeMap<String, StrVal>,

    /// directory that gets zipped and uploaded as the function code.
    pub asset_dir: PathBuf,

    /// added as an inline policy on the execution role, on top of basic logging permissions.
    pub extra_statements: Vec<PolicyStatement>,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            resource_name: String::new(),
            function_name: String::new(),
            region: "us-east-1".into(),
            runtime: DEFAULT_RUNTIME.into(),
            handler: "index.handler".into(),
            memory_size: 128,
            timeout: 30,
            environment: BTreeMap::new(),
            asset_dir: PathBuf::from("lambda"),
            extra_statements: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outputs {
    pub function_logical_id: String,
    pub role_logical_id: String,
    pub asset: LambdaAsset,
}

impl Input {
    pub fn is_valid(&self) -> Option<String> {
        if let Some(err_msg) = verify_resource_name(&self.resource_name) {
            return Some(err_msg);
        }
        if self.function_name.len() > 64 {
            return Some(format!("Invalid function name {:?}\nMust be at most 64 characters", self.function_name));
        }
        let region_err = aws_regions::verify_region(self.region.as_str());
        if region_err.is_some() {
            return region_err;
        }
        if !SUPPORTED_RUNTIMES.contains(&self.runtime.as_str()) {
            return Some(format!("Unsupported runtime {:?}\nMust be one of {:?}", self.runtime, SUPPORTED_RUNTIMES));
        }
        if self.memory_size < 128 || self.memory_size > 10240 {
            return Some(format!("Invalid memory size {:?}\nMust be between 128 and 10240", self.memory_size));
        }
        if self.timeout < 1 || self.timeout > 900 {
            return Some(format!("Invalid timeout {:?}\nMust be between 1 and 900", self.timeout));
        }
        None
    }

    pub fn role_logical_id(&self) -> String {
        format!("Role{}", self.resource_name)
    }
}

/// Declares the execution role and the function. Code comes from two template
/// parameters whose values are filled in when the packaged asset is uploaded.
pub fn config(lambda_input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, StackError> {
    if let Some(e) = lambda_input.is_valid() {
        return Err(StackError::validation(&lambda_input.resource_name, e));
    }
    let resource_name = &lambda_input.resource_name;
    let role_resource_name = lambda_input.role_logical_id();
    let bucket_param = format!("ArtifactBucket{resource_name}");
    let key_param = format!("ArtifactKey{resource_name}");

    let mut role = service_role(
        format!("execution role for {resource_name}"),
        "lambda.amazonaws.com",
        lambda_input.extra_statements.clone(),
        &format!("{resource_name}policy"),
    );
    role.managed_policy_arns.push(lambda_basic_execution_policy_arn());

    let function = CfnFunction {
        function_name: if lambda_input.function_name.is_empty() {
            None
        } else {
            Some(lambda_input.function_name.clone())
        },
        runtime: lambda_input.runtime.clone(),
        handler: lambda_input.handler.clone(),
        role: get_att(&role_resource_name, "Arn").into(),
        code: FunctionCode::S3(Code {
            s3_bucket: get_ref(&bucket_param).into(),
            s3_key: get_ref(&key_param).into(),
        }),
        memory_size: lambda_input.memory_size,
        timeout: lambda_input.timeout,
        environment: if lambda_input.environment.is_empty() {
            None
        } else {
            Some(Environment { variables: lambda_input.environment.clone() })
        },
    };

    stackinp.add_parameter(&bucket_param, format!("artifact bucket holding the code of {resource_name}"));
    stackinp.add_parameter(&key_param, format!("artifact key of the code of {resource_name}"));
    stackinp.push(Resource::new(&role_resource_name, role));
    stackinp.push(Resource::new(resource_name, function).depends_on(&role_resource_name));

    Ok(Outputs {
        function_logical_id: resource_name.clone(),
        role_logical_id: role_resource_name,
        asset: LambdaAsset {
            resource_name: resource_name.clone(),
            asset_dir: lambda_input.asset_dir.clone(),
            bucket_param,
            key_param,
        },
    })
}
