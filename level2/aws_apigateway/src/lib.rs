//! A REST API that proxies every request to one Lambda function.
//!
//! `ANY` is mapped on `/` and on a `{proxy+}` resource, both with an
//! `AWS_PROXY` integration, so the function sees every path and method. The
//! deployment's logical id carries a checksum of the method definitions:
//! API Gateway only publishes changes through a new deployment, and a new
//! logical id is how CloudFormation is told to create one.

use aws_cfn_stack::{get_att, get_ref, join, sub, to_properties, CfnResource, Resource, StackError, StrVal, REGION, URL_SUFFIX};
use aws_lambda::CfnPermission;
use serde::Serialize;
use serde_json::{json, Value};

pub mod domain;

pub use domain::{DomainInput, DomainOutputs};

pub const DEFAULT_STAGE: &str = "prod";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfiguration {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRestApi {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endpoint_configuration: EndpointConfiguration,
}

impl CfnResource for CfnRestApi {
    fn type_string(&self) -> &'static str {
        "AWS::ApiGateway::RestApi"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Rest API must have a name".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnApiResource {
    pub parent_id: StrVal,
    pub path_part: String,
    pub rest_api_id: StrVal,
}

aws_cfn_stack::cfn_resource!(CfnApiResource, "AWS::ApiGateway::Resource");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Integration {
    #[serde(rename = "Type")]
    pub integration_type: String,
    pub integration_http_method: String,
    pub uri: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnMethod {
    pub http_method: String,
    pub resource_id: StrVal,
    pub rest_api_id: StrVal,
    pub authorization_type: String,
    pub integration: Integration,
}

impl CfnResource for CfnMethod {
    fn type_string(&self) -> &'static str {
        "AWS::ApiGateway::Method"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        let valid = ["ANY", "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];
        if !valid.contains(&self.http_method.as_str()) {
            return Err(format!("Invalid http method {:?}", self.http_method));
        }
        if self.integration.integration_type == "AWS_PROXY" && self.integration.integration_http_method != "POST" {
            return Err("Lambda proxy integrations must call the function with POST".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDeployment {
    pub rest_api_id: StrVal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

aws_cfn_stack::cfn_resource!(CfnDeployment, "AWS::ApiGateway::Deployment");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnStage {
    pub rest_api_id: StrVal,
    pub deployment_id: StrVal,
    pub stage_name: String,
}

impl CfnResource for CfnStage {
    fn type_string(&self) -> &'static str {
        "AWS::ApiGateway::Stage"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        let valid = !self.stage_name.is_empty() && self.stage_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(format!("Invalid stage name {:?}\nMay only contain letters, numbers, underscores, and dashes", self.stage_name));
        }
        Ok(())
    }
}

/// `arn:...:apigateway:region:lambda:path/.../functions/<fn arn>/invocations`
pub fn lambda_integration_uri(function_logical_id: &str) -> Value {
    sub(format!(
        "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{function_logical_id}.Arn}}/invocations"
    ))
}

pub struct Input {
    pub logical_name: String,
    /// name shown in the console. Defaults to the logical name when empty.
    pub api_name: String,
    /// the function every request is proxied to. Must already be declared.
    pub function: aws_lambda::Outputs,
    pub stage_name: String,
}

impl Input {
    pub fn new(logical_name: &str, function: &aws_lambda::Outputs) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            api_name: String::new(),
            function: function.clone(),
            stage_name: DEFAULT_STAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    pub logical_api_name: String,
    pub logical_stage_name: String,
    pub logical_deployment_name: String,
    pub stage_name: String,
}

impl Outputs {
    pub fn rest_api_id(&self) -> Value {
        get_ref(&self.logical_api_name)
    }

    /// `https://{api}.execute-api.{region}.{suffix}/{stage}/`
    pub fn url(&self) -> Value {
        join(
            "",
            vec![
                json!("https://"),
                get_ref(&self.logical_api_name),
                json!(".execute-api."),
                get_ref(REGION),
                json!("."),
                get_ref(URL_SUFFIX),
                json!(format!("/{}/", self.stage_name)),
            ],
        )
    }
}

fn proxy_method(rest_api: &str, resource_id: Value, function_logical_id: &str) -> CfnMethod {
    CfnMethod {
        http_method: "ANY".into(),
        resource_id: resource_id.into(),
        rest_api_id: get_ref(rest_api).into(),
        authorization_type: "NONE".into(),
        integration: Integration {
            integration_type: "AWS_PROXY".into(),
            integration_http_method: "POST".into(),
            uri: lambda_integration_uri(function_logical_id).into(),
        },
    }
}

/// checksum over the serialized methods, so any change to them yields a new deployment id.
pub fn methods_checksum(methods: &[&CfnMethod]) -> Result<u32, serde_json::Error> {
    let mut hasher = adler::Adler32::new();
    for method in methods {
        hasher.write_slice(&serde_json::to_vec(method)?);
    }
    Ok(hasher.checksum())
}

pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, StackError> {
    let api = &myinput.logical_name;
    let function_id = &myinput.function.function_logical_id;
    if !stackinp.contains(function_id) {
        return Err(StackError::DanglingReference { resource: api.clone(), target: function_id.clone() });
    }
    let rest_api = CfnRestApi {
        name: if myinput.api_name.is_empty() { api.clone() } else { myinput.api_name.clone() },
        description: None,
        endpoint_configuration: EndpointConfiguration { types: vec!["EDGE".into()] },
    };
    let proxy_resource_name = format!("{api}Proxy");
    let proxy_resource = CfnApiResource {
        parent_id: get_att(api, "RootResourceId").into(),
        path_part: "{proxy+}".into(),
        rest_api_id: get_ref(api).into(),
    };
    let root_method_name = format!("{api}AnyRoot");
    let root_method = proxy_method(api, get_att(api, "RootResourceId"), function_id);
    let proxy_method_name = format!("{api}AnyProxy");
    let proxy_any = proxy_method(api, get_ref(&proxy_resource_name), function_id);

    let checksum = methods_checksum(&[&root_method, &proxy_any])?;
    let deployment_name = format!("{api}Deployment{checksum:08x}");
    let deployment = CfnDeployment {
        rest_api_id: get_ref(api).into(),
        description: Some(format!("deployment of {api}")),
    };
    let stage_name = format!("{api}Stage");
    let stage = CfnStage {
        rest_api_id: get_ref(api).into(),
        deployment_id: get_ref(&deployment_name).into(),
        stage_name: myinput.stage_name.clone(),
    };
    let permission = CfnPermission::invoke_from(
        function_id,
        "apigateway.amazonaws.com",
        Some(sub(format!("arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api}}}/*/*/*")).into()),
    );

    stackinp.push(Resource::new(api, rest_api));
    stackinp.push(Resource::new(&proxy_resource_name, proxy_resource));
    stackinp.push(Resource::new(&root_method_name, root_method));
    stackinp.push(Resource::new(&proxy_method_name, proxy_any));
    stackinp.push(
        Resource::new(&deployment_name, deployment)
            .depends_on(&root_method_name)
            .depends_on(&proxy_method_name),
    );
    stackinp.push(Resource::new(&stage_name, stage));
    stackinp.push(Resource::new(format!("{api}Permission"), permission));

    Ok(Outputs {
        logical_api_name: api.clone(),
        logical_stage_name: stage_name,
        logical_deployment_name: deployment_name,
        stage_name: myinput.stage_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::validate_resources_to_template;

    fn function_stack() -> (aws_cfn_stack::Input, aws_lambda::Outputs) {
        let mut stack = aws_cfn_stack::Input::default();
        let function = aws_lambda::config(
            &aws_lambda::Input {
                resource_name: "DataHandler".into(),
                handler: "data.handler".into(),
                ..Default::default()
            },
            &mut stack,
        )
        .unwrap();
        (stack, function)
    }

    #[test]
    fn proxies_root_and_every_path() {
        let (mut stack, function) = function_stack();
        let outputs = config(&Input::new("DataAPIEndpoint", &function), &mut stack).unwrap();
        let template = validate_resources_to_template(&stack).unwrap();

        let methods: Vec<_> = template.resources_of_type("AWS::ApiGateway::Method").collect();
        assert_eq!(methods.len(), 2);
        for (_, method) in methods {
            assert_eq!(method.properties["HttpMethod"], json!("ANY"));
            assert_eq!(method.properties["Integration"]["Type"], json!("AWS_PROXY"));
            assert_eq!(
                method.properties["Integration"]["Uri"]["Fn::Sub"],
                json!("arn:${AWS::Partition}:apigateway:${AWS::Region}:lambda:path/2015-03-31/functions/${DataHandler.Arn}/invocations")
            );
        }
        assert_eq!(template.resources["DataAPIEndpointProxy"].properties["PathPart"], json!("{proxy+}"));
        assert_eq!(template.resources[&outputs.logical_stage_name].properties["StageName"], json!("prod"));
        let permission = &template.resources["DataAPIEndpointPermission"].properties;
        assert_eq!(permission["Principal"], json!("apigateway.amazonaws.com"));
        assert_eq!(permission["FunctionName"], json!({ "Fn::GetAtt": ["DataHandler", "Arn"] }));
        assert!(outputs.logical_deployment_name.starts_with("DataAPIEndpointDeployment"));
        assert_eq!(outputs.url()["Fn::Join"][1][6], json!("/prod/"));
    }

    #[test]
    fn deployment_id_tracks_methods() {
        let a = proxy_method("Api", get_att("Api", "RootResourceId"), "FnA");
        let b = proxy_method("Api", get_att("Api", "RootResourceId"), "FnB");
        assert_eq!(methods_checksum(&[&a]).unwrap(), methods_checksum(&[&a.clone()]).unwrap());
        assert_ne!(methods_checksum(&[&a]).unwrap(), methods_checksum(&[&b]).unwrap());
    }

    #[test]
    fn no_gateway_without_function() {
        let (_, function) = function_stack();
        let mut empty = aws_cfn_stack::Input::default();
        assert!(matches!(config(&Input::new("Api", &function), &mut empty), Err(StackError::DanglingReference { .. })));
        assert!(empty.resources.is_empty());
    }
}
