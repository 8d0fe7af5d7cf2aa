//! Regional custom domain for a REST API.

use aws_acm_cert::Certificate;
use aws_cfn_stack::{get_att, get_ref, to_properties, CfnResource, Resource, StackError, StrVal};
use serde::Serialize;
use serde_json::Value;

use crate::{EndpointConfiguration, Outputs};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDomainName {
    pub domain_name: String,
    pub endpoint_configuration: EndpointConfiguration,
    pub regional_certificate_arn: StrVal,
    pub security_policy: String,
}

aws_cfn_stack::cfn_resource!(CfnDomainName, "AWS::ApiGateway::DomainName");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBasePathMapping {
    pub domain_name: StrVal,
    pub rest_api_id: StrVal,
    pub stage: StrVal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl CfnResource for CfnBasePathMapping {
    fn type_string(&self) -> &'static str {
        "AWS::ApiGateway::BasePathMapping"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.base_path {
            let valid = path.chars().all(|c| c.is_ascii_alphanumeric() || "-._~$".contains(c));
            if path.is_empty() || !valid {
                return Err(format!("Invalid base path {:?}\nUse a single path segment without slashes", path));
            }
        }
        Ok(())
    }
}

pub struct DomainInput {
    pub logical_name: String,
    /// fully qualified, eg: `api.example.com`
    pub domain_name: String,
    pub certificate: Certificate,
    /// path segment the API is mounted under. Empty maps the API at the root.
    pub base_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOutputs {
    pub logical_domain_name: String,
    pub domain_name: String,
}

impl DomainOutputs {
    /// alias target pair for Route 53: regional domain name and its hosted zone.
    pub fn alias_dns_name(&self) -> Value {
        get_att(&self.logical_domain_name, "RegionalDomainName")
    }

    pub fn alias_hosted_zone_id(&self) -> Value {
        get_att(&self.logical_domain_name, "RegionalHostedZoneId")
    }
}

pub fn config(myinput: &DomainInput, api: &Outputs, stackinp: &mut aws_cfn_stack::Input) -> Result<DomainOutputs, StackError> {
    let logical_domain_name = &myinput.logical_name;
    if !myinput.certificate.covers(&myinput.domain_name) {
        return Err(StackError::validation(
            logical_domain_name,
            format!("{} is not covered by the domain's certificate", myinput.domain_name),
        ));
    }
    let domain = CfnDomainName {
        domain_name: myinput.domain_name.clone(),
        endpoint_configuration: EndpointConfiguration { types: vec!["REGIONAL".into()] },
        regional_certificate_arn: myinput.certificate.arn(),
        security_policy: "TLS_1_2".into(),
    };
    let mapping = CfnBasePathMapping {
        domain_name: get_ref(logical_domain_name).into(),
        rest_api_id: api.rest_api_id().into(),
        stage: get_ref(&api.logical_stage_name).into(),
        base_path: if myinput.base_path.is_empty() {
            None
        } else {
            Some(myinput.base_path.trim_matches('/').to_string())
        },
    };
    stackinp.push(Resource::new(logical_domain_name, domain));
    stackinp.push(Resource::new(format!("{logical_domain_name}Mapping"), mapping));
    Ok(DomainOutputs {
        logical_domain_name: logical_domain_name.clone(),
        domain_name: myinput.domain_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api() -> Outputs {
        Outputs {
            logical_api_name: "Api".into(),
            logical_stage_name: "ApiStage".into(),
            logical_deployment_name: "ApiDeployment0".into(),
            stage_name: "prod".into(),
        }
    }

    #[test]
    fn regional_domain_with_mapping() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = DomainInput {
            logical_name: "ApiDomain".into(),
            domain_name: "api.example.com".into(),
            certificate: Certificate::from_arn("arn:aws:acm:us-east-1:1:certificate/x"),
            base_path: "/data/".into(),
        };
        let outputs = config(&input, &api(), &mut stack).unwrap();
        let domain = stack.get("ApiDomain").unwrap().properties.properties().unwrap();
        assert_eq!(domain["EndpointConfiguration"]["Types"], json!(["REGIONAL"]));
        assert_eq!(domain["RegionalCertificateArn"], json!("arn:aws:acm:us-east-1:1:certificate/x"));
        let mapping = stack.get("ApiDomainMapping").unwrap().properties.properties().unwrap();
        assert_eq!(mapping["BasePath"], json!("data"));
        assert_eq!(mapping["Stage"], json!({ "Ref": "ApiStage" }));
        assert_eq!(outputs.alias_hosted_zone_id(), json!({ "Fn::GetAtt": ["ApiDomain", "RegionalHostedZoneId"] }));
    }

    #[test]
    fn certificate_must_cover_domain() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = DomainInput {
            logical_name: "ApiDomain".into(),
            domain_name: "api.example.com".into(),
            certificate: Certificate::Issued { logical_name: "C".into(), names: vec!["www.example.com".into()] },
            base_path: String::new(),
        };
        assert!(config(&input, &api(), &mut stack).is_err());
    }
}
