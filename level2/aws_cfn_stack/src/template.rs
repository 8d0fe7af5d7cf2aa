use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DeletionPolicy, Input, StackError};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const DEFAULT_STACK_NAME: &str = "PersonalWebsiteStack";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateParameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, TemplateParameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl SavedTemplate {
    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }

    /// we make it pretty so if a user needs to look at the stack in the Cfn console, it looks nice
    pub fn to_body(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn verify_resource_name(resource_name: &str) -> Option<String> {
    if resource_name.len() > 255 {
        return Some(format!("Invalid resource name {:?}\nmust be less than 255 characters", resource_name));
    }
    if resource_name.is_empty() {
        return Some(format!("Invalid resource name {:?}\nMust contain at least 1 character", resource_name));
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some(format!("Invalid resource name {:?}\nMust contain only alphanumeric characters [A-Za-z0-9]", resource_name));
    }
    None
}

pub fn validate_stack_name(current_stack_name: &str) -> Result<String, String> {
    let stack_name = if current_stack_name.is_empty() {
        DEFAULT_STACK_NAME.to_string()
    } else {
        current_stack_name.replace('_', "-")
    };
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let starts_alpha = stack_name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !starts_alpha || !valid_chars || stack_name.len() > 128 {
        return Err(format!("Invalid stack name {}\n{}", stack_name, restriction));
    }
    Ok(stack_name)
}

/// Validates every resource, rejects duplicate logical ids, and checks that
/// every reference in the template resolves to something declared.
pub fn validate_resources_to_template(input: &Input) -> Result<SavedTemplate, StackError> {
    let mut out_template = SavedTemplate::default();
    if !input.description.is_empty() {
        out_template.description = Some(input.description.clone());
    }
    for (name, param) in input.parameters.iter() {
        if let Some(e) = verify_resource_name(name) {
            return Err(StackError::validation(name, e));
        }
        out_template.parameters.insert(name.clone(), param.clone());
    }
    for resource in input.resources.iter() {
        if let Some(e) = verify_resource_name(&resource.name) {
            return Err(StackError::validation(&resource.name, e));
        }
        if let Err(e) = resource.properties.validate() {
            return Err(StackError::validation(&resource.name, e));
        }
        let saved_resource = SavedResource {
            ty: resource.properties.type_string().to_string(),
            properties: resource.properties.properties()?,
            depends_on: resource.depends_on.clone(),
            deletion_policy: resource.deletion_policy,
            update_replace_policy: resource.update_replace_policy,
        };
        if out_template.resources.insert(resource.name.clone(), saved_resource).is_some()
            || out_template.parameters.contains_key(&resource.name)
        {
            return Err(StackError::DuplicateLogicalId(resource.name.clone()));
        }
    }
    for (name, output) in input.outputs.iter() {
        if let Some(e) = verify_resource_name(name) {
            return Err(StackError::validation(name, e));
        }
        if out_template.outputs.insert(name.clone(), output.clone()).is_some() {
            return Err(StackError::DuplicateLogicalId(name.clone()));
        }
    }
    check_references(&out_template)?;
    Ok(out_template)
}

/// Every `Ref`, `Fn::GetAtt`, `${Var}` in `Fn::Sub` and `DependsOn` entry must
/// name a declared resource, a declared parameter or an `AWS::` pseudo parameter.
pub fn check_references(template: &SavedTemplate) -> Result<(), StackError> {
    let resolves = |target: &str| {
        target.starts_with("AWS::")
            || template.resources.contains_key(target)
            || template.parameters.contains_key(target)
    };
    for (name, resource) in template.resources.iter() {
        let mut targets = vec![];
        collect_references(&resource.properties, &mut targets);
        targets.extend(resource.depends_on.iter().cloned());
        if let Some(target) = targets.into_iter().find(|t| !resolves(t)) {
            return Err(StackError::DanglingReference { resource: name.clone(), target });
        }
    }
    for (name, output) in template.outputs.iter() {
        let mut targets = vec![];
        collect_references(&output.value, &mut targets);
        if let Some(target) = targets.into_iter().find(|t| !resolves(t)) {
            return Err(StackError::DanglingReference { resource: name.clone(), target });
        }
    }
    Ok(())
}

pub fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    out.push(target.clone());
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(target)) = parts.first() {
                        out.push(target.clone());
                    }
                    return;
                }
                match map.get("Fn::Sub") {
                    Some(Value::String(template)) => {
                        out.extend(sub_variables(template));
                        return;
                    }
                    Some(Value::Array(parts)) => {
                        let locals: HashSet<&String> = parts
                            .get(1)
                            .and_then(Value::as_object)
                            .map(|vars| vars.keys().collect())
                            .unwrap_or_default();
                        if let Some(Value::String(template)) = parts.first() {
                            out.extend(sub_variables(template).into_iter().filter(|v| !locals.contains(v)));
                        }
                        if let Some(vars) = parts.get(1) {
                            collect_references(vars, out);
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// variable names used by a `Fn::Sub` template string. `${X.Attr}` yields `X`,
/// `${!Literal}` is skipped.
fn sub_variables(template: &str) -> Vec<String> {
    let mut out = vec![];
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let var = &after[..end];
        if !var.starts_with('!') {
            let name = var.split('.').next().unwrap_or(var);
            out.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{get_att, get_ref, sub, CfnResource, Resource};
    use serde_json::json;

    struct Raw(&'static str, Value);

    impl CfnResource for Raw {
        fn type_string(&self) -> &'static str {
            self.0
        }
        fn properties(&self) -> Result<Value, serde_json::Error> {
            Ok(self.1.clone())
        }
    }

    struct Invalid;

    impl CfnResource for Invalid {
        fn type_string(&self) -> &'static str {
            "AWS::Invalid::Thing"
        }
        fn properties(&self) -> Result<Value, serde_json::Error> {
            Ok(json!({}))
        }
        fn validate(&self) -> Result<(), String> {
            Err("nope".into())
        }
    }

    #[derive(serde::Serialize)]
    struct TupleKeys(std::collections::BTreeMap<(u8, u8), u8>);
    crate::cfn_resource!(TupleKeys, "AWS::Broken::Thing");

    #[test]
    fn unserializable_properties_fail_the_template() {
        let mut input = Input::default();
        input.push(Resource::new("Broken", TupleKeys([((1, 2), 3)].into_iter().collect())));
        assert!(matches!(validate_resources_to_template(&input), Err(StackError::Serialize(_))));
    }

    #[test]
    fn stack_name_defaults_and_is_checked() {
        assert_eq!(validate_stack_name("").unwrap(), DEFAULT_STACK_NAME);
        assert_eq!(validate_stack_name("my_site").unwrap(), "my-site");
        assert!(validate_stack_name("1site").is_err());
        assert!(validate_stack_name("site.com").is_err());
        assert!(validate_stack_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn resource_names_must_be_alphanumeric() {
        assert!(verify_resource_name("DataBucket").is_none());
        assert!(verify_resource_name("").is_some());
        assert!(verify_resource_name("Data-Bucket").unwrap().contains("alphanumeric"));
    }

    #[test]
    fn dangling_ref_is_rejected() {
        let mut input = Input::default();
        input.push(Resource::new("Fn", Raw("AWS::Lambda::Function", json!({ "Role": get_att("Role", "Arn") }))));
        match validate_resources_to_template(&input) {
            Err(StackError::DanglingReference { resource, target }) => {
                assert_eq!(resource, "Fn");
                assert_eq!(target, "Role");
            }
            other => panic!("expected dangling reference, got {:?}", other),
        }
    }

    #[test]
    fn sub_variables_resolve_to_resources_parameters_and_pseudo_params() {
        let mut input = Input::default();
        input.add_parameter("ArtifactKey", "key");
        input.push(Resource::new("Bucket", Raw("AWS::S3::Bucket", json!({}))));
        input.push(Resource::new(
            "Policy",
            Raw(
                "AWS::S3::BucketPolicy",
                json!({
                    "Bucket": get_ref("Bucket"),
                    "Arn": sub("arn:${AWS::Partition}:s3:::${Bucket}/${ArtifactKey}/${!Literal}"),
                    "Other": { "Fn::Sub": ["${Local}-${Bucket.Arn}", { "Local": get_ref("Bucket") }] }
                }),
            ),
        ));
        assert!(validate_resources_to_template(&input).is_ok());
    }

    #[test]
    fn depends_on_must_resolve() {
        let mut input = Input::default();
        input.push(Resource::new("Stage", Raw("AWS::ApiGateway::Stage", json!({}))).depends_on("Deployment"));
        assert!(matches!(
            validate_resources_to_template(&input),
            Err(StackError::DanglingReference { .. })
        ));
    }

    #[test]
    fn duplicates_and_invalid_resources_fail() {
        let mut input = Input::default();
        input.push(Resource::new("Bucket", Raw("AWS::S3::Bucket", json!({}))));
        input.push(Resource::new("Bucket", Raw("AWS::S3::Bucket", json!({}))));
        assert!(matches!(
            validate_resources_to_template(&input),
            Err(StackError::DuplicateLogicalId(name)) if name == "Bucket"
        ));

        let mut input = Input::default();
        input.push(Resource::new("Broken", Invalid));
        let err = validate_resources_to_template(&input).unwrap_err().to_string();
        assert!(err.contains("Broken"));
        assert!(err.contains("nope"));
    }

    #[test]
    fn output_references_are_checked() {
        let mut input = Input::default();
        input.add_output("CdnId", "id", get_ref("Distribution"));
        assert!(validate_resources_to_template(&input).is_err());
    }

    #[test]
    fn template_body_has_cfn_keys() {
        let mut input = Input::default();
        input.description = "site".into();
        input.push(
            Resource::new("Bucket", Raw("AWS::S3::Bucket", json!({ "BucketName": "x" })))
                .removal_policy(DeletionPolicy::Delete),
        );
        let template = validate_resources_to_template(&input).unwrap();
        let body: Value = serde_json::from_str(&template.to_body().unwrap()).unwrap();
        assert_eq!(body["AWSTemplateFormatVersion"], json!("2010-09-09"));
        assert_eq!(body["Description"], json!("site"));
        assert_eq!(body["Resources"]["Bucket"]["DeletionPolicy"], json!("Delete"));
        assert!(body.get("Parameters").is_none());
        assert!(body["Resources"]["Bucket"].get("DependsOn").is_none());
    }
}
