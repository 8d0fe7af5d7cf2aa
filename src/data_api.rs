//! Encrypted data bucket served through a Lambda backed REST API.

use std::collections::BTreeMap;
use std::path::PathBuf;

use aws_acm_cert::Certificate;
use aws_apigateway::{DomainInput, DomainOutputs};
use aws_cfn_stack::{account_root_principal, DeletionPolicy, StackError};
use aws_route53::{AliasTarget, HostedZone};
use aws_s3::{AssetSource, BucketDeployment, BucketPolicyBuilder, ObjectOwnership};

pub const DATA_OBJECT_KEY: &str = "data.json";
pub const ALLOW_ORIGIN: &str = "*";

/// Custom domain of the API. Without one the API is only reachable on its
/// `execute-api` endpoint. The API answers on `sub_domain` inside `zone`.
#[derive(Debug, Clone)]
pub struct ApiDomainProps {
    pub sub_domain: String,
    pub base_path: String,
    /// reuse an existing certificate instead of issuing one.
    pub certificate_arn: Option<String>,
    pub zone: HostedZone,
}

#[derive(Debug, Clone)]
pub struct DataApiProps {
    /// prefix for every logical id and output, so several units can share a stack.
    pub scope: String,
    pub bucket_name: String,
    pub region: String,
    pub lambda_asset_dir: PathBuf,
    pub runtime: String,
    pub domain: Option<ApiDomainProps>,
    pub data_asset_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DataApi {
    pub bucket: aws_s3::Outputs,
    pub function: aws_lambda::Outputs,
    pub api: aws_apigateway::Outputs,
    pub domain: Option<DomainOutputs>,
    pub deployment: Option<BucketDeployment>,
}

pub fn build(props: &DataApiProps, stack: &mut aws_cfn_stack::Input) -> Result<DataApi, StackError> {
    let scope = &props.scope;
    let key = aws_s3::kms::config(&format!("{scope}DataBucketKmsKey"), "encrypts the data bucket", stack);
    let bucket = aws_s3::config(
        &aws_s3::Input {
            logical_name: format!("{scope}DataBucket"),
            bucket_name: props.bucket_name.clone(),
            encryption_key: Some(key),
            block_public_access: true,
            object_ownership: Some(ObjectOwnership::BucketOwnerEnforced),
            removal_policy: DeletionPolicy::Delete,
            cleanup_runtime: aws_s3::cleanup::runtime_for(&props.runtime).to_string(),
            ..Default::default()
        },
        stack,
    )?;
    BucketPolicyBuilder::new(&bucket)
        .grant_read(account_root_principal())
        .config(stack);

    let environment: BTreeMap<String, aws_cfn_stack::StrVal> = [
        ("DATA_BUCKET_NAME", props.bucket_name.as_str()),
        ("BUCKET_REGION", props.region.as_str()),
        ("BUCKET_OBJECT_KEY", DATA_OBJECT_KEY),
        ("ACCESS_CONTROL_ALLOW_ORIGIN", ALLOW_ORIGIN),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into()))
    .collect();
    let function = aws_lambda::config(
        &aws_lambda::Input {
            resource_name: format!("{scope}DataHandler"),
            region: props.region.clone(),
            runtime: props.runtime.clone(),
            handler: "data.handler".into(),
            environment,
            asset_dir: props.lambda_asset_dir.clone(),
            extra_statements: aws_s3::grant::read_statements(&bucket),
            ..Default::default()
        },
        stack,
    )?;

    let api = aws_apigateway::config(&aws_apigateway::Input::new(&format!("{scope}DataAPIEndpoint"), &function), stack)?;
    stack.add_output(format!("{scope}DataBucketName"), "The bucket holding the API's data", bucket.name());
    stack.add_output(format!("{scope}DataApiUrl"), "Endpoint of the data API", api.url());

    let domain = match &props.domain {
        Some(domain_props) => Some(add_domain(scope, domain_props, &api, stack)?),
        None => None,
    };

    let deployment = props.data_asset_path.as_ref().map(|path| BucketDeployment {
        name: format!("{scope}DataDeployment"),
        source: AssetSource::File { path: path.clone(), key: DATA_OBJECT_KEY.to_string() },
        bucket_output: format!("{scope}DataBucketName"),
        key_prefix: String::new(),
        prune: false,
    });

    Ok(DataApi { bucket, function, api, domain, deployment })
}

fn add_domain(
    scope: &str,
    props: &ApiDomainProps,
    api: &aws_apigateway::Outputs,
    stack: &mut aws_cfn_stack::Input,
) -> Result<DomainOutputs, StackError> {
    let domain_name = props.zone.record_name(&props.sub_domain);
    let certificate = match &props.certificate_arn {
        Some(arn) => Certificate::from_arn(arn),
        None => aws_acm_cert::config(
            &aws_acm_cert::Input {
                logical_name: format!("{scope}ApiDomainCertificate"),
                domain_name: domain_name.clone(),
                subject_alternative_names: vec![],
                hosted_zone_id: props.zone.id.clone(),
            },
            stack,
        )?,
    };
    let domain = aws_apigateway::domain::config(
        &DomainInput {
            logical_name: format!("{scope}ApiDomain"),
            domain_name,
            certificate,
            base_path: props.base_path.clone(),
        },
        api,
        stack,
    )?;
    aws_route53::config(
        &aws_route53::Input {
            logical_name: format!("{scope}ApiDns"),
            zone: props.zone.clone(),
            record_name: props.sub_domain.clone(),
            target: AliasTarget::new(domain.alias_dns_name(), domain.alias_hosted_zone_id()),
        },
        stack,
    )?;
    let base = if props.base_path.is_empty() {
        String::new()
    } else {
        format!("{}/", props.base_path.trim_matches('/'))
    };
    stack.add_output(
        format!("{scope}DataApiDomainUrl"),
        "Custom domain of the data API",
        serde_json::Value::String(format!("https://{}/{base}", domain.domain_name)),
    );
    Ok(domain)
}
