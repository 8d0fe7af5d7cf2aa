//! Composes the units into one CloudFormation stack.

use aws_cfn_stack::{validate_resources_to_template, validate_stack_name, SavedTemplate, StackError};
use aws_lambda::LambdaAsset;
use aws_regions::CLOUDFRONT_CERTIFICATE_REGION;
use aws_route53::{HostedZone, ZoneLookup};
use aws_s3::BucketDeployment;
use dotenv_reader::ConfigError;
use tracing::debug;

use crate::config::Settings;
use crate::data_api::{self, ApiDomainProps, DataApi, DataApiProps};
use crate::error::Result;
use crate::static_site::{self, StaticSite, StaticSiteProps};

/// Everything needed to deploy: the resources plus the local assets the
/// template refers to.
#[derive(Debug)]
pub struct WebsiteStack {
    pub name: String,
    pub region: String,
    pub artifact_bucket: String,
    pub input: aws_cfn_stack::Input,
    pub lambda_assets: Vec<LambdaAsset>,
    pub deployments: Vec<BucketDeployment>,
    /// us-east-1 stack holding the CloudFront certificates when `region` is
    /// elsewhere. Its outputs become parameters of this stack.
    pub certificate_stack: Option<aws_cfn_stack::Input>,
}

/// name of the us-east-1 companion of `stack_name`.
pub fn certificate_stack_name(stack_name: &str) -> String {
    format!("{stack_name}-certificates")
}

impl WebsiteStack {
    pub fn new(name: &str, region: &str, artifact_bucket: &str) -> Result<Self, StackError> {
        let name = validate_stack_name(name).map_err(|e| StackError::validation(name, e))?;
        if let Some(e) = aws_regions::verify_region(region) {
            return Err(StackError::validation(&name, e));
        }
        let input = aws_cfn_stack::Input {
            stack_name: name.clone(),
            description: "Personal website and data API".to_string(),
            ..Default::default()
        };
        Ok(Self {
            name,
            region: region.to_string(),
            artifact_bucket: artifact_bucket.to_string(),
            input,
            lambda_assets: vec![],
            deployments: vec![],
            certificate_stack: None,
        })
    }

    pub fn add_data_api(&mut self, props: &DataApiProps) -> Result<DataApi, StackError> {
        let unit = data_api::build(props, &mut self.input)?;
        self.lambda_assets.push(unit.function.asset.clone());
        self.deployments.extend(unit.deployment.clone());
        Ok(unit)
    }

    /// Outside us-east-1 the site certificate goes into [`Self::certificate_stack`].
    pub fn add_static_site(&mut self, props: &StaticSiteProps) -> Result<StaticSite, StackError> {
        let cert_stack = if self.region == CLOUDFRONT_CERTIFICATE_REGION {
            None
        } else {
            let stack_name = validate_stack_name(&certificate_stack_name(&self.name))
                .map_err(|e| StackError::validation(&self.name, e))?;
            Some(self.certificate_stack.get_or_insert_with(|| aws_cfn_stack::Input {
                stack_name,
                description: "CloudFront certificates of the personal website".to_string(),
                ..Default::default()
            }))
        };
        let unit = static_site::build(props, &mut self.input, cert_stack)?;
        self.deployments.push(unit.deployment.clone());
        Ok(unit)
    }

    /// the units `settings` enable. `zone` is required whenever
    /// [`Settings::needs_zone`] is true.
    pub fn from_settings(settings: &Settings, zone: Option<&HostedZone>) -> Result<Self> {
        let mut stack = Self::new(&settings.stack_name, &settings.region, &settings.artifact_bucket())?;
        let zone_for = |what: &str| {
            zone.cloned().ok_or_else(|| StackError::validation(what, "no hosted zone was resolved for DOMAIN_NAME"))
        };

        if let Some(bucket_name) = &settings.data_bucket_name {
            let domain = match (&settings.domain_name, &settings.sub_domain) {
                (Some(_), Some(sub_domain)) => Some(ApiDomainProps {
                    sub_domain: sub_domain.clone(),
                    base_path: settings.base_path.clone(),
                    certificate_arn: settings.domain_certificate_arn.clone(),
                    zone: zone_for("ApiDomain")?,
                }),
                _ => None,
            };
            stack.add_data_api(&DataApiProps {
                scope: String::new(),
                bucket_name: bucket_name.clone(),
                region: settings.region.clone(),
                lambda_asset_dir: settings.lambda_asset_dir.clone(),
                runtime: settings.lambda_runtime.clone(),
                domain,
                data_asset_path: settings.data_asset_path.clone(),
            })?;
        }

        if let Some(sub_domain) = &settings.site_sub_domain {
            let domain_name = settings
                .domain_name
                .clone()
                .ok_or(ConfigError::MissingVar { key: "DOMAIN_NAME" })?;
            stack.add_static_site(&StaticSiteProps {
                scope: String::new(),
                domain_name,
                sub_domain: sub_domain.clone(),
                zone: zone_for("StaticSite")?,
                site_asset_dir: settings.site_asset_dir.clone(),
                runtime: settings.lambda_runtime.clone(),
            })?;
        }
        debug!(stack = %stack.name, resources = stack.input.resources.len(), "composed stack");
        Ok(stack)
    }

    pub fn synth(&self) -> Result<SavedTemplate, StackError> {
        validate_resources_to_template(&self.input)
    }

    pub fn to_json(&self) -> Result<String, StackError> {
        self.synth()?.to_body()
    }

    pub fn synth_certificates(&self) -> Result<Option<SavedTemplate>, StackError> {
        self.certificate_stack.as_ref().map(validate_resources_to_template).transpose()
    }
}

/// the hosted zone for `settings.domain_name`, when the stack needs one.
/// `HOSTED_ZONE_ID` skips the lookup.
pub async fn resolve_zone(settings: &Settings, lookup: &dyn ZoneLookup) -> Result<Option<HostedZone>> {
    if !settings.needs_zone() {
        return Ok(None);
    }
    let domain_name = settings
        .domain_name
        .as_deref()
        .ok_or(ConfigError::MissingVar { key: "DOMAIN_NAME" })?;
    if let Some(id) = &settings.hosted_zone_id {
        return Ok(Some(HostedZone::new(id, domain_name)));
    }
    Ok(Some(lookup.find_zone(domain_name).await?))
}
