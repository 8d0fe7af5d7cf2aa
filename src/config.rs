//! Stack settings, read from the environment or a `.env` file.

use std::path::PathBuf;

use aws_cfn_stack::DEFAULT_STACK_NAME;
use dotenv_reader::{first_of, optional, optional_or, ConfigError, EnvSource};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_LAMBDA_ASSET_DIR: &str = "lambda";
pub const DEFAULT_SITE_ASSET_DIR: &str = "sources/site";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stack_name: String,
    pub region: String,
    pub domain_name: Option<String>,
    /// sub domain of the data API, eg: `api`
    pub sub_domain: Option<String>,
    pub base_path: String,
    /// existing certificate for the API domain. One is issued in the stack when unset.
    pub domain_certificate_arn: Option<String>,
    /// enables the data API unit.
    pub data_bucket_name: Option<String>,
    /// enables the static site unit.
    pub site_sub_domain: Option<String>,
    /// skips the Route 53 lookup of `domain_name`.
    pub hosted_zone_id: Option<String>,
    pub lambda_asset_dir: PathBuf,
    pub lambda_runtime: String,
    /// local file uploaded as the data API's object, if set.
    pub data_asset_path: Option<PathBuf>,
    pub site_asset_dir: PathBuf,
    /// bucket receiving packaged lambda code. Derived from the stack name when unset.
    pub asset_bucket_name: Option<String>,
}

impl Settings {
    pub fn from_source(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let settings = Self {
            stack_name: optional_or(source, "STACK_NAME", DEFAULT_STACK_NAME),
            region: first_of(source, &["AWS_REGION", "CDK_DEFAULT_REGION"]).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            domain_name: optional(source, "DOMAIN_NAME").map(|d| d.trim_end_matches('.').to_ascii_lowercase()),
            sub_domain: optional(source, "SUB_DOMAIN"),
            base_path: optional(source, "BASE_PATH").unwrap_or_default(),
            domain_certificate_arn: optional(source, "DOMAIN_CERTIFICATE_ARN"),
            data_bucket_name: optional(source, "DATA_BUCKET_NAME"),
            site_sub_domain: optional(source, "SITE_SUB_DOMAIN"),
            hosted_zone_id: optional(source, "HOSTED_ZONE_ID"),
            lambda_asset_dir: optional_or(source, "LAMBDA_ASSET_DIR", DEFAULT_LAMBDA_ASSET_DIR).into(),
            lambda_runtime: optional_or(source, "LAMBDA_RUNTIME", aws_lambda::DEFAULT_RUNTIME),
            data_asset_path: optional(source, "DATA_ASSET_PATH").map(PathBuf::from),
            site_asset_dir: optional_or(source, "SITE_ASSET_DIR", DEFAULT_SITE_ASSET_DIR).into(),
            asset_bucket_name: optional(source, "ASSET_BUCKET_NAME"),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(message) = aws_regions::verify_region(&self.region) {
            return Err(ConfigError::Invalid { key: "AWS_REGION", message });
        }
        if self.site_sub_domain.is_some() && self.domain_name.is_none() {
            return Err(ConfigError::MissingVar { key: "DOMAIN_NAME" });
        }
        if self.sub_domain.is_some() && self.domain_name.is_none() {
            return Err(ConfigError::MissingVar { key: "DOMAIN_NAME" });
        }
        if let Some(message) = aws_s3::verify_bucket_name(&self.artifact_bucket()) {
            return Err(ConfigError::Invalid { key: "ASSET_BUCKET_NAME", message });
        }
        Ok(())
    }

    pub fn data_api_enabled(&self) -> bool {
        self.data_bucket_name.is_some()
    }

    pub fn static_site_enabled(&self) -> bool {
        self.site_sub_domain.is_some()
    }

    /// `sub.domain` of the data API, when both parts are set.
    pub fn api_domain(&self) -> Option<String> {
        match (&self.sub_domain, &self.domain_name) {
            (Some(sub), Some(domain)) => Some(format!("{sub}.{domain}")),
            _ => None,
        }
    }

    /// whether building the stack needs the hosted zone of `domain_name`.
    pub fn needs_zone(&self) -> bool {
        self.static_site_enabled() || (self.data_api_enabled() && self.api_domain().is_some())
    }

    pub fn artifact_bucket(&self) -> String {
        match &self.asset_bucket_name {
            Some(name) => name.clone(),
            None => format!("{}-assets-{}", self.stack_name.to_ascii_lowercase().replace('_', "-"), self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_source(&env(&[])).unwrap();
        assert_eq!(settings.stack_name, "PersonalWebsiteStack");
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.lambda_asset_dir, PathBuf::from("lambda"));
        assert_eq!(settings.site_asset_dir, PathBuf::from("sources/site"));
        assert_eq!(settings.lambda_runtime, "nodejs22.x");
        assert_eq!(settings.artifact_bucket(), "personalwebsitestack-assets-us-east-1");
        assert!(!settings.data_api_enabled());
        assert!(!settings.static_site_enabled());
        assert!(!settings.needs_zone());
    }

    #[test]
    fn data_api_with_domain() {
        let settings = Settings::from_source(&env(&[
            ("DOMAIN_NAME", "Example.com."),
            ("SUB_DOMAIN", "api"),
            ("BASE_PATH", "data"),
            ("DATA_BUCKET_NAME", "my-data-bucket"),
            ("CDK_DEFAULT_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(settings.api_domain().as_deref(), Some("api.example.com"));
        assert_eq!(settings.region, "eu-west-1");
        assert!(settings.needs_zone());
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            Settings::from_source(&env(&[("AWS_REGION", "moon-1")])),
            Err(ConfigError::Invalid { key: "AWS_REGION", .. })
        ));
        assert!(matches!(
            Settings::from_source(&env(&[("SITE_SUB_DOMAIN", "blog")])),
            Err(ConfigError::MissingVar { key: "DOMAIN_NAME" })
        ));
        assert!(matches!(
            Settings::from_source(&env(&[("ASSET_BUCKET_NAME", "Bad_Bucket")])),
            Err(ConfigError::Invalid { key: "ASSET_BUCKET_NAME", .. })
        ));
    }
}
