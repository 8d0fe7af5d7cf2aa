//! Applies a [`WebsiteStack`]: certificates and code first, then the stack,
//! then content.

use std::collections::HashMap;

use aws_cfn_stack::deploy::StackDeployer;
use aws_cfn_stack::{validate_resources_to_template, StackError};
use aws_config::Region;
use aws_lambda::package::{ensure_artifact_bucket, upload_artifact};
use aws_regions::CLOUDFRONT_CERTIFICATE_REGION;
use aws_s3::SyncReport;
use tracing::info;

use crate::error::Result;
use crate::stack::{certificate_stack_name, WebsiteStack};

pub struct Deployer {
    cfn: StackDeployer,
    /// same account, pinned to us-east-1.
    certificates: StackDeployer,
    s3: aws_sdk_s3::Client,
}

/// values for the parameters a stack declares for each of `exporter`'s outputs.
pub fn exported_parameters(
    exporter: &aws_cfn_stack::Input,
    outputs: &HashMap<String, String>,
) -> Result<Vec<(String, String)>, StackError> {
    exporter
        .outputs
        .iter()
        .map(|(name, _)| match outputs.get(name) {
            Some(value) => Ok((name.clone(), value.clone())),
            None => Err(StackError::MissingOutput { stack: exporter.stack_name.clone(), output: name.clone() }),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct DeployReport {
    pub outputs: HashMap<String, String>,
    pub syncs: Vec<(String, SyncReport)>,
}

impl Deployer {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        let us_east_1 = config.to_builder().region(Region::new(CLOUDFRONT_CERTIFICATE_REGION)).build();
        Self {
            cfn: StackDeployer::new(config),
            certificates: StackDeployer::new(&us_east_1),
            s3: aws_sdk_s3::Client::new(config),
        }
    }

    /// applies the us-east-1 certificate stack, if any, and returns the
    /// parameters carrying its ARNs into the main stack.
    async fn deploy_certificates(&self, stack: &WebsiteStack) -> Result<Vec<(String, String)>> {
        let Some(certificates) = &stack.certificate_stack else {
            return Ok(vec![]);
        };
        let template = validate_resources_to_template(certificates)?;
        let outputs = self.certificates.deploy(&certificates.stack_name, &template, &[]).await?;
        info!(stack = %certificates.stack_name, region = CLOUDFRONT_CERTIFICATE_REGION, "certificates applied");
        Ok(exported_parameters(certificates, &outputs)?)
    }

    /// packages and uploads every function, so the template parameters can point at the archives.
    async fn upload_code(&self, stack: &WebsiteStack) -> Result<Vec<(String, String)>> {
        let mut parameters = vec![];
        if stack.lambda_assets.is_empty() {
            return Ok(parameters);
        }
        ensure_artifact_bucket(&self.s3, &stack.artifact_bucket, &stack.region).await?;
        for asset in stack.lambda_assets.iter() {
            let packaged = asset.package()?;
            upload_artifact(&self.s3, &stack.artifact_bucket, &packaged).await?;
            parameters.extend(asset.parameter_values(&stack.artifact_bucket, &packaged));
        }
        Ok(parameters)
    }

    pub async fn deploy(&self, stack: &WebsiteStack) -> Result<DeployReport> {
        let template = stack.synth()?;
        let mut parameters = self.deploy_certificates(stack).await?;
        parameters.extend(self.upload_code(stack).await?);
        let outputs = self.cfn.deploy(&stack.name, &template, &parameters).await?;
        info!(stack = %stack.name, outputs = outputs.len(), "stack applied");

        let mut report = DeployReport { outputs, syncs: vec![] };
        for deployment in stack.deployments.iter() {
            let sync = deployment.run(&self.s3, &report.outputs).await?;
            report.syncs.push((deployment.name.clone(), sync));
        }
        Ok(report)
    }

    /// deletes the stack, then its certificate stack. Retained resources (the
    /// KMS key) and the artifact bucket stay behind.
    pub async fn destroy(&self, stack_name: &str) -> Result<()> {
        self.cfn.delete_stack(stack_name).await?;
        self.certificates.delete_stack(&certificate_stack_name(stack_name)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter() -> aws_cfn_stack::Input {
        let mut input = aws_cfn_stack::Input { stack_name: "site-certificates".into(), ..Default::default() };
        input.add_output("SiteCertificateArn", "ARN of blog.example.com", aws_cfn_stack::get_ref("SiteCertificate"));
        input
    }

    #[test]
    fn certificate_outputs_become_parameters() {
        let arn = "arn:aws:acm:us-east-1:123456789012:certificate/abc";
        let outputs: HashMap<String, String> = [("SiteCertificateArn".to_string(), arn.to_string())].into();
        assert_eq!(
            exported_parameters(&exporter(), &outputs).unwrap(),
            vec![("SiteCertificateArn".to_string(), arn.to_string())]
        );
    }

    #[test]
    fn missing_certificate_output_is_an_error() {
        match exported_parameters(&exporter(), &HashMap::new()) {
            Err(StackError::MissingOutput { stack, output }) => {
                assert_eq!(stack, "site-certificates");
                assert_eq!(output, "SiteCertificateArn");
            }
            other => panic!("expected a missing output, got {other:?}"),
        }
    }
}
