//! Private website bucket behind a CloudFront distribution.

use std::path::PathBuf;

use aws_cfn_stack::{DeletionPolicy, StackError};
use aws_cloudfront_distribution::{origin_access_identity, CLOUDFRONT_HOSTED_ZONE_ID};
use aws_route53::{AliasTarget, HostedZone};
use aws_s3::{AssetSource, BucketDeployment, BucketPolicyBuilder, WebsiteConfiguration};

#[derive(Debug, Clone)]
pub struct StaticSiteProps {
    pub scope: String,
    pub domain_name: String,
    pub sub_domain: String,
    pub zone: HostedZone,
    pub site_asset_dir: PathBuf,
    /// runtime configured for the stack's functions, reused by the bucket cleanup.
    pub runtime: String,
}

#[derive(Debug, Clone)]
pub struct StaticSite {
    pub bucket: aws_s3::Outputs,
    pub certificate: aws_acm_cert::Certificate,
    pub distribution: aws_cloudfront_distribution::Outputs,
    /// names of the alias records, sub domain first.
    pub records: Vec<String>,
    pub deployment: BucketDeployment,
}

impl StaticSiteProps {
    pub fn site_domain(&self) -> String {
        format!("{}.{}", self.sub_domain, self.domain_name)
    }

    pub fn www_domain(&self) -> String {
        format!("www.{}", self.domain_name)
    }

    /// every name the distribution answers to.
    pub fn aliases(&self) -> Vec<String> {
        vec![self.site_domain(), self.domain_name.clone(), self.www_domain()]
    }
}

/// Declares the site in `stack`. CloudFront only reads certificates from
/// us-east-1; when `stack` deploys elsewhere, pass a `cert_stack` bound for
/// us-east-1 and the certificate is issued there instead.
pub fn build(
    props: &StaticSiteProps,
    stack: &mut aws_cfn_stack::Input,
    cert_stack: Option<&mut aws_cfn_stack::Input>,
) -> Result<StaticSite, StackError> {
    let scope = &props.scope;
    let site_domain = props.site_domain();

    let bucket = aws_s3::config(
        &aws_s3::Input {
            logical_name: format!("{scope}SiteBucket"),
            bucket_name: site_domain.clone(),
            block_public_access: true,
            website: Some(WebsiteConfiguration::default()),
            removal_policy: DeletionPolicy::Delete,
            cleanup_runtime: aws_s3::cleanup::runtime_for(&props.runtime).to_string(),
            ..Default::default()
        },
        stack,
    )?;

    let certificate_input = aws_acm_cert::Input {
        logical_name: format!("{scope}SiteCertificate"),
        domain_name: site_domain.clone(),
        subject_alternative_names: vec![props.domain_name.clone(), props.www_domain()],
        hosted_zone_id: props.zone.id.clone(),
    };
    let certificate = match cert_stack {
        Some(cert_stack) => aws_acm_cert::config_in_stack(&certificate_input, cert_stack, stack)?,
        None => aws_acm_cert::config(&certificate_input, stack)?,
    };

    let oai = origin_access_identity::config(&format!("{scope}SiteOAI"), &site_domain, stack);
    let distribution = aws_cloudfront_distribution::config(
        &aws_cloudfront_distribution::Input {
            logical_name: format!("{scope}SiteDistribution"),
            origin_domain_name: bucket.regional_domain_name(),
            origin_access_identity: oai.clone(),
            aliases: props.aliases(),
            certificate: Some(certificate.clone()),
            ..Default::default()
        },
        stack,
    )?;
    BucketPolicyBuilder::new(&bucket)
        .grant_read(origin_access_identity::principal(&oai))
        .config(stack);

    let mut records = vec![];
    for (suffix, record_name) in [("", props.sub_domain.as_str()), ("Root", ""), ("Www", "www")] {
        let name = aws_route53::config(
            &aws_route53::Input {
                logical_name: format!("{scope}Cdn{suffix}ARecord"),
                zone: props.zone.clone(),
                record_name: record_name.to_string(),
                target: AliasTarget::new(distribution.domain_name(), CLOUDFRONT_HOSTED_ZONE_ID),
            },
            stack,
        )?;
        records.push(name);
    }

    let deployment = BucketDeployment {
        name: format!("{scope}SiteDeployment"),
        source: AssetSource::Directory(props.site_asset_dir.clone()),
        bucket_output: format!("{scope}SiteBucketName"),
        key_prefix: String::new(),
        prune: true,
    };

    stack.add_output(format!("{scope}SiteBucketName"), "The Bucket store files for Cloudfront to use", bucket.name());
    stack.add_output(format!("{scope}CdnId"), "The ID of Cloudfront distribution", distribution.id());
    stack.add_output(
        format!("{scope}SiteUrl"),
        "The Url of static site",
        serde_json::Value::String(format!("https://{site_domain}")),
    );

    Ok(StaticSite { bucket, certificate, distribution, records, deployment })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::validate_resources_to_template;
    use serde_json::json;

    fn props() -> StaticSiteProps {
        StaticSiteProps {
            scope: String::new(),
            domain_name: "example.com".into(),
            sub_domain: "blog".into(),
            zone: HostedZone::new("Z0123", "example.com"),
            site_asset_dir: "sources/site".into(),
            runtime: "nodejs20.x".into(),
        }
    }

    #[test]
    fn distribution_reads_one_bucket_through_identity() {
        let mut stack = aws_cfn_stack::Input::default();
        let site = build(&props(), &mut stack, None).unwrap();
        let template = validate_resources_to_template(&stack).unwrap();

        assert_eq!(template.resources_of_type("AWS::S3::Bucket").count(), 1);
        let bucket = &template.resources["SiteBucket"].properties;
        assert_eq!(bucket["BucketName"], json!("blog.example.com"));
        assert_eq!(bucket["WebsiteConfiguration"]["IndexDocument"], json!("index.html"));

        let origin = &template.resources["SiteDistribution"].properties["DistributionConfig"]["Origins"][0];
        assert_eq!(origin["DomainName"], json!({ "Fn::GetAtt": ["SiteBucket", "RegionalDomainName"] }));

        let statement = &template.resources["SiteBucketPolicy"].properties["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Principal"]["CanonicalUser"], json!({ "Fn::GetAtt": ["SiteOAI", "S3CanonicalUserId"] }));
        assert_eq!(statement["Action"], json!(aws_s3::grant::READ_ACTIONS));

        let cleanup = &template.resources["CleanupFunctionSiteBucket"].properties;
        assert_eq!(cleanup["Runtime"], json!("nodejs20.x"));

        assert_eq!(site.deployment.source, AssetSource::Directory("sources/site".into()));
        assert!(site.deployment.prune);
    }

    #[test]
    fn certificate_covers_every_alias() {
        let mut stack = aws_cfn_stack::Input::default();
        let site = build(&props(), &mut stack, None).unwrap();
        assert_eq!(site.certificate.uncovered(&props().aliases()), None);
        let template = validate_resources_to_template(&stack).unwrap();
        let cert = &template.resources["SiteCertificate"].properties;
        assert_eq!(cert["DomainName"], json!("blog.example.com"));
        assert_eq!(cert["SubjectAlternativeNames"], json!(["example.com", "www.example.com"]));
    }

    #[test]
    fn three_alias_records_point_at_the_distribution() {
        let mut stack = aws_cfn_stack::Input::default();
        let site = build(&props(), &mut stack, None).unwrap();
        assert_eq!(site.records, vec!["blog.example.com", "example.com", "www.example.com"]);
        let template = validate_resources_to_template(&stack).unwrap();
        let records: Vec<_> = template.resources_of_type("AWS::Route53::RecordSet").collect();
        assert_eq!(records.len(), 3);
        for (_, record) in records {
            assert_eq!(record.properties["AliasTarget"]["DNSName"], json!({ "Fn::GetAtt": ["SiteDistribution", "DomainName"] }));
            assert_eq!(record.properties["AliasTarget"]["HostedZoneId"], json!(CLOUDFRONT_HOSTED_ZONE_ID));
        }
        for output in ["SiteBucketName", "CdnId", "SiteUrl"] {
            assert!(template.outputs.contains_key(output));
        }
        assert_eq!(template.outputs["SiteUrl"].value, json!("https://blog.example.com"));
    }

    #[test]
    fn certificate_can_live_in_a_companion_stack() {
        let mut stack = aws_cfn_stack::Input::default();
        let mut cert_stack = aws_cfn_stack::Input { stack_name: "site-certificates".into(), ..Default::default() };
        let site = build(&props(), &mut stack, Some(&mut cert_stack)).unwrap();
        assert_eq!(site.certificate.uncovered(&props().aliases()), None);

        let template = validate_resources_to_template(&stack).unwrap();
        assert_eq!(template.resources_of_type("AWS::CertificateManager::Certificate").count(), 0);
        assert!(template.parameters.contains_key("SiteCertificateArn"));
        let viewer = &template.resources["SiteDistribution"].properties["DistributionConfig"]["ViewerCertificate"];
        assert_eq!(viewer["AcmCertificateArn"], json!({ "Ref": "SiteCertificateArn" }));

        let certificates = validate_resources_to_template(&cert_stack).unwrap();
        assert_eq!(certificates.resources_of_type("AWS::CertificateManager::Certificate").count(), 1);
        assert!(certificates.outputs.contains_key("SiteCertificateArn"));
    }
}
