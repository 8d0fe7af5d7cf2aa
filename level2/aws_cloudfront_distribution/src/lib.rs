use aws_acm_cert::Certificate;
use aws_cfn_stack::{get_att, get_ref, sub, to_properties, CfnResource, Resource, StackError, StrVal};
use serde::Serialize;
use serde_json::Value;

pub mod origin_access_identity;

pub use origin_access_identity::CfnCloudFrontOriginAccessIdentity;

/// the hosted zone every CloudFront distribution lives in, used as the
/// target zone of Route 53 alias records.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3OriginConfig {
    pub origin_access_identity: StrVal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: StrVal,
    pub s3_origin_config: S3OriginConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cookies {
    pub forward: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForwardedValues {
    pub query_string: bool,
    pub cookies: Cookies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewerProtocolPolicy {
    #[serde(rename = "allow-all")]
    AllowAll,
    #[serde(rename = "https-only")]
    HttpsOnly,
    #[serde(rename = "redirect-to-https")]
    RedirectToHttps,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub compress: bool,
    pub forwarded_values: ForwardedValues,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: StrVal,
    pub ssl_support_method: String,
    pub minimum_protocol_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub default_root_object: String,
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    pub price_class: String,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDistribution {
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("A distribution needs at least one origin".into());
        }
        if !config.origins.iter().any(|o| o.id == config.default_cache_behavior.target_origin_id) {
            return Err(format!(
                "Default cache behavior targets origin {:?} which is not defined",
                config.default_cache_behavior.target_origin_id
            ));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err("Aliases require a viewer certificate".into());
        }
        Ok(())
    }
}

/// A distribution in front of a single S3 bucket, read through an origin
/// access identity so the bucket itself can stay private.
pub struct Input {
    pub logical_name: String,
    /// regional domain name of the origin bucket, eg: `GetAtt Bucket.RegionalDomainName`.
    pub origin_domain_name: Value,
    /// logical id of the [`CfnCloudFrontOriginAccessIdentity`] allowed to read the bucket.
    pub origin_access_identity: String,
    /// alternate domain names served by the distribution.
    /// Each one must be covered by `certificate`.
    pub aliases: Vec<String>,
    pub certificate: Option<Certificate>,
    /// By default set to redirect-to-https.
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub default_root_object: String,
    pub price_class: String,
    /// by default we create the distribution enabled and ready to use.
    pub disabled: bool,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_name: String::new(),
            origin_domain_name: Value::Null,
            origin_access_identity: String::new(),
            aliases: vec![],
            certificate: None,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            default_root_object: "index.html".into(),
            price_class: "PriceClass_100".into(),
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    pub logical_distr_name: String,
}

impl Outputs {
    /// `Ref` of a distribution is its id.
    pub fn id(&self) -> Value {
        get_ref(&self.logical_distr_name)
    }

    /// the `*.cloudfront.net` name alias records point at.
    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_distr_name, "DomainName")
    }
}

pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Outputs, StackError> {
    let logical_distr_name = &myinput.logical_name;
    if myinput.origin_access_identity.is_empty() || !stackinp.contains(&myinput.origin_access_identity) {
        return Err(StackError::DanglingReference {
            resource: logical_distr_name.clone(),
            target: myinput.origin_access_identity.clone(),
        });
    }
    let viewer_certificate = match &myinput.certificate {
        Some(cert) => {
            if let Some(alias) = cert.uncovered(&myinput.aliases) {
                return Err(StackError::validation(
                    logical_distr_name,
                    format!("Alias {alias:?} is not covered by the distribution's certificate"),
                ));
            }
            Some(ViewerCertificate {
                acm_certificate_arn: cert.arn(),
                ssl_support_method: "sni-only".into(),
                minimum_protocol_version: "TLSv1.2_2021".into(),
            })
        }
        None => None,
    };

    let default_origin_id = "origin1";
    let origin = Origin {
        id: default_origin_id.into(),
        domain_name: myinput.origin_domain_name.clone().into(),
        s3_origin_config: S3OriginConfig {
            origin_access_identity: sub(format!(
                "origin-access-identity/cloudfront/${{{}}}",
                myinput.origin_access_identity
            ))
            .into(),
        },
    };
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            enabled: !myinput.disabled,
            aliases: myinput.aliases.clone(),
            default_root_object: myinput.default_root_object.clone(),
            http_version: "http2".into(),
            ipv6_enabled: true,
            price_class: myinput.price_class.clone(),
            origins: vec![origin],
            default_cache_behavior: DefaultCacheBehavior {
                target_origin_id: default_origin_id.into(),
                viewer_protocol_policy: myinput.viewer_protocol_policy,
                allowed_methods: vec!["GET".into(), "HEAD".into()],
                cached_methods: vec!["GET".into(), "HEAD".into()],
                compress: true,
                forwarded_values: ForwardedValues {
                    query_string: false,
                    cookies: Cookies { forward: "none".into() },
                },
            },
            viewer_certificate,
        },
    };
    stackinp.push(Resource::new(logical_distr_name, distribution));
    Ok(Outputs {
        logical_distr_name: logical_distr_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::validate_resources_to_template;
    use serde_json::json;

    fn site_stack() -> aws_cfn_stack::Input {
        let mut stack = aws_cfn_stack::Input::default();
        origin_access_identity::config("SiteOAI", "blog.example.com", &mut stack);
        stack
    }

    fn cert() -> Certificate {
        Certificate::Issued {
            logical_name: "SiteCertificate".into(),
            names: vec!["blog.example.com".into(), "example.com".into(), "www.example.com".into()],
        }
    }

    fn input() -> Input {
        Input {
            logical_name: "SiteDistribution".into(),
            origin_domain_name: get_att("SiteBucket", "RegionalDomainName"),
            origin_access_identity: "SiteOAI".into(),
            aliases: vec!["blog.example.com".into(), "example.com".into(), "www.example.com".into()],
            certificate: Some(cert()),
            ..Default::default()
        }
    }

    #[test]
    fn s3_origin_through_identity() {
        let mut stack = site_stack();
        let outputs = config(&input(), &mut stack).unwrap();
        assert_eq!(outputs.domain_name(), json!({ "Fn::GetAtt": ["SiteDistribution", "DomainName"] }));
        let props = stack.get("SiteDistribution").unwrap().properties.properties().unwrap();
        let config = &props["DistributionConfig"];
        assert_eq!(config["Origins"][0]["S3OriginConfig"]["OriginAccessIdentity"], json!({ "Fn::Sub": "origin-access-identity/cloudfront/${SiteOAI}" }));
        assert_eq!(config["DefaultCacheBehavior"]["ViewerProtocolPolicy"], json!("redirect-to-https"));
        assert_eq!(config["DefaultRootObject"], json!("index.html"));
        assert_eq!(config["ViewerCertificate"]["AcmCertificateArn"], json!({ "Ref": "SiteCertificate" }));
        assert_eq!(config["ViewerCertificate"]["SslSupportMethod"], json!("sni-only"));
        assert_eq!(config["PriceClass"], json!("PriceClass_100"));
        assert_eq!(config["IPV6Enabled"], json!(true));
        assert_eq!(config["Aliases"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn uncovered_alias_is_rejected() {
        let mut stack = site_stack();
        let mut bad = input();
        bad.aliases.push("shop.example.com".into());
        let err = config(&bad, &mut stack).unwrap_err().to_string();
        assert!(err.contains("shop.example.com"));
    }

    #[test]
    fn no_distribution_without_identity() {
        let mut stack = aws_cfn_stack::Input::default();
        assert!(matches!(config(&input(), &mut stack), Err(StackError::DanglingReference { .. })));
        assert!(stack.resources.is_empty());
    }

    #[test]
    fn aliases_without_cert_fail_validation() {
        let mut stack = site_stack();
        let mut no_cert = input();
        no_cert.certificate = None;
        config(&no_cert, &mut stack).unwrap();
        let err = validate_resources_to_template(&stack).unwrap_err().to_string();
        assert!(err.contains("Aliases require a viewer certificate"));
    }
}
