use aws_cfn_stack::{canonical_user_principal, get_att, Resource};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessIdentityConfig {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCloudFrontOriginAccessIdentity {
    pub cloud_front_origin_access_identity_config: OriginAccessIdentityConfig,
}

aws_cfn_stack::cfn_resource!(CfnCloudFrontOriginAccessIdentity, "AWS::CloudFront::CloudFrontOriginAccessIdentity");

/// Declares the identity and returns its logical id.
pub fn config(logical_name: &str, comment: &str, stackinp: &mut aws_cfn_stack::Input) -> String {
    let oai = CfnCloudFrontOriginAccessIdentity {
        cloud_front_origin_access_identity_config: OriginAccessIdentityConfig {
            comment: format!("Allows CloudFront to reach {comment}"),
        },
    };
    stackinp.push(Resource::new(logical_name, oai));
    logical_name.to_string()
}

/// principal to grant bucket read to.
pub fn principal(logical_name: &str) -> Value {
    canonical_user_principal(get_att(logical_name, "S3CanonicalUserId"))
}
