use aws_cfn_stack::{get_ref, CfnResource, Resource, StackError, StrVal};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCertificate {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl CfnResource for CfnCertificate {
    fn type_string(&self) -> &'static str {
        "AWS::CertificateManager::Certificate"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        aws_cfn_stack::to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        for name in std::iter::once(&self.domain_name).chain(self.subject_alternative_names.iter()) {
            if let Some(e) = verify_domain_name(name) {
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Checks a name the way ACM does. Examples of valid values:
/// - www.mysite.com
/// - multiple.sub.domains.mysite.com
/// - mysite.com
/// - *.mysite.com
///
/// Examples of invalid values:
/// - *.something.*.mysite.com
/// - cannotendwithdot.com.
pub fn verify_domain_name(domain_name: &str) -> Option<String> {
    if domain_name.is_empty() {
        return Some("Must provide a domain name".to_string());
    }
    if domain_name.len() > 253 {
        return Some(format!("Invalid domain name {:?}\nMust be at most 253 characters", domain_name));
    }
    if domain_name.matches('*').count() > 1 {
        return Some(format!("Must only provide 1 wildcard. {} is invalid.", domain_name));
    }
    if domain_name.contains('*') && !domain_name.starts_with("*.") {
        return Some(format!("If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\". {} is invalid.", domain_name));
    }
    if domain_name.split('.').any(|label| label.is_empty() || label.len() > 63) {
        return Some(format!("Invalid domain name {:?}\nEvery label must be between 1 and 63 characters", domain_name));
    }
    let valid_char_check = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '*';
    if !domain_name.chars().all(valid_char_check) {
        return Some(format!("Invalid domain name {:?}\nMay only contain letters, numbers, dots, and dashes", domain_name));
    }
    None
}

/// true if `pattern` (a certificate name, possibly `*.` prefixed) matches `name`.
/// A wildcard matches exactly one label.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(parent) => name
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == parent),
        None => pattern == name,
    }
}

/// Requests a DNS validated certificate. This only works if the following is true:
/// - The domain you'd like to get a certificate for is hosted in Amazon Route 53
/// - The hosted zone resides in the account the stack is deployed into.
///
/// CloudFormation creates the validation records itself when every name has a
/// `DomainValidationOption` pointing at the hosted zone.
#[derive(Debug, Clone, Default)]
pub struct Input {
    pub logical_name: String,
    /// the name the certificate is issued for. Must be fully qualified. Can have 1 optional wildcard.
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    /// The hosted zone ID of where your domain is hosted in Route53,
    /// without the `/hostedzone/` prefix.
    pub hosted_zone_id: String,
}

/// A certificate issued in this stack, one issued by a companion stack, or
/// one that already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    Issued { logical_name: String, names: Vec<String> },
    /// issued elsewhere, its ARN arrives through the template parameter `parameter`.
    Parameter { parameter: String, names: Vec<String> },
    Imported { arn: String },
}

impl Certificate {
    pub fn from_arn(arn: impl Into<String>) -> Self {
        Certificate::Imported { arn: arn.into() }
    }

    /// `Ref` of a certificate resource is its ARN.
    pub fn arn(&self) -> StrVal {
        match self {
            Certificate::Issued { logical_name, .. } => get_ref(logical_name).into(),
            Certificate::Parameter { parameter, .. } => get_ref(parameter).into(),
            Certificate::Imported { arn } => arn.into(),
        }
    }

    /// whether `name` is covered. Imported certificates are opaque, so they
    /// are assumed to cover whatever they are bound to.
    pub fn covers(&self, name: &str) -> bool {
        match self {
            Certificate::Issued { names, .. } | Certificate::Parameter { names, .. } => {
                names.iter().any(|n| name_matches(n, name))
            }
            Certificate::Imported { .. } => true,
        }
    }

    /// first alias the certificate does not cover, if any.
    pub fn uncovered<'a>(&self, aliases: &'a [String]) -> Option<&'a str> {
        aliases.iter().find(|a| !self.covers(a)).map(String::as_str)
    }
}

pub fn config(self_input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Certificate, StackError> {
    let logical_name = &self_input.logical_name;
    if let Some(e) = verify_domain_name(&self_input.domain_name) {
        return Err(StackError::validation(logical_name, e));
    }
    if self_input.hosted_zone_id.is_empty() {
        return Err(StackError::validation(logical_name, "Must provide the hosted zone ID of where your domain resides"));
    }
    let names: Vec<String> = std::iter::once(self_input.domain_name.clone())
        .chain(self_input.subject_alternative_names.iter().cloned())
        .collect();
    let cert = CfnCertificate {
        domain_name: self_input.domain_name.clone(),
        subject_alternative_names: self_input.subject_alternative_names.clone(),
        validation_method: "DNS".to_string(),
        domain_validation_options: names
            .iter()
            .map(|n| DomainValidationOption {
                domain_name: n.clone(),
                hosted_zone_id: self_input.hosted_zone_id.clone(),
            })
            .collect(),
    };
    stackinp.push(Resource::new(logical_name, cert));
    Ok(Certificate::Issued {
        logical_name: logical_name.clone(),
        names,
    })
}

/// Issues the certificate in `cert_stack` instead of `stackinp`, for
/// certificates that must live in another region. `cert_stack` exports the
/// ARN as output `{logical_name}Arn` and `stackinp` declares a parameter of
/// the same name, to be filled with that output at deploy time.
pub fn config_in_stack(
    self_input: &Input,
    cert_stack: &mut aws_cfn_stack::Input,
    stackinp: &mut aws_cfn_stack::Input,
) -> Result<Certificate, StackError> {
    let issued = config(self_input, cert_stack)?;
    let names = match issued {
        Certificate::Issued { names, .. } => names,
        other => return Ok(other),
    };
    let parameter = format!("{}Arn", self_input.logical_name);
    cert_stack.add_output(&parameter, format!("ARN of {}", self_input.domain_name), get_ref(&self_input.logical_name));
    stackinp.add_parameter(&parameter, format!("ARN of {}, issued by stack {}", self_input.domain_name, cert_stack.stack_name));
    Ok(Certificate::Parameter { parameter, names })
}
