//! Route 53 alias records, and the hosted zone they are written into.

use aws_cfn_stack::{to_properties, verify_resource_name, CfnResource, Resource, StackError, StrVal};
use serde::Serialize;
use serde_json::Value;

pub mod lookup;

pub use lookup::{Route53ZoneLookup, StaticZoneLookup, ZoneLookup, ZoneLookupError};

/// A public hosted zone, resolved before the template is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// id without the `/hostedzone/` prefix.
    pub id: String,
    /// zone name without the trailing dot, eg: `example.com`
    pub name: String,
}

impl HostedZone {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.trim_start_matches("/hostedzone/").to_string(),
            name: name.trim_end_matches('.').to_ascii_lowercase(),
        }
    }

    /// fully qualified name of `sub` in this zone. An empty `sub` is the zone apex.
    pub fn record_name(&self, sub: &str) -> String {
        if sub.is_empty() {
            self.name.clone()
        } else {
            format!("{sub}.{}", self.name)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        name == self.name || name.ends_with(&format!(".{}", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: StrVal,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: StrVal,
    #[serde(rename = "EvaluateTargetHealth")]
    pub evaluate_target_health: bool,
}

impl AliasTarget {
    pub fn new(dns_name: impl Into<StrVal>, hosted_zone_id: impl Into<StrVal>) -> Self {
        Self {
            dns_name: dns_name.into(),
            hosted_zone_id: hosted_zone_id.into(),
            evaluate_target_health: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRecordSet {
    pub hosted_zone_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub alias_target: AliasTarget,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> Result<Value, serde_json::Error> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.hosted_zone_id.is_empty() {
            return Err("Route53 record must have a hosted zone id".into());
        }
        if self.name.is_empty() {
            return Err("Route53 record must have a name. Example mysubdomain.mywebsite.com".into());
        }
        if !matches!(self.record_type.as_str(), "A" | "AAAA") {
            return Err(format!("Alias records must be of type A or AAAA, found {:?}", self.record_type));
        }
        Ok(())
    }
}

pub struct Input {
    pub logical_name: String,
    pub zone: HostedZone,
    /// label inside the zone, eg: `www`. Leave empty for the zone apex.
    pub record_name: String,
    pub target: AliasTarget,
}

/// Declares an alias `A` record and returns its fully qualified name.
pub fn config(myinput: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<String, StackError> {
    let logical_name = &myinput.logical_name;
    if let Some(e) = verify_resource_name(logical_name) {
        return Err(StackError::validation(logical_name, e));
    }
    let name = myinput.zone.record_name(&myinput.record_name);
    if !myinput.zone.contains(&name) {
        return Err(StackError::validation(logical_name, format!("{name} is not inside hosted zone {}", myinput.zone.name)));
    }
    let record = CfnRecordSet {
        hosted_zone_id: myinput.zone.id.clone(),
        name: format!("{name}."),
        record_type: "A".into(),
        comment: Some(name.clone()),
        alias_target: myinput.target.clone(),
    };
    stackinp.push(Resource::new(logical_name, record));
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::get_att;
    use serde_json::json;

    fn zone() -> HostedZone {
        HostedZone::new("/hostedzone/Z0123", "Example.com.")
    }

    #[test]
    fn zone_names() {
        let zone = zone();
        assert_eq!(zone.id, "Z0123");
        assert_eq!(zone.name, "example.com");
        assert_eq!(zone.record_name(""), "example.com");
        assert_eq!(zone.record_name("www"), "www.example.com");
        assert!(zone.contains("blog.example.com."));
        assert!(!zone.contains("badexample.com"));
    }

    #[test]
    fn alias_record_shape() {
        let mut stack = aws_cfn_stack::Input::default();
        let name = config(
            &Input {
                logical_name: "CdnWwwARecord".into(),
                zone: zone(),
                record_name: "www".into(),
                target: AliasTarget::new(get_att("SiteDistribution", "DomainName"), "Z2FDTNDATAQYW2"),
            },
            &mut stack,
        )
        .unwrap();
        assert_eq!(name, "www.example.com");
        let props = stack.get("CdnWwwARecord").unwrap().properties.properties().unwrap();
        assert_eq!(props["Name"], json!("www.example.com."));
        assert_eq!(props["Type"], json!("A"));
        assert_eq!(props["HostedZoneId"], json!("Z0123"));
        assert_eq!(props["AliasTarget"]["DNSName"], json!({ "Fn::GetAtt": ["SiteDistribution", "DomainName"] }));
        assert_eq!(props["AliasTarget"]["EvaluateTargetHealth"], json!(false));
    }

    #[test]
    fn bad_logical_name() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = Input {
            logical_name: "api-dns".into(),
            zone: zone(),
            record_name: "api".into(),
            target: AliasTarget::new("d.example.net", "Z1"),
        };
        assert!(config(&input, &mut stack).is_err());
    }
}
