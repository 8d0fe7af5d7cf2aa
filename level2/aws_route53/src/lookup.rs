//! Finding the hosted zone for a domain before synthesis.

use aws_sdk_route53::error::DisplayErrorContext;
use thiserror::Error;
use tracing::debug;

use crate::HostedZone;

#[derive(Debug, Error)]
pub enum ZoneLookupError {
    #[error("No public hosted zone named {0} in this account")]
    NotFound(String),

    #[error("Route53 ListHostedZonesByName failed for {domain}\n{message}")]
    Route53 { domain: String, message: String },
}

#[async_trait::async_trait]
pub trait ZoneLookup {
    async fn find_zone(&self, domain: &str) -> Result<HostedZone, ZoneLookupError>;
}

/// A zone given up front, eg: through the `HOSTED_ZONE_ID` setting.
#[derive(Debug, Clone)]
pub struct StaticZoneLookup {
    pub zones: Vec<HostedZone>,
}

#[async_trait::async_trait]
impl ZoneLookup for StaticZoneLookup {
    async fn find_zone(&self, domain: &str) -> Result<HostedZone, ZoneLookupError> {
        let wanted = domain.trim_end_matches('.').to_ascii_lowercase();
        self.zones
            .iter()
            .find(|z| z.name == wanted)
            .cloned()
            .ok_or(ZoneLookupError::NotFound(wanted))
    }
}

pub struct Route53ZoneLookup {
    client: aws_sdk_route53::Client,
}

impl Route53ZoneLookup {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_route53::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl ZoneLookup for Route53ZoneLookup {
    /// exact match on a public zone, the same rule `HostedZone.fromLookup` applies.
    async fn find_zone(&self, domain: &str) -> Result<HostedZone, ZoneLookupError> {
        let wanted = domain.trim_end_matches('.').to_ascii_lowercase();
        let resp = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(format!("{wanted}."))
            .send()
            .await
            .map_err(|e| ZoneLookupError::Route53 {
                domain: wanted.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        let zones = resp
            .hosted_zones()
            .iter()
            .filter(|z| !z.config().is_some_and(|c| c.private_zone()))
            .map(|z| HostedZone::new(z.id(), z.name()));
        let found = pick_zone(zones, &wanted)?;
        debug!(domain = %wanted, zone_id = %found.id, "found hosted zone");
        Ok(found)
    }
}

fn pick_zone(mut zones: impl Iterator<Item = HostedZone>, wanted: &str) -> Result<HostedZone, ZoneLookupError> {
    zones
        .find(|z| z.name == wanted)
        .ok_or_else(|| ZoneLookupError::NotFound(wanted.to_string()))
}
