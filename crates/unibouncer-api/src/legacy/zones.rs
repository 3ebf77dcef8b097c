// Zone-based firewall endpoints (v2 API)
//
// Zones and zone policies are only exposed through the un-enveloped v2
// surface: `/v2/api/site/{site}/firewall/zone` and
// `/v2/api/site/{site}/firewall-policies`.

use reqwest::Method;
use tracing::debug;

use crate::error::Error;
use crate::legacy::client::LegacyClient;
use crate::legacy::models::{FirewallZone, PolicyReorder, ZonePolicy};

impl LegacyClient {
    /// List the firewall zones of the site.
    ///
    /// Fails (typically with HTTP 404) on sites that have not been
    /// migrated to the zone-based firewall.
    pub async fn list_firewall_zones(&self) -> Result<Vec<FirewallZone>, Error> {
        let url = self.v2_url("firewall/zone")?;
        self.send_v2(self.request(Method::GET, url)).await
    }

    /// List all zone policies, predefined ones included.
    pub async fn list_zone_policies(&self) -> Result<Vec<ZonePolicy>, Error> {
        let url = self.v2_url("firewall-policies")?;
        self.send_v2(self.request(Method::GET, url)).await
    }

    /// Create a zone policy and return it as stored (with `_id`).
    pub async fn create_zone_policy(&self, policy: &ZonePolicy) -> Result<ZonePolicy, Error> {
        let url = self.v2_url("firewall-policies")?;
        debug!(name = %policy.name, "creating zone policy");
        self.send_v2(self.request(Method::POST, url).json(policy)).await
    }

    /// Reorder the user-defined policies of one zone pair.
    pub async fn reorder_zone_policies(&self, reorder: &PolicyReorder) -> Result<(), Error> {
        let url = self.v2_url("firewall-policies/batch-reorder")?;
        debug!(
            source = %reorder.source_zone_id,
            destination = %reorder.destination_zone_id,
            count = reorder.before_predefined_ids.len(),
            "reordering zone policies"
        );
        let _: serde_json::Value = self
            .send_v2(self.request(Method::PUT, url).json(reorder))
            .await?;
        Ok(())
    }
}
