// Firewall group and rule endpoints
//
// Both live under the legacy REST namespace: `rest/firewallgroup` and
// `rest/firewallrule`. Updates are full-object PUTs, so a group's member
// list is always replaced wholesale.

use reqwest::Method;
use tracing::debug;

use crate::error::Error;
use crate::legacy::client::LegacyClient;
use crate::legacy::models::{LegacyFirewallGroup, LegacyFirewallRule};

impl LegacyClient {
    /// List all firewall groups of the site.
    ///
    /// `GET /api/s/{site}/rest/firewallgroup`
    pub async fn list_firewall_groups(&self) -> Result<Vec<LegacyFirewallGroup>, Error> {
        let url = self.site_url("rest/firewallgroup")?;
        self.send_legacy(self.request(Method::GET, url)).await
    }

    /// Create a firewall group and return it as stored (with `_id`).
    ///
    /// `POST /api/s/{site}/rest/firewallgroup`
    pub async fn create_firewall_group(
        &self,
        group: &LegacyFirewallGroup,
    ) -> Result<LegacyFirewallGroup, Error> {
        let url = self.site_url("rest/firewallgroup")?;
        debug!(name = %group.name, members = group.group_members.len(), "creating firewall group");
        let created = self
            .send_legacy(self.request(Method::POST, url).json(group))
            .await?;
        first_or_missing(created, "create firewall group")
    }

    /// Replace a firewall group (name, type, and full member list).
    ///
    /// `PUT /api/s/{site}/rest/firewallgroup/{id}`
    pub async fn update_firewall_group(
        &self,
        id: &str,
        group: &LegacyFirewallGroup,
    ) -> Result<LegacyFirewallGroup, Error> {
        let url = self.site_url(&format!("rest/firewallgroup/{id}"))?;
        debug!(id, name = %group.name, members = group.group_members.len(), "updating firewall group");
        let updated = self
            .send_legacy(self.request(Method::PUT, url).json(group))
            .await?;
        first_or_missing(updated, "update firewall group")
    }

    /// List all firewall rules of the site.
    ///
    /// `GET /api/s/{site}/rest/firewallrule`
    pub async fn list_firewall_rules(&self) -> Result<Vec<LegacyFirewallRule>, Error> {
        let url = self.site_url("rest/firewallrule")?;
        self.send_legacy(self.request(Method::GET, url)).await
    }

    /// Create a firewall rule and return it as stored (with `_id`).
    ///
    /// `POST /api/s/{site}/rest/firewallrule`
    pub async fn create_firewall_rule(
        &self,
        rule: &LegacyFirewallRule,
    ) -> Result<LegacyFirewallRule, Error> {
        let url = self.site_url("rest/firewallrule")?;
        debug!(name = %rule.name, ruleset = %rule.ruleset, index = rule.rule_index, "creating firewall rule");
        let created = self
            .send_legacy(self.request(Method::POST, url).json(rule))
            .await?;
        first_or_missing(created, "create firewall rule")
    }
}

/// The REST namespace echoes a created/updated object as a one-element list.
fn first_or_missing<T>(data: Vec<T>, operation: &str) -> Result<T, Error> {
    data.into_iter().next().ok_or_else(|| Error::LegacyApi {
        message: format!("{operation}: controller returned no object"),
    })
}
