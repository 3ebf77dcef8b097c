// ── Blocked addresses ──

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use super::family::IpFamily;

/// A single IP or CIDR range that should be blocked.
///
/// Host bits are truncated on construction, so `10.1.2.3/8` and
/// `10.0.0.0/8` are the same entry. A full-length prefix displays as a bare
/// address (`1.2.3.4`), which is the form UniFi stores in group members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockedAddress(IpNet);

impl BlockedAddress {
    pub fn new(net: IpNet) -> Self {
        Self(net.trunc())
    }

    pub fn family(&self) -> IpFamily {
        match self.0 {
            IpNet::V4(_) => IpFamily::V4,
            IpNet::V6(_) => IpFamily::V6,
        }
    }

    pub fn net(&self) -> IpNet {
        self.0
    }

    /// True for a single address rather than a range.
    pub fn is_host(&self) -> bool {
        self.0.prefix_len() == self.0.max_prefix_len()
    }
}

impl From<IpAddr> for BlockedAddress {
    fn from(addr: IpAddr) -> Self {
        Self(IpNet::from(addr))
    }
}

/// Rejected address or range value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an IP address or CIDR range: {0:?}")]
pub struct InvalidAddress(pub String);

impl FromStr for BlockedAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains('/') {
            trimmed
                .parse::<IpNet>()
                .map(Self::new)
                .map_err(|_| InvalidAddress(s.to_owned()))
        } else {
            trimmed
                .parse::<IpAddr>()
                .map(Self::from)
                .map_err(|_| InvalidAddress(s.to_owned()))
        }
    }
}

impl fmt::Display for BlockedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "{}", self.0.addr())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
