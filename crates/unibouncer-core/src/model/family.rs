// ── Address families ──
//
// IPv4 and IPv6 state never mixes. Everything per-family lives in a
// `PerFamily<T>` with two named partitions instead of a keyed map, so a
// match over `IpFamily` is always exhaustive.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// IP address family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
pub enum IpFamily {
    #[strum(serialize = "ipv4")]
    #[serde(rename = "ipv4")]
    V4,
    #[strum(serialize = "ipv6")]
    #[serde(rename = "ipv6")]
    V6,
}

impl IpFamily {
    /// Iterate both families, v4 first.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// One value per address family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerFamily<T> {
    pub v4: T,
    pub v6: T,
}

impl<T> PerFamily<T> {
    pub fn new(v4: T, v6: T) -> Self {
        Self { v4, v6 }
    }

    /// Iterate `(family, &value)` pairs, v4 first.
    pub fn iter(&self) -> impl Iterator<Item = (IpFamily, &T)> {
        [(IpFamily::V4, &self.v4), (IpFamily::V6, &self.v6)].into_iter()
    }
}

impl<T> Index<IpFamily> for PerFamily<T> {
    type Output = T;

    fn index(&self, family: IpFamily) -> &T {
        match family {
            IpFamily::V4 => &self.v4,
            IpFamily::V6 => &self.v6,
        }
    }
}

impl<T> IndexMut<IpFamily> for PerFamily<T> {
    fn index_mut(&mut self, family: IpFamily) -> &mut T {
        match family {
            IpFamily::V4 => &mut self.v4,
            IpFamily::V6 => &mut self.v6,
        }
    }
}
