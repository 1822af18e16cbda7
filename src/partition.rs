//! Named partitions of the news store.
//!
//! The portal keeps one unscoped homepage bucket and one bucket per region.
//! Partitions are siblings: an article or category belongs to exactly one of
//! them and never references another.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A region with its own news partition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Africa,
    Asia,
    Australia,
    Europe,
    NorthAmerica,
    SouthAmerica,
    Antarctica,
    India,
    Global,
}

impl Region {
    /// Every region, in the order searches aggregate them.
    pub const ALL: [Region; 9] = [
        Region::Africa,
        Region::Asia,
        Region::Australia,
        Region::Europe,
        Region::NorthAmerica,
        Region::SouthAmerica,
        Region::Antarctica,
        Region::India,
        Region::Global,
    ];

    /// The identifier used in URLs, role names and storage keys.
    pub fn key(self) -> &'static str {
        match self {
            Region::Africa => "africa",
            Region::Asia => "asia",
            Region::Australia => "australia",
            Region::Europe => "europe",
            Region::NorthAmerica => "north-america",
            Region::SouthAmerica => "south-america",
            Region::Antarctica => "antarctica",
            Region::India => "india",
            Region::Global => "global",
        }
    }

    pub fn display_name(self) -> String {
        page_name(self.key())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.key() == s)
            .ok_or_else(|| Error::InvalidPartition(s.to_string()))
    }
}

/// A bucket of articles and categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Homepage,
    Region(Region),
}

impl Partition {
    pub const HOMEPAGE_KEY: &'static str = "homepage";

    /// Homepage first, then every region in canonical order.
    pub fn all() -> impl Iterator<Item = Partition> {
        std::iter::once(Partition::Homepage)
            .chain(Region::ALL.into_iter().map(Partition::Region))
    }

    pub fn key(self) -> &'static str {
        match self {
            Partition::Homepage => Self::HOMEPAGE_KEY,
            Partition::Region(region) => region.key(),
        }
    }

    /// Provenance label attached to search results.
    pub fn display_name(self) -> String {
        match self {
            Partition::Homepage => "Homepage".to_string(),
            Partition::Region(region) => region.display_name(),
        }
    }
}

impl From<Region> for Partition {
    fn from(region: Region) -> Self {
        Partition::Region(region)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::HOMEPAGE_KEY {
            Ok(Partition::Homepage)
        } else {
            s.parse().map(Partition::Region)
        }
    }
}

/// Upper-case the first character and turn the first `-` into a space, so
/// `north-america` is shown as `North america`.
fn page_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().replacen('-', " ", 1);
            first.to_uppercase().chain(rest.chars()).collect()
        }
        None => String::new(),
    }
}
