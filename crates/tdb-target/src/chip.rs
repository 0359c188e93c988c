//! Chip identity.
//!
//! The supported TPU families form a closed set. Names are converted to
//! [`Target`] once at the boundary; everything past that dispatches on the
//! enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// A supported TPU chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "BM1684X")]
    Bm1684x,
    #[serde(rename = "BM1684")]
    Bm1684,
    #[serde(rename = "BM1688")]
    Bm1688,
    #[serde(rename = "SG2260")]
    Sg2260,
}

impl Target {
    /// Every supported chip, in registration order.
    pub const ALL: [Target; 4] = [
        Target::Bm1684x,
        Target::Bm1684,
        Target::Bm1688,
        Target::Sg2260,
    ];

    /// Canonical chip name as it appears in bmodel files and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Target::Bm1684x => "BM1684X",
            Target::Bm1684 => "BM1684",
            Target::Bm1688 => "BM1688",
            Target::Sg2260 => "SG2260",
        }
    }

    /// One-line description used by listings.
    pub const fn description(self) -> &'static str {
        match self {
            Target::Bm1684x => "BM1684X, 64-lane TPU with L2 SRAM",
            Target::Bm1684 => "BM1684, first-generation 64-lane TPU",
            Target::Bm1688 => "BM1688, 32-lane edge TPU",
            Target::Sg2260 => "SG2260, 64-lane training TPU with message sync",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| TargetError::UnsupportedTarget { name: s.into() })
    }
}
