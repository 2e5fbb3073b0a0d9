// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::registry::InstructionRegistry;
use crate::xe2_lpm_base;

/// Hardware generation whose instruction layouts are used for encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    #[default]
    Xe2Lpm,
    Xe2Hpm,
    Xe3Lpm,
}

impl Generation {
    pub const ALL: [Generation; 3] = [Generation::Xe2Lpm, Generation::Xe2Hpm, Generation::Xe3Lpm];

    pub fn name(self) -> &'static str {
        match self {
            Generation::Xe2Lpm => "xe2_lpm",
            Generation::Xe2Hpm => "xe2_hpm",
            Generation::Xe3Lpm => "xe3_lpm",
        }
    }

    /// Instruction table used when building command buffers for this generation.
    pub fn registry(self) -> &'static InstructionRegistry {
        match self {
            // Xe2 HPM and Xe3 LPM media engines keep the Xe2 LPM base MI/VDBOX control layouts.
            Generation::Xe2Lpm | Generation::Xe2Hpm | Generation::Xe3Lpm => {
                &xe2_lpm_base::REGISTRY
            }
        }
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Generation::ALL
            .iter()
            .copied()
            .find(|g| g.name() == s)
            .ok_or_else(|| format!("unknown hardware generation: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        for g in Generation::ALL {
            assert_eq!(g.name().parse::<Generation>(), Ok(g));
        }
        assert!("gen12".parse::<Generation>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        let g: Generation = serde_json::from_str("\"xe3_lpm\"").unwrap();
        assert_eq!(g, Generation::Xe3Lpm);
        assert_eq!(serde_json::to_string(&Generation::Xe2Hpm).unwrap(), "\"xe2_hpm\"");
    }
}
