// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use hw_cmd::mi;
use hw_cmd::Generation;
use hw_cmd::InstructionKind;
use hw_cmd::InstructionRegistry;
use hw_cmd::Record;
use serde::Deserialize;
use serde::Serialize;

use crate::registry::CodecRegistry;

const VD_CONTROL_STATE_FOR_HCP: u64 = 10;
const CODEC_ENGINE_NAME_FOR_AVP: u64 = 3;
const CODEC_ENGINE_NAME_FOR_HCP: u64 = 7;

// MI_FORCE_WAKEUP mask bits enabling writes to the power well controls.
const HEVC_POWER_WELL_MASK: u64 = 1 << 8;
const MFX_POWER_WELL_MASK: u64 = 1 << 9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Avc,
    Hevc,
    Av1,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::Avc, Codec::Hevc, Codec::Av1];

    pub fn name(self) -> &'static str {
        match self {
            Codec::Avc => "avc",
            Codec::Hevc => "hevc",
            Codec::Av1 => "av1",
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Codec::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown codec: {}", s))
    }
}

/// The codec specific commands of one frame.
pub trait Workload: Send {
    fn codec(&self) -> Codec;

    /// Commands running the frame on VDBOX `pipe` out of `pipes`.
    fn emit(&self, pipe: u8, pipes: u8) -> hw_cmd::Result<Vec<Record>>;
}

/// AVC runs on the MFX engine.
struct MfxWorkload {
    registry: &'static InstructionRegistry,
}

impl Workload for MfxWorkload {
    fn codec(&self) -> Codec {
        Codec::Avc
    }

    fn emit(&self, _pipe: u8, _pipes: u8) -> hw_cmd::Result<Vec<Record>> {
        let reg = self.registry;
        Ok(vec![
            reg.define(InstructionKind::MiForceWakeup)?
                .with_field("MfxPowerWellControl", 1)?
                .with_field("MaskBits", MFX_POWER_WELL_MASK)?,
            reg.define(InstructionKind::MfxWait)?
                .with_field("MfxSyncControlFlag", 1)?,
            mi::flush_dw(reg)?,
        ])
    }
}

/// HEVC and AV1 run on the HCP and AVP engines, which share the VDBOX control state.
struct HcpWorkload {
    registry: &'static InstructionRegistry,
    codec: Codec,
    engine: u64,
}

impl Workload for HcpWorkload {
    fn codec(&self) -> Codec {
        self.codec
    }

    fn emit(&self, _pipe: u8, pipes: u8) -> hw_cmd::Result<Vec<Record>> {
        let reg = self.registry;
        let control = |field: &str| -> hw_cmd::Result<Record> {
            reg.define(InstructionKind::VdControlState)?
                .with_field("MediaInstructionCommand", VD_CONTROL_STATE_FOR_HCP)?
                .with_field("MediaInstructionOpcode", self.engine)?
                .with_field(field, 1)
        };
        let mut cmds = vec![
            reg.define(InstructionKind::MiForceWakeup)?
                .with_field("HevcPowerWellControl", 1)?
                .with_field("MaskBits", HEVC_POWER_WELL_MASK)?,
            control("PipelineInitialization")?,
        ];
        if pipes > 1 {
            cmds.push(control("ScalableModePipeLock")?);
            cmds.push(control("ScalableModePipeUnlock")?);
        }
        cmds.push(control("MemoryImplicitFlush")?);
        cmds.push(mi::flush_dw(reg)?);
        Ok(cmds)
    }
}

pub type WorkloadRegistry = CodecRegistry<Codec, Generation, Box<dyn Workload>>;

/// Registry of every codec the pipeline can run.
pub fn default_registry() -> WorkloadRegistry {
    let mut registry = WorkloadRegistry::new();
    registry.register(Codec::Avc, |generation: Generation| {
        Box::new(MfxWorkload {
            registry: generation.registry(),
        }) as Box<dyn Workload>
    });
    registry.register(Codec::Hevc, |generation: Generation| {
        Box::new(HcpWorkload {
            registry: generation.registry(),
            codec: Codec::Hevc,
            engine: CODEC_ENGINE_NAME_FOR_HCP,
        }) as Box<dyn Workload>
    });
    registry.register(Codec::Av1, |generation: Generation| {
        Box::new(HcpWorkload {
            registry: generation.registry(),
            codec: Codec::Av1,
            engine: CODEC_ENGINE_NAME_FOR_AVP,
        }) as Box<dyn Workload>
    });
    registry
}
