// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-generation capabilities of the media engines.

use hw_cmd::Generation;
use hw_cmd::InstructionRegistry;
use status_report::DEFAULT_STATUS_NUM;

/// MMIO base of each VDBOX command streamer, by instance.
const VDBOX_MMIO_BASE: [u32; 8] = [
    0x1c_0000, 0x1c_4000, 0x1d_0000, 0x1d_4000, 0x1e_0000, 0x1e_4000, 0x1f_0000, 0x1f_4000,
];

const CS_ENGINE_ID_OFFSET: u32 = 0x8c;
const MFX_ERROR_FLAGS_OFFSET: u32 = 0x800;
const MFX_FRAME_CRC_OFFSET: u32 = 0x850;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    generation: Generation,
    vdbox_count: u8,
    default_status_num: u32,
}

impl Platform {
    pub fn new(generation: Generation) -> Self {
        let vdbox_count = match generation {
            Generation::Xe2Lpm => 2,
            Generation::Xe2Hpm => 4,
            Generation::Xe3Lpm => 2,
        };
        Platform {
            generation,
            vdbox_count,
            default_status_num: DEFAULT_STATUS_NUM,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn registry(&self) -> &'static InstructionRegistry {
        self.generation.registry()
    }

    pub fn vdbox_count(&self) -> u8 {
        self.vdbox_count
    }

    pub fn default_status_num(&self) -> u32 {
        self.default_status_num
    }

    fn vdbox_register(&self, pipe: u8, offset: u32) -> Option<u32> {
        if pipe >= self.vdbox_count {
            return None;
        }
        VDBOX_MMIO_BASE
            .get(usize::from(pipe))
            .map(|base| base + offset)
    }

    /// CS engine id register of the VDBOX running `pipe`.
    pub fn cs_engine_id_register(&self, pipe: u8) -> Option<u32> {
        self.vdbox_register(pipe, CS_ENGINE_ID_OFFSET)
    }

    pub fn mfx_error_flags_register(&self, pipe: u8) -> Option<u32> {
        self.vdbox_register(pipe, MFX_ERROR_FLAGS_OFFSET)
    }

    pub fn mfx_frame_crc_register(&self, pipe: u8) -> Option<u32> {
        self.vdbox_register(pipe, MFX_FRAME_CRC_OFFSET)
    }
}
