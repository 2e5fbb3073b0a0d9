// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Identifies which physical engine instance executed a submission.
//!
//! The command streamer exposes a CS engine id register; the pipeline stores it into status
//! memory at the end of each workload. Its layout is:
//!
//! ```text
//!  31                10 9          4   3  2     0
//! +--------------------+------------+---+--------+
//! |      reserved      | instanceId | r | classId|
//! +--------------------+------------+---+--------+
//! ```

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use log::info;
use log::warn;
use serde::Serialize;

/// Number of engine instances per class the resolver can track.
pub const CS_INSTANCE_ID_MAX: u8 = 8;

const CLASS_ID_MASK: u32 = 0x7;
const INSTANCE_ID_SHIFT: u32 = 4;
const INSTANCE_ID_MASK: u32 = 0x3f;

/// Engine class encoded in bits 0..2 of the CS engine id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, enumn::N)]
#[repr(u8)]
pub enum EngineClass {
    Render = 0,
    Video = 1,
    VideoEnhancement = 2,
    Copy = 3,
    Other = 4,
    Compute = 5,
}

/// A decoded CS engine id register value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CsEngineId {
    /// `None` for class ids the hardware does not define.
    pub class: Option<EngineClass>,
    pub class_id: u8,
    pub instance: u8,
}

impl CsEngineId {
    /// Decodes a raw register dump.
    ///
    /// Instance ids beyond `CS_INSTANCE_ID_MAX` cannot name a real engine and decode as
    /// instance 0.
    pub fn from_raw(raw: u32) -> Self {
        let class_id = (raw & CLASS_ID_MASK) as u8;
        let mut instance = ((raw >> INSTANCE_ID_SHIFT) & INSTANCE_ID_MASK) as u8;
        if instance >= CS_INSTANCE_ID_MAX {
            warn!(
                "CS engine id {:#x} has out of range instance {}, using 0",
                raw, instance
            );
            instance = 0;
        }
        CsEngineId {
            class: EngineClass::n(class_id),
            class_id,
            instance,
        }
    }

    pub fn is_video(&self) -> bool {
        self.class == Some(EngineClass::Video)
    }
}

/// Accumulated mask of every VDBOX instance that ever executed a workload.
///
/// Each instance owns one nibble of the mask, so VDBOX `n` sets bit `4 * n`. The mask is shared
/// by every tracker that was handed the same `EngineUsage`.
#[derive(Debug, Default)]
pub struct EngineUsage {
    used_vdbox_ids: AtomicU32,
}

impl EngineUsage {
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one raw CS engine id dump into the mask.
    ///
    /// A zero dump means the pipe never ran and is ignored, as are engines of other classes.
    pub fn record(&self, raw: u32) {
        if raw == 0 {
            return;
        }
        let id = CsEngineId::from_raw(raw);
        if !id.is_video() {
            warn!("CS engine id {:#x} is not a video engine (class {})", raw, id.class_id);
            return;
        }
        self.used_vdbox_ids
            .fetch_or(1 << (u32::from(id.instance) << 2), Ordering::Relaxed);
    }

    pub fn used_vdbox_ids(&self) -> u32 {
        self.used_vdbox_ids.load(Ordering::Relaxed)
    }

    /// Logs the mask of VDBOX instances used so far.
    pub fn report(&self) {
        info!("used VDBOX ids: {:#010x}", self.used_vdbox_ids());
    }
}
