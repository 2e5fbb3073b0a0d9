// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem::offset_of;
use std::mem::size_of;

use log::warn;
use serde::Serialize;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::engine::CsEngineId;
use crate::tracker::ReportFormat;
use crate::tracker::SlotView;
use crate::tracker::StatusItem;
use crate::ExecutingStatus;

/// Report type of the `MfxStatus` block.
pub const STATUS_REPORT_MFX: u32 = 2;

/// Per-submission status block written by the video command streamer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct MfxStatus {
    /// An `ExecutingStatus` marker.
    pub status: u32,
    pub mmio_error_status: u32,
    pub mmio_frame_crc: u32,
    pub reserved: u32,
}

const_assert_eq!(size_of::<MfxStatus>(), 16);

impl MfxStatus {
    pub const STATUS_OFFSET: usize = offset_of!(MfxStatus, status);
    pub const ERROR_STATUS_OFFSET: usize = offset_of!(MfxStatus, mmio_error_status);
    pub const FRAME_CRC_OFFSET: usize = offset_of!(MfxStatus, mmio_frame_crc);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CodecStatus {
    Success,
    /// Hardware started the workload but never marked it finished.
    Incomplete,
    Error,
    /// The workload was skipped before reaching hardware.
    Skipped,
    NotReady,
    Unavailable,
}

/// Caller data carried through the ring with each submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameParams {
    pub feedback: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaReport {
    pub submission: u32,
    pub feedback: Option<u32>,
    pub status: CodecStatus,
    pub error_status: u32,
    pub frame_crc: u32,
    pub engines: Vec<CsEngineId>,
}

/// Report format of the video decode pipeline.
pub struct MediaStatusFormat {
    error_mask: u32,
}

impl MediaStatusFormat {
    /// Creates a format treating set bits of `error_mask` in the MMIO error status as failures.
    pub fn new(error_mask: u32) -> Self {
        MediaStatusFormat { error_mask }
    }
}

impl Default for MediaStatusFormat {
    fn default() -> Self {
        MediaStatusFormat::new(u32::MAX)
    }
}

impl ReportFormat for MediaStatusFormat {
    type Params = FrameParams;
    type Report = MediaReport;

    fn items(&self) -> Vec<StatusItem> {
        vec![StatusItem {
            report_type: STATUS_REPORT_MFX,
            size: size_of::<MfxStatus>(),
        }]
    }

    fn parse_status(&mut self, slot: &SlotView<'_, FrameParams>) -> MediaReport {
        let mut report = MediaReport {
            submission: slot.submission(),
            feedback: Some(slot.params().feedback),
            status: CodecStatus::Error,
            error_status: 0,
            frame_crc: 0,
            engines: slot
                .engine_ids()
                .unwrap_or_default()
                .into_iter()
                .filter(|raw| *raw != 0)
                .map(CsEngineId::from_raw)
                .collect(),
        };
        let raw: MfxStatus = match slot.read(STATUS_REPORT_MFX) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "failed to read status of submission {}: {}",
                    slot.submission(),
                    e
                );
                return report;
            }
        };
        report.error_status = raw.mmio_error_status;
        report.frame_crc = raw.mmio_frame_crc;
        report.status = match ExecutingStatus::n(raw.status) {
            Some(ExecutingStatus::QueryEnd) if raw.mmio_error_status & self.error_mask != 0 => {
                CodecStatus::Error
            }
            Some(ExecutingStatus::QueryEnd) => CodecStatus::Success,
            Some(ExecutingStatus::QueryStart) => CodecStatus::Incomplete,
            Some(ExecutingStatus::QuerySkipped) => CodecStatus::Skipped,
            None => {
                warn!(
                    "submission {} has unknown executing status {:#x}",
                    slot.submission(),
                    raw.status
                );
                CodecStatus::Error
            }
        };
        report
    }

    fn set_status(
        &mut self,
        submission: u32,
        slot: Option<&SlotView<'_, FrameParams>>,
        out_of_range: bool,
    ) -> MediaReport {
        MediaReport {
            submission,
            feedback: slot.map(|s| s.params().feedback),
            status: if out_of_range {
                CodecStatus::Unavailable
            } else {
                CodecStatus::NotReady
            },
            error_status: 0,
            frame_crc: 0,
            engines: Vec::new(),
        }
    }
}
