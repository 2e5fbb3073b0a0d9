// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tracks completion of work submitted to media engines.
//!
//! Every unit of work registered with [`StatusReport::init`] occupies one slot of a fixed ring
//! and gets a monotonically increasing submission id. Hardware reports progress by writing
//! status memory: per-slot report regions and a single completion count. The consumer drains
//! finished slots in order with [`StatusReport::get_report`], which never blocks.

pub mod engine;
mod media_status;
mod memory;
mod observer;
mod tracker;

use remain::sorted;
use serde::Serialize;
use thiserror::Error;

pub use crate::engine::CsEngineId;
pub use crate::engine::EngineClass;
pub use crate::engine::EngineUsage;
pub use crate::media_status::CodecStatus;
pub use crate::media_status::FrameParams;
pub use crate::media_status::MediaReport;
pub use crate::media_status::MediaStatusFormat;
pub use crate::media_status::MfxStatus;
pub use crate::media_status::STATUS_REPORT_MFX;
pub use crate::memory::Allocator;
pub use crate::memory::GpuVaAllocator;
pub use crate::memory::HwWriter;
pub use crate::memory::StatusMemory;
pub use crate::observer::CompletionEvent;
pub use crate::observer::CompletionObserver;
pub use crate::tracker::Counts;
pub use crate::tracker::EngineTag;
pub use crate::tracker::ReportFormat;
pub use crate::tracker::ReportOutcome;
pub use crate::tracker::SlotView;
pub use crate::tracker::StatusBufAddr;
pub use crate::tracker::StatusEntry;
pub use crate::tracker::StatusItem;
pub use crate::tracker::StatusReport;
pub use crate::tracker::TrackerConfig;
pub use crate::tracker::DEFAULT_STATUS_NUM;
pub use crate::tracker::MAX_PIPES;

/// Report type of the completion count cell.
pub const STATUS_REPORT_GLOBAL_COUNT: u32 = 0;
/// Report type of the per-pipe CS engine id dumps.
pub const STATUS_REPORT_CS_ENGINE_ID: u32 = 1;

/// Progress markers the command streamer stores into a slot's status dword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, enumn::N)]
#[repr(u32)]
pub enum ExecutingStatus {
    QuerySkipped = 0x00,
    QueryStart = 0x01,
    QueryEnd = 0xff,
}

#[sorted]
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("allocation cannot have size of 0")]
    AllocSizeZero,
    #[error("alignment {0:#x} must be a non-zero power of 2 dividing the pool base")]
    BadAlignment(u64),
    #[error("{completed} submissions completed but only {submitted} were submitted")]
    CompletedCountAhead { completed: u32, submitted: u32 },
    #[error("completed count went backwards from {previous} to {observed}")]
    CompletedCountRegressed { previous: u32, observed: u32 },
    #[error("report type {0} is declared twice")]
    DuplicateReportType(u32),
    #[error("status ring size {0} is not a power of 2")]
    InvalidRingSize(u32),
    #[error("offset {offset:#x} is outside the {size} byte status buffer")]
    OutOfBounds { offset: usize, size: usize },
    #[error("out of status memory for {size} bytes")]
    OutOfSpace { size: u64 },
    #[error("failed to create status resource `{resource}`: {source}")]
    ResourceCreationFailed {
        resource: String,
        #[source]
        source: Box<Error>,
    },
    #[error("unknown status report type {0}")]
    UnknownReportType(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
