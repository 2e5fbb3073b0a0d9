// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use log::debug;
use log::error;
use log::warn;
use serde::Deserialize;
use serde::Serialize;
use static_assertions::const_assert;
use zerocopy::FromBytes;

use crate::engine::EngineClass;
use crate::engine::EngineUsage;
use crate::engine::CS_INSTANCE_ID_MAX;
use crate::memory::Allocator;
use crate::memory::StatusMemory;
use crate::observer::CompletionEvent;
use crate::observer::CompletionObserver;
use crate::observer::ObserverSet;
use crate::Error;
use crate::Result;
use crate::STATUS_REPORT_CS_ENGINE_ID;
use crate::STATUS_REPORT_GLOBAL_COUNT;

/// Default number of slots in the status ring.
pub const DEFAULT_STATUS_NUM: u32 = 512;
const_assert!(DEFAULT_STATUS_NUM.is_power_of_two());

/// Maximum number of pipes whose engine id is dumped per submission.
pub const MAX_PIPES: usize = CS_INSTANCE_ID_MAX as usize;

// The completion count is written by a qword post-sync operation.
const COMPLETED_COUNT_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Number of ring slots. Must be a power of two.
    pub status_num: u32,
    /// Dump the CS engine id of every pipe and accumulate the used VDBOX mask.
    pub enable_vdbox_id_report: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            status_num: DEFAULT_STATUS_NUM,
            enable_vdbox_id_report: cfg!(debug_assertions),
        }
    }
}

/// One per-slot region a report format needs hardware to fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusItem {
    pub report_type: u32,
    /// Bytes per slot.
    pub size: usize,
}

/// Location hardware writes a status field to.
#[derive(Clone, Debug)]
pub struct StatusBufAddr {
    pub resource: Arc<StatusMemory>,
    /// Byte offset into `resource`.
    pub offset: usize,
    /// Bytes reserved at `offset`.
    pub size: usize,
}

impl StatusBufAddr {
    pub fn gpu_address(&self) -> u64 {
        self.resource.gpu_address() + self.offset as u64
    }
}

/// The engine a submission was sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EngineTag {
    pub class: EngineClass,
    /// Number of pipes executing the submission.
    pub pipes: u8,
}

impl Default for EngineTag {
    fn default() -> Self {
        EngineTag {
            class: EngineClass::Video,
            pipes: 1,
        }
    }
}

struct SlotMeta<P> {
    submission: u32,
    engine: EngineTag,
    params: P,
}

/// Read access to one ring slot: the metadata stored by `init` and the status memory hardware
/// wrote for it.
pub struct SlotView<'a, P> {
    index: u32,
    meta: &'a SlotMeta<P>,
    items: &'a BTreeMap<u32, StatusBufAddr>,
}

impl<'a, P> SlotView<'a, P> {
    pub fn submission(&self) -> u32 {
        self.meta.submission
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn engine(&self) -> EngineTag {
        self.meta.engine
    }

    pub fn params(&self) -> &P {
        &self.meta.params
    }

    fn region(&self, report_type: u32) -> Result<(&'a StatusBufAddr, usize)> {
        let item = self
            .items
            .get(&report_type)
            .ok_or(Error::UnknownReportType(report_type))?;
        Ok((item, item.offset + item.size * self.index as usize))
    }

    /// Reads the dword at `offset` within this slot's `report_type` region.
    pub fn read_dword(&self, report_type: u32, offset: usize) -> Result<u32> {
        let (item, base) = self.region(report_type)?;
        if offset + 4 > item.size {
            return Err(Error::OutOfBounds {
                offset,
                size: item.size,
            });
        }
        item.resource.read_dword(base + offset)
    }

    /// Copies this slot's `report_type` region.
    pub fn read_bytes(&self, report_type: u32) -> Result<Vec<u8>> {
        let (item, base) = self.region(report_type)?;
        item.resource.read_bytes(base, item.size)
    }

    /// Reads a `T` from the start of this slot's `report_type` region.
    pub fn read<T: FromBytes>(&self, report_type: u32) -> Result<T> {
        let bytes = self.read_bytes(report_type)?;
        let size = bytes.len();
        T::read_from_prefix(&bytes)
            .map(|(value, _)| value)
            .map_err(|_| Error::OutOfBounds { offset: 0, size })
    }

    /// Raw CS engine id dumps of the pipes that ran this slot.
    pub fn engine_ids(&self) -> Result<Vec<u32>> {
        let pipes = usize::from(self.meta.engine.pipes).min(MAX_PIPES);
        (0..pipes)
            .map(|pipe| self.read_dword(STATUS_REPORT_CS_ENGINE_ID, pipe * 4))
            .collect()
    }
}

/// A per-codec status layout.
///
/// `parse_status` turns the status memory of a completed slot into a report. `set_status`
/// produces the report for a slot that cannot be parsed: `out_of_range` is false while the
/// submission is still running and true when it has no data at all, either because it was never
/// submitted or because a newer submission reused its slot.
pub trait ReportFormat: Send {
    type Params: Send;
    type Report;

    /// Per-slot regions hardware writes. Report types 0 and 1 belong to the tracker.
    fn items(&self) -> Vec<StatusItem>;

    fn parse_status(&mut self, slot: &SlotView<'_, Self::Params>) -> Self::Report;

    fn set_status(
        &mut self,
        submission: u32,
        slot: Option<&SlotView<'_, Self::Params>>,
        out_of_range: bool,
    ) -> Self::Report;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReportOutcome {
    /// Hardware finished; the report was parsed from status memory.
    Completed,
    /// Submitted but not finished. The slot stays pending.
    NotReady,
    /// Nothing was submitted with this id yet.
    OutOfRange,
    /// Finished, but a newer submission reused the slot before it was read. Skipped for good.
    Overwritten,
}

impl ReportOutcome {
    pub fn is_available(&self) -> bool {
        *self == ReportOutcome::Completed
    }
}

#[derive(Debug, Serialize)]
pub struct StatusEntry<R> {
    pub submission: u32,
    pub index: u32,
    pub outcome: ReportOutcome,
    pub report: R,
}

/// Snapshot of the tracker counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub submitted: u32,
    /// Last completion count read from status memory.
    pub completed: u32,
    pub reported: u32,
    pub notified: u32,
}

struct State<F: ReportFormat> {
    format: F,
    slots: Vec<Option<SlotMeta<F::Params>>>,
    counts: Counts,
}

/// Ring of status slots tracking submissions until their reports are read.
pub struct StatusReport<F: ReportFormat> {
    status_num: u32,
    completed_count: Arc<StatusMemory>,
    items: BTreeMap<u32, StatusBufAddr>,
    engine_usage: Option<Arc<EngineUsage>>,
    observers: ObserverSet,
    state: Mutex<State<F>>,
}

fn allocate(alloc: &mut dyn Allocator, tag: String, size: usize) -> Result<Arc<StatusMemory>> {
    alloc
        .allocate(&tag, size)
        .map_err(|e| Error::ResourceCreationFailed {
            resource: tag,
            source: Box::new(e),
        })
}

impl<F: ReportFormat> StatusReport<F> {
    /// Allocates the completion count cell and one ring region per status item.
    pub fn create(format: F, config: &TrackerConfig, alloc: &mut dyn Allocator) -> Result<Self> {
        let status_num = config.status_num;
        if !status_num.is_power_of_two() {
            return Err(Error::InvalidRingSize(status_num));
        }

        let completed_count = allocate(
            alloc,
            "status completed count".to_string(),
            COMPLETED_COUNT_SIZE,
        )?;
        let mut items = BTreeMap::new();
        items.insert(
            STATUS_REPORT_GLOBAL_COUNT,
            StatusBufAddr {
                resource: completed_count.clone(),
                offset: 0,
                size: 4,
            },
        );

        let mut requested = Vec::new();
        if config.enable_vdbox_id_report {
            requested.push(StatusItem {
                report_type: STATUS_REPORT_CS_ENGINE_ID,
                size: MAX_PIPES * 4,
            });
        }
        requested.extend(format.items());

        for item in requested {
            if items.contains_key(&item.report_type) {
                return Err(Error::DuplicateReportType(item.report_type));
            }
            let resource = allocate(
                alloc,
                format!("status report type {}", item.report_type),
                item.size * status_num as usize,
            )?;
            items.insert(
                item.report_type,
                StatusBufAddr {
                    resource,
                    offset: 0,
                    size: item.size,
                },
            );
        }

        let engine_usage = if config.enable_vdbox_id_report {
            Some(Arc::new(EngineUsage::new()))
        } else {
            None
        };

        Ok(StatusReport {
            status_num,
            completed_count,
            items,
            engine_usage,
            observers: ObserverSet::default(),
            state: Mutex::new(State {
                format,
                slots: (0..status_num).map(|_| None).collect(),
                counts: Counts::default(),
            }),
        })
    }

    /// Accumulates used VDBOX ids into `usage` instead of a private mask. Has no effect when
    /// the engine id report is disabled.
    pub fn with_engine_usage(mut self, usage: Arc<EngineUsage>) -> Self {
        if self.engine_usage.is_some() {
            self.engine_usage = Some(usage);
        }
        self
    }

    pub fn engine_usage(&self) -> Option<&Arc<EngineUsage>> {
        self.engine_usage.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, State<F>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("status report state is poisoned"),
        }
    }

    pub fn status_num(&self) -> u32 {
        self.status_num
    }

    /// Ring slot used by submission `count`.
    pub fn slot_index(&self, count: u32) -> u32 {
        count & (self.status_num - 1)
    }

    /// Registers a submission and returns its id.
    pub fn init(&self, engine: EngineTag, params: F::Params) -> Result<u32> {
        let mut state = self.lock();
        let submission = state.counts.submitted;
        let index = self.slot_index(submission);
        self.clear_slot(index)?;
        state.slots[index as usize] = Some(SlotMeta {
            submission,
            engine,
            params,
        });
        state.counts.submitted = submission.wrapping_add(1);
        debug!("status slot {} holds submission {}", index, submission);
        Ok(submission)
    }

    /// Re-arms the slot the next `init` will occupy. No counter moves.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        let index = self.slot_index(state.counts.submitted);
        state.slots[index as usize] = None;
        self.clear_slot(index)
    }

    fn clear_slot(&self, index: u32) -> Result<()> {
        for (report_type, item) in &self.items {
            if *report_type == STATUS_REPORT_GLOBAL_COUNT {
                continue;
            }
            item.resource
                .clear(item.offset + item.size * index as usize, item.size)?;
        }
        Ok(())
    }

    /// Location of `report_type` for the next submission.
    pub fn address(&self, report_type: u32) -> Result<StatusBufAddr> {
        let submitted = self.lock().counts.submitted;
        self.address_for(report_type, submitted)
    }

    /// Location of `report_type` for `submission`.
    pub fn address_for(&self, report_type: u32, submission: u32) -> Result<StatusBufAddr> {
        let item = self
            .items
            .get(&report_type)
            .ok_or(Error::UnknownReportType(report_type))?;
        if report_type == STATUS_REPORT_GLOBAL_COUNT {
            return Ok(item.clone());
        }
        Ok(StatusBufAddr {
            resource: item.resource.clone(),
            offset: item.offset + item.size * self.slot_index(submission) as usize,
            size: item.size,
        })
    }

    pub fn counts(&self) -> Counts {
        self.lock().counts
    }

    pub fn register_observer(&self, observer: Arc<dyn CompletionObserver>) -> bool {
        self.observers.register(observer)
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn CompletionObserver>) -> bool {
        self.observers.unregister(observer)
    }

    /// Reads the completion count and checks it against what was submitted and seen before.
    fn observe_completed(&self, counts: &mut Counts) -> Result<u32> {
        let observed = self.completed_count.read_dword(0)?;
        let previous = counts.completed;
        if (observed.wrapping_sub(previous) as i32) < 0 {
            error!(
                "completed count regressed from {} to {}",
                previous, observed
            );
            return Err(Error::CompletedCountRegressed { previous, observed });
        }
        let submitted = counts.submitted;
        if observed.wrapping_sub(counts.reported) > submitted.wrapping_sub(counts.reported) {
            error!(
                "completed count {} is ahead of submitted count {}",
                observed, submitted
            );
            return Err(Error::CompletedCountAhead {
                completed: observed,
                submitted,
            });
        }
        counts.completed = observed;
        Ok(observed)
    }

    fn pending_events(&self, counts: &mut Counts) -> Vec<CompletionEvent> {
        let mut events = Vec::new();
        while counts.notified != counts.completed {
            events.push(CompletionEvent {
                submission: counts.notified,
                index: self.slot_index(counts.notified),
            });
            counts.notified = counts.notified.wrapping_add(1);
        }
        events
    }

    /// Notifies observers of newly completed submissions without reading any report. Returns
    /// the completion count.
    pub fn poll(&self) -> Result<u32> {
        let (completed, events) = {
            let mut state = self.lock();
            let completed = self.observe_completed(&mut state.counts)?;
            (completed, self.pending_events(&mut state.counts))
        };
        self.observers.notify(&events);
        Ok(completed)
    }

    /// Produces reports for up to `num` submissions starting at the oldest unreported one.
    ///
    /// Never waits for hardware. Completed submissions are parsed and consumed in order. The
    /// first submission that has not completed stops consumption: it and every later entry of
    /// this call are returned as `NotReady` and will be reported again by the next call.
    pub fn get_report(&self, num: u16) -> Result<Vec<StatusEntry<F::Report>>> {
        let (entries, events) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let completed = self.observe_completed(&mut state.counts)?;

            let start = state.counts.reported;
            let outstanding = state.counts.submitted.wrapping_sub(start);
            let ready = completed.wrapping_sub(start);
            let mut consumed = 0u32;
            let mut entries = Vec::with_capacity(usize::from(num).min(self.status_num as usize));
            for i in 0..u32::from(num) {
                let submission = start.wrapping_add(i);
                let index = self.slot_index(submission);
                let view = state.slots[index as usize]
                    .as_ref()
                    .filter(|meta| meta.submission == submission)
                    .map(|meta| SlotView {
                        index,
                        meta,
                        items: &self.items,
                    });

                let (outcome, report) = if i >= outstanding {
                    (
                        ReportOutcome::OutOfRange,
                        state.format.set_status(submission, None, true),
                    )
                } else if i == consumed && i < ready {
                    consumed += 1;
                    match view {
                        Some(view) => {
                            if let Some(usage) = &self.engine_usage {
                                for raw in view.engine_ids()? {
                                    usage.record(raw);
                                }
                            }
                            (
                                ReportOutcome::Completed,
                                state.format.parse_status(&view),
                            )
                        }
                        None => {
                            warn!(
                                "status of submission {} was overwritten before it was read",
                                submission
                            );
                            (
                                ReportOutcome::Overwritten,
                                state.format.set_status(submission, None, true),
                            )
                        }
                    }
                } else {
                    debug!("submission {} is not ready", submission);
                    (
                        ReportOutcome::NotReady,
                        state.format.set_status(submission, view.as_ref(), false),
                    )
                };
                entries.push(StatusEntry {
                    submission,
                    index,
                    outcome,
                    report,
                });
            }
            state.counts.reported = start.wrapping_add(consumed);
            (entries, self.pending_events(&mut state.counts))
        };
        self.observers.notify(&events);
        Ok(entries)
    }
}

impl<F: ReportFormat> Drop for StatusReport<F> {
    fn drop(&mut self) {
        if let Some(usage) = &self.engine_usage {
            usage.report();
        }
    }
}
