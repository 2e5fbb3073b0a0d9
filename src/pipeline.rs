// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Builds the command buffer of each frame.
//!
//! Every frame is bracketed by status writes. `begin_frame` marks the slot as started, the
//! codec workload follows, and `end_frame` marks it finished, dumps the error, CRC and engine
//! id registers, then publishes the new completion count with a post-sync flush. The count is
//! written last so that a consumer seeing it can parse every other field of the slot.

use std::sync::Arc;

use hw_cmd::mi;
use hw_cmd::CommandBuffer;
use log::debug;
use log::warn;
use remain::sorted;
use status_report::EngineClass;
use status_report::EngineTag;
use status_report::ExecutingStatus;
use status_report::FrameParams;
use status_report::MediaStatusFormat;
use status_report::MfxStatus;
use status_report::StatusReport;
use status_report::STATUS_REPORT_CS_ENGINE_ID;
use status_report::STATUS_REPORT_GLOBAL_COUNT;
use status_report::STATUS_REPORT_MFX;
use thiserror::Error;

use crate::codec::Workload;
use crate::config::MediaConfig;
use crate::platform::Platform;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] hw_cmd::Error),
    #[error("status tracking failed: {0}")]
    Status(#[from] status_report::Error),
    #[error("{pipes} pipes requested but only {available} VDBOXes exist")]
    TooManyPipes { pipes: u8, available: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A frame ready for submission.
#[derive(Debug)]
pub struct Submission {
    /// Id assigned by the status tracker.
    pub id: u32,
    pub stream: Vec<u8>,
}

pub struct MediaPipeline {
    platform: Platform,
    workload: Box<dyn Workload>,
    tracker: Arc<StatusReport<MediaStatusFormat>>,
    pipes: u8,
    command_buffer_size: usize,
}

impl MediaPipeline {
    pub fn new(
        platform: Platform,
        config: &MediaConfig,
        workload: Box<dyn Workload>,
        tracker: Arc<StatusReport<MediaStatusFormat>>,
    ) -> Result<Self> {
        if config.pipes > platform.vdbox_count() {
            return Err(Error::TooManyPipes {
                pipes: config.pipes,
                available: platform.vdbox_count(),
            });
        }
        Ok(MediaPipeline {
            platform,
            workload,
            tracker,
            pipes: config.pipes,
            command_buffer_size: config.command_buffer_size,
        })
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn tracker(&self) -> &Arc<StatusReport<MediaStatusFormat>> {
        &self.tracker
    }

    /// Builds the command buffer of one frame and registers it with the tracker.
    ///
    /// If the buffer cannot be built, the slot it would have used is re-armed and nothing is
    /// registered.
    pub fn submit_frame(&self, params: FrameParams) -> Result<Submission> {
        let mut cmd = CommandBuffer::new(self.platform.registry(), self.command_buffer_size);
        let built = self
            .begin_frame(&mut cmd)
            .and_then(|_| self.emit_workload(&mut cmd));
        if let Err(e) = built {
            warn!("aborting frame {}: {}", params.feedback, e);
            self.tracker.reset()?;
            return Err(e);
        }
        let id = match self.end_frame(&mut cmd, params) {
            Ok(id) => id,
            Err(e) => {
                warn!("aborting frame {}: {}", params.feedback, e);
                self.tracker.reset()?;
                return Err(e);
            }
        };
        Ok(Submission {
            id,
            stream: cmd.finish(),
        })
    }

    /// Marks the next slot as started.
    pub fn begin_frame(&self, cmd: &mut CommandBuffer) -> Result<()> {
        let reg = cmd.registry();
        let status = self.tracker.address(STATUS_REPORT_MFX)?;
        cmd.append(&mi::store_data_imm(
            reg,
            status.gpu_address() + MfxStatus::STATUS_OFFSET as u64,
            ExecutingStatus::QueryStart as u32,
        )?)?;
        Ok(())
    }

    fn emit_workload(&self, cmd: &mut CommandBuffer) -> Result<()> {
        for pipe in 0..self.pipes {
            cmd.append_all(&self.workload.emit(pipe, self.pipes)?)?;
        }
        Ok(())
    }

    /// Writes the closing status of the next slot, terminates the batch and registers the
    /// submission. Returns its id.
    pub fn end_frame(&self, cmd: &mut CommandBuffer, params: FrameParams) -> Result<u32> {
        let reg = cmd.registry();
        let status = self.tracker.address(STATUS_REPORT_MFX)?.gpu_address();
        let mut records = vec![mi::store_data_imm(
            reg,
            status + MfxStatus::STATUS_OFFSET as u64,
            ExecutingStatus::QueryEnd as u32,
        )?];
        if let Some(register) = self.platform.mfx_error_flags_register(0) {
            records.push(mi::store_register_mem(
                reg,
                register,
                status + MfxStatus::ERROR_STATUS_OFFSET as u64,
            )?);
        }
        if let Some(register) = self.platform.mfx_frame_crc_register(0) {
            records.push(mi::store_register_mem(
                reg,
                register,
                status + MfxStatus::FRAME_CRC_OFFSET as u64,
            )?);
        }

        if let Ok(engine_ids) = self.tracker.address(STATUS_REPORT_CS_ENGINE_ID) {
            for pipe in 0..self.pipes {
                if let Some(register) = self.platform.cs_engine_id_register(pipe) {
                    records.push(mi::store_register_mem(
                        reg,
                        register,
                        engine_ids.gpu_address() + u64::from(pipe) * 4,
                    )?);
                }
            }
        }

        let counts = self.tracker.counts();
        let completed = self.tracker.address(STATUS_REPORT_GLOBAL_COUNT)?;
        records.push(mi::flush_dw_post_sync(
            reg,
            completed.gpu_address(),
            u64::from(counts.submitted.wrapping_add(1)),
        )?);
        records.push(mi::batch_buffer_end(reg)?);
        cmd.append_all(&records)?;
        cmd.pad_to_qword()?;

        let id = self.tracker.init(
            EngineTag {
                class: EngineClass::Video,
                pipes: self.pipes,
            },
            params,
        )?;
        debug!(
            "{} frame {} is submission {} ({} bytes)",
            self.workload.codec(),
            params.feedback,
            id,
            cmd.len()
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use hw_cmd::Generation;
    use hw_cmd::InstructionKind;
    use status_report::GpuVaAllocator;

    use super::*;
    use crate::codec::default_registry;
    use crate::codec::Codec;

    fn pipeline(config: &MediaConfig) -> MediaPipeline {
        let mut alloc = GpuVaAllocator::new(0x1_0000_0000, 0x10_0000, 0x1000).unwrap();
        let tracker = StatusReport::create(
            MediaStatusFormat::default(),
            &config.tracker_config(),
            &mut alloc,
        )
        .unwrap();
        let workload = default_registry()
            .create(&Codec::Hevc, config.generation)
            .unwrap();
        MediaPipeline::new(
            Platform::new(config.generation),
            config,
            workload,
            Arc::new(tracker),
        )
        .unwrap()
    }

    #[test]
    fn frame_is_bracketed_by_status_writes() {
        let config = MediaConfig {
            enable_vdbox_id_report: true,
            pipes: 2,
            ..Default::default()
        };
        let p = pipeline(&config);
        let submission = p.submit_frame(FrameParams { feedback: 3 }).unwrap();
        assert_eq!(submission.id, 0);
        assert_eq!(submission.stream.len() % 8, 0);

        let reg = Generation::Xe2Lpm.registry();
        let kinds: Vec<InstructionKind> = reg
            .decode_stream(&submission.stream)
            .unwrap()
            .into_iter()
            .map(|(_, rec)| rec.kind())
            .collect();
        assert_eq!(kinds[0], InstructionKind::MiStoreDataImm);
        let end = kinds
            .iter()
            .position(|k| *k == InstructionKind::MiBatchBufferEnd)
            .unwrap();
        assert_eq!(kinds[end - 1], InstructionKind::MiFlushDw);
        // Error flags, CRC and one engine id per pipe.
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == InstructionKind::MiStoreRegisterMem)
                .count(),
            4
        );
        assert_eq!(p.tracker().counts().submitted, 1);
    }

    #[test]
    fn post_sync_writes_next_completion_count() {
        let p = pipeline(&MediaConfig::default());
        p.submit_frame(FrameParams::default()).unwrap();
        let second = p.submit_frame(FrameParams::default()).unwrap();
        let reg = Generation::Xe2Lpm.registry();
        let flush = reg
            .decode_stream(&second.stream)
            .unwrap()
            .into_iter()
            .map(|(_, rec)| rec)
            .filter(|rec| rec.kind() == InstructionKind::MiFlushDw)
            .last()
            .unwrap();
        assert_eq!(flush.field("ImmediateData").unwrap(), 2);
        let cell = p.tracker().address(STATUS_REPORT_GLOBAL_COUNT).unwrap();
        assert_eq!(flush.address("DestinationAddress").unwrap(), cell.gpu_address());
    }

    #[test]
    fn overflow_rearms_slot_without_submitting() {
        let config = MediaConfig {
            command_buffer_size: 64,
            ..Default::default()
        };
        let p = pipeline(&config);
        assert!(matches!(
            p.submit_frame(FrameParams::default()),
            Err(Error::Encode(hw_cmd::Error::BufferOverflow { .. }))
        ));
        assert_eq!(p.tracker().counts().submitted, 0);
    }

    #[test]
    fn too_many_pipes() {
        let config = MediaConfig {
            pipes: 3,
            ..Default::default()
        };
        let mut alloc = GpuVaAllocator::new(0, 0x10_0000, 0x1000).unwrap();
        let tracker = StatusReport::create(
            MediaStatusFormat::default(),
            &config.tracker_config(),
            &mut alloc,
        )
        .unwrap();
        let workload = default_registry().create(&Codec::Avc, config.generation).unwrap();
        assert!(matches!(
            MediaPipeline::new(
                Platform::new(Generation::Xe2Lpm),
                &config,
                workload,
                Arc::new(tracker)
            ),
            Err(Error::TooManyPipes {
                pipes: 3,
                available: 2
            })
        ));
    }
}
