// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;
use std::sync::Mutex;

use status_report::CodecStatus;
use status_report::CompletionEvent;
use status_report::CompletionObserver;
use status_report::EngineTag;
use status_report::EngineUsage;
use status_report::ExecutingStatus;
use status_report::FrameParams;
use status_report::GpuVaAllocator;
use status_report::MediaStatusFormat;
use status_report::MfxStatus;
use status_report::ReportOutcome;
use status_report::StatusReport;
use status_report::TrackerConfig;
use status_report::DEFAULT_STATUS_NUM;
use status_report::STATUS_REPORT_CS_ENGINE_ID;
use status_report::STATUS_REPORT_GLOBAL_COUNT;
use status_report::STATUS_REPORT_MFX;

fn create(alloc: &mut GpuVaAllocator, status_num: u32) -> StatusReport<MediaStatusFormat> {
    let config = TrackerConfig {
        status_num,
        enable_vdbox_id_report: true,
    };
    StatusReport::create(MediaStatusFormat::default(), &config, alloc).unwrap()
}

/// Plays the command streamer for one finished submission.
fn hw_finish(t: &StatusReport<MediaStatusFormat>, submission: u32, engine_id: u32) {
    let mfx = t.address_for(STATUS_REPORT_MFX, submission).unwrap();
    mfx.resource
        .writer()
        .write_dword(
            mfx.offset + MfxStatus::STATUS_OFFSET,
            ExecutingStatus::QueryEnd as u32,
        )
        .unwrap();
    let ids = t
        .address_for(STATUS_REPORT_CS_ENGINE_ID, submission)
        .unwrap();
    ids.resource
        .writer()
        .write_dword(ids.offset, engine_id)
        .unwrap();
    let cell = t.address(STATUS_REPORT_GLOBAL_COUNT).unwrap();
    cell.resource.writer().increment(cell.offset).unwrap();
}

#[test]
fn three_submissions_two_completed() {
    let mut alloc = GpuVaAllocator::new(0x100_0000, 0x100_0000, 0x1000).unwrap();
    let t = create(&mut alloc, DEFAULT_STATUS_NUM);
    let ids: Vec<u32> = (0..3)
        .map(|feedback| {
            t.init(EngineTag::default(), FrameParams { feedback })
                .unwrap()
        })
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);
    hw_finish(&t, 0, 0x01);
    hw_finish(&t, 1, 0x01);

    let entries = t.get_report(3).unwrap();
    let outcomes: Vec<ReportOutcome> = entries.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ReportOutcome::Completed,
            ReportOutcome::Completed,
            ReportOutcome::NotReady
        ]
    );
    assert_eq!(entries[0].report.status, CodecStatus::Success);
    assert_eq!(entries[2].report.status, CodecStatus::NotReady);
    assert_eq!(t.counts().reported, 2);

    hw_finish(&t, 2, 0x01);
    let entries = t.get_report(3).unwrap();
    assert_eq!(entries[0].submission, 2);
    assert_eq!(entries[0].outcome, ReportOutcome::Completed);
    assert_eq!(entries[0].report.feedback, Some(2));
    assert_eq!(entries[1].outcome, ReportOutcome::OutOfRange);
    assert_eq!(t.counts().reported, 3);
}

#[test]
fn wraparound_overwrites_unread_reports() {
    let mut alloc = GpuVaAllocator::new(0x100_0000, 0x100_0000, 0x1000).unwrap();
    let t = create(&mut alloc, 4);
    for feedback in 0..6 {
        let id = t
            .init(EngineTag::default(), FrameParams { feedback })
            .unwrap();
        hw_finish(&t, id, 0x01);
    }

    let entries = t.get_report(6).unwrap();
    let outcomes: Vec<ReportOutcome> = entries.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ReportOutcome::Overwritten,
            ReportOutcome::Overwritten,
            ReportOutcome::Completed,
            ReportOutcome::Completed,
            ReportOutcome::Completed,
            ReportOutcome::Completed,
        ]
    );
    assert_eq!(entries[0].report.status, CodecStatus::Unavailable);
    assert_eq!(entries[5].report.feedback, Some(5));
    assert_eq!(t.counts().reported, 6);
}

#[derive(Default)]
struct Collector(Mutex<Vec<u32>>);

impl CompletionObserver for Collector {
    fn on_complete(&self, event: &CompletionEvent) {
        self.0.lock().unwrap().push(event.submission);
    }
}

#[test]
fn trackers_share_engine_usage() {
    let mut alloc = GpuVaAllocator::new(0x100_0000, 0x100_0000, 0x1000).unwrap();
    let usage = Arc::new(EngineUsage::new());
    let decode = create(&mut alloc, 8).with_engine_usage(usage.clone());
    let encode = create(&mut alloc, 8).with_engine_usage(usage.clone());
    let collector = Arc::new(Collector::default());
    decode.register_observer(collector.clone());

    let id = decode
        .init(EngineTag::default(), FrameParams::default())
        .unwrap();
    hw_finish(&decode, id, 0x01);
    let id = encode
        .init(EngineTag::default(), FrameParams::default())
        .unwrap();
    hw_finish(&encode, id, 0x11);

    decode.get_report(1).unwrap();
    encode.get_report(1).unwrap();
    assert_eq!(usage.used_vdbox_ids(), 0x11);
    assert_eq!(*collector.0.lock().unwrap(), vec![0]);
}
