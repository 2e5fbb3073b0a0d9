// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use hw_cmd::compute_length;
use hw_cmd::mi;
use hw_cmd::CommandBuffer;
use hw_cmd::Error;
use hw_cmd::Generation;
use hw_cmd::InstructionKind;
use hw_cmd::Record;

#[test]
fn every_generation_defines_every_kind() {
    for generation in Generation::ALL {
        let registry = generation.registry();
        for def in registry.iter() {
            let rec = registry.define(def.kind).unwrap();
            assert_eq!(rec.dwords(), def.defaults);
            assert_eq!(rec.byte_size(), def.dword_count() * 4);
        }
    }
}

#[test]
fn compute_length_examples() {
    assert_eq!(compute_length(1, 2), 0);
    assert_eq!(compute_length(5, 2), 3);
}

#[test]
fn stream_round_trip() {
    let reg = Generation::Xe2Lpm.registry();
    let records: Vec<Record> = vec![
        reg.define(InstructionKind::MiForceWakeup)
            .unwrap()
            .with_field("MfxPowerWellControl", 1)
            .unwrap()
            .with_field("MaskBits", 0x200)
            .unwrap(),
        reg.define(InstructionKind::VdControlState)
            .unwrap()
            .with_field("PipelineInitialization", 1)
            .unwrap(),
        mi::store_data_imm(reg, 0x10_0000, 1).unwrap(),
        mi::load_register_imm(reg, &[(0x1c_0000, 5), (0x1c_0004, 6)]).unwrap(),
        reg.define(InstructionKind::MfxWait)
            .unwrap()
            .with_field("MfxSyncControlFlag", 1)
            .unwrap(),
        mi::flush_dw_post_sync(reg, 0x10_0008, 1).unwrap(),
        mi::atomic_increment(reg, 0x10_0010).unwrap(),
        mi::batch_buffer_end(reg).unwrap(),
    ];

    let mut cmd = CommandBuffer::new(reg, 4096);
    let offsets: Vec<usize> = records.iter().map(|r| cmd.append(r).unwrap()).collect();
    let total: usize = records.iter().map(Record::byte_size).sum();
    assert_eq!(cmd.len(), total);

    let stream = cmd.finish();
    assert_eq!(stream.len(), total);
    let decoded = reg.decode_stream(&stream).unwrap();
    assert_eq!(decoded.len(), records.len());
    for ((offset, rec), (expected_offset, expected)) in
        decoded.iter().zip(offsets.iter().zip(records.iter()))
    {
        assert_eq!(offset, expected_offset);
        assert_eq!(rec, expected);
    }
}

#[test]
fn address_split_scenario() {
    let reg = Generation::Xe2Lpm.registry();
    let mut cmd = CommandBuffer::new(reg, 64);
    let rec = mi::store_register_mem(reg, 0x2358, 0x1_2345_6780).unwrap();
    let offset = cmd.append(&rec).unwrap();
    let bytes = cmd.as_bytes();
    let low = u32::from_le_bytes(bytes[offset + 8..offset + 12].try_into().unwrap());
    let high = u32::from_le_bytes(bytes[offset + 12..offset + 16].try_into().unwrap());
    let reassembled = (u64::from(high) << 32 | u64::from(low)) & !0x3;
    assert_eq!(reassembled, 0x1_2345_6780);
}

#[test]
fn overflow_aborts_assembly() {
    let reg = Generation::Xe2Lpm.registry();
    let mut cmd = CommandBuffer::new(reg, 32);
    cmd.append(&mi::store_data_imm(reg, 0x1000, 1).unwrap())
        .unwrap();
    let before = cmd.as_bytes().to_vec();
    let err = cmd
        .append(&reg.define(InstructionKind::PipeControl).unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        Error::BufferOverflow {
            needed: 24,
            remaining: 12
        }
    );
    assert_eq!(cmd.as_bytes(), &before[..]);
}
