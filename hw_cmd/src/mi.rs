// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Builders for the memory interface commands a pipeline emits around each workload.

use crate::registry::InstructionKind;
use crate::registry::InstructionRegistry;
use crate::Error;
use crate::Record;
use crate::Result;

/// MI_ATOMIC opcode incrementing a dword in memory.
pub const ATOMIC_4B_INCREMENT: u64 = 0x05;
/// MI_ATOMIC opcode adding operand 1 to a dword in memory.
pub const ATOMIC_4B_ADD: u64 = 0x07;

/// MI_FLUSH_DW post-sync operation writing the immediate data.
pub const FLUSH_WRITE_IMMEDIATE_DATA: u64 = 1;

/// Semaphore compare operations (semaphore address data vs. semaphore data dword).
pub const SAD_GREATER_THAN_OR_EQUAL_SDD: u64 = 1;
pub const SAD_EQUAL_SDD: u64 = 4;
pub const SAD_NOT_EQUAL_SDD: u64 = 5;

const WAIT_MODE_POLLING: u64 = 1;
const REGISTER_POLL_MODE_MEMORY: u64 = 0;

pub fn batch_buffer_end(reg: &InstructionRegistry) -> Result<Record> {
    reg.define(InstructionKind::MiBatchBufferEnd)
}

/// Jumps to the batch buffer at `address`, chaining unless `nested` is set.
pub fn batch_buffer_start(reg: &InstructionRegistry, address: u64, nested: bool) -> Result<Record> {
    let mut cmd = reg
        .define(InstructionKind::MiBatchBufferStart)?
        .with_field("AddressSpaceIndicator", 1)?
        .with_field("NestedLevelBatchBuffer", u64::from(nested))?;
    cmd.set_address("BatchBufferStartAddress", address)?;
    Ok(cmd)
}

/// Writes `value` to the dword at `address`.
pub fn store_data_imm(reg: &InstructionRegistry, address: u64, value: u32) -> Result<Record> {
    let mut cmd = reg
        .define(InstructionKind::MiStoreDataImm)?
        .with_field("DataDword0", u64::from(value))?;
    cmd.set_address("Address", address)?;
    Ok(cmd)
}

/// Writes the qword `value` to `address`, which must be qword aligned.
pub fn store_data_imm_qword(reg: &InstructionRegistry, address: u64, value: u64) -> Result<Record> {
    if address & 0x7 != 0 {
        return Err(Error::MisalignedAddress {
            field: "Address",
            address,
            align: 8,
        });
    }
    let mut cmd = reg
        .define(InstructionKind::MiStoreDataImm)?
        .with_field("StoreQword", 1)?
        .with_field("DataDword0", value & 0xffff_ffff)?
        .with_field("DataDword1", value >> 32)?;
    cmd.set_address("Address", address)?;
    Ok(cmd)
}

/// Stores MMIO register `register` to the dword at `address`.
pub fn store_register_mem(
    reg: &InstructionRegistry,
    register: u32,
    address: u64,
) -> Result<Record> {
    let mut cmd = reg.define(InstructionKind::MiStoreRegisterMem)?;
    cmd.set_address("RegisterAddress", u64::from(register))?;
    cmd.set_address("MemoryAddress", address)?;
    Ok(cmd)
}

/// Loads each `(register, value)` pair into its MMIO register.
pub fn load_register_imm(reg: &InstructionRegistry, writes: &[(u32, u32)]) -> Result<Record> {
    let (first, rest) = match writes.split_first() {
        Some(split) => split,
        None => return reg.define(InstructionKind::MiLoadRegisterImm),
    };
    let mut cmd = reg
        .define(InstructionKind::MiLoadRegisterImm)?
        .with_field("DataDword", u64::from(first.1))?;
    cmd.set_address("RegisterOffset", u64::from(first.0))?;
    let mut payload = Vec::with_capacity(rest.len() * 2);
    for &(register, value) in rest {
        if register & 0x3 != 0 {
            return Err(Error::MisalignedAddress {
                field: "RegisterOffset",
                address: u64::from(register),
                align: 4,
            });
        }
        payload.push(register);
        payload.push(value);
    }
    cmd.extend_payload(&payload)?;
    Ok(cmd)
}

/// Flushes the video pipeline without a post-sync write.
pub fn flush_dw(reg: &InstructionRegistry) -> Result<Record> {
    reg.define(InstructionKind::MiFlushDw)?
        .with_field("VideoPipelineCacheInvalidate", 1)
}

/// Flushes the video pipeline and then writes `data` to `address`.
///
/// The write lands only after all prior work on the engine has completed, which makes it the
/// command of choice for publishing completion counts.
pub fn flush_dw_post_sync(reg: &InstructionRegistry, address: u64, data: u64) -> Result<Record> {
    let mut cmd = flush_dw(reg)?
        .with_field("PostSyncOperation", FLUSH_WRITE_IMMEDIATE_DATA)?
        .with_field("ImmediateData", data)?;
    cmd.set_address("DestinationAddress", address)?;
    Ok(cmd)
}

/// Atomically increments the dword at `address`.
pub fn atomic_increment(reg: &InstructionRegistry, address: u64) -> Result<Record> {
    let mut cmd = reg
        .define(InstructionKind::MiAtomic)?
        .with_field("AtomicOpcode", ATOMIC_4B_INCREMENT)?
        .with_field("CsStall", 1)?;
    cmd.set_address("MemoryAddress", address)?;
    Ok(cmd)
}

/// Stalls the engine until the dword at `address` satisfies `compare` against `value`.
pub fn semaphore_wait(
    reg: &InstructionRegistry,
    address: u64,
    value: u32,
    compare: u64,
) -> Result<Record> {
    let mut cmd = reg
        .define(InstructionKind::MiSemaphoreWait)?
        .with_field("CompareOperation", compare)?
        .with_field("WaitMode", WAIT_MODE_POLLING)?
        .with_field("RegisterPollMode", REGISTER_POLL_MODE_MEMORY)?
        .with_field("SemaphoreDataDword", u64::from(value))?;
    cmd.set_address("SemaphoreAddress", address)?;
    Ok(cmd)
}

/// Ends the current batch buffer when the dword at `address` is not greater than `data`.
pub fn conditional_batch_buffer_end(
    reg: &InstructionRegistry,
    address: u64,
    data: u32,
) -> Result<Record> {
    let mut cmd = reg
        .define(InstructionKind::MiConditionalBatchBufferEnd)?
        .with_field("CompareSemaphore", 1)?
        .with_field("CompareDataDword", u64::from(data))?;
    cmd.set_address("CompareAddress", address)?;
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Generation;

    fn reg() -> &'static InstructionRegistry {
        Generation::Xe2Lpm.registry()
    }

    #[test]
    fn store_data_imm_layout() {
        let cmd = store_data_imm(reg(), 0x1_2345_6780, 0xff).unwrap();
        assert_eq!(cmd.dwords(), &[0x1000_0003, 0x2345_6780, 0x1, 0xff, 0]);
    }

    #[test]
    fn store_qword_needs_alignment() {
        assert!(store_data_imm_qword(reg(), 0x1004, 1).is_err());
        let cmd = store_data_imm_qword(reg(), 0x1008, 0x1_0000_0002).unwrap();
        assert_eq!(cmd.dwords(), &[0x1020_0003, 0x1008, 0, 0x2, 0x1]);
    }

    #[test]
    fn flush_with_post_sync_write() {
        let cmd = flush_dw_post_sync(reg(), 0x2000, 7).unwrap();
        assert_eq!(cmd.field("PostSyncOperation").unwrap(), 1);
        assert_eq!(cmd.address("DestinationAddress").unwrap(), 0x2000);
        assert_eq!(cmd.field("ImmediateData").unwrap(), 7);
        assert_eq!(cmd.dwords()[0], 0x1300_4083);
        // The destination needs qword alignment.
        assert!(flush_dw_post_sync(reg(), 0x2004, 7).is_err());
    }

    #[test]
    fn store_register_layout() {
        let cmd = store_register_mem(reg(), 0x1c_008c, 0x3000).unwrap();
        assert_eq!(cmd.dwords(), &[0x1200_0002, 0x1c_008c, 0x3000, 0]);
        assert!(store_register_mem(reg(), 0x1c_008e, 0x3000).is_err());
    }

    #[test]
    fn load_register_pairs() {
        let cmd = load_register_imm(reg(), &[(0x100, 1), (0x104, 2), (0x108, 3)]).unwrap();
        assert_eq!(
            cmd.dwords(),
            &[0x1100_0005, 0x100, 1, 0x104, 2, 0x108, 3]
        );
        assert!(load_register_imm(reg(), &[(0x100, 1), (0x102, 2)]).is_err());
    }

    #[test]
    fn atomic_increment_layout() {
        let cmd = atomic_increment(reg(), 0x1_0000_0010).unwrap();
        assert_eq!(cmd.dwords()[0], 0x1782_0509);
        assert_eq!(cmd.dwords()[1], 0x10);
        assert_eq!(cmd.dwords()[2], 0x1);
    }

    #[test]
    fn semaphore_wait_overrides_poll_default() {
        let cmd = semaphore_wait(reg(), 0x4000, 3, SAD_GREATER_THAN_OR_EQUAL_SDD).unwrap();
        assert_eq!(cmd.dwords()[0], 0x0e00_9003);
        assert_eq!(cmd.dwords()[1], 3);
        assert_eq!(cmd.address("SemaphoreAddress").unwrap(), 0x4000);
    }

    #[test]
    fn batch_buffer_chain() {
        let cmd = batch_buffer_start(reg(), 0x10_0000, false).unwrap();
        assert_eq!(cmd.dwords(), &[0x1880_0101, 0x10_0000, 0]);
        let nested = batch_buffer_start(reg(), 0x10_0000, true).unwrap();
        assert_eq!(nested.dwords()[0], 0x18c0_0101);
        assert_eq!(batch_buffer_end(reg()).unwrap().dwords(), &[0x0500_0000]);
    }

    #[test]
    fn conditional_end_layout() {
        let cmd = conditional_batch_buffer_end(reg(), 0x5008, 0).unwrap();
        assert_eq!(cmd.dwords(), &[0x1b20_0002, 0, 0x5008, 0]);
    }
}
