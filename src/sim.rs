// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A software command streamer.
//!
//! Executes the memory side effects of a command stream against status memory: immediate
//! stores, post-sync flush writes, register stores and atomic increments. Everything else is
//! decoded and skipped. Useful for exercising the status tracker without hardware.

use std::collections::BTreeMap;
use std::sync::Arc;

use hw_cmd::mi;
use hw_cmd::InstructionKind;
use hw_cmd::InstructionRegistry;
use hw_cmd::Record;
use log::debug;
use remain::sorted;
use status_report::EngineClass;
use status_report::GpuVaAllocator;
use status_report::StatusMemory;
use thiserror::Error;

use crate::platform::Platform;

const REGISTER_OFFSET_MASK: u32 = 0x7f_fffc;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to decode command stream: {0}")]
    Decode(#[from] hw_cmd::Error),
    #[error("status memory access failed: {0}")]
    Memory(#[from] status_report::Error),
    #[error("{name} accesses unmapped address {address:#x}")]
    UnmappedAddress { name: &'static str, address: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// How far a stream got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Commands executed.
    pub executed: usize,
    /// Whether MI_BATCH_BUFFER_END was reached.
    pub finished: bool,
}

pub struct CommandStreamer<'a> {
    memory: &'a GpuVaAllocator,
    registers: BTreeMap<u32, u32>,
}

impl<'a> CommandStreamer<'a> {
    pub fn new(memory: &'a GpuVaAllocator) -> Self {
        CommandStreamer {
            memory,
            registers: BTreeMap::new(),
        }
    }

    /// Creates a streamer whose CS engine id registers identify the VDBOXes of `platform`.
    pub fn for_platform(memory: &'a GpuVaAllocator, platform: &Platform) -> Self {
        let mut streamer = CommandStreamer::new(memory);
        for pipe in 0..platform.vdbox_count() {
            if let Some(register) = platform.cs_engine_id_register(pipe) {
                let engine_id = (u32::from(pipe) << 4) | EngineClass::Video as u32;
                streamer.set_register(register, engine_id);
            }
        }
        streamer
    }

    pub fn set_register(&mut self, register: u32, value: u32) {
        self.registers.insert(register, value);
    }

    /// Value of `register`. Registers never written read as zero.
    pub fn register(&self, register: u32) -> u32 {
        self.registers.get(&register).copied().unwrap_or(0)
    }

    /// Executes `stream` up to MI_BATCH_BUFFER_END, or only its first `limit` commands.
    ///
    /// Stopping early leaves status memory as a hung engine would.
    pub fn run(
        &mut self,
        registry: &InstructionRegistry,
        stream: &[u8],
        limit: Option<usize>,
    ) -> Result<RunSummary> {
        let mut executed = 0;
        for (offset, record) in registry.decode_stream(stream)? {
            if limit.map_or(false, |limit| executed >= limit) {
                debug!("command streamer stopped at offset {:#x}", offset);
                break;
            }
            executed += 1;
            if record.kind() == InstructionKind::MiBatchBufferEnd {
                return Ok(RunSummary {
                    executed,
                    finished: true,
                });
            }
            self.execute(&record)?;
        }
        Ok(RunSummary {
            executed,
            finished: false,
        })
    }

    fn execute(&mut self, record: &Record) -> Result<()> {
        match record.kind() {
            InstructionKind::MiStoreDataImm => {
                let address = record.address("Address")?;
                self.write_dword(record.name(), address, record.field("DataDword0")? as u32)?;
                if record.field("StoreQword")? != 0 {
                    let high = record.field("DataDword1")? as u32;
                    self.write_dword(record.name(), address + 4, high)?;
                }
            }
            InstructionKind::MiFlushDw => {
                if record.field("PostSyncOperation")? == mi::FLUSH_WRITE_IMMEDIATE_DATA {
                    let address = record.address("DestinationAddress")?;
                    let data = record.field("ImmediateData")?;
                    self.write_dword(record.name(), address, data as u32)?;
                    self.write_dword(record.name(), address + 4, (data >> 32) as u32)?;
                }
            }
            InstructionKind::MiStoreRegisterMem => {
                let register = record.address("RegisterAddress")? as u32;
                let value = self.register(register);
                self.write_dword(record.name(), record.address("MemoryAddress")?, value)?;
            }
            InstructionKind::MiLoadRegisterImm => {
                for pair in record.dwords()[1..].chunks_exact(2) {
                    self.set_register(pair[0] & REGISTER_OFFSET_MASK, pair[1]);
                }
            }
            InstructionKind::MiAtomic => {
                if record.field("AtomicOpcode")? == mi::ATOMIC_4B_INCREMENT {
                    let address = record.address("MemoryAddress")?;
                    let (mem, offset) = self.resolve(record.name(), address)?;
                    mem.writer().increment(offset)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve(&self, name: &'static str, address: u64) -> Result<(&'a Arc<StatusMemory>, usize)> {
        self.memory
            .resolve(address, 4)
            .ok_or(Error::UnmappedAddress { name, address })
    }

    fn write_dword(&self, name: &'static str, address: u64, value: u32) -> Result<()> {
        let (mem, offset) = self.resolve(name, address)?;
        mem.writer().write_dword(offset, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hw_cmd::CommandBuffer;
    use hw_cmd::Generation;
    use status_report::Allocator;

    use super::*;

    #[test]
    fn applies_memory_writes() {
        let reg = Generation::Xe2Lpm.registry();
        let mut alloc = GpuVaAllocator::new(0x10_0000, 0x1_0000, 0x1000).unwrap();
        let mem = alloc.allocate("scratch", 64).unwrap();
        let base = mem.gpu_address();

        let mut cmd = CommandBuffer::new(reg, 512);
        cmd.append_all(&[
            mi::store_data_imm(reg, base, 0x11).unwrap(),
            mi::store_data_imm_qword(reg, base + 8, 0x2_0000_0001).unwrap(),
            mi::load_register_imm(reg, &[(0x1c_0100, 0xaa), (0x1c_0104, 0xbb)]).unwrap(),
            mi::store_register_mem(reg, 0x1c_0104, base + 16).unwrap(),
            mi::atomic_increment(reg, base + 20).unwrap(),
            mi::atomic_increment(reg, base + 20).unwrap(),
            mi::flush_dw_post_sync(reg, base + 24, 9).unwrap(),
            mi::batch_buffer_end(reg).unwrap(),
            mi::store_data_imm(reg, base + 32, 1).unwrap(),
        ])
        .unwrap();

        let mut cs = CommandStreamer::new(&alloc);
        let summary = cs.run(reg, cmd.as_bytes(), None).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                executed: 8,
                finished: true
            }
        );
        assert_eq!(cs.register(0x1c_0100), 0xaa);
        let dwords: Vec<u32> = (0..9).map(|i| mem.read_dword(i * 4).unwrap()).collect();
        assert_eq!(dwords, vec![0x11, 0, 1, 2, 0xbb, 2, 9, 0, 0]);
    }

    #[test]
    fn limit_models_a_hang() {
        let reg = Generation::Xe2Lpm.registry();
        let mut alloc = GpuVaAllocator::new(0x10_0000, 0x1_0000, 0x1000).unwrap();
        let mem = alloc.allocate("scratch", 8).unwrap();
        let mut cmd = CommandBuffer::new(reg, 256);
        cmd.append_all(&[
            mi::store_data_imm(reg, mem.gpu_address(), 1).unwrap(),
            mi::store_data_imm(reg, mem.gpu_address() + 4, 2).unwrap(),
            mi::batch_buffer_end(reg).unwrap(),
        ])
        .unwrap();

        let summary = CommandStreamer::new(&alloc)
            .run(reg, cmd.as_bytes(), Some(1))
            .unwrap();
        assert!(!summary.finished);
        assert_eq!(mem.read_dword(0).unwrap(), 1);
        assert_eq!(mem.read_dword(4).unwrap(), 0);
    }

    #[test]
    fn unmapped_write_fails() {
        let reg = Generation::Xe2Lpm.registry();
        let alloc = GpuVaAllocator::new(0x10_0000, 0x1_0000, 0x1000).unwrap();
        let stream = mi::store_data_imm(reg, 0x40_0000, 1).unwrap().to_bytes();
        assert!(matches!(
            CommandStreamer::new(&alloc).run(reg, &stream, None),
            Err(Error::UnmappedAddress {
                address: 0x40_0000,
                ..
            })
        ));
    }

    #[test]
    fn engine_id_registers_follow_platform() {
        let alloc = GpuVaAllocator::new(0, 0x1000, 0x1000).unwrap();
        let platform = Platform::new(Generation::Xe2Hpm);
        let cs = CommandStreamer::for_platform(&alloc, &platform);
        assert_eq!(cs.register(platform.cs_engine_id_register(3).unwrap()), 0x31);
    }
}
