// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;

use crate::Error;
use crate::Result;

/// A buffer of status memory shared with the command streamer.
///
/// Hardware writes it asynchronously, so every dword is an atomic: software observes hardware
/// writes with acquire loads and the hardware side (`HwWriter`) publishes with release stores.
#[derive(Debug)]
pub struct StatusMemory {
    tag: String,
    gpu_address: u64,
    dwords: Box<[AtomicU32]>,
}

impl StatusMemory {
    /// Creates zeroed status memory of `size` bytes mapped at `gpu_address`.
    pub fn new(tag: &str, gpu_address: u64, size: usize) -> Self {
        StatusMemory {
            tag: tag.to_string(),
            gpu_address,
            dwords: (0..size.div_ceil(4)).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.dwords.len() * 4
    }

    /// Whether `[address, address + len)` lies in this buffer.
    pub fn contains(&self, address: u64, len: usize) -> bool {
        address >= self.gpu_address
            && address
                .checked_add(len as u64)
                .map_or(false, |end| end <= self.gpu_address + self.size() as u64)
    }

    fn cell(&self, offset: usize) -> Result<&AtomicU32> {
        if offset % 4 != 0 {
            return Err(Error::OutOfBounds {
                offset,
                size: self.size(),
            });
        }
        self.dwords.get(offset / 4).ok_or(Error::OutOfBounds {
            offset,
            size: self.size(),
        })
    }

    /// Reads the dword at byte `offset`.
    pub fn read_dword(&self, offset: usize) -> Result<u32> {
        Ok(self.cell(offset)?.load(Ordering::Acquire))
    }

    /// Copies `len` bytes starting at byte `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.div_ceil(4) * 4);
        for i in 0..len.div_ceil(4) {
            out.extend_from_slice(&self.read_dword(offset + i * 4)?.to_le_bytes());
        }
        out.truncate(len);
        Ok(out)
    }

    /// Zeroes `len` bytes at `offset` before the region is handed to hardware again.
    pub(crate) fn clear(&self, offset: usize, len: usize) -> Result<()> {
        for i in 0..len.div_ceil(4) {
            self.cell(offset + i * 4)?.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Returns the handle through which the command streamer writes this memory.
    pub fn writer(self: &Arc<Self>) -> HwWriter {
        HwWriter { mem: self.clone() }
    }
}

/// The hardware side of a `StatusMemory`.
///
/// Only code standing in for the command streamer writes through this handle; the status
/// tracker itself never does.
#[derive(Clone, Debug)]
pub struct HwWriter {
    mem: Arc<StatusMemory>,
}

impl HwWriter {
    pub fn memory(&self) -> &Arc<StatusMemory> {
        &self.mem
    }

    pub fn write_dword(&self, offset: usize, value: u32) -> Result<()> {
        self.mem.cell(offset)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Atomically increments the dword at `offset`, returning the new value.
    pub fn increment(&self, offset: usize) -> Result<u32> {
        let prev = self.mem.cell(offset)?.fetch_add(1, Ordering::AcqRel);
        Ok(prev.wrapping_add(1))
    }
}

/// Source of status memory for the tracker.
pub trait Allocator {
    /// Allocates `size` bytes of zeroed status memory tagged `tag`.
    fn allocate(&mut self, tag: &str, size: usize) -> Result<Arc<StatusMemory>>;
}

/// Hands out status memory from a fixed GPU virtual address range.
///
/// Allocations are bumped upwards from the start of the pool at `align` granularity and are
/// never returned. The allocator remembers every buffer so that a GPU address can be resolved
/// back to the memory backing it.
pub struct GpuVaAllocator {
    base: u64,
    end: u64,
    next: u64,
    align: u64,
    buffers: Vec<Arc<StatusMemory>>,
}

impl GpuVaAllocator {
    /// Creates an allocator for `[base, base + size)`. `align` must be a power of two.
    pub fn new(base: u64, size: u64, align: u64) -> Result<Self> {
        if align == 0 || !align.is_power_of_two() || base % align != 0 {
            return Err(Error::BadAlignment(align));
        }
        let end = base.checked_add(size).ok_or(Error::OutOfSpace { size })?;
        Ok(GpuVaAllocator {
            base,
            end,
            next: base,
            align,
            buffers: Vec::new(),
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Bytes still available.
    pub fn available(&self) -> u64 {
        self.end - self.next
    }

    /// Finds the buffer holding `len` bytes at GPU address `address` and the offset into it.
    pub fn resolve(&self, address: u64, len: usize) -> Option<(&Arc<StatusMemory>, usize)> {
        self.buffers
            .iter()
            .find(|b| b.contains(address, len))
            .map(|b| (b, (address - b.gpu_address()) as usize))
    }
}

impl Allocator for GpuVaAllocator {
    fn allocate(&mut self, tag: &str, size: usize) -> Result<Arc<StatusMemory>> {
        if size == 0 {
            return Err(Error::AllocSizeZero);
        }
        let aligned = (size as u64)
            .checked_add(self.align - 1)
            .map(|s| s & !(self.align - 1))
            .ok_or(Error::OutOfSpace { size: size as u64 })?;
        if aligned > self.available() {
            return Err(Error::OutOfSpace { size: size as u64 });
        }
        let mem = Arc::new(StatusMemory::new(tag, self.next, size));
        debug!(
            "allocated status memory `{}` at {:#x} ({} bytes)",
            tag, self.next, size
        );
        self.next += aligned;
        self.buffers.push(mem.clone());
        Ok(mem)
    }
}
