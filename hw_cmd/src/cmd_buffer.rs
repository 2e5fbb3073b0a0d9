// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Display;

use log::debug;
use log::error;

use crate::record::Record;
use crate::registry::InstructionKind;
use crate::registry::InstructionRegistry;
use crate::Error;
use crate::Result;

/// A fixed-capacity command buffer that records are appended to in order.
///
/// The write cursor only moves forward. An append that does not fit fails without writing any
/// byte, so the buffer never holds a partial record. Once complete the buffer is turned into the
/// read-only stream handed to the command streamer with `finish`.
pub struct CommandBuffer {
    registry: &'static InstructionRegistry,
    bytes: Vec<u8>,
    cursor: usize,
}

impl CommandBuffer {
    /// Creates an empty command buffer of `capacity` bytes encoding for `registry`.
    pub fn new(registry: &'static InstructionRegistry, capacity: usize) -> Self {
        CommandBuffer {
            registry,
            bytes: vec![0u8; capacity],
            cursor: 0,
        }
    }

    pub fn registry(&self) -> &'static InstructionRegistry {
        self.registry
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of bytes written so far, i.e. the write cursor.
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// Copies `record` to the cursor and returns the offset it was written at.
    pub fn append(&mut self, record: &Record) -> Result<usize> {
        check_length(record)?;
        let needed = record.byte_size();
        let remaining = self.remaining();
        if needed > remaining {
            error!(
                "{} does not fit: needs {} bytes, {} of {} remaining",
                record.name(),
                needed,
                remaining,
                self.capacity()
            );
            return Err(Error::BufferOverflow { needed, remaining });
        }
        let offset = self.cursor;
        record.write_le(&mut self.bytes[offset..offset + needed]);
        self.cursor += needed;
        debug!("{} at {:#x} ({} bytes)", record.name(), offset, needed);
        Ok(offset)
    }

    /// Appends each record in order, returning their offsets.
    ///
    /// Capacity and length encoding for all of them are checked up front, so either every
    /// record is appended or none.
    pub fn append_all(&mut self, records: &[Record]) -> Result<Vec<usize>> {
        for record in records {
            check_length(record)?;
        }
        let needed = records.iter().map(Record::byte_size).sum();
        let remaining = self.remaining();
        if needed > remaining {
            error!(
                "{} records do not fit: need {} bytes, {} remaining",
                records.len(),
                needed,
                remaining
            );
            return Err(Error::BufferOverflow { needed, remaining });
        }
        records.iter().map(|r| self.append(r)).collect()
    }

    /// Pads the stream with MI_NOOP until the cursor is qword aligned.
    pub fn pad_to_qword(&mut self) -> Result<()> {
        if self.cursor % 8 != 0 {
            let noop = self.registry.define(InstructionKind::MiNoop)?;
            self.append(&noop)?;
        }
        Ok(())
    }

    /// Decodes the record previously appended at `offset`.
    pub fn record_at(&self, offset: usize) -> Result<Record> {
        if offset % 4 != 0 || offset >= self.cursor {
            return Err(Error::InvalidOffset(offset));
        }
        let header = read_dword(&self.bytes, offset);
        let def = self
            .registry
            .identify(header)
            .ok_or(Error::UnknownOpcode { offset, header })?;
        let needed = def.encoded_dwords(header) * 4;
        if offset + needed > self.cursor {
            return Err(Error::InvalidOffset(offset));
        }
        let dwords = (0..needed / 4)
            .map(|i| read_dword(&self.bytes, offset + i * 4))
            .collect();
        Ok(Record::from_dwords(def, dwords))
    }

    /// Rewrites address field `name` of the record at `offset`.
    ///
    /// Used to relocate addresses that were unknown when the record was appended. The record's
    /// size cannot change, so nothing after it moves.
    pub fn patch_address(&mut self, offset: usize, name: &str, address: u64) -> Result<()> {
        let mut record = self.record_at(offset)?;
        record.set_address(name, address)?;
        let size = record.byte_size();
        record.write_le(&mut self.bytes[offset..offset + size]);
        debug!(
            "patched {}.{} at {:#x} to {:#x}",
            record.name(),
            name,
            offset,
            address
        );
        Ok(())
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }

    /// Consumes the buffer and returns the finished command stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.truncate(self.cursor);
        self.bytes
    }
}

impl Display for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CommandBuffer `{}` {}/{} bytes",
            self.registry.name(),
            self.cursor,
            self.capacity()
        )
    }
}

/// A variable-length record shorter than its length bias would decode with a different size.
fn check_length(record: &Record) -> Result<()> {
    let def = record.def();
    let min = def.length_bias();
    if def.variable_length && record.dword_count() < min {
        error!(
            "{} has {} dwords, its length field cannot encode fewer than {}",
            record.name(),
            record.dword_count(),
            min
        );
        return Err(Error::MissingPayload {
            instruction: record.name(),
            dwords: record.dword_count(),
            min,
        });
    }
    Ok(())
}

fn read_dword(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Generation;

    fn registry() -> &'static InstructionRegistry {
        Generation::Xe2Lpm.registry()
    }

    #[test]
    fn offsets_advance_by_record_size() {
        let reg = registry();
        let records = [
            reg.define(InstructionKind::MiFlushDw).unwrap(),
            reg.define(InstructionKind::MiNoop).unwrap(),
            reg.define(InstructionKind::MiAtomic).unwrap(),
            reg.define(InstructionKind::MiBatchBufferEnd).unwrap(),
        ];
        let mut cmd = CommandBuffer::new(reg, 256);
        let mut expected_offset = 0;
        for rec in &records {
            let offset = cmd.append(rec).unwrap();
            assert_eq!(offset, expected_offset);
            assert_eq!(&cmd.as_bytes()[offset..offset + rec.byte_size()], &rec.to_bytes()[..]);
            expected_offset += rec.byte_size();
        }
        assert_eq!(cmd.len(), (5 + 1 + 11 + 1) * 4);
        assert_eq!(cmd.remaining(), 256 - cmd.len());
    }

    #[test]
    fn overflow_writes_nothing() {
        let reg = registry();
        let flush = reg.define(InstructionKind::MiFlushDw).unwrap();
        let mut cmd = CommandBuffer::new(reg, 24);
        cmd.append(&flush).unwrap();
        assert_eq!(
            cmd.append(&flush),
            Err(Error::BufferOverflow {
                needed: 20,
                remaining: 4
            })
        );
        assert_eq!(cmd.len(), 20);
        assert_eq!(cmd.finish().len(), 20);
    }

    #[test]
    fn append_all_is_all_or_nothing() {
        let reg = registry();
        let noop = reg.define(InstructionKind::MiNoop).unwrap();
        let end = reg.define(InstructionKind::MiBatchBufferEnd).unwrap();
        let mut cmd = CommandBuffer::new(reg, 8);
        assert!(cmd
            .append_all(&[noop.clone(), noop.clone(), end.clone()])
            .is_err());
        assert!(cmd.is_empty());
        assert_eq!(cmd.append_all(&[noop, end]).unwrap(), vec![0, 4]);
    }

    #[test]
    fn qword_padding() {
        let reg = registry();
        let mut cmd = CommandBuffer::new(reg, 64);
        cmd.append(&reg.define(InstructionKind::MiBatchBufferEnd).unwrap())
            .unwrap();
        cmd.pad_to_qword().unwrap();
        assert_eq!(cmd.len(), 8);
        cmd.pad_to_qword().unwrap();
        assert_eq!(cmd.len(), 8);
        assert_eq!(&cmd.as_bytes()[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn empty_math_is_rejected() {
        let reg = registry();
        let mut math = reg.define(InstructionKind::MiMath).unwrap();
        let end = reg.define(InstructionKind::MiBatchBufferEnd).unwrap();
        let mut cmd = CommandBuffer::new(reg, 64);
        assert_eq!(
            cmd.append(&math),
            Err(Error::MissingPayload {
                instruction: "MI_MATH",
                dwords: 1,
                min: 2
            })
        );
        assert!(cmd.append_all(&[end.clone(), math.clone()]).is_err());
        assert!(cmd.is_empty());

        math.extend_payload(&[0x0420_0000]).unwrap();
        cmd.append_all(&[math, end]).unwrap();
        let kinds: Vec<InstructionKind> = reg
            .decode_stream(cmd.as_bytes())
            .unwrap()
            .into_iter()
            .map(|(_, rec)| rec.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![InstructionKind::MiMath, InstructionKind::MiBatchBufferEnd]
        );
    }

    #[test]
    fn relocation_patch() {
        let reg = registry();
        let mut cmd = CommandBuffer::new(reg, 64);
        cmd.append(&reg.define(InstructionKind::MiNoop).unwrap())
            .unwrap();
        let offset = cmd
            .append(&reg.define(InstructionKind::MiBatchBufferStart).unwrap())
            .unwrap();
        cmd.patch_address(offset, "BatchBufferStartAddress", 0x8_0000_1000)
            .unwrap();
        let rec = cmd.record_at(offset).unwrap();
        assert_eq!(rec.address("BatchBufferStartAddress").unwrap(), 0x8_0000_1000);
        assert_eq!(rec.dwords()[0], 0x1880_0001);
        assert_eq!(cmd.len(), 16);

        assert_eq!(
            cmd.patch_address(2, "BatchBufferStartAddress", 0),
            Err(Error::InvalidOffset(2))
        );
        assert_eq!(
            cmd.patch_address(16, "BatchBufferStartAddress", 0),
            Err(Error::InvalidOffset(16))
        );
    }
}
