// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Display;

use crate::field::AddressDef;
use crate::field::Domain;
use crate::field::FieldDef;
use crate::record::Record;
use crate::Error;
use crate::Result;

/// Length bias of memory interface (MI) commands.
pub const MI_LENGTH_BIAS: usize = 2;
/// Length bias of GFX pipe commands such as PIPE_CONTROL and MEDIA_STATE_FLUSH.
pub const GFX_LENGTH_BIAS: usize = 2;
/// Length bias of VDBOX commands such as MFX_WAIT and VD_CONTROL_STATE.
pub const VDBOX_LENGTH_BIAS: usize = 2;

/// Hardware command kinds known to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    MiBatchBufferEnd,
    MiNoop,
    MiArbCheck,
    MiLoadRegisterImm,
    MiLoadRegisterMem,
    MiLoadRegisterReg,
    MiStoreRegisterMem,
    MiBatchBufferStart,
    MiSetPredicate,
    MiCopyMemMem,
    MiStoreDataImm,
    MiSemaphoreSignal,
    MiSemaphoreWait,
    MiConditionalBatchBufferEnd,
    MiAtomic,
    MiMath,
    MiFlushDw,
    MiForceWakeup,
    MiUserInterrupt,
    PipeControl,
    MfxWait,
    VdControlState,
    MediaStateFlush,
}

/// Instruction family; decides the bias used by the length field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Mi,
    Gfx,
    Vdbox,
}

impl Family {
    pub const fn length_bias(self) -> usize {
        match self {
            Family::Mi => MI_LENGTH_BIAS,
            Family::Gfx => GFX_LENGTH_BIAS,
            Family::Vdbox => VDBOX_LENGTH_BIAS,
        }
    }
}

/// Returns the value of a length field for a record of `dword_count` dwords.
///
/// Hardware counts the dwords following a fixed baseline rather than the total, so the value is
/// `max(dword_count, bias) - bias`.
pub fn compute_length(dword_count: usize, bias: usize) -> usize {
    dword_count.max(bias) - bias
}

/// Static description of one hardware command.
#[derive(Debug, PartialEq, Eq)]
pub struct InstructionDef {
    pub kind: InstructionKind,
    pub name: &'static str,
    pub family: Family,
    /// Default encoding; its length is the fixed (or minimum, for variable-length commands)
    /// dword count.
    pub defaults: &'static [u32],
    /// Header fields in dword 0 that identify the command.
    pub opcode: &'static [&'static str],
    pub length: Option<&'static str>,
    pub variable_length: bool,
    pub fields: &'static [FieldDef],
    pub addresses: &'static [AddressDef],
}

impl InstructionDef {
    pub fn dword_count(&self) -> usize {
        self.defaults.len()
    }

    pub fn length_bias(&self) -> usize {
        self.family.length_bias()
    }

    pub fn field(&self, name: &str) -> Result<&'static FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField {
                instruction: self.name,
                field: name.to_string(),
            })
    }

    pub fn address(&self, name: &str) -> Result<&'static AddressDef> {
        self.addresses
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::UnknownAddress {
                instruction: self.name,
                field: name.to_string(),
            })
    }

    pub(crate) fn length_field(&self) -> Option<&'static FieldDef> {
        let name = self.length?;
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `header` carries this command's opcode fields.
    ///
    /// Opcode fields with an enumerated domain match any legal value (VD_CONTROL_STATE names
    /// the target codec engine in its header), the others must equal the default.
    pub fn matches(&self, header: u32) -> bool {
        let header = [header];
        self.opcode.iter().all(|name| match self.field(name) {
            Ok(f) => {
                let value = f.read(&header);
                match f.domain {
                    Domain::Enumerated(_) => f.check(value).is_ok(),
                    Domain::Numeric => value == f.read(self.defaults),
                }
            }
            Err(_) => false,
        })
    }

    /// Number of dwords of an encoded instance of this command whose first dword is `header`.
    pub fn encoded_dwords(&self, header: u32) -> usize {
        match self.length_field() {
            Some(f) if self.variable_length => f.read(&[header]) as usize + self.length_bias(),
            _ => self.dword_count(),
        }
    }
}

/// The instruction set of one hardware generation.
pub struct InstructionRegistry {
    name: &'static str,
    defs: &'static [InstructionDef],
}

impl InstructionRegistry {
    pub const fn new(name: &'static str, defs: &'static [InstructionDef]) -> Self {
        InstructionRegistry { name, defs }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static InstructionDef> {
        self.defs.iter()
    }

    pub fn get(&self, kind: InstructionKind) -> Result<&'static InstructionDef> {
        self.defs
            .iter()
            .find(|d| d.kind == kind)
            .ok_or_else(|| Error::UnknownInstruction(format!("{:?}", kind)))
    }

    /// Looks a command up by its hardware name, e.g. `MI_FLUSH_DW`. Case is ignored.
    pub fn by_name(&self, name: &str) -> Result<&'static InstructionDef> {
        self.defs
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownInstruction(name.to_string()))
    }

    /// Returns a record of `kind` carrying the hardware default encoding.
    pub fn define(&self, kind: InstructionKind) -> Result<Record> {
        Ok(Record::new(self.get(kind)?))
    }

    /// Finds the command whose opcode fields match `header`.
    pub fn identify(&self, header: u32) -> Option<&'static InstructionDef> {
        self.defs.iter().find(|d| d.matches(header))
    }

    /// Splits an encoded command stream back into records.
    ///
    /// Returns each record with the byte offset it was found at. Trailing bytes that do not form
    /// a whole dword are reported as a truncated record.
    pub fn decode_stream(&self, bytes: &[u8]) -> Result<Vec<(usize, Record)>> {
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let available = bytes.len() - offset;
            let header = read_dword(bytes, offset).ok_or(Error::TruncatedRecord {
                offset,
                needed: 4,
                available,
            })?;
            let def = self
                .identify(header)
                .ok_or(Error::UnknownOpcode { offset, header })?;
            let needed = def.encoded_dwords(header) * 4;
            if needed > available {
                return Err(Error::TruncatedRecord {
                    offset,
                    needed,
                    available,
                });
            }
            let dwords = bytes[offset..offset + needed]
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            records.push((offset, Record::from_dwords(def, dwords)));
            offset += needed;
        }
        Ok(records)
    }
}

impl Display for InstructionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} instructions)", self.name, self.defs.len())
    }
}

fn read_dword(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
