// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::fmt::Display;

use crate::registry::compute_length;
use crate::registry::InstructionDef;
use crate::registry::InstructionKind;
use crate::Error;
use crate::Result;

/// An encoded instruction: the dwords of one hardware command.
///
/// A record starts out as the hardware default pattern of its definition. Every setter validates
/// its input before touching the dwords, so a failed call leaves the record exactly as it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    def: &'static InstructionDef,
    dwords: Vec<u32>,
}

impl Record {
    pub(crate) fn new(def: &'static InstructionDef) -> Self {
        Record {
            def,
            dwords: def.defaults.to_vec(),
        }
    }

    pub(crate) fn from_dwords(def: &'static InstructionDef, dwords: Vec<u32>) -> Self {
        Record { def, dwords }
    }

    pub fn def(&self) -> &'static InstructionDef {
        self.def
    }

    pub fn kind(&self) -> InstructionKind {
        self.def.kind
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn dwords(&self) -> &[u32] {
        &self.dwords
    }

    pub fn dword_count(&self) -> usize {
        self.dwords.len()
    }

    pub fn byte_size(&self) -> usize {
        self.dwords.len() * 4
    }

    /// Length field value matching the current size of the record.
    pub fn compute_length(&self) -> usize {
        compute_length(self.dwords.len(), self.def.length_bias())
    }

    /// Current value of the length field, if the command has one.
    pub fn length(&self) -> Option<u64> {
        self.def.length_field().map(|f| f.read(&self.dwords))
    }

    pub fn field(&self, name: &str) -> Result<u64> {
        Ok(self.def.field(name)?.read(&self.dwords))
    }

    /// Writes `value` into the bits of field `name`.
    ///
    /// Values wider than the field fail with `FieldOutOfRange` and values outside an enumerated
    /// domain fail with `IllegalEnumValue`; nothing is truncated.
    pub fn set_field(&mut self, name: &str, value: u64) -> Result<()> {
        let field = self.def.field(name)?;
        field.check(value)?;
        field.write(&mut self.dwords, value);
        Ok(())
    }

    /// Builder form of `set_field`.
    pub fn with_field(mut self, name: &str, value: u64) -> Result<Self> {
        self.set_field(name, value)?;
        Ok(self)
    }

    /// Splices a graphics address into the address field `name`.
    ///
    /// The low bits reserved by the layout must be zero in `address`.
    pub fn set_address(&mut self, name: &str, address: u64) -> Result<()> {
        let addr = self.def.address(name)?;
        let low = self.def.field(addr.low)?;
        let align = 1u64 << low.low_bit;
        if address & (align - 1) != 0 {
            return Err(Error::MisalignedAddress {
                field: addr.name,
                address,
                align,
            });
        }
        match addr.high {
            None => {
                let value = address >> low.low_bit;
                if value > low.max_value() {
                    return Err(Error::FieldOutOfRange {
                        field: addr.name,
                        value: address,
                        bits: low.bits + low.low_bit,
                    });
                }
                low.write(&mut self.dwords, value);
            }
            Some(high) => {
                let high = self.def.field(high)?;
                let high_value = address >> 32;
                if high_value > high.max_value() {
                    return Err(Error::FieldOutOfRange {
                        field: addr.name,
                        value: address,
                        bits: high.bits + 32,
                    });
                }
                low.write(&mut self.dwords, (address & 0xffff_ffff) >> low.low_bit);
                high.write(&mut self.dwords, high_value);
            }
        }
        Ok(())
    }

    /// Reassembles the address stored in address field `name`.
    pub fn address(&self, name: &str) -> Result<u64> {
        let addr = self.def.address(name)?;
        let low = self.def.field(addr.low)?;
        let low_part = low.read(&self.dwords) << low.low_bit;
        match addr.high {
            None => Ok(low_part),
            Some(high) => {
                let high = self.def.field(high)?;
                Ok(high.read(&self.dwords) << 32 | low_part)
            }
        }
    }

    /// Appends payload dwords to a variable-length command and updates its length field.
    pub fn extend_payload(&mut self, payload: &[u32]) -> Result<()> {
        if !self.def.variable_length {
            return Err(Error::FixedLength(self.def.name));
        }
        let new_count = self.dwords.len() + payload.len();
        let length = self
            .def
            .length_field()
            .map(|f| {
                let value = compute_length(new_count, self.def.length_bias()) as u64;
                f.check(value).map(|_| (f, value))
            })
            .transpose()?;
        self.dwords.extend_from_slice(payload);
        if let Some((f, value)) = length {
            f.write(&mut self.dwords, value);
        }
        Ok(())
    }

    /// Serializes the record into `out`, which must be exactly `byte_size()` long.
    pub fn write_le(&self, out: &mut [u8]) {
        for (chunk, dword) in out.chunks_exact_mut(4).zip(self.dwords.iter()) {
            chunk.copy_from_slice(&dword.to_le_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.byte_size()];
        self.write_le(&mut out);
        out
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.def.name)?;
        for field in self.def.fields {
            if self.def.opcode.contains(&field.name) {
                continue;
            }
            let value = field.read(&self.dwords);
            if value == 0 {
                continue;
            }
            match field.enum_name(value) {
                Some(name) => write!(f, " {}={}", field.name, name)?,
                None => write!(f, " {}={:#x}", field.name, value)?,
            }
        }
        if self.dwords.len() > self.def.dword_count() {
            write!(f, " +{} payload", self.dwords.len() - self.def.dword_count())?;
        }
        Ok(())
    }
}
