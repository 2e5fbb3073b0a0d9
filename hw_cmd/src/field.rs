// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;
use crate::Result;

/// One legal value of an enumerated field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub name: &'static str,
    pub value: u32,
}

impl EnumValue {
    pub const fn new(name: &'static str, value: u32) -> Self {
        EnumValue { name, value }
    }
}

/// Set of values a field accepts on top of its bit width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    /// Any value that fits the bit width.
    Numeric,
    /// Only the listed values.
    Enumerated(&'static [EnumValue]),
}

/// Location of a named field inside an instruction.
///
/// `low_bit` is relative to dword `dword`. A field may extend past bit 31 into the following
/// dword, which is how the 64-bit `DWn_m` fields of the hardware layouts are expressed. Dwords
/// are stored little-endian, so bit `i` of a two-dword field is bit `i % 32` of dword
/// `dword + i / 32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub dword: usize,
    pub low_bit: u32,
    pub bits: u32,
    pub domain: Domain,
}

impl FieldDef {
    /// Defines a numeric field covering bits `low..=high` starting at dword `dword`.
    pub const fn new(name: &'static str, dword: usize, low: u32, high: u32) -> Self {
        assert!(low <= high && high < 64);
        FieldDef {
            name,
            dword,
            low_bit: low,
            bits: high - low + 1,
            domain: Domain::Numeric,
        }
    }

    /// Restricts the field to `values`.
    pub const fn enumerated(self, values: &'static [EnumValue]) -> Self {
        FieldDef {
            domain: Domain::Enumerated(values),
            ..self
        }
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Number of dwords the field touches.
    pub fn dword_span(&self) -> usize {
        if self.low_bit + self.bits > 32 {
            2
        } else {
            1
        }
    }

    /// Name of `value` in the field's enumeration, if it has one.
    pub fn enum_name(&self, value: u64) -> Option<&'static str> {
        match self.domain {
            Domain::Numeric => None,
            Domain::Enumerated(values) => values
                .iter()
                .find(|v| u64::from(v.value) == value)
                .map(|v| v.name),
        }
    }

    /// Checks that `value` can be stored without truncation and is legal for the domain.
    pub fn check(&self, value: u64) -> Result<()> {
        if value > self.max_value() {
            return Err(Error::FieldOutOfRange {
                field: self.name,
                value,
                bits: self.bits,
            });
        }
        if let Domain::Enumerated(values) = self.domain {
            if !values.iter().any(|v| u64::from(v.value) == value) {
                return Err(Error::IllegalEnumValue {
                    field: self.name,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Extracts the field from `dwords`.
    pub(crate) fn read(&self, dwords: &[u32]) -> u64 {
        let mut raw = u64::from(dwords[self.dword]);
        if self.dword_span() == 2 {
            raw |= u64::from(dwords[self.dword + 1]) << 32;
        }
        (raw >> self.low_bit) & self.max_value()
    }

    /// Packs `value` into `dwords`, leaving every bit outside the field untouched.
    ///
    /// The caller must have validated `value` with `check`.
    pub(crate) fn write(&self, dwords: &mut [u32], value: u64) {
        let mask = self.max_value() << self.low_bit;
        let mut raw = u64::from(dwords[self.dword]);
        if self.dword_span() == 2 {
            raw |= u64::from(dwords[self.dword + 1]) << 32;
        }
        raw = (raw & !mask) | ((value << self.low_bit) & mask);
        dwords[self.dword] = raw as u32;
        if self.dword_span() == 2 {
            dwords[self.dword + 1] = (raw >> 32) as u32;
        }
    }
}

/// A graphics address stored in one or two fields with its low alignment bits reserved.
///
/// With a single field the field holds `address >> low.low_bit`. With a `high` field the low
/// field holds bits `low.low_bit..32` of the address and the high field holds `address >> 32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDef {
    pub name: &'static str,
    pub low: &'static str,
    pub high: Option<&'static str>,
}

impl AddressDef {
    pub const fn single(name: &'static str) -> Self {
        AddressDef {
            name,
            low: name,
            high: None,
        }
    }

    pub const fn split(name: &'static str, low: &'static str, high: &'static str) -> Self {
        AddressDef {
            name,
            low,
            high: Some(high),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: &[EnumValue] = &[EnumValue::new("SIGNAL", 0), EnumValue::new("POLL", 1)];

    #[test]
    fn single_dword_round_trip() {
        let f = FieldDef::new("CompareOperation", 0, 12, 14);
        let mut dwords = [0xffff_0fffu32];
        f.write(&mut dwords, 5);
        assert_eq!(f.read(&dwords), 5);
        assert_eq!(dwords[0], 0xffff_5fff);
    }

    #[test]
    fn qword_field_spans_two_dwords() {
        let f = FieldDef::new("Address", 1, 2, 63);
        assert_eq!(f.dword_span(), 2);
        let mut dwords = [0u32, 0x3, 0];
        f.write(&mut dwords, 0x1_2345_6780 >> 2);
        assert_eq!(dwords, [0, 0x2345_6783, 0x1]);
        assert_eq!(f.read(&dwords), 0x1_2345_6780 >> 2);
    }

    #[test]
    fn full_width_field() {
        let f = FieldDef::new("ImmediateData", 0, 0, 63);
        assert_eq!(f.max_value(), u64::MAX);
        let mut dwords = [0u32; 2];
        f.write(&mut dwords, 0xdead_beef_0bad_f00d);
        assert_eq!(dwords, [0x0bad_f00d, 0xdead_beef]);
    }

    #[test]
    fn check_rejects_wide_values() {
        let f = FieldDef::new("DwordLength", 0, 0, 7);
        assert!(f.check(0xff).is_ok());
        assert_eq!(
            f.check(0x100),
            Err(Error::FieldOutOfRange {
                field: "DwordLength",
                value: 0x100,
                bits: 8
            })
        );
    }

    #[test]
    fn check_rejects_values_outside_enumeration() {
        let f = FieldDef::new("WaitMode", 0, 15, 16).enumerated(MODES);
        assert!(f.check(1).is_ok());
        assert_eq!(
            f.check(2),
            Err(Error::IllegalEnumValue {
                field: "WaitMode",
                value: 2
            })
        );
        assert_eq!(f.enum_name(1), Some("POLL"));
        assert_eq!(f.enum_name(3), None);
    }
}
