// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Encodes media command streamer instructions into byte-exact command buffers.
//!
//! Instructions are not modelled as native bit-field structs. Each hardware command is described
//! by an [`InstructionDef`]: its default dword pattern, the header fields that identify it, an
//! optional length field, and a table of named payload fields with their dword index, bit range
//! and legal values. A [`Record`] is a mutable copy of that default pattern whose fields are
//! packed and unpacked through the table, and a [`CommandBuffer`] is the fixed-capacity,
//! append-only byte stream the records are serialized into.
//!
//! ```
//! use hw_cmd::CommandBuffer;
//! use hw_cmd::Generation;
//! use hw_cmd::InstructionKind;
//!
//! let registry = Generation::Xe2Lpm.registry();
//! let mut store = registry.define(InstructionKind::MiStoreDataImm).unwrap();
//! store.set_address("Address", 0x1_0000_0040).unwrap();
//! store.set_field("DataDword0", 0xff).unwrap();
//!
//! let mut cmd = CommandBuffer::new(registry, 4096);
//! let offset = cmd.append(&store).unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(cmd.len(), store.byte_size());
//! ```

mod cmd_buffer;
mod field;
mod generation;
pub mod mi;
mod record;
mod registry;
mod xe2_lpm_base;

use remain::sorted;
use thiserror::Error;

pub use crate::cmd_buffer::CommandBuffer;
pub use crate::field::AddressDef;
pub use crate::field::Domain;
pub use crate::field::EnumValue;
pub use crate::field::FieldDef;
pub use crate::generation::Generation;
pub use crate::record::Record;
pub use crate::registry::compute_length;
pub use crate::registry::Family;
pub use crate::registry::InstructionDef;
pub use crate::registry::InstructionKind;
pub use crate::registry::InstructionRegistry;

#[sorted]
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("command buffer overflow: record needs {needed} bytes, {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },
    #[error("value {value:#x} does not fit the {bits}-bit field {field}")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        bits: u32,
    },
    #[error("{0} has a fixed length and cannot carry extra payload")]
    FixedLength(&'static str),
    #[error("{value:#x} is not a legal value for field {field}")]
    IllegalEnumValue { field: &'static str, value: u64 },
    #[error("no record starts at offset {0:#x}")]
    InvalidOffset(usize),
    #[error("address {address:#x} for {field} is not aligned to {align} bytes")]
    MisalignedAddress {
        field: &'static str,
        address: u64,
        align: u64,
    },
    #[error("{instruction} has {dwords} dwords but needs at least {min} to encode its length")]
    MissingPayload {
        instruction: &'static str,
        dwords: usize,
        min: usize,
    },
    #[error("record at offset {offset:#x} needs {needed} bytes but only {available} remain")]
    TruncatedRecord {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{instruction} has no address field named {field}")]
    UnknownAddress {
        instruction: &'static str,
        field: String,
    },
    #[error("{instruction} has no field named {field}")]
    UnknownField {
        instruction: &'static str,
        field: String,
    },
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("unrecognized command header {header:#010x} at offset {offset:#x}")]
    UnknownOpcode { offset: usize, header: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
