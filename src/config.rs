// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use hw_cmd::Generation;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use status_report::TrackerConfig;
use status_report::MAX_PIPES;
use thiserror::Error;

use crate::platform::Platform;

/// Default command buffer size in bytes.
pub const DEFAULT_COMMAND_BUFFER_SIZE: usize = 16 * 1024;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("command buffer size {0} must be a non-zero multiple of 8")]
    BufferSize(usize),
    #[error("pipe count {pipes} must be between 1 and {max}")]
    InvalidPipes { pipes: u8, max: usize },
    #[error("status ring size {0} is not a power of 2")]
    InvalidRingSize(u32),
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings of a media pipeline, loaded from a JSON file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    pub generation: Generation,
    /// Slots in the status report ring.
    pub status_ring_size: u32,
    /// Capacity of each command buffer in bytes.
    pub command_buffer_size: usize,
    /// Collect the VDBOX instances used by each submission. On by default in debug builds.
    pub enable_vdbox_id_report: bool,
    /// Number of VDBOX pipes running every frame.
    pub pipes: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let generation = Generation::default();
        MediaConfig {
            generation,
            status_ring_size: Platform::new(generation).default_status_num(),
            command_buffer_size: DEFAULT_COMMAND_BUFFER_SIZE,
            enable_vdbox_id_report: cfg!(debug_assertions),
            pipes: 1,
        }
    }
}

impl MediaConfig {
    /// Reads and validates the config at `path`. Missing keys take their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MediaConfig =
            serde_json::from_str(&contents).map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.status_ring_size.is_power_of_two() {
            return Err(Error::InvalidRingSize(self.status_ring_size));
        }
        if self.command_buffer_size == 0 || self.command_buffer_size % 8 != 0 {
            return Err(Error::BufferSize(self.command_buffer_size));
        }
        if self.pipes == 0 || usize::from(self.pipes) > MAX_PIPES {
            return Err(Error::InvalidPipes {
                pipes: self.pipes,
                max: MAX_PIPES,
            });
        }
        Ok(())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            status_num: self.status_ring_size,
            enable_vdbox_id_report: self.enable_vdbox_id_report,
        }
    }
}
