// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Media command streamer front end.
//!
//! Ties the instruction encoder (`hw_cmd`) to the submission tracker (`status_report`): a
//! [`pipeline::MediaPipeline`] wraps each codec workload in the status writes hardware uses to
//! report progress, and [`sim::CommandStreamer`] executes the resulting streams in software.

pub mod codec;
pub mod config;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod sim;
