// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod database;
mod http;
mod linking;
mod logging;
mod upstream;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use linking::{LinkingConfig, LinkingConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use upstream::{UpstreamConfig, UpstreamConfigLayer};
