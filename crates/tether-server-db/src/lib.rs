// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Link persistence for Tether.
//!
//! A link maps (provider, tenant, external email) to an account id in the
//! tenant's system of record. Rows are created once and never deleted; a
//! repeated link attempt only refreshes `metadata` and `updated_at`.

pub mod error;
pub mod link;
pub mod migrations;
pub mod pool;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::DbError;
pub use link::{Link, LinkRepository, LinkStore, NewLink};
pub use migrations::run_migrations;
pub use pool::{create_pool, ping};
