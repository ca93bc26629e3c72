// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial server configuration, merged across sources.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::registry::AppConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, HttpConfigLayer, LinkingConfigLayer, LoggingConfigLayer,
	UpstreamConfigLayer,
};

/// One source's view of the configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub upstream: Option<UpstreamConfigLayer>,
	#[serde(default)]
	pub linking: Option<LinkingConfigLayer>,
	/// `[apps.<id>]` tables.
	#[serde(default)]
	pub apps: Option<BTreeMap<String, AppConfigLayer>>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(&mut self.upstream, other.upstream, UpstreamConfigLayer::merge);
		merge_option(&mut self.linking, other.linking, LinkingConfigLayer::merge);
		merge_option(&mut self.apps, other.apps, merge_apps);
	}
}

fn merge_apps(
	base: &mut BTreeMap<String, AppConfigLayer>,
	other: BTreeMap<String, AppConfigLayer>,
) {
	for (id, layer) in other {
		base.entry(id).or_default().merge(layer);
	}
}

fn merge_option<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		_ => {}
	}
}
