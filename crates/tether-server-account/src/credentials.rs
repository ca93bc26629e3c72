// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Boundary validation of account-link credential payloads.

use std::fmt;

use serde_json::{Map, Value};
use tether_common_secret::SecretString;

use crate::error::AccountError;

/// Credential values for a tenant's declared link fields, in declared order.
///
/// Values are secrets (passwords, PINs); `Debug` prints field names only.
#[derive(Clone)]
pub struct CredentialFields {
	fields: Vec<(String, SecretString)>,
}

impl CredentialFields {
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.fields.iter().map(|(k, _)| k.as_str())
	}

	pub fn get(&self, name: &str) -> Option<&SecretString> {
		self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
	}

	/// JSON object sent to the system of record.
	pub(crate) fn to_json(&self) -> Value {
		let map: Map<String, Value> = self
			.fields
			.iter()
			.map(|(k, v)| (k.clone(), Value::String(v.expose().clone())))
			.collect();
		Value::Object(map)
	}
}

impl fmt::Debug for CredentialFields {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CredentialFields")
			.field("names", &self.names().collect::<Vec<_>>())
			.finish()
	}
}

/// Check `payload` against the tenant's `link_fields`.
///
/// Every declared field must be a non-blank string. Undeclared fields are
/// logged by name and dropped.
pub fn validate_credentials(
	link_fields: &[String],
	payload: &Value,
) -> Result<CredentialFields, AccountError> {
	let object = payload.as_object().ok_or_else(|| {
		AccountError::InvalidCredentials("payload must be a JSON object".to_string())
	})?;

	let mut fields = Vec::with_capacity(link_fields.len());
	for name in link_fields {
		match object.get(name) {
			Some(Value::String(s)) if !s.trim().is_empty() => {
				fields.push((name.clone(), SecretString::new(s.clone())));
			}
			Some(Value::String(_)) | None | Some(Value::Null) => {
				return Err(AccountError::InvalidCredentials(format!(
					"missing required field '{name}'"
				)));
			}
			Some(_) => {
				return Err(AccountError::InvalidCredentials(format!(
					"field '{name}' must be a string"
				)));
			}
		}
	}

	let undeclared: Vec<&str> = object
		.keys()
		.filter(|k| !link_fields.contains(*k))
		.map(String::as_str)
		.collect();
	if !undeclared.is_empty() {
		tracing::warn!(fields = ?undeclared, "dropping undeclared credential fields");
	}

	Ok(CredentialFields { fields })
}
