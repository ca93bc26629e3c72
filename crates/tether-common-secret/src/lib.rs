// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for the credentials the broker handles.
//!
//! OAuth client secrets, tenant API keys for the system of record, provider
//! access/ID tokens and tenant session tokens all pass through [`Secret<T>`].
//! The wrapper:
//!
//! - prints `[REDACTED]` through `Debug`, `Display` and `Serialize`;
//! - zeroizes the inner value on drop;
//! - has no `Deref`, so every read goes through [`Secret::expose`].
//!
//! ```
//! use tether_common_secret::SecretString;
//!
//! let client_secret = SecretString::new("gl-oauth-secret".to_string());
//! assert_eq!(format!("{client_secret}"), "[REDACTED]");
//! assert_eq!(client_secret.expose(), "gl-oauth-secret");
//! ```
//!
//! `tracing::Value` is sealed, so structured logging relies on the redacted
//! `Display` (`%secret`) and `Debug` (`?secret`) implementations.

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never reach logs, responses or config dumps.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret strings: client secrets, API keys, bearer tokens.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Read the wrapped value. Call sites are the audit surface for secret use.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Clone the inner value out. The original stays zeroize-on-drop.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// True when the wrapped string is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Secret::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

// =============================================================================
// Serde Integration
// =============================================================================

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	/// Token endpoint responses and config files deserialize straight into
	/// the wrapper.
	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_are_redacted() {
		let secret = SecretString::from("tenant-api-key-123");

		let debug = format!("{secret:?}");
		assert!(!debug.contains("tenant-api-key-123"));
		assert_eq!(debug, "Secret(\"[REDACTED]\")");
		assert_eq!(format!("{secret}"), REDACTED);
	}

	#[test]
	fn option_secret_debug_is_redacted() {
		let secret: Option<SecretString> = Some("client-secret".into());
		let debug = format!("{secret:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("client-secret"));
	}

	#[test]
	fn expose_and_into_inner_return_value() {
		let secret = SecretString::new("tok".to_string());
		assert_eq!(secret.expose(), "tok");
		assert_eq!(secret.clone().into_inner(), "tok");
	}

	#[test]
	fn blank_detection() {
		assert!(SecretString::from("").is_blank());
		assert!(SecretString::from("  \n").is_blank());
		assert!(!SecretString::from("x").is_blank());
	}

	#[test]
	fn equality_compares_inner_values() {
		assert_eq!(SecretString::from("a"), SecretString::from("a"));
		assert_ne!(SecretString::from("a"), SecretString::from("b"));
	}

	#[cfg(feature = "serde")]
	#[test]
	fn serde_redacts_on_write_and_populates_on_read() {
		let secret = SecretString::from("ya29.access-token");
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");

		#[derive(serde::Deserialize)]
		struct TokenBody {
			access_token: SecretString,
		}
		let body: TokenBody = serde_json::from_str(r#"{"access_token":"ya29.abc"}"#).unwrap();
		assert_eq!(body.access_token.expose(), "ya29.abc");
	}

	proptest! {
		#[test]
		fn formatting_never_leaks(inner in "[a-zA-Z0-9!@#$%^&*_+=;:,.<>?/-]{3,50}") {
			prop_assume!(!inner.contains("REDACTED"));
			prop_assume!(!inner.contains("Secret"));

			let secret = Secret::new(inner.clone());
			let debug_output = format!("{secret:?}");
			let display_output = format!("{secret}");
			prop_assert!(!debug_output.contains(&inner));
			prop_assert!(!display_output.contains(&inner));
		}

		#[test]
		fn expose_roundtrips(inner in ".*") {
			let secret = Secret::new(inner.clone());
			prop_assert_eq!(secret.expose(), &inner);
		}
	}
}
