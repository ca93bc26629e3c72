// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Provider-independent identity claims.
///
/// Produced by an adapter after a successful code exchange. Never persisted
/// as-is: it becomes link metadata and the body of link tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
	/// Provider-scoped subject identifier.
	pub sub: String,
	pub name: String,
	pub given_name: String,
	pub family_name: String,
	pub picture: Option<String>,
	pub email: String,
	pub email_verified: bool,
}

impl NormalizedIdentity {
	/// Email in the form used as the link key.
	pub fn normalized_email(&self) -> String {
		normalize_email(&self.email)
	}
}

pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

/// Split a display name into (first word, remainder).
pub fn split_display_name(name: &str) -> (String, String) {
	let name = name.trim();
	match name.split_once(char::is_whitespace) {
		Some((given, family)) => (given.to_string(), family.trim().to_string()),
		None => (name.to_string(), String::new()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn splits_first_word_from_rest() {
		assert_eq!(
			split_display_name("Ada King Lovelace"),
			("Ada".to_string(), "King Lovelace".to_string())
		);
		assert_eq!(split_display_name("Cher"), ("Cher".to_string(), String::new()));
		assert_eq!(split_display_name("  "), (String::new(), String::new()));
	}

	#[test]
	fn email_is_trimmed_and_lowercased() {
		assert_eq!(normalize_email("  A@X.com "), "a@x.com");
	}

	proptest! {
		#[test]
		fn split_keeps_every_word(words in proptest::collection::vec("[A-Za-z]{1,10}", 1..5)) {
			let (given, family) = split_display_name(&words.join(" "));
			prop_assert_eq!(&given, &words[0]);
			prop_assert_eq!(family, words[1..].join(" "));
		}
	}
}
