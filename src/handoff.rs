//! Secret-free credential view handed to less-trusted contexts.
//!
//! A plugin's browser-facing code fetches this view from an internal loopback endpoint. It only
//! ever holds the currently cached access token (possibly empty) and the relay base URL.

// self
use crate::_prelude::*;

/// Read-only projection of the broker's token state.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
	token: String,
	api_url: String,
}
impl ClientConfig {
	pub(crate) fn new(token: String, api_url: &Url) -> Self {
		Self { token, api_url: api_url.as_str().trim_end_matches('/').to_owned() }
	}

	/// Cached access token, or an empty string when none has been acquired.
	pub fn token(&self) -> &str {
		&self.token
	}

	/// Relay base URL without a trailing slash.
	pub fn api_url(&self) -> &str {
		&self.api_url
	}

	/// Returns `true` when no token has been acquired yet.
	pub fn is_empty(&self) -> bool {
		self.token.is_empty()
	}

	/// Serializes the view as the JSON object served to less-trusted code.
	pub fn to_json(&self) -> String {
		serde_json::json!({ "token": self.token, "api_url": self.api_url }).to_string()
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
			.field("api_url", &self.api_url)
			.finish()
	}
}
