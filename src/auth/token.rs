//! Short-lived access tokens, refresh tokens, and parsed issuer responses.

// self
use crate::{
	_prelude::*,
	auth::{GrantType, TokenSecret},
};

/// Bearer credential attached to every relayed call.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(TokenSecret);
impl AccessToken {
	/// Wraps an issuer-provided access token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(TokenSecret::new(value))
	}

	/// Returns the raw bearer value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}

	/// Formats the value for an `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}

/// Longer-lived token that renews access without presenting the client secret.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(TokenSecret);
impl RefreshToken {
	/// Wraps an issuer-provided refresh token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(TokenSecret::new(value))
	}

	/// Returns the raw refresh value. Only the grant facade should read it.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}
impl Debug for RefreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("RefreshToken").field(&"<redacted>").finish()
	}
}

/// Validated token-endpoint response.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Grant that produced the token.
	pub grant: GrantType,
	/// Newly minted access token.
	pub access_token: AccessToken,
	/// Rotated refresh token, when the issuer returned one.
	pub refresh_token: Option<RefreshToken>,
	/// Lifetime reported by the issuer; always positive.
	pub expires_in: Duration,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tokens_redact_and_format_bearer() {
		let access = AccessToken::new("AT1");
		let refresh = RefreshToken::new("RT1");

		assert_eq!(access.bearer(), "Bearer AT1");
		assert_eq!(format!("{access:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{refresh:?}"), "RefreshToken(\"<redacted>\")");
		assert_eq!(refresh.expose(), "RT1");
	}
}
