//! Long-lived client credential held only by the broker process.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// OAuth client identifier + secret pair used for the client-credentials grant.
///
/// The credential is fixed when the broker is built and never leaves the broker: it is not
/// serializable, and its [`Debug`] output omits the secret.
#[derive(Clone)]
pub struct ClientCredential {
	client_id: String,
	client_secret: TokenSecret,
}
impl ClientCredential {
	/// Creates a credential from its identifier and secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into() }
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Client secret; only the grant facade should read it.
	pub(crate) fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}
}
impl Debug for ClientCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredential")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_omits_secret() {
		let credential = ClientCredential::new("c1", "s1");
		let rendered = format!("{credential:?}");

		assert!(rendered.contains("c1"));
		assert!(!rendered.contains("s1\""));
		assert_eq!(credential.client_secret().expose(), "s1");
	}
}
