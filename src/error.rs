//! Broker-level error types shared across the credential broker, grant facade, and relay.
//!
//! Every error is [`Clone`] so a single failed acquisition can be handed to each caller that
//! attached to it.

// self
use crate::{_prelude::*, auth::GrantType};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, clonable error source.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Neither the refresh grant nor the client-credentials grant produced a token.
	#[error(transparent)]
	AuthGrant(#[from] AuthGrantError),
	/// A relayed call returned a non-2xx status or an undecodable body.
	#[error(transparent)]
	Relay(#[from] RelayError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised while assembling a broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Required configuration value is absent.
	#[error("Configuration value `{name}` is required.")]
	MissingValue {
		/// Environment variable or builder field name.
		name: &'static str,
	},
	/// Configured URL cannot be parsed.
	#[error("Configuration value `{name}` is not a valid URL.")]
	InvalidUrl {
		/// Environment variable or builder field name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured millisecond value is not a non-negative integer.
	#[error("Configuration value `{name}` must be a non-negative integer, got `{value}`.")]
	InvalidNumber {
		/// Environment variable or builder field name.
		name: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Configured duration falls outside the accepted range.
	#[error("Configuration value `{name}` must be between 0 and {max_ms} ms, got {value_ms} ms.")]
	OutOfRange {
		/// Environment variable or builder field name.
		name: &'static str,
		/// Rejected value in milliseconds.
		value_ms: i128,
		/// Largest accepted value in milliseconds.
		max_ms: i128,
	},
	/// Token endpoint URL could not be derived from the host URL.
	#[error("Token endpoint cannot be derived from the host URL.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: SharedError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Wraps a request construction failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpRequest { source: Arc::new(src) }
	}
}

/// Token endpoint failures for a single grant attempt.
#[derive(Clone, Debug, ThisError)]
pub enum AuthGrantError {
	/// The issuer answered with a non-2xx status.
	#[error("Token endpoint rejected the {grant} grant with status {}.", display_status(.status))]
	Rejected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code returned by the issuer, when available.
		status: Option<u16>,
		/// OAuth `error` field, when the body carried one.
		oauth_error: Option<String>,
		/// Raw response body text, when available.
		body: Option<String>,
		/// `Retry-After` hint sent with the rejection.
		retry_after: Option<Duration>,
	},
	/// The issuer answered 2xx but the body is not a token response.
	#[error("Token endpoint returned a malformed response for the {grant} grant: {message}.")]
	MalformedResponse {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code returned by the issuer, when available.
		status: Option<u16>,
		/// Parser or client message describing the problem.
		message: String,
		/// Raw response body text, when available.
		body: Option<String>,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response for the {grant} grant is missing expires_in.")]
	MissingExpiresIn {
		/// Grant that was attempted.
		grant: GrantType,
	},
	/// Token endpoint returned a zero, negative, or unrepresentable `expires_in`.
	#[error("Token endpoint returned an unusable expires_in for the {grant} grant.")]
	InvalidExpiresIn {
		/// Grant that was attempted.
		grant: GrantType,
	},
}
impl AuthGrantError {
	/// Grant whose attempt produced this error.
	pub fn grant(&self) -> GrantType {
		match self {
			Self::Rejected { grant, .. }
			| Self::MalformedResponse { grant, .. }
			| Self::MissingExpiresIn { grant }
			| Self::InvalidExpiresIn { grant } => *grant,
		}
	}

	/// HTTP status reported by the issuer, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::MalformedResponse { status, .. } => *status,
			_ => None,
		}
	}

	/// Raw issuer response body, when captured.
	pub fn body(&self) -> Option<&str> {
		match self {
			Self::Rejected { body, .. } | Self::MalformedResponse { body, .. } => body.as_deref(),
			_ => None,
		}
	}

	/// `Retry-After` hint from a rejection, when the issuer sent one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Rejected { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Failures surfaced by relayed host API calls.
#[derive(Clone, Debug, ThisError)]
pub enum RelayError {
	/// Host API answered with a non-2xx status.
	#[error("{method} {path} failed with status {status}.")]
	Status {
		/// HTTP method of the relayed call.
		method: String,
		/// Path (or absolute URL) the caller requested.
		path: String,
		/// HTTP status code returned by the host.
		status: u16,
		/// Response body text, when readable.
		body: Option<String>,
		/// `Retry-After` hint sent with the response.
		retry_after: Option<Duration>,
	},
	/// Host API answered 2xx with a body that does not match the expected shape.
	#[error("Response from {path} could not be decoded at `{field}`.")]
	Decode {
		/// Path (or absolute URL) the caller requested.
		path: String,
		/// JSON path of the failing field.
		field: String,
		/// Underlying JSON failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
}
impl RelayError {
	/// HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			Self::Decode { .. } => None,
		}
	}

	/// `Retry-After` hint carried by a status error, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Status { retry_after, .. } => *retry_after,
			Self::Decode { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Human-readable endpoint label.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The request exceeded the configured timeout.
	#[error("Request to {target} timed out.")]
	Timeout {
		/// Human-readable endpoint label.
		target: &'static str,
		/// Transport-specific timeout error.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target, source: Arc::new(src) }
	}

	/// Classifies a reqwest failure as a timeout or a generic network error.
	pub fn from_reqwest(target: &'static str, err: ReqwestError) -> Self {
		if err.is_timeout() {
			Self::Timeout { target, source: Arc::new(err) }
		} else {
			Self::network(target, err)
		}
	}
}

fn display_status(status: &Option<u16>) -> String {
	status.map(|code| code.to_string()).unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_error_accessors_expose_issuer_details() {
		let err = AuthGrantError::Rejected {
			grant: GrantType::ClientCredentials,
			status: Some(401),
			oauth_error: Some("invalid_client".into()),
			body: Some("{\"error\":\"invalid_client\"}".into()),
			retry_after: Some(Duration::seconds(3)),
		};

		assert_eq!(err.grant(), GrantType::ClientCredentials);
		assert_eq!(err.status(), Some(401));
		assert_eq!(err.body(), Some("{\"error\":\"invalid_client\"}"));
		assert_eq!(err.retry_after(), Some(Duration::seconds(3)));
		assert_eq!(
			err.to_string(),
			"Token endpoint rejected the client_credentials grant with status 401."
		);

		let err = AuthGrantError::MissingExpiresIn { grant: GrantType::RefreshToken };

		assert_eq!(err.status(), None);
		assert_eq!(err.body(), None);
	}

	#[test]
	fn errors_clone_across_waiters() {
		let err = Error::from(TransportError::network(
			"the token endpoint",
			std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
		));
		let cloned = err.clone();

		assert!(matches!(cloned, Error::Transport(TransportError::Network { .. })));
		assert_eq!(err.to_string(), cloned.to_string());
	}

	#[test]
	fn relay_status_error_names_method_and_path() {
		let err = RelayError::Status {
			method: "GET".into(),
			path: "/api/v1/settings".into(),
			status: 404,
			body: None,
			retry_after: None,
		};

		assert_eq!(err.status(), Some(404));
		assert_eq!(err.to_string(), "GET /api/v1/settings failed with status 404.");
	}
}
