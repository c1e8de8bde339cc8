//! Broker configuration assembled from explicit overrides and the process environment.
//!
//! Explicit builder values always win; [`BrokerConfigBuilder::merge_env`] only fills fields that
//! are still unset. The loaded [`BrokerConfig`] is immutable for the broker's lifetime.

// self
use crate::{_prelude::*, auth::ClientCredential, error::ConfigError};

/// Environment variable holding the OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "PLUGIN_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "PLUGIN_CLIENT_SECRET";
/// Environment variable holding the host URL that serves `/oauth/token`.
pub const ENV_HOST_URL: &str = "PLUGIN_HOST_URL";
/// Environment variable holding the relay base URL (defaults to the host URL).
pub const ENV_API_URL: &str = "PLUGIN_API_URL";
/// Environment variable holding the refresh buffer in milliseconds.
pub const ENV_REFRESH_BUFFER_MS: &str = "PLUGIN_REFRESH_BUFFER_MS";
/// Environment variable holding the grant + relay HTTP timeout in milliseconds.
pub const ENV_HTTP_TIMEOUT_MS: &str = "PLUGIN_HTTP_TIMEOUT_MS";

const TOKEN_PATH: &str = "/oauth/token";

/// Validated broker configuration.
#[derive(Clone)]
pub struct BrokerConfig {
	/// Long-lived client credential.
	pub credential: ClientCredential,
	/// Base URL of the token issuer.
	pub host_url: Url,
	/// Base URL relayed paths are resolved against.
	pub api_url: Url,
	/// Window before expiry in which a cached token is no longer handed out.
	pub refresh_buffer: Duration,
	/// Timeout applied to every grant and relayed HTTP call.
	pub http_timeout: Duration,
}
impl BrokerConfig {
	/// Default refresh buffer (30 seconds).
	pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::milliseconds(30_000);
	/// Default HTTP timeout (30 seconds).
	pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::milliseconds(30_000);
	/// Largest accepted refresh buffer (one day).
	pub const MAX_REFRESH_BUFFER: Duration = Duration::days(1);
	/// Largest accepted HTTP timeout (one hour).
	pub const MAX_HTTP_TIMEOUT: Duration = Duration::hours(1);

	/// Starts an empty builder.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::default()
	}

	/// Loads the configuration purely from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::builder().merge_env()?.build()
	}

	/// Loads the configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Self::builder().merge_lookup(lookup)?.build()
	}

	/// Token endpoint derived as `{host_url}/oauth/token`.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		let base = self.host_url.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}{TOKEN_PATH}"))
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })
	}

	/// HTTP timeout converted to a standard-library duration.
	pub fn http_timeout_std(&self) -> std::time::Duration {
		self.http_timeout.try_into().unwrap_or(std::time::Duration::ZERO)
	}
}
impl Debug for BrokerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerConfig")
			.field("client_id", &self.credential.client_id())
			.field("host_url", &self.host_url.as_str())
			.field("api_url", &self.api_url.as_str())
			.field("refresh_buffer", &self.refresh_buffer)
			.field("http_timeout", &self.http_timeout)
			.finish()
	}
}

/// Builder for [`BrokerConfig`] values.
#[derive(Clone, Default)]
pub struct BrokerConfigBuilder {
	client_id: Option<String>,
	client_secret: Option<String>,
	host_url: Option<String>,
	api_url: Option<String>,
	refresh_buffer: Option<Duration>,
	http_timeout: Option<Duration>,
}
impl BrokerConfigBuilder {
	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, value: impl Into<String>) -> Self {
		self.client_secret = Some(value.into());

		self
	}

	/// Sets the issuer base URL.
	pub fn host_url(mut self, value: impl Into<String>) -> Self {
		self.host_url = Some(value.into());

		self
	}

	/// Sets the relay base URL.
	pub fn api_url(mut self, value: impl Into<String>) -> Self {
		self.api_url = Some(value.into());

		self
	}

	/// Overrides the refresh buffer; negative values clamp to zero.
	pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = Some(if buffer.is_negative() { Duration::ZERO } else { buffer });

		self
	}

	/// Overrides the HTTP timeout; negative values clamp to zero.
	pub fn http_timeout(mut self, timeout: Duration) -> Self {
		self.http_timeout = Some(if timeout.is_negative() { Duration::ZERO } else { timeout });

		self
	}

	/// Fills unset fields from the process environment.
	pub fn merge_env(self) -> Result<Self, ConfigError> {
		self.merge_lookup(|key| std::env::var(key).ok())
	}

	/// Fills unset fields from `lookup`; blank values count as unset.
	pub fn merge_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

		if self.client_id.is_none() {
			self.client_id = read(ENV_CLIENT_ID);
		}
		if self.client_secret.is_none() {
			self.client_secret = read(ENV_CLIENT_SECRET);
		}
		if self.host_url.is_none() {
			self.host_url = read(ENV_HOST_URL);
		}
		if self.api_url.is_none() {
			self.api_url = read(ENV_API_URL);
		}
		if self.refresh_buffer.is_none() {
			self.refresh_buffer = read(ENV_REFRESH_BUFFER_MS)
				.map(|raw| parse_millis(ENV_REFRESH_BUFFER_MS, &raw))
				.transpose()?;
		}
		if self.http_timeout.is_none() {
			self.http_timeout = read(ENV_HTTP_TIMEOUT_MS)
				.map(|raw| parse_millis(ENV_HTTP_TIMEOUT_MS, &raw))
				.transpose()?;
		}

		Ok(self)
	}

	/// Validates the collected values.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let client_id =
			self.client_id.ok_or(ConfigError::MissingValue { name: ENV_CLIENT_ID })?;
		let client_secret =
			self.client_secret.ok_or(ConfigError::MissingValue { name: ENV_CLIENT_SECRET })?;
		let host_raw = self.host_url.ok_or(ConfigError::MissingValue { name: ENV_HOST_URL })?;
		let host_url = parse_url(ENV_HOST_URL, &host_raw)?;
		let api_url = match self.api_url {
			Some(raw) => parse_url(ENV_API_URL, &raw)?,
			None => host_url.clone(),
		};

		Ok(BrokerConfig {
			credential: ClientCredential::new(client_id, client_secret),
			host_url,
			api_url,
			refresh_buffer: within_range(
				ENV_REFRESH_BUFFER_MS,
				self.refresh_buffer.unwrap_or(BrokerConfig::DEFAULT_REFRESH_BUFFER),
				BrokerConfig::MAX_REFRESH_BUFFER,
			)?,
			http_timeout: within_range(
				ENV_HTTP_TIMEOUT_MS,
				self.http_timeout.unwrap_or(BrokerConfig::DEFAULT_HTTP_TIMEOUT),
				BrokerConfig::MAX_HTTP_TIMEOUT,
			)?,
		})
	}
}
impl Debug for BrokerConfigBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerConfigBuilder")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("host_url", &self.host_url)
			.field("api_url", &self.api_url)
			.field("refresh_buffer", &self.refresh_buffer)
			.field("http_timeout", &self.http_timeout)
			.finish()
	}
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn within_range(
	name: &'static str,
	value: Duration,
	max: Duration,
) -> Result<Duration, ConfigError> {
	if value.is_negative() || value > max {
		return Err(ConfigError::OutOfRange {
			name,
			value_ms: value.whole_milliseconds(),
			max_ms: max.whole_milliseconds(),
		});
	}

	Ok(value)
}

fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
	raw.trim()
		.parse::<u64>()
		.ok()
		.and_then(|ms| i64::try_from(ms).ok())
		.map(Duration::milliseconds)
		.ok_or_else(|| ConfigError::InvalidNumber { name, value: raw.to_owned() })
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	#[test]
	fn loads_from_lookup_with_defaults() {
		let config = BrokerConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "c1"),
			(ENV_CLIENT_SECRET, "s1"),
			(ENV_HOST_URL, "http://127.0.0.1:4000/"),
		]))
		.expect("Configuration should load from the lookup.");

		assert_eq!(config.credential.client_id(), "c1");
		assert_eq!(config.api_url, config.host_url);
		assert_eq!(config.refresh_buffer, Duration::milliseconds(30_000));
		assert_eq!(config.http_timeout, Duration::seconds(30));
		assert_eq!(
			config.token_endpoint().expect("Token endpoint should derive.").as_str(),
			"http://127.0.0.1:4000/oauth/token"
		);
	}

	#[test]
	fn explicit_values_win_over_environment() {
		let config = BrokerConfig::builder()
			.client_id("explicit")
			.refresh_buffer(Duration::seconds(5))
			.merge_lookup(lookup(&[
				(ENV_CLIENT_ID, "from-env"),
				(ENV_CLIENT_SECRET, "s1"),
				(ENV_HOST_URL, "http://host.internal"),
				(ENV_API_URL, "http://api.internal/base"),
				(ENV_REFRESH_BUFFER_MS, "1000"),
			]))
			.expect("Lookup values should parse.")
			.build()
			.expect("Configuration should build.");

		assert_eq!(config.credential.client_id(), "explicit");
		assert_eq!(config.refresh_buffer, Duration::seconds(5));
		assert_eq!(config.api_url.as_str(), "http://api.internal/base");
	}

	#[test]
	fn rejects_missing_and_malformed_values() {
		let err = BrokerConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "c1")]))
			.expect_err("Missing secret should be rejected.");

		assert!(matches!(err, ConfigError::MissingValue { name: ENV_CLIENT_SECRET }));

		let err = BrokerConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "c1"),
			(ENV_CLIENT_SECRET, "s1"),
			(ENV_HOST_URL, "not a url"),
		]))
		.expect_err("Malformed host URL should be rejected.");

		assert!(matches!(err, ConfigError::InvalidUrl { name: ENV_HOST_URL, .. }));

		let err = BrokerConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "c1"),
			(ENV_CLIENT_SECRET, "s1"),
			(ENV_HOST_URL, "http://host.internal"),
			(ENV_REFRESH_BUFFER_MS, "-5"),
		]))
		.expect_err("Negative buffer should be rejected.");

		assert!(matches!(err, ConfigError::InvalidNumber { name: ENV_REFRESH_BUFFER_MS, .. }));
	}

	#[test]
	fn rejects_durations_beyond_their_cap() {
		let err = BrokerConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "c1"),
			(ENV_CLIENT_SECRET, "s1"),
			(ENV_HOST_URL, "http://host.internal"),
			(ENV_REFRESH_BUFFER_MS, "9223372036854775807"),
		]))
		.expect_err("An absurd refresh buffer should be rejected.");

		assert!(matches!(
			err,
			ConfigError::OutOfRange { name: ENV_REFRESH_BUFFER_MS, max_ms: 86_400_000, .. }
		));

		let err = BrokerConfig::builder()
			.client_id("c1")
			.client_secret("s1")
			.host_url("http://host.internal")
			.http_timeout(Duration::seconds(-1))
			.build()
			.expect_err("A negative timeout should be rejected.");

		assert!(matches!(err, ConfigError::OutOfRange { name: ENV_HTTP_TIMEOUT_MS, .. }));

		let config = BrokerConfig::builder()
			.client_id("c1")
			.client_secret("s1")
			.host_url("http://host.internal")
			.refresh_buffer(BrokerConfig::MAX_REFRESH_BUFFER)
			.build()
			.expect("The largest accepted buffer should build.");

		assert_eq!(config.refresh_buffer, Duration::days(1));
	}

	#[test]
	fn debug_never_prints_secret() {
		let config = BrokerConfig::builder()
			.client_id("c1")
			.client_secret("very-secret-value")
			.host_url("http://host.internal")
			.build()
			.expect("Configuration should build.");

		assert!(!format!("{config:?}").contains("very-secret-value"));
		assert!(
			!format!("{:?}", BrokerConfig::builder().client_secret("very-secret-value"))
				.contains("very-secret-value")
		);
	}
}
