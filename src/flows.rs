//! Credential broker: cached access tokens, single-flight acquisition, and the secret-free
//! client-config handoff.

mod acquire;
mod metrics;

pub use metrics::AcquisitionMetrics;

use acquire::Acquisition;

// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, GrantType, TokenPhase, TokenState},
	config::BrokerConfig,
	handoff::ClientConfig,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{BasicFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind},
};

/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Converts the long-lived client credential into short-lived access tokens.
///
/// The broker owns its [`TokenState`]; nothing is shared through module-level state and
/// nothing is persisted, so dropping the broker discards every cached token. Cloning a broker
/// is cheap and yields a handle onto the same state.
///
/// [`Broker::access_token`] returns the cached token while `now < expires_at - refresh_buffer`.
/// Otherwise the first caller starts an acquisition and every caller arriving before it
/// finishes awaits that same acquisition, so at most one grant request is in flight per broker.
/// The acquisition tries the refresh grant when a refresh token is cached and falls back to the
/// client-credentials grant; a failure is returned to every attached caller and never cached.
///
/// The acquisition is driven by whichever attached callers are polling it. If all of them are
/// dropped mid-flight (for example by their own timeouts), the acquisition pauses and the next
/// caller resumes it; until then [`Broker::phase`] keeps reporting the in-flight grant.
pub struct Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: Arc<BrokerConfig>,
	facade: Arc<BasicFacade<C, M>>,
	state: Arc<Mutex<TokenState>>,
	metrics: Arc<AcquisitionMetrics>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_endpoint = config.token_endpoint()?;
		let facade = BasicFacade::new(&token_endpoint, &config.credential, http_client, mapper)?;

		Ok(Self {
			config: Arc::new(config),
			facade: Arc::new(facade),
			state: Default::default(),
			metrics: Default::default(),
		})
	}

	/// Configuration the broker was built from.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Counters describing acquisition activity.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.metrics
	}

	/// Returns a usable access token, acquiring one when the cache is empty or stale.
	pub async fn access_token(&self) -> Result<AccessToken> {
		let pending = {
			let mut state = self.state.lock();

			if let Some(token) =
				state.fresh_token_at(OffsetDateTime::now_utc(), self.config.refresh_buffer)
			{
				return Ok(token);
			}

			match state.pending() {
				Some(pending) => {
					self.metrics.record_join();

					pending
				},
				None => {
					let grant = if state.has_refresh_token() {
						GrantType::RefreshToken
					} else {
						GrantType::ClientCredentials
					};
					let pending = Acquisition::new(self).run().boxed().shared();

					obs::debug_event(FlowKind::Acquire, "starting token acquisition");
					self.metrics.record_acquisition();
					state.begin(pending.clone(), grant);

					pending
				},
			}
		};

		pending.await
	}

	/// Secret-free view of the cached token for less-trusted contexts; never acquires.
	pub fn client_config(&self) -> ClientConfig {
		let token = self
			.state
			.lock()
			.cached()
			.map(|cached| cached.access_token.expose().to_owned())
			.unwrap_or_default();

		ClientConfig::new(token, &self.config.api_url)
	}

	/// Current lifecycle phase of the token state.
	pub fn phase(&self) -> TokenPhase {
		self.state.lock().phase_at(OffsetDateTime::now_utc(), self.config.refresh_buffer)
	}

	/// Returns `true` while a refresh token is cached.
	pub fn has_refresh_token(&self) -> bool {
		self.state.lock().has_refresh_token()
	}

	/// Drops the cached access token so the next call re-acquires; a cached refresh token is
	/// kept for that acquisition.
	pub fn invalidate(&self) {
		self.state.lock().invalidate();
	}
}
impl ReqwestBroker {
	/// Creates a broker backed by a reqwest client bounded by the configured HTTP timeout.
	pub fn new(config: BrokerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.http_timeout_std())?;

		Self::with_http_client(config, http_client, ReqwestTransportErrorMapper)
	}

	/// Creates a broker from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::new(BrokerConfig::from_env()?)
	}
}
impl<C, M> Clone for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			facade: self.facade.clone(),
			state: self.state.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("state", &*self.state.lock())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;

	#[tokio::test]
	async fn pending_acquisition_does_not_keep_state_alive() {
		let server = MockServer::start_async().await;
		let _token_mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth/token");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"AT1\",\"token_type\":\"bearer\",\"expires_in\":3600}")
					.delay(StdDuration::from_secs(5));
			})
			.await;
		let config = BrokerConfig::builder()
			.client_id("c1")
			.client_secret("s1")
			.host_url(format!("http://{}", server.address()))
			.build()
			.expect("Broker config should build.");
		let broker = ReqwestBroker::new(config).expect("Broker should build.");
		let cancelled =
			tokio::time::timeout(StdDuration::from_millis(50), broker.access_token()).await;

		assert!(cancelled.is_err());
		assert!(broker.state.lock().pending().is_some());

		let state = Arc::downgrade(&broker.state);

		drop(broker);

		assert!(state.upgrade().is_none());
	}
}
