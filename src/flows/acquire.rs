//! Dual-grant acquisition routine run inside the single-flight slot.
//!
//! The routine is a two-step chain: a refresh grant while a refresh token is cached, then the
//! client-credentials grant. A failed refresh discards the refresh token for good before the
//! fallback runs. The routine is the only writer of [`TokenState`]: it installs the outcome and
//! clears the in-flight slot in one critical section.
//!
//! The routine holds the token state weakly, so a pending acquisition never keeps a dropped
//! broker's state alive. If the routine unwinds before reaching its final critical section, a
//! guard clears the slot so the next caller can start over.

// std
use std::sync::Weak;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, GrantType, IssuedToken, RefreshToken, TokenState},
	flows::{AcquisitionMetrics, Broker},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

enum Step {
	Refresh(RefreshToken),
	ClientCredentials,
}

/// One acquisition attempt, detached from the broker handle that started it.
pub(super) struct Acquisition<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<BasicFacade<C, M>>,
	state: Weak<Mutex<TokenState>>,
	metrics: Arc<AcquisitionMetrics>,
}
impl<C, M> Acquisition<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(super) fn new(broker: &Broker<C, M>) -> Self {
		Self {
			facade: broker.facade.clone(),
			state: Arc::downgrade(&broker.state),
			metrics: broker.metrics.clone(),
		}
	}

	pub(super) async fn run(self) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::Acquire;

		let mut slot = SlotGuard { state: self.state.clone(), armed: true };
		let span = FlowSpan::new(KIND, "acquire");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut step = match self.cached_refresh_token() {
					Some(token) => Step::Refresh(token),
					None => Step::ClientCredentials,
				};

				loop {
					step = match step {
						Step::Refresh(token) => match self.refresh_grant(&token).await {
							Ok(issued) => break Ok(issued),
							Err(err) => {
								obs::warn_event(
									FlowKind::Refresh,
									"refresh grant failed, falling back to client credentials",
									&err,
								);
								self.metrics.record_fallback();
								self.fall_back_to_client_credentials();

								Step::ClientCredentials
							},
						},
						Step::ClientCredentials => break self.client_credentials_grant().await,
					};
				}
			})
			.await;
		let acquired_at = OffsetDateTime::now_utc();
		let outcome = match self.state.upgrade() {
			Some(shared) => {
				let mut state = shared.lock();
				let outcome = result
					.and_then(|issued| state.adopt(issued, acquired_at).map_err(Error::from));

				state.finish();
				slot.armed = false;

				outcome
			},
			// The broker is gone; nobody can observe the state any more.
			None => result.map(|issued| issued.access_token),
		};

		if let Err(err) = &outcome {
			self.metrics.record_failure();
			obs::warn_event(KIND, "token acquisition failed", err);
		}

		obs::record_flow_result(KIND, &outcome);

		outcome
	}

	fn cached_refresh_token(&self) -> Option<RefreshToken> {
		self.state.upgrade()?.lock().refresh_token()
	}

	async fn refresh_grant(&self, token: &RefreshToken) -> Result<IssuedToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_grant");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_refresh_attempt();

		let result = span.instrument(self.facade.exchange_refresh_token(token)).await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn client_credentials_grant(&self) -> Result<IssuedToken> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "client_credentials_grant");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_client_credentials_attempt();

		let result = span.instrument(self.facade.exchange_client_credentials()).await;

		obs::record_flow_result(KIND, &result);

		result
	}

	fn fall_back_to_client_credentials(&self) {
		if let Some(shared) = self.state.upgrade() {
			let mut state = shared.lock();

			state.discard_refresh_token();
			state.set_in_flight_grant(GrantType::ClientCredentials);
		}
	}
}

/// Clears the in-flight slot when an acquisition unwinds without finishing.
struct SlotGuard {
	state: Weak<Mutex<TokenState>>,
	armed: bool,
}
impl Drop for SlotGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		if let Some(shared) = self.state.upgrade() {
			shared.lock().finish();
		}
	}
}
