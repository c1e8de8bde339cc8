//! Broker-owned token state and its single-flight acquisition slot.
//!
//! [`TokenState`] is created empty, mutated only by the acquisition routine, and dropped with
//! the broker; nothing here is persisted. The cached access token and its expiry live in one
//! [`CachedToken`] so a token without an expiry cannot exist, and the in-flight acquisition is
//! an [`InFlight`] handle that is either present or absent.

// crates.io
use futures::future::{BoxFuture, Shared};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, GrantType, IssuedToken, RefreshToken},
	error::AuthGrantError,
};

/// Shared handle every concurrent caller awaits while an acquisition runs.
pub(crate) type PendingAcquisition = Shared<BoxFuture<'static, Result<AccessToken>>>;

/// Observable lifecycle phase of the broker's token state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenPhase {
	/// No access token has been acquired (or it was invalidated).
	NoToken,
	/// A cached access token is usable outside the refresh buffer.
	Valid,
	/// A cached access token exists but sits inside the refresh buffer or past expiry.
	Stale,
	/// A refresh-token grant is in flight.
	Refreshing,
	/// A client-credentials grant is in flight (first acquisition or refresh fallback).
	ClientCredentialsFallback,
}

/// Access token paired with the instant it stops being trusted.
#[derive(Clone, Debug)]
pub struct CachedToken {
	/// Bearer credential.
	pub access_token: AccessToken,
	/// `acquired_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Returns `true` iff `now < expires_at - buffer`; a deadline outside the representable
	/// range counts as not fresh.
	pub fn is_fresh_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at.checked_sub(buffer).is_some_and(|deadline| now < deadline)
	}
}

pub(crate) struct InFlight {
	pub(crate) handle: PendingAcquisition,
	pub(crate) grant: GrantType,
}

/// Mutable token state owned by a single broker.
#[derive(Default)]
pub struct TokenState {
	cached: Option<CachedToken>,
	refresh_token: Option<RefreshToken>,
	in_flight: Option<InFlight>,
}
impl TokenState {
	/// Currently cached access token, regardless of freshness.
	pub fn cached(&self) -> Option<&CachedToken> {
		self.cached.as_ref()
	}

	/// Returns `true` when a refresh token is available for the next acquisition.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Returns `true` while an acquisition is in flight.
	pub fn is_acquiring(&self) -> bool {
		self.in_flight.is_some()
	}

	/// Returns the cached access token when it is usable at `now`.
	pub fn fresh_token_at(&self, now: OffsetDateTime, buffer: Duration) -> Option<AccessToken> {
		self.cached
			.as_ref()
			.filter(|cached| cached.is_fresh_at(now, buffer))
			.map(|cached| cached.access_token.clone())
	}

	/// Reports the lifecycle phase at `now`.
	pub fn phase_at(&self, now: OffsetDateTime, buffer: Duration) -> TokenPhase {
		if let Some(in_flight) = &self.in_flight {
			return match in_flight.grant {
				GrantType::RefreshToken => TokenPhase::Refreshing,
				GrantType::ClientCredentials => TokenPhase::ClientCredentialsFallback,
			};
		}

		match &self.cached {
			None => TokenPhase::NoToken,
			Some(cached) if cached.is_fresh_at(now, buffer) => TokenPhase::Valid,
			Some(_) => TokenPhase::Stale,
		}
	}

	/// Adopts a freshly issued token; the refresh token rotates only when a new one was issued.
	///
	/// A lifetime whose expiry instant is not representable is rejected and leaves the state
	/// untouched.
	pub fn adopt(
		&mut self,
		issued: IssuedToken,
		acquired_at: OffsetDateTime,
	) -> Result<AccessToken, AuthGrantError> {
		let expires_at = acquired_at
			.checked_add(issued.expires_in)
			.ok_or(AuthGrantError::InvalidExpiresIn { grant: issued.grant })?;
		let access_token = issued.access_token;

		self.cached = Some(CachedToken { access_token: access_token.clone(), expires_at });

		if let Some(refresh) = issued.refresh_token {
			self.refresh_token = Some(refresh);
		}

		Ok(access_token)
	}

	/// Drops the cached access token, keeping any refresh token.
	pub fn invalidate(&mut self) {
		self.cached = None;
	}

	pub(crate) fn refresh_token(&self) -> Option<RefreshToken> {
		self.refresh_token.clone()
	}

	pub(crate) fn discard_refresh_token(&mut self) {
		self.refresh_token = None;
	}

	pub(crate) fn pending(&self) -> Option<PendingAcquisition> {
		self.in_flight.as_ref().map(|in_flight| in_flight.handle.clone())
	}

	pub(crate) fn begin(&mut self, handle: PendingAcquisition, grant: GrantType) {
		self.in_flight = Some(InFlight { handle, grant });
	}

	pub(crate) fn set_in_flight_grant(&mut self, grant: GrantType) {
		if let Some(in_flight) = self.in_flight.as_mut() {
			in_flight.grant = grant;
		}
	}

	pub(crate) fn finish(&mut self) {
		self.in_flight = None;
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("cached", &self.cached)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("acquiring", &self.in_flight.is_some())
			.finish()
	}
}
