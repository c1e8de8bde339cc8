//! Shared fixtures for integration tests that run the broker against an `httpmock` host.

#![allow(dead_code)]

// crates.io
use httpmock::prelude::*;
// self
use plugin_broker::{
	config::BrokerConfig,
	flows::ReqwestBroker,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	relay::Relay,
};

pub const CLIENT_ID: &str = "c1";
pub const CLIENT_SECRET: &str = "s1";
pub const TOKEN_PATH: &str = "/oauth/token";

pub type ReqwestRelay = Relay<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Token endpoint body with an optional refresh token.
pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	match refresh {
		Some(refresh) => format!(
			"{{\"access_token\":\"{access}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in},\"refresh_token\":\"{refresh}\"}}"
		),
		None => format!(
			"{{\"access_token\":\"{access}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in}}}"
		),
	}
}

/// Plain-HTTP base URL of the mock host.
pub fn host_url(server: &MockServer) -> String {
	format!("http://{}", server.address())
}

pub fn config(server: &MockServer) -> BrokerConfig {
	BrokerConfig::builder()
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.host_url(host_url(server))
		.build()
		.expect("Broker config fixture should build successfully.")
}

pub fn broker(server: &MockServer) -> ReqwestBroker {
	ReqwestBroker::new(config(server)).expect("Broker fixture should build successfully.")
}

pub fn relay(server: &MockServer) -> ReqwestRelay {
	Relay::new(broker(server)).expect("Relay fixture should build successfully.")
}
