//! Demonstrates a plugin backend that trades its client secret for a bearer token, relays a
//! host API call with it, and builds the secret-free view for its browser-side code.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use plugin_broker::{config::BrokerConfig, flows::ReqwestBroker, relay::Relay};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("grant_type=client_credentials");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let settings_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/settings").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"theme\":\"dark\",\"notifications\":true}");
		})
		.await;
	let config = BrokerConfig::builder()
		.client_id("demo-plugin")
		.client_secret("super-secret")
		.host_url(format!("http://{}", server.address()))
		.build()?;
	let broker = ReqwestBroker::new(config)?;
	let relay = Relay::new(broker.clone())?;

	println!("Client config before any call: {}", broker.client_config().to_json());

	let settings = relay.get_settings().await?;

	println!("Host settings: {settings}");
	// Cached token; no second grant request.
	relay.get_settings().await?;

	println!("Client config handed to the browser: {}", broker.client_config().to_json());
	println!(
		"Acquisitions: {}, token phase: {:?}",
		broker.metrics().acquisitions(),
		broker.phase()
	);

	token_mock.assert_calls_async(1).await;
	settings_mock.assert_calls_async(2).await;

	Ok(())
}
