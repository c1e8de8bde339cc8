//! Authenticated relay: resolves paths against the API base URL, injects the broker-issued
//! bearer credential, and performs the call.
//!
//! The relay owns the `Authorization` header. Any caller-supplied value (in any letter case) is
//! replaced; every other header passes through untouched. No retries happen here: a failed call
//! surfaces to its caller immediately.

pub mod api;

pub use api::*;

// crates.io
use reqwest::{
	Method, Response,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	flows::Broker,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Label used in transport errors raised by relayed calls.
pub const HOST_API_TARGET: &str = "the host API";

/// Method, headers, and body of a relayed call.
#[derive(Clone, Debug)]
pub struct RelayRequest {
	method: Method,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
}
impl RelayRequest {
	/// Creates a request with the provided method and no headers or body.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: None }
	}

	/// `GET` request.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// `POST` request.
	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	/// `PUT` request.
	pub fn put() -> Self {
		Self::new(Method::PUT)
	}

	/// `DELETE` request.
	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Merges a header map, replacing existing values per name.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		for (name, value) in headers {
			if let Some(name) = name {
				self.headers.insert(name, value);
			}
		}

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Sets a JSON body and its content type.
	pub fn json(mut self, value: &serde_json::Value) -> Self {
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(value.to_string().into_bytes());

		self
	}

	/// HTTP method of the request.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Headers the caller supplied.
	pub fn header_map(&self) -> &HeaderMap {
		&self.headers
	}
}

/// Relays host API calls with the broker-issued bearer credential.
pub struct Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker: Broker<C, M>,
	http_client: ReqwestHttpClient,
}
impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a relay whose calls share the broker's configured HTTP timeout.
	pub fn new(broker: Broker<C, M>) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(broker.config().http_timeout_std())?;

		Ok(Self::with_http_client(broker, http_client))
	}

	/// Creates a relay that reuses the provided reqwest client.
	pub fn with_http_client(broker: Broker<C, M>, http_client: ReqwestHttpClient) -> Self {
		Self { broker, http_client }
	}

	/// Broker supplying the bearer credential.
	pub fn broker(&self) -> &Broker<C, M> {
		&self.broker
	}

	/// Resolves `path`: absolute `http(s)` URLs pass through, anything else is appended to the
	/// API base URL.
	pub fn resolve(&self, path: &str) -> String {
		resolve_against(&self.broker.config().api_url, path)
	}

	/// Performs an authenticated call and returns the raw response.
	pub async fn fetch(&self, path: &str, request: RelayRequest) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Relay;

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let url = self.resolve(path);
				let token = self.broker.access_token().await?;
				let RelayRequest { method, mut headers, body } = request;
				let mut bearer =
					HeaderValue::from_str(&token.bearer()).map_err(ConfigError::http_request)?;

				bearer.set_sensitive(true);
				headers.insert(AUTHORIZATION, bearer);

				let mut builder = self.http_client.request(method, url).headers(headers);

				if let Some(body) = body {
					builder = builder.body(body);
				}

				builder.send().await.map_err(map_send_error)
			})
			.await;

		if let Err(err) = &result {
			obs::warn_event(KIND, "relayed call failed", err);
		}

		obs::record_flow_result(KIND, &result);

		result
	}
}
impl<C, M> Debug for Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Relay").field("broker", &self.broker).finish()
	}
}

fn resolve_against(base: &Url, path: &str) -> String {
	if Url::parse(path).is_ok_and(|url| matches!(url.scheme(), "http" | "https")) {
		return path.to_owned();
	}

	let base = base.as_str().trim_end_matches('/');

	match path {
		"" => base.to_owned(),
		path if path.starts_with('/') => format!("{base}{path}"),
		path => format!("{base}/{path}"),
	}
}

fn map_send_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		ConfigError::http_request(err).into()
	} else {
		TransportError::from_reqwest(HOST_API_TARGET, err).into()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base(raw: &str) -> Url {
		Url::parse(raw).expect("Failed to parse base URL.")
	}

	#[test]
	fn resolves_relative_and_absolute_paths() {
		let api = base("http://127.0.0.1:9000/");

		assert_eq!(
			resolve_against(&api, "/api/v1/settings"),
			"http://127.0.0.1:9000/api/v1/settings"
		);
		assert_eq!(resolve_against(&api, "api/v1/settings"), "http://127.0.0.1:9000/api/v1/settings");
		assert_eq!(resolve_against(&api, ""), "http://127.0.0.1:9000");
		assert_eq!(
			resolve_against(&api, "https://elsewhere.example/v2/items"),
			"https://elsewhere.example/v2/items"
		);
		assert_eq!(
			resolve_against(&base("http://host.internal/prefix/"), "/items"),
			"http://host.internal/prefix/items"
		);
	}

	#[test]
	fn request_builder_merges_headers() {
		let mut extra = HeaderMap::new();

		extra.insert(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));

		let request = RelayRequest::post()
			.header(HeaderName::from_static("x-plugin"), HeaderValue::from_static("demo"))
			.headers(extra)
			.json(&serde_json::json!({ "a": 1 }));

		assert_eq!(request.method(), &Method::POST);
		assert_eq!(request.header_map()["x-plugin"], "demo");
		assert_eq!(request.header_map()["x-trace"], "abc");
		assert_eq!(request.header_map()[CONTENT_TYPE], "application/json");
	}
}
