//! Typed host API operations layered on [`Relay::fetch`].
//!
//! Each operation applies a fixed method and path template. Any non-2xx status becomes
//! [`RelayError::Status`]; JSON bodies are decoded with field-level error paths; void
//! operations only check the status.

// std
use std::collections::BTreeMap;
// crates.io
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{RelayError, TransportError},
	http::{TokenHttpClient, body_preview, parse_retry_after},
	oauth::TransportErrorMapper,
	relay::{HOST_API_TARGET, Relay, RelayRequest},
};

const SETTINGS_PATH: &str = "/api/v1/settings";
const FS_READ_PATH: &str = "/api/v1/fs/read";
const FS_WRITE_PATH: &str = "/api/v1/fs/write";
const FS_LIST_PATH: &str = "/api/v1/fs/list";
const PROCESSES_PATH: &str = "/api/v1/processes";
const CONTAINERS_PATH: &str = "/api/v1/containers";
const NETWORK_PROXY_PATH: &str = "/api/v1/network/proxy";
const EXTENSIONS_PATH: &str = "/api/v1/extensions";

/// File contents returned by the host filesystem API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
	/// Path that was read.
	pub path: String,
	/// File contents.
	pub content: String,
	/// Encoding of `content` (for example `utf-8` or `base64`), when reported.
	#[serde(default)]
	pub encoding: Option<String>,
}

/// Directory entry returned by the host filesystem API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
	/// Entry name.
	pub name: String,
	/// Full path of the entry.
	pub path: String,
	/// Whether the entry is a directory.
	#[serde(default)]
	pub is_dir: bool,
	/// Size in bytes, when reported.
	#[serde(default)]
	pub size: Option<u64>,
}

/// Process visible to the plugin's sandbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
	/// Process identifier.
	pub pid: u32,
	/// Executable name.
	pub name: String,
	/// Full command line, when reported.
	#[serde(default)]
	pub command: Option<String>,
	/// Host-reported state.
	#[serde(default)]
	pub status: Option<String>,
}

/// Container managed by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
	/// Container identifier.
	pub id: String,
	/// Container name.
	pub name: String,
	/// Image the container runs.
	pub image: String,
	/// Host-reported state.
	#[serde(default)]
	pub status: Option<String>,
}

/// Outbound request the host performs on the plugin's behalf through its network proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
	/// Target URL.
	pub url: String,
	/// HTTP method.
	pub method: String,
	/// Request headers.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, String>,
	/// Request body.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<String>,
}
impl ProxyRequest {
	/// Creates a body-less request.
	pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
		Self { url: url.into(), method: method.into(), headers: BTreeMap::new(), body: None }
	}

	/// JSON payload posted to the host's network proxy.
	pub fn to_json(&self) -> Value {
		let mut payload = serde_json::json!({ "url": self.url, "method": self.method });

		if !self.headers.is_empty() {
			payload["headers"] = serde_json::json!(self.headers);
		}
		if let Some(body) = &self.body {
			payload["body"] = Value::String(body.clone());
		}

		payload
	}
}

/// Response relayed back from the host's network proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
	/// Upstream status code.
	pub status: u16,
	/// Upstream response headers.
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
	/// Upstream response body.
	#[serde(default)]
	pub body: String,
}

impl<C, M> Relay<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// `GET /api/v1/settings`.
	pub async fn get_settings(&self) -> Result<Value> {
		self.call_json(SETTINGS_PATH, RelayRequest::get()).await
	}

	/// `PUT /api/v1/settings`.
	pub async fn save_settings(&self, settings: &Value) -> Result<()> {
		self.call_void(SETTINGS_PATH, RelayRequest::put().json(settings)).await
	}

	/// `GET /api/v1/fs/read?path=…`.
	pub async fn read_file(&self, path: &str) -> Result<FileContent> {
		self.call_json(&with_path_query(FS_READ_PATH, path), RelayRequest::get()).await
	}

	/// `POST /api/v1/fs/write` with `{path, content}`.
	pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
		let body = serde_json::json!({ "path": path, "content": content });

		self.call_void(FS_WRITE_PATH, RelayRequest::post().json(&body)).await
	}

	/// `GET /api/v1/fs/list?path=…`.
	pub async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
		self.call_json(&with_path_query(FS_LIST_PATH, path), RelayRequest::get()).await
	}

	/// `GET /api/v1/processes`.
	pub async fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
		self.call_json(PROCESSES_PATH, RelayRequest::get()).await
	}

	/// `GET /api/v1/containers`.
	pub async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
		self.call_json(CONTAINERS_PATH, RelayRequest::get()).await
	}

	/// `POST /api/v1/network/proxy`.
	pub async fn proxy_request(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
		self.call_json(NETWORK_PROXY_PATH, RelayRequest::post().json(&request.to_json())).await
	}

	/// `POST /api/v1/extensions/{extension_id}/{operation}` with `{"input": input}`; both path
	/// segments are percent-encoded.
	pub async fn invoke_extension(
		&self,
		extension_id: &str,
		operation: &str,
		input: Value,
	) -> Result<Value> {
		let path = extension_path(extension_id, operation);
		let body = serde_json::json!({ "input": input });

		self.call_json(&path, RelayRequest::post().json(&body)).await
	}

	async fn call_json<T>(&self, path: &str, request: RelayRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.call_checked(path, request).await?;
		let bytes = response
			.bytes()
			.await
			.map_err(|err| TransportError::from_reqwest(HOST_API_TARGET, err))?;

		decode_json(path, &bytes)
	}

	async fn call_void(&self, path: &str, request: RelayRequest) -> Result<()> {
		self.call_checked(path, request).await.map(|_| ())
	}

	async fn call_checked(&self, path: &str, request: RelayRequest) -> Result<Response> {
		let method = request.method().to_string();
		let response = self.fetch(path, request).await?;
		let status = response.status();

		if status.is_success() {
			return Ok(response);
		}

		let retry_after = parse_retry_after(response.headers());
		let body = response
			.bytes()
			.await
			.ok()
			.filter(|bytes| !bytes.is_empty())
			.map(|bytes| body_preview(&bytes));

		Err(RelayError::Status {
			method,
			path: path.to_owned(),
			status: status.as_u16(),
			body,
			retry_after,
		}
		.into())
	}
}

fn with_path_query(base: &str, path: &str) -> String {
	format!("{base}?path={}", urlencoding::encode(path))
}

fn extension_path(extension_id: &str, operation: &str) -> String {
	format!(
		"{EXTENSIONS_PATH}/{}/{}",
		urlencoding::encode(extension_id),
		urlencoding::encode(operation)
	)
}

fn decode_json<T>(path: &str, bytes: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
		let field = err.path().to_string();

		RelayError::Decode { path: path.to_owned(), field, source: Arc::new(err.into_inner()) }
			.into()
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn extension_segments_are_escaped() {
		assert_eq!(
			extension_path("acme/tools", "run job"),
			"/api/v1/extensions/acme%2Ftools/run%20job"
		);
		assert_eq!(
			with_path_query(FS_READ_PATH, "/tmp/a b&c"),
			"/api/v1/fs/read?path=%2Ftmp%2Fa%20b%26c"
		);
	}

	#[test]
	fn decode_errors_name_the_failing_field() {
		let err = decode_json::<Vec<ProcessInfo>>(
			PROCESSES_PATH,
			br#"[{"pid":1,"name":"init"},{"pid":"two","name":"sh"}]"#,
		)
		.expect_err("A string pid should fail to decode.");

		match err {
			Error::Relay(RelayError::Decode { path, field, .. }) => {
				assert_eq!(path, PROCESSES_PATH);
				assert_eq!(field, "[1].pid");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn proxy_payload_omits_empty_fields() {
		let bare = ProxyRequest::new("GET", "https://example.com/feed");

		assert_eq!(
			bare.to_json(),
			serde_json::json!({ "url": "https://example.com/feed", "method": "GET" })
		);

		let mut full = ProxyRequest::new("POST", "https://example.com/hook");

		full.headers.insert("x-token".into(), "abc".into());
		full.body = Some("{}".into());

		assert_eq!(
			full.to_json(),
			serde_json::json!({
				"url": "https://example.com/hook",
				"method": "POST",
				"headers": { "x-token": "abc" },
				"body": "{}",
			})
		);
		assert_eq!(
			serde_json::to_value(&full).expect("Proxy request should serialize."),
			full.to_json()
		);
	}

	#[test]
	fn dir_entries_use_camel_case() {
		let entries: Vec<DirEntry> =
			decode_json(FS_LIST_PATH, br#"[{"name":"a","path":"/a","isDir":true}]"#)
				.expect("Directory listing should decode.");

		assert!(entries[0].is_dir);
		assert_eq!(entries[0].size, None);
	}
}
