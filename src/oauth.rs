//! OAuth client facade performing the two grants the broker needs.
//!
//! Both grants post a form-encoded body to `{host_url}/oauth/token` with request-body client
//! authentication. The client-credentials grant sends `client_id` + `client_secret`; the refresh
//! grant is issued through a secret-less client so it sends only `client_id` + `refresh_token`.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken as OAuthRefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientCredential, GrantType, IssuedToken, RefreshToken},
	error::{AuthGrantError, ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, body_preview},
};

/// Label used in transport errors raised by grant requests.
pub const TOKEN_ENDPOINT_TARGET: &str = "the token endpoint";

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) =>
				if inner.is_builder() {
					ConfigError::http_request(*inner).into()
				} else {
					TransportError::from_reqwest(TOKEN_ENDPOINT_TARGET, *inner).into()
				},
			HttpClientError::Http(inner) => ConfigError::http_request(inner).into(),
			HttpClientError::Io(inner) => TransportError::network(TOKEN_ENDPOINT_TARGET, inner).into(),
			HttpClientError::Other(message) => map_unexpected_response(grant, meta, message, None),
			_ => map_unexpected_response(grant, meta, "unknown HTTP client failure".into(), None),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_client_credentials(&self) -> FacadeFuture<'_, IssuedToken>;

	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a RefreshToken,
	) -> FacadeFuture<'a, IssuedToken>;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	confidential: ConfiguredBasicClient,
	public: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_endpoint: &Url,
		credential: &ClientCredential,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let public = BasicClient::new(ClientId::new(credential.client_id().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);
		let confidential = public
			.clone()
			.set_client_secret(ClientSecret::new(credential.client_secret().expose().to_owned()));

		Ok(Self {
			confidential,
			public,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials(&self) -> FacadeFuture<'_, IssuedToken> {
		const GRANT: GrantType = GrantType::ClientCredentials;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.confidential
				.exchange_client_credentials()
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(GRANT, meta.take(), err, self.error_mapper.as_ref()))?;

			map_token_response(GRANT, response)
		})
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a RefreshToken,
	) -> FacadeFuture<'a, IssuedToken> {
		const GRANT: GrantType = GrantType::RefreshToken;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = OAuthRefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.public
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(GRANT, meta.take(), err, self.error_mapper.as_ref()))?;

			map_token_response(GRANT, response)
		})
	}
}

fn map_token_response(grant: GrantType, response: BasicTokenResponse) -> Result<IssuedToken> {
	let expires_in =
		response.expires_in().ok_or(AuthGrantError::MissingExpiresIn { grant })?.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| AuthGrantError::InvalidExpiresIn { grant })?;

	if expires_in <= 0 {
		return Err(AuthGrantError::InvalidExpiresIn { grant }.into());
	}

	Ok(IssuedToken {
		grant,
		access_token: AccessToken::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| RefreshToken::new(token.secret().to_owned())),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		RequestTokenError::Parse(error, body) =>
			map_unexpected_response(grant, meta_ref, error.to_string(), Some(body_preview(&body))),
		RequestTokenError::Other(message) => map_unexpected_response(grant, meta_ref, message, None),
	}
}

fn map_server_response_error(
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	AuthGrantError::Rejected {
		grant,
		status: meta_status(meta),
		oauth_error: Some(response.error().as_ref().to_owned()),
		body: meta_body(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

/// Classifies a response the OAuth client could not interpret: non-2xx statuses are rejections,
/// anything else is a malformed success.
fn map_unexpected_response(
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	message: String,
	body: Option<String>,
) -> Error {
	let status = meta_status(meta);
	let body = meta_body(meta).or(body);

	match status {
		Some(code) if !(200..300).contains(&code) =>
			AuthGrantError::Rejected {
				grant,
				status,
				oauth_error: None,
				body,
				retry_after: meta_retry_after(meta),
			}
			.into(),
		_ => AuthGrantError::MalformedResponse { grant, status, message, body }.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_body(meta: Option<&ResponseMetadata>) -> Option<String> {
	meta.and_then(|value| value.body.clone())
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	#[test]
	fn builds_facade_for_token_endpoint() {
		let endpoint =
			Url::parse("https://host.internal/oauth/token").expect("Failed to parse token URL.");
		let result = <BasicFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::new(
			&endpoint,
			&ClientCredential::new("c1", "s1"),
			Arc::new(ReqwestHttpClient::default()),
			Arc::new(ReqwestTransportErrorMapper),
		);

		assert!(result.is_ok());
	}

	#[test]
	fn unexpected_response_classification_uses_status() {
		let rejected = ResponseMetadata {
			status: Some(503),
			retry_after: Some(Duration::seconds(30)),
			body: Some("maintenance".into()),
		};
		let err = map_unexpected_response(
			GrantType::RefreshToken,
			Some(&rejected),
			"expected JSON".into(),
			None,
		);

		assert!(matches!(
			err,
			Error::AuthGrant(AuthGrantError::Rejected {
				status: Some(503),
				ref body,
				retry_after,
				..
			}) if body.as_deref() == Some("maintenance")
				&& retry_after == Some(Duration::seconds(30))
		));

		let ok = ResponseMetadata { status: Some(200), retry_after: None, body: None };
		let err = map_unexpected_response(
			GrantType::ClientCredentials,
			Some(&ok),
			"missing field `access_token`".into(),
			Some("{}".into()),
		);

		assert!(matches!(
			err,
			Error::AuthGrant(AuthGrantError::MalformedResponse { status: Some(200), .. })
		));
	}
}
