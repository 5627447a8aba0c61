//! Issuer handle: provider metadata (data) plus credentials and transport (behavior).
//!
//! `metadata` exposes [`IssuerMetadata`], the endpoints and delivery modes a provider
//! publishes. `credentials` defines [`ClientAuth`], the strategy that authenticates every
//! outbound call. [`Issuer`] ties both to an HTTP transport and is reused across sessions.

pub mod credentials;
pub mod metadata;

pub use credentials::*;
pub use metadata::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::{Method, Request},
};
// self
use crate::{
	_prelude::*,
	ciba::PollMetrics,
	http::BackchannelHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	oauth::TransportErrorMapper,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Issuer specialized for the crate's default reqwest transport stack.
pub type ReqwestIssuer = Issuer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Handle to one identity provider, shared by every session started against it.
///
/// The handle owns the metadata and shares the credential strategy, transport and error
/// mapper through `Arc`, so independent sessions can run concurrently against the same
/// issuer without additional locking.
pub struct Issuer<C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Provider metadata (issuer string and endpoints).
	pub metadata: IssuerMetadata,
	/// Credential strategy applied to every request.
	pub credentials: Arc<ClientAuth>,
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Counters shared by every session polling this issuer.
	pub poll_metrics: Arc<PollMetrics>,
}
impl<C, M> Issuer<C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an issuer that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		metadata: IssuerMetadata,
		credentials: impl Into<Arc<ClientAuth>>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			metadata,
			credentials: credentials.into(),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			poll_metrics: Default::default(),
		}
	}

	/// Discovers metadata for `issuer` over the given transport, then builds the handle.
	pub async fn discover_with_http_client(
		issuer: &str,
		credentials: impl Into<Arc<ClientAuth>>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		const KIND: FlowKind = FlowKind::Discovery;

		let http_client = http_client.into();
		let mapper = mapper.into();
		let span = FlowSpan::new(KIND, "discover");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(IssuerMetadata::discover(issuer, http_client.as_ref(), mapper.as_ref()))
			.await;

		obs::record_result(KIND, &result);

		Ok(Self::with_http_client(result?, credentials, http_client, mapper))
	}

	/// Issuer identity string.
	pub fn issuer(&self) -> &str {
		&self.metadata.issuer
	}

	/// Sends `form` to the `kind` endpoint through the credential strategy.
	pub(crate) async fn post_form(
		&self,
		kind: EndpointKind,
		url: &Url,
		form: BTreeMap<String, String>,
	) -> Result<HttpResponse> {
		let builder = Request::builder().method(Method::POST).uri(url.as_str());
		let request = self.credentials.attach(builder, form)?;
		let handle = self.http_client.handle();

		handle.call(request).await.map_err(|e| self.transport_mapper.map_transport_error(kind, e))
	}
}
#[cfg(feature = "reqwest")]
impl Issuer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an issuer backed by a reqwest client tailored to `credentials`.
	///
	/// Mutual-TLS strategies get their identity installed on the client here, so callers
	/// never build TLS configuration by hand.
	pub fn new(metadata: IssuerMetadata, credentials: ClientAuth) -> Result<Self> {
		let http_client = ReqwestHttpClient::for_credentials(&credentials)?;

		Ok(Self::with_http_client(
			metadata,
			credentials,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}

	/// Discovers `issuer` over a reqwest client tailored to `credentials`.
	pub async fn discover(issuer: &str, credentials: ClientAuth) -> Result<Self> {
		let http_client = ReqwestHttpClient::for_credentials(&credentials)?;

		Self::discover_with_http_client(
			issuer,
			credentials,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		)
		.await
	}
}
impl<C, M> Clone for Issuer<C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			metadata: self.metadata.clone(),
			credentials: self.credentials.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			poll_metrics: self.poll_metrics.clone(),
		}
	}
}
impl<C, M> Debug for Issuer<C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Issuer")
			.field("metadata", &self.metadata)
			.field("client_auth_method", &self.credentials.method())
			.finish()
	}
}
