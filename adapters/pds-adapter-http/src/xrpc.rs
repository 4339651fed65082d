//! Minimal XRPC client: query/procedure calls with bearer auth, timeouts,
//! and upstream error normalization.

use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::body::{Body, Bytes};
use hyper::http::StatusCode;
use hyper::{Method, header};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use skygate_types::prelude::*;
use skygate_types::trace;

/// Default upstream request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn to_boxed<B>(body: B) -> BoxBody<Bytes, Error>
where
	B: Body<Data = Bytes> + Send + Sync + 'static,
	B::Error: Send + 'static,
{
	body.map_err(|_err| Error::UpstreamUnavailable("body stream error".into())).boxed()
}

/// Error body shape used by XRPC endpoints
#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
	error: Option<String>,
	message: Option<String>,
}

/// Map an upstream failure status to the gateway taxonomy
fn map_status(status: StatusCode, body: &[u8], retry_after: Option<u32>) -> Error {
	let parsed: Option<XrpcErrorBody> = serde_json::from_slice(body).ok();
	let code = parsed.as_ref().and_then(|b| b.error.as_deref()).unwrap_or_default();
	let message = parsed
		.as_ref()
		.and_then(|b| b.message.as_deref())
		.unwrap_or("upstream error")
		.to_string();

	match status {
		StatusCode::UNAUTHORIZED => Error::Unauthorized,
		StatusCode::NOT_FOUND => Error::NotFound,
		StatusCode::TOO_MANY_REQUESTS => {
			Error::RateLimited { retry_after: retry_after.unwrap_or(30) }
		}
		StatusCode::BAD_REQUEST if code.contains("NotFound") => Error::NotFound,
		StatusCode::BAD_REQUEST if code == "ExpiredToken" || code == "InvalidToken" => {
			Error::Unauthorized
		}
		status if status.is_server_error() => Error::UpstreamUnavailable(message),
		_ => Error::Internal(format!("upstream {}: {} {}", status, code, message)),
	}
}

#[derive(Clone, Debug)]
pub struct XrpcClient {
	base: Url,
	client: Client<HttpsConnector<HttpConnector>, BoxBody<Bytes, Error>>,
}

impl XrpcClient {
	pub fn new(base_url: &str) -> SgResult<Self> {
		let base = Url::parse(base_url)
			.map_err(|_| Error::Internal(format!("invalid PDS URL: {}", base_url)))?;

		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|_| Error::Internal("no native root CA certificates found".into()))?
			.https_or_http()
			.enable_http1()
			.build();

		Ok(XrpcClient { base, client: Client::builder(TokioExecutor::new()).build(connector) })
	}

	fn endpoint(&self, nsid: &str, params: &[(&str, &str)]) -> SgResult<Url> {
		let mut url = self
			.base
			.join(&format!("xrpc/{}", nsid))
			.map_err(|_| Error::Internal(format!("invalid XRPC path: {}", nsid)))?;
		if !params.is_empty() {
			let mut pairs = url.query_pairs_mut();
			for (key, value) in params {
				pairs.append_pair(key, value);
			}
		}
		Ok(url)
	}

	fn builder(&self, method: Method, url: &Url, auth: Option<&str>) -> hyper::http::request::Builder {
		let mut builder = hyper::Request::builder().method(method).uri(url.as_str());
		if let Some(token) = auth {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		if let Some(traceparent) = trace::current_traceparent() {
			builder = builder.header("traceparent", traceparent);
		}
		builder
	}

	async fn execute(
		&self,
		req: hyper::Request<BoxBody<Bytes, Error>>,
	) -> SgResult<(StatusCode, Option<u32>, Bytes)> {
		let response = timeout(REQUEST_TIMEOUT, self.client.request(req))
			.await
			.map_err(|_| Error::UpstreamUnavailable("request timeout".into()))?
			.map_err(|err| Error::UpstreamUnavailable(format!("connect: {}", err)))?;

		let status = response.status();
		let retry_after = response
			.headers()
			.get(header::RETRY_AFTER)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse().ok());

		let body = timeout(REQUEST_TIMEOUT, response.into_body().collect())
			.await
			.map_err(|_| Error::UpstreamUnavailable("body timeout".into()))?
			.map_err(|_| Error::UpstreamUnavailable("body collection error".into()))?
			.to_bytes();

		Ok((status, retry_after, body))
	}

	fn decode<Res: DeserializeOwned>(
		(status, retry_after, body): (StatusCode, Option<u32>, Bytes),
	) -> SgResult<Res> {
		if !status.is_success() {
			return Err(map_status(status, &body, retry_after));
		}
		serde_json::from_slice(&body).map_err(|err| {
			warn!("malformed upstream response: {}", err);
			Error::UpstreamUnavailable("malformed upstream response".into())
		})
	}

	/// XRPC query (GET)
	pub async fn query<Res: DeserializeOwned>(
		&self,
		auth: Option<&str>,
		nsid: &str,
		params: &[(&str, &str)],
	) -> SgResult<Res> {
		let url = self.endpoint(nsid, params)?;
		let req = self.builder(Method::GET, &url, auth).body(to_boxed(Empty::new()))?;
		Self::decode(self.execute(req).await?)
	}

	/// XRPC procedure (POST) with a JSON input
	pub async fn procedure<Res: DeserializeOwned>(
		&self,
		auth: Option<&str>,
		nsid: &str,
		input: &impl serde::Serialize,
	) -> SgResult<Res> {
		let url = self.endpoint(nsid, &[])?;
		let body = serde_json::to_vec(input)?;
		let req = self
			.builder(Method::POST, &url, auth)
			.header(header::CONTENT_TYPE, "application/json")
			.body(to_boxed(Full::from(body)))?;
		Self::decode(self.execute(req).await?)
	}

	/// XRPC procedure (POST) with no input body
	pub async fn procedure_empty<Res: DeserializeOwned>(
		&self,
		auth: Option<&str>,
		nsid: &str,
	) -> SgResult<Res> {
		let url = self.endpoint(nsid, &[])?;
		let req = self.builder(Method::POST, &url, auth).body(to_boxed(Empty::new()))?;
		Self::decode(self.execute(req).await?)
	}

	/// XRPC procedure (POST) with a raw byte payload (blob upload)
	pub async fn procedure_bytes<Res: DeserializeOwned>(
		&self,
		auth: Option<&str>,
		nsid: &str,
		bytes: Vec<u8>,
		content_type: &str,
	) -> SgResult<Res> {
		let url = self.endpoint(nsid, &[])?;
		let req = self
			.builder(Method::POST, &url, auth)
			.header(header::CONTENT_TYPE, content_type)
			.body(to_boxed(Full::from(bytes)))?;
		Self::decode(self.execute(req).await?)
	}
}


// vim: ts=4
