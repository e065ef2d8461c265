use crate::config::Config;
use crate::enricher::Enricher;
use crate::geo::{Backend, CachedLookup, Lookup};
use crate::uri_tools::compose_uri;

use hyper::client::HttpConnector;
use hyper::header::{self, HeaderMap};
use hyper::service::Service;
use hyper::{Body, Client, Method, Request, Response, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;

/// Connection-scoped headers that must not be forwarded
static HOP_BY_HOP_HEADERS: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] hyper::Error),
    #[error("Requested URI {0:?} is invalid")]
    InvalidUri(Uri),
    #[error(r#"Internal server error: "{0:?}""#)]
    InternalServerError(#[from] hyper::http::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUri(_) => StatusCode::BAD_REQUEST,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum InvalidConfigError {
    #[error("upstream {0} must be an absolute URI with scheme and host")]
    UpstreamNotAbsolute(Uri),
    #[error("upstream {0} must not have a query")]
    UpstreamWithQuery(Uri),
}

/// Wraps a request handler, adding geolocation headers before the request reaches it.
///
/// One middleware is created per connection, `remote_addr` is the transport address of that
/// connection.
pub struct GeoIpMiddleware<S, L = CachedLookup<Backend>> {
    inner: S,
    enricher: Arc<Enricher<L>>,
    remote_addr: String,
}

impl<S, L> GeoIpMiddleware<S, L> {
    pub fn new(inner: S, enricher: Arc<Enricher<L>>, remote_addr: SocketAddr) -> Self {
        Self {
            inner,
            enricher,
            remote_addr: remote_addr.to_string(),
        }
    }
}

impl<S, L, B> Service<Request<B>> for GeoIpMiddleware<S, L>
where
    S: Service<Request<B>>,
    L: Lookup,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let outcome = self
            .enricher
            .process(request.headers_mut(), &self.remote_addr);
        log::trace!("{} {:?}", self.remote_addr, outcome);
        self.inner.call(request)
    }
}

/// Forwards requests to the upstream service
#[derive(Clone)]
pub struct ProxyService {
    client: Client<HttpsConnector<HttpConnector>>,
    upstream: Uri,
}

impl ProxyService {
    pub fn new(upstream: Uri) -> Result<Self, InvalidConfigError> {
        if upstream.scheme().is_none() || upstream.authority().is_none() {
            return Err(InvalidConfigError::UpstreamNotAbsolute(upstream));
        }
        if upstream.query().is_some() {
            return Err(InvalidConfigError::UpstreamWithQuery(upstream));
        }
        let https = HttpsConnector::new();
        let client = Client::builder().build::<_, Body>(https);
        Ok(Self { client, upstream })
    }

    pub fn upstream(&self) -> &Uri {
        &self.upstream
    }

    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>, ServiceError> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .cloned()
            .ok_or_else(|| ServiceError::InvalidUri(request.uri().clone()))?;
        *request.uri_mut() = compose_uri(&self.upstream, &path_and_query)?;

        let headers = request.headers_mut();
        remove_hop_by_hop_headers(headers);
        // the client sets it from the upstream URI
        headers.remove(header::HOST);

        let mut response = self.client.request(request).await?;
        remove_hop_by_hop_headers(response.headers_mut());
        Ok(response)
    }
}

fn remove_hop_by_hop_headers(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Everything the server needs, built once from the configuration
pub struct GeoHeadersService {
    enricher: Arc<Enricher>,
    proxy: ProxyService,
}

impl GeoHeadersService {
    pub fn from_config(config: Config) -> Result<Self, InvalidConfigError> {
        let Config {
            upstream,
            geoip: geoip_config,
            ..
        } = config;

        let proxy = ProxyService::new(upstream)?;
        let enricher = Arc::new(Enricher::from_config(&geoip_config));

        Ok(Self { enricher, proxy })
    }

    pub fn proxy(&self) -> &ProxyService {
        &self.proxy
    }

    pub fn middleware<S>(&self, inner: S, remote_addr: SocketAddr) -> GeoIpMiddleware<S> {
        GeoIpMiddleware::new(inner, Arc::clone(&self.enricher), remote_addr)
    }
}

pub fn make_error_response(error: ServiceError) -> Response<Body> {
    let mut response = Response::new(Body::from(error.to_string()));
    *response.status_mut() = error.status();
    response
}

pub fn log_response(remote_addr: SocketAddr, method: &Method, uri: &Uri, response: &Response<Body>) {
    log::info!("{} {} {} {}", remote_addr, method, uri, response.status());
}
