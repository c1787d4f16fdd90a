use crate::{ApiRequest, Context, Error, RequestSigner, Result, Session};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION, USER_AGENT};
use http::{HeaderMap, Method, StatusCode, Uri};
use log::debug;
use std::fmt::Debug;
use std::fmt::Write;
use std::sync::Arc;

/// How many 302 hops the transport follows before giving up.
///
/// The platform normally redirects once, to hand a client its cluster
/// host. Anything deeper than this limit is a misconfigured or hostile
/// server, and surfaces as [`ErrorKind::TooManyRedirects`].
///
/// [`ErrorKind::TooManyRedirects`]: crate::ErrorKind::TooManyRedirects
pub const MAX_REDIRECT_HOPS: usize = 5;

const MEDIA_TYPE: &str = "application/vnd.backplane+json";

/// A redirect the transport followed.
#[derive(Debug, Clone)]
pub struct RedirectEvent {
    /// The URL the request was originally sent to.
    pub original_url: String,
    /// The headers of the redirect response.
    pub headers: HeaderMap,
    /// The body of the redirect response.
    pub body: String,
    /// The URL the request was re-issued against.
    pub new_url: String,
}

/// RedirectNotify is called once for every redirect the transport follows.
///
/// Implementations typically cache the new host as the default host for
/// subsequent requests. The notification runs on whatever task drove the
/// request, before the re-issued request is dispatched.
pub trait RedirectNotify: Debug + Send + Sync + 'static {
    /// Called with the details of a followed redirect.
    fn redirected(&self, event: &RedirectEvent);
}

/// NoopRedirectNotify ignores every redirect notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRedirectNotify;

impl RedirectNotify for NoopRedirectNotify {
    fn redirected(&self, _event: &RedirectEvent) {}
}

/// Transport signs and dispatches [`ApiRequest`]s and resolves redirects.
///
/// Every dispatched request carries the versioned media-type headers and
/// an OAuth authorization header derived from the session. A 302 response
/// is re-issued against its `Location` with identical verb and body,
/// re-signed, up to [`MAX_REDIRECT_HOPS`] times; each followed hop
/// notifies the configured [`RedirectNotify`] exactly once.
#[derive(Clone, Debug)]
pub struct Transport {
    ctx: Context,
    session: Arc<Session>,
    signer: RequestSigner,
    notify: Arc<dyn RedirectNotify>,
}

impl Transport {
    /// Create a new transport over the given context and session.
    pub fn new(ctx: Context, session: Arc<Session>) -> Self {
        Self {
            ctx,
            signer: RequestSigner::new(session.clone()),
            session,
            notify: Arc::new(NoopRedirectNotify),
        }
    }

    /// Replace the redirect observer.
    pub fn with_redirect_notify(mut self, notify: impl RedirectNotify) -> Self {
        self.notify = Arc::new(notify);
        self
    }

    /// Dispatch the request against the given host and return the response
    /// body.
    ///
    /// Blocks (asynchronously) until the final response arrives. Returns
    /// the raw body string on a 2xx response; any other non-redirect
    /// status fails with [`ErrorKind::RequestFailed`].
    ///
    /// [`ErrorKind::RequestFailed`]: crate::ErrorKind::RequestFailed
    pub async fn execute(&self, req: &ApiRequest, host: &str) -> Result<String> {
        let mut uri = req.uri(&self.session, host)?;
        let payload = req.payload()?;

        for hop in 0..=MAX_REDIRECT_HOPS {
            let http_req = self.build_request(req.verb(), &uri, &payload)?;
            debug!("dispatching {} {}", req.verb(), uri);
            let resp = self.ctx.http_send_as_string(http_req).await?;

            if resp.status() != StatusCode::FOUND {
                let (parts, body) = resp.into_parts();
                if parts.status.is_success() {
                    return Ok(body);
                }
                return Err(Error::request_failed(format!(
                    "server returned {}: {}",
                    parts.status, body
                )));
            }

            let (parts, body) = resp.into_parts();
            let location = parts.headers.get(LOCATION).ok_or_else(|| {
                Error::protocol_violation("redirect given but no location header")
            })?;
            let new_uri: Uri = location.to_str()?.parse().map_err(|e| {
                Error::protocol_violation("redirect location is not a valid uri").with_source(e)
            })?;
            debug!("following redirect {} -> {} (hop {})", uri, new_uri, hop + 1);

            let event = RedirectEvent {
                original_url: uri.to_string(),
                headers: parts.headers,
                body,
                new_url: new_uri.to_string(),
            };
            self.notify.redirected(&event);
            uri = new_uri;
        }

        Err(Error::too_many_redirects(format!(
            "gave up after {MAX_REDIRECT_HOPS} redirects"
        )))
    }

    fn build_request(
        &self,
        verb: &Method,
        uri: &Uri,
        payload: &str,
    ) -> Result<http::Request<Bytes>> {
        let media_type = format!("{}; version={}", MEDIA_TYPE, self.session.api_version());
        let mut req = http::Request::builder()
            .method(verb.clone())
            .uri(uri.clone())
            .header(CONTENT_TYPE, &media_type)
            .header(ACCEPT, &media_type)
            .header(USER_AGENT, self.user_agent())
            .body(Bytes::from(payload.to_string()))?;

        let authorization = self.signer.authorization(verb, uri)?;
        req.headers_mut().insert(AUTHORIZATION, authorization);
        Ok(req)
    }

    fn user_agent(&self) -> String {
        let mut ua = format!("Backplane Rust Client; {}", self.session.api_version());
        if let Some(app_name) = self.session.app_name() {
            // Write into a String cannot fail.
            let _ = write!(ua, "/{app_name}");
        }
        ua
    }
}
