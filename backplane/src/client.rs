//! The Backplane client facade.

use crate::push::{PushToken, TokenType};
use crate::query::Query;
use backplane_core::{
    ApiRequest, Context, HttpSend, NoopRedirectNotify, RedirectEvent, RedirectNotify, Result,
    Session, Transport, DEFAULT_HOST,
};
use backplane_http_send_reqwest::ReqwestHttpSend;
use http::Method;
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use url::Url;

/// The top-level object applications use to issue API calls.
///
/// A client owns its [`Session`] and transport; cloning is cheap and all
/// clones share the cached host. Operations resolve to the raw response
/// body on success, leaving deserialization to the caller.
///
/// When the platform redirects a call, the client remembers the new host
/// for every subsequent request and, if the host actually changed, hands
/// the redirect to the observer configured via
/// [`ClientBuilder::redirect_notify`] so the application can persist it.
#[derive(Clone, Debug)]
pub struct Client {
    session: Arc<Session>,
    transport: Transport,
    host: Arc<Mutex<String>>,
}

impl Client {
    /// Create a client with the default host and HTTP client.
    pub fn new(session: Session) -> Self {
        Self::builder(session).build()
    }

    /// Create a client builder.
    pub fn builder(session: Session) -> ClientBuilder {
        ClientBuilder {
            session,
            host: DEFAULT_HOST.to_string(),
            ctx: Context::new().with_http_send(ReqwestHttpSend::default()),
            notify: Arc::new(NoopRedirectNotify),
        }
    }

    /// The session this client signs with.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The host requests currently go to.
    pub fn host(&self) -> String {
        self.host.lock().expect("lock poisoned").clone()
    }

    async fn execute(&self, req: ApiRequest) -> Result<String> {
        let host = self.host();
        self.transport.execute(&req, &host).await
    }

    // ── session & login/logout ────────────────────────────────────────

    /// Log a user in. The expected parameters depend on how the app's
    /// user object is configured, typically username and password fields.
    pub async fn login(&self, params: &[(&str, &str)]) -> Result<String> {
        self.execute(ApiRequest::new("login").user_based().with_params(owned(params)))
            .await
    }

    /// Log the current user out.
    pub async fn logout(&self) -> Result<String> {
        self.execute(ApiRequest::new("logout").user_based()).await
    }

    /// Start a new API session.
    pub async fn start_session(&self) -> Result<String> {
        self.execute(ApiRequest::new("startsession").with_verb(Method::POST))
            .await
    }

    // ── twitter ───────────────────────────────────────────────────────

    /// Log in with a Twitter user token/secret pair (per-user keys, not
    /// the consumer pair).
    pub async fn twitter_login(&self, token: &str, secret: &str) -> Result<String> {
        let params = [("tw_tk", token), ("tw_ts", secret)];
        self.execute(
            ApiRequest::new("twitterlogin")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Post a status update for the linked Twitter account. Must be at
    /// most 140 characters.
    pub async fn twitter_status_update(&self, message: &str) -> Result<String> {
        let params = [("tw_st", message)];
        self.execute(
            ApiRequest::new("twitterStatusUpdate")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Create a new user and associate it with an existing Twitter user.
    pub async fn register_with_twitter_token(
        &self,
        token: &str,
        secret: &str,
        username: &str,
    ) -> Result<String> {
        let params = [("tw_tk", token), ("tw_ts", secret), ("username", username)];
        self.execute(
            ApiRequest::new("createUserWithTwitter")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Link the logged-in user with an existing Twitter user.
    pub async fn link_user_with_twitter_token(&self, token: &str, secret: &str) -> Result<String> {
        let params = [("tw_tk", token), ("tw_ts", secret)];
        self.execute(
            ApiRequest::new("linkUserWithTwitter")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    // ── facebook ──────────────────────────────────────────────────────

    /// Log in with a Facebook user token.
    pub async fn facebook_login(&self, token: &str) -> Result<String> {
        let params = [("fb_at", token)];
        self.execute(
            ApiRequest::new("facebookLogin")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Create a new user and link it with a Facebook account.
    pub async fn register_with_facebook_token(
        &self,
        token: &str,
        username: &str,
    ) -> Result<String> {
        let params = [("fb_at", token), ("username", username)];
        self.execute(
            ApiRequest::new("createUserWithFacebook")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Link the logged-in user with a Facebook user.
    pub async fn link_user_with_facebook_token(&self, token: &str) -> Result<String> {
        let params = [("fb_at", token)];
        self.execute(
            ApiRequest::new("linkUserWithFacebook")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Post a message to the linked Facebook account. Does nothing when no
    /// Facebook user is logged in.
    pub async fn facebook_post_message(&self, message: &str) -> Result<String> {
        let params = [("message", message)];
        self.execute(
            ApiRequest::new("postFacebookMessage")
                .user_based()
                .with_params(owned(&params)),
        )
        .await
    }

    /// Get Facebook user info for the current user. Returns nothing when
    /// no Facebook user is logged in.
    pub async fn get_facebook_user_info(&self) -> Result<String> {
        self.get("getFacebookUserInfo").await
    }

    // ── push notifications ────────────────────────────────────────────

    /// Send a push notification to a group of tokens.
    pub async fn push_to_tokens(
        &self,
        payload: &[(&str, &str)],
        tokens: &[PushToken],
    ) -> Result<String> {
        let body = json!({
            "payload": { "kvPairs": kv_pairs(payload) },
            "tokens": tokens,
        });
        self.post("push/push_tokens_universal", &body).await
    }

    /// Send a push notification to a group of users.
    pub async fn push_to_users(
        &self,
        payload: &[(&str, &str)],
        user_ids: &[&str],
    ) -> Result<String> {
        let body = json!({
            "kvPairs": kv_pairs(payload),
            "userIds": user_ids,
        });
        self.post("push/push_users_universal", &body).await
    }

    /// Register a user's device token for push notifications.
    pub async fn register_for_push_with_user(
        &self,
        username: &str,
        registration_id: &str,
    ) -> Result<String> {
        let body = json!({
            "userId": username,
            "token": { "token": registration_id, "type": "android" },
        });
        self.post("push/register_device_token_universal", &body).await
    }

    /// Broadcast a push notification to all users of this app. Use
    /// sparingly on large apps.
    pub async fn broadcast_push_notification(&self, payload: &[(&str, &str)]) -> Result<String> {
        let body = json!({ "kvPairs": kv_pairs(payload) });
        self.post("push/push_broadcast", &body).await
    }

    /// Get all expired push tokens for this app without clearing them.
    pub async fn get_expired_push_tokens(&self) -> Result<String> {
        self.expired_push_tokens(false).await
    }

    /// Get all expired push tokens for this app and clear them once
    /// returned.
    pub async fn get_and_clear_expired_push_tokens(&self) -> Result<String> {
        self.expired_push_tokens(true).await
    }

    async fn expired_push_tokens(&self, clear: bool) -> Result<String> {
        let body = json!({ "clear": clear });
        self.post("push/get_expired_tokens_universal", &body).await
    }

    /// Remove a push token for this app.
    pub async fn remove_push_token(&self, token: &str, token_type: TokenType) -> Result<String> {
        let body = json!({ "token": token, "type": token_type.to_string() });
        self.post("push/remove_push_token_universal", &body).await
    }

    // ── generic CRUD ──────────────────────────────────────────────────

    /// Issue a GET against the given path.
    pub async fn get(&self, path: &str) -> Result<String> {
        self.execute(ApiRequest::new(path)).await
    }

    /// Issue a GET with the given arguments encoded into the query string.
    pub async fn get_with_params(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        self.execute(ApiRequest::new(path).with_params(owned(params)))
            .await
    }

    /// Run a [`Query`] against its object collection.
    pub async fn get_query(&self, query: &Query) -> Result<String> {
        self.execute(
            ApiRequest::new(format!("/{}", query.object_name()))
                .with_params(query.arguments().to_vec()),
        )
        .await
    }

    /// POST the given object, serialized to JSON, to the given path.
    pub async fn post(&self, path: &str, body: &impl Serialize) -> Result<String> {
        self.execute(
            ApiRequest::new(path)
                .with_verb(Method::POST)
                .with_body(body)?,
        )
        .await
    }

    /// PUT the given object, serialized to JSON, to `path/id`.
    pub async fn put(&self, path: &str, id: &str, body: &impl Serialize) -> Result<String> {
        self.execute(
            ApiRequest::new(format!("{path}/{id}"))
                .with_verb(Method::PUT)
                .with_body(body)?,
        )
        .await
    }

    /// DELETE `path/id`.
    pub async fn delete(&self, path: &str, id: &str) -> Result<String> {
        self.execute(ApiRequest::new(format!("{path}/{id}")).with_verb(Method::DELETE))
            .await
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    session: Session,
    host: String,
    ctx: Context,
    notify: Arc<dyn RedirectNotify>,
}

impl ClientBuilder {
    /// Override the host requests initially go to.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the HTTP client implementation.
    pub fn http_send(mut self, http: impl HttpSend) -> Self {
        self.ctx = Context::new().with_http_send(http);
        self
    }

    /// Set the observer called when the platform redirects a request to a
    /// new host. Use it to persist the new host across process restarts.
    /// May be called from whatever task drove the request.
    pub fn redirect_notify(mut self, notify: impl RedirectNotify) -> Self {
        self.notify = Arc::new(notify);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let session = Arc::new(self.session);
        let host = Arc::new(Mutex::new(self.host));
        let notify = HostCachingNotify {
            host: host.clone(),
            user: self.notify,
        };
        let transport = Transport::new(self.ctx, session.clone()).with_redirect_notify(notify);

        Client {
            session,
            transport,
            host,
        }
    }
}

/// Remembers the host a redirect landed on and forwards the event to the
/// user's observer, but only when the host actually changed.
#[derive(Debug)]
struct HostCachingNotify {
    host: Arc<Mutex<String>>,
    user: Arc<dyn RedirectNotify>,
}

impl RedirectNotify for HostCachingNotify {
    fn redirected(&self, event: &RedirectEvent) {
        // A target we cannot parse only affects the caching decision, not
        // the request that is being redirected.
        let Ok(url) = Url::parse(&event.new_url) else {
            debug!("ignoring unparseable redirect target {}", event.new_url);
            return;
        };
        let Some(host) = url.host_str() else {
            debug!("ignoring redirect target without host {}", event.new_url);
            return;
        };
        let new_host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut cached = self.host.lock().expect("lock poisoned");
        if !cached.eq_ignore_ascii_case(&new_host) {
            *cached = new_host;
            self.user.redirected(event);
        }
    }
}

fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn kv_pairs(payload: &[(&str, &str)]) -> Value {
    Value::Object(
        payload
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[derive(Debug, Clone, Default)]
    struct Recording {
        events: Arc<Mutex<Vec<RedirectEvent>>>,
    }

    impl Recording {
        fn count(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    impl RedirectNotify for Recording {
        fn redirected(&self, event: &RedirectEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn cache(initial: &str, user: Recording) -> HostCachingNotify {
        HostCachingNotify {
            host: Arc::new(Mutex::new(initial.to_string())),
            user: Arc::new(user),
        }
    }

    fn event(new_url: &str) -> RedirectEvent {
        RedirectEvent {
            original_url: "http://api.bp1.backplane.io/games".to_string(),
            headers: HeaderMap::new(),
            body: String::new(),
            new_url: new_url.to_string(),
        }
    }

    #[test]
    fn test_new_host_updates_cache_and_notifies() {
        let user = Recording::default();
        let notify = cache("api.bp1.backplane.io", user.clone());

        notify.redirected(&event("http://api2.backplane.io/games"));

        assert_eq!(*notify.host.lock().unwrap(), "api2.backplane.io");
        assert_eq!(user.count(), 1);
    }

    #[test]
    fn test_same_host_does_not_notify() {
        let user = Recording::default();
        let notify = cache("api.bp1.backplane.io", user.clone());

        notify.redirected(&event("http://api.bp1.backplane.io/elsewhere"));

        assert_eq!(*notify.host.lock().unwrap(), "api.bp1.backplane.io");
        assert_eq!(user.count(), 0);
    }

    #[test]
    fn test_host_comparison_ignores_case() {
        let user = Recording::default();
        let notify = cache("API.BP1.BACKPLANE.IO", user.clone());

        notify.redirected(&event("http://api.bp1.backplane.io/games"));

        assert_eq!(user.count(), 0);
    }

    #[test]
    fn test_cached_host_keeps_port() {
        let user = Recording::default();
        let notify = cache("api.bp1.backplane.io", user.clone());

        notify.redirected(&event("http://api2.backplane.io:8080/games"));

        assert_eq!(*notify.host.lock().unwrap(), "api2.backplane.io:8080");
        assert_eq!(user.count(), 1);
    }

    #[test]
    fn test_unparseable_target_is_ignored() {
        let user = Recording::default();
        let notify = cache("api.bp1.backplane.io", user.clone());

        notify.redirected(&event("::not a url::"));

        assert_eq!(*notify.host.lock().unwrap(), "api.bp1.backplane.io");
        assert_eq!(user.count(), 0);
    }
}
