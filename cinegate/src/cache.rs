use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use reqwest::{
    header::{self, HeaderValue},
    Client, StatusCode,
};

use crate::{
    error::{AuthFailure, KeySetFetchError},
    jwa::Algorithm,
    jwk::KeyIdRef,
    Jwk, Jwks,
};

#[derive(Clone, Debug, Default)]
struct CachedKeys {
    jwks: Jwks,
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    fetched_at: Option<Instant>,
}

impl CachedKeys {
    fn fresh(jwks: Jwks) -> Self {
        Self {
            jwks,
            fetched_at: Some(Instant::now()),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Remote {
    jwks_url: String,
    client: Client,
}

/// The signing keys trusted by the verifier, optionally backed by a remote
/// key set discovery URL
///
/// Cloning is cheap, and clones share the same keys. The set is replaced
/// atomically on refresh, so readers always see either the previous or the
/// new set in full.
#[derive(Clone, Debug)]
#[must_use]
pub struct KeySetCache {
    keys: Arc<ArcSwap<CachedKeys>>,
    remote: Option<Arc<Remote>>,
    cooldown: Duration,
}

impl KeySetCache {
    /// Constructs a cache over a fixed key set
    ///
    /// A key ID that is not in the set is rejected without any network
    /// activity.
    pub fn from_jwks(jwks: Jwks) -> Self {
        Self {
            keys: Arc::new(ArcSwap::from_pointee(CachedKeys::fresh(jwks))),
            remote: None,
            cooldown: Duration::ZERO,
        }
    }

    /// Constructs a cache that fetches its keys from `jwks_url`
    ///
    /// Nothing is fetched until a key is first requested. Each fetch is
    /// bounded by `fetch_timeout`.
    pub fn from_url(
        jwks_url: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Result<Self, KeySetFetchError> {
        let client = Client::builder()
            .user_agent(concat!("cinegate/", env!("CARGO_PKG_VERSION")))
            .timeout(fetch_timeout)
            .build()
            .map_err(KeySetFetchError::Client)?;

        Ok(Self::with_client(jwks_url, client))
    }

    /// Constructs a cache that fetches its keys from `jwks_url` with a
    /// preconfigured client
    pub fn with_client(jwks_url: impl Into<String>, client: Client) -> Self {
        Self {
            keys: Arc::new(ArcSwap::from_pointee(CachedKeys::default())),
            remote: Some(Arc::new(Remote {
                jwks_url: jwks_url.into(),
                client,
            })),
            cooldown: Duration::ZERO,
        }
    }

    /// Suppresses refreshes triggered by unknown key IDs for `cooldown`
    /// after the last successful fetch
    ///
    /// Without a cooldown every unknown key ID fetches the key set, so
    /// untrusted callers control how often the endpoint is hit. Keys rotated
    /// in during the cooldown are not found until it elapses.
    pub fn with_refresh_cooldown(self, cooldown: Duration) -> Self {
        Self { cooldown, ..self }
    }

    /// The discovery URL, if the cache is backed by one
    #[must_use]
    pub fn jwks_url(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.jwks_url.as_str())
    }

    /// A copy of the keys currently held
    #[must_use]
    pub fn current(&self) -> Jwks {
        self.keys.load().jwks.clone()
    }

    /// Replaces the held keys
    pub fn set_keys(&self, jwks: Jwks) {
        self.keys.store(Arc::new(CachedKeys::fresh(jwks)));
    }

    /// Finds the key with the given ID, fetching the key set if the ID is
    /// not known yet
    ///
    /// # Errors
    ///
    /// Fails with `invalid_header` if the key set cannot be fetched or does
    /// not contain a matching key after fetching.
    pub async fn resolve(&self, kid: &KeyIdRef, alg: Algorithm) -> Result<Jwk, AuthFailure> {
        let cached = self.keys.load_full();
        if let Some(key) = cached.jwks.get_key_by_id(kid, alg) {
            return Ok(key.clone());
        }

        if self.remote.is_none() {
            tracing::debug!(%kid, %alg, "no matching key in static key set");
            return Err(AuthFailure::key_not_found());
        }

        if let Some(fetched_at) = cached.fetched_at {
            if fetched_at.elapsed() < self.cooldown {
                tracing::debug!(%kid, %alg, "no matching key; refresh cooling down");
                return Err(AuthFailure::key_not_found());
            }
        }

        tracing::debug!(%kid, %alg, "no matching key; refreshing key set");
        self.refresh()
            .await
            .map_err(|_| AuthFailure::key_set_unavailable())?;

        self.keys
            .load()
            .jwks
            .get_key_by_id(kid, alg)
            .cloned()
            .ok_or_else(|| {
                tracing::debug!(%kid, %alg, "no matching key after refresh");
                AuthFailure::key_not_found()
            })
    }

    /// Refreshes the key set from the discovery URL
    ///
    /// No retries are attempted. If the refresh fails, the held keys are left
    /// unchanged. A cache without a discovery URL has nothing to refresh.
    #[tracing::instrument(skip(self), fields(jwks.url = tracing::field::Empty))]
    pub async fn refresh(&self) -> Result<(), KeySetFetchError> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };

        tracing::Span::current().record("jwks.url", remote.jwks_url.as_str());
        tracing::debug!("refreshing JWKS");

        let current = self.keys.load_full();

        let mut request = remote.client.get(&remote.jwks_url);
        if let Some(etag) = &current.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        } else if let Some(last_modified) = &current.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await.map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "JWKS refresh failed; request error");
            KeySetFetchError::Request(err)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!("JWKS not modified");
            self.keys.store(Arc::new(CachedKeys {
                fetched_at: Some(Instant::now()),
                ..CachedKeys::clone(&current)
            }));
            return Ok(());
        }

        if !status.is_success() {
            tracing::warn!(
                http.status_code = status.as_u16(),
                "JWKS refresh failed; unexpected response status",
            );
            return Err(KeySetFetchError::Status(status));
        }

        let etag = response.headers().get(header::ETAG).map(ToOwned::to_owned);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .map(ToOwned::to_owned);

        let jwks = response.json::<Jwks>().await.map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "JWKS refresh failed; malformed key set");
            KeySetFetchError::Malformed(err)
        })?;

        let key_count = jwks.len();
        self.keys.store(Arc::new(CachedKeys {
            jwks,
            etag,
            last_modified,
            fetched_at: Some(Instant::now()),
        }));
        tracing::info!(jwks.keys = key_count, "JWKS refreshed");

        Ok(())
    }

    /// Refreshes the key set on a fixed interval for as long as the runtime
    /// lives
    ///
    /// Failures are logged and otherwise ignored; the next tick tries again.
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    pub fn spawn_refresh(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;
            loop {
                timer.tick().await;
                let _ = this.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use color_eyre::Result;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{error::ErrorCode, jwk::KeyId, testing};

    const JWKS_PATH: &str = "/.well-known/jwks.json";

    fn jwks_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_owned(), "application/json")
    }

    fn remote_cache(server: &MockServer) -> Result<KeySetCache> {
        Ok(KeySetCache::from_url(
            format!("{}{JWKS_PATH}", server.uri()),
            Duration::from_secs(5),
        )?)
    }

    fn kid(id: &'static str) -> KeyId {
        KeyId::from_static(id)
    }

    #[tokio::test]
    async fn fetches_on_first_use_and_then_serves_from_memory() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .expect(1)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        let trusted = kid(testing::TRUSTED_KEY_ID);

        let first = cache.resolve(&trusted, Algorithm::RS256).await?;
        let second = cache.resolve(&trusted, Algorithm::RS256).await?;

        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_key_after_refresh_is_not_found() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .expect(2)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;

        for _ in 0..2 {
            let failure = cache
                .resolve(&kid("missing"), Algorithm::RS256)
                .await
                .unwrap_err();
            assert_eq!(failure.code(), ErrorCode::InvalidHeader);
            assert_eq!(failure.description(), "Unable to find the appropriate key.");
        }
        Ok(())
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeated_refreshes() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .expect(1)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?.with_refresh_cooldown(Duration::from_secs(60));

        for _ in 0..3 {
            let failure = cache
                .resolve(&kid("missing"), Algorithm::RS256)
                .await
                .unwrap_err();
            assert_eq!(failure.description(), "Unable to find the appropriate key.");
        }
        Ok(())
    }

    #[tokio::test]
    async fn picks_up_rotated_keys_on_miss() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::ROTATED_JWKS))
            .expect(2)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;

        let _ = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await?;
        let _ = cache
            .resolve(&kid(testing::ROTATED_KEY_ID), Algorithm::RS256)
            .await?;

        let failure = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(failure.description(), "Unable to find the appropriate key.");
        Ok(())
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_failure() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;

        assert!(matches!(
            cache.refresh().await,
            Err(KeySetFetchError::Status(status)) if status == StatusCode::SERVICE_UNAVAILABLE
        ));

        let failure = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(failure.code(), ErrorCode::InvalidHeader);
        assert_eq!(failure.status(), http::StatusCode::UNAUTHORIZED);
        assert_eq!(failure.description(), "Unable to fetch the signing key set.");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_document_is_a_fetch_failure() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response("<html>not a key set</html>"))
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        let failure = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await
            .unwrap_err();

        assert_eq!(failure.description(), "Unable to fetch the signing key set.");
        Ok(())
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let cache = KeySetCache::from_url(
            format!("{}{JWKS_PATH}", server.uri()),
            Duration::from_millis(100),
        )?;

        let failure = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(failure.description(), "Unable to fetch the signing key set.");
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_keys() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        cache.refresh().await?;
        assert!(cache.refresh().await.is_err());

        assert_eq!(cache.current().len(), 1);
        let _ = cache
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn conditional_refresh_keeps_keys_when_not_modified() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS).insert_header("etag", "\"v1\""))
            .expect(1)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        cache.refresh().await?;
        cache.refresh().await?;

        assert_eq!(cache.current().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn static_cache_never_fetches() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(testing::JWKS)?;
        let cache = KeySetCache::from_jwks(jwks);

        cache.refresh().await?;
        assert_eq!(cache.jwks_url(), None);

        let failure = cache
            .resolve(&kid(testing::ROTATED_KEY_ID), Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(failure.description(), "Unable to find the appropriate key.");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_all_resolve_from_a_whole_set() -> Result<()> {
        const CALLERS: u64 = 8;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS).set_delay(Duration::from_millis(50)))
            .expect(1..=CALLERS)
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        let expected: Jwks = serde_json::from_str(testing::JWKS)?;

        let tasks: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
                        .await
                })
            })
            .collect();

        for task in tasks {
            let key = task.await??;
            assert_eq!(key.key_id().as_str(), testing::TRUSTED_KEY_ID);
        }

        assert_eq!(cache.current().len(), expected.len());
        assert_eq!(cache.current().keys(), expected.keys());
        Ok(())
    }

    #[tokio::test]
    async fn set_keys_replaces_the_set_for_all_clones() -> Result<()> {
        let cache = KeySetCache::from_jwks(serde_json::from_str(testing::JWKS)?);
        let clone = cache.clone();

        cache.set_keys(serde_json::from_str(testing::ROTATED_JWKS)?);

        let _ = clone
            .resolve(&kid(testing::ROTATED_KEY_ID), Algorithm::RS256)
            .await?;
        assert!(clone
            .resolve(&kid(testing::TRUSTED_KEY_ID), Algorithm::RS256)
            .await
            .is_err());
        Ok(())
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn background_refresh_polls_the_endpoint() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(testing::JWKS))
            .mount(&server)
            .await;

        let cache = remote_cache(&server)?;
        let task = cache.spawn_refresh(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(300)).await;
        task.abort();

        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.len() >= 2, "expected repeated refreshes");
        assert_eq!(cache.current().len(), 1);
        Ok(())
    }
}
