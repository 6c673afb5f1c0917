//! Conditional responder for a single cached icon

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use http::header::{
    ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue,
    IF_NONE_MATCH,
};
use http::{Method, Response, StatusCode};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::error::{ConfigError, IconError};
use crate::freshness::is_fresh;
use crate::lifetime::{LifetimeSpec, normalize};
use crate::route::ResourceRoute;
use crate::snapshot::IconSnapshot;
use crate::source::{FileSource, IconSource, MemorySource};

/// Value of the `Allow` header on preflight and rejected requests
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Content type of every full icon response
pub const ICON_CONTENT_TYPE: &str = "image/x-icon";

/// A snapshot build shared by every request that arrives while it runs
type SnapshotBuild = Shared<BoxFuture<'static, Result<Arc<IconSnapshot>, IconError>>>;

/// Options for building a responder
#[derive(Debug, Clone, Default)]
pub struct FaviconOptions {
    /// Cache lifetime; `None` means one year
    pub max_age: Option<LifetimeSpec>,
    /// Path the icon is served from
    pub route: ResourceRoute,
}

impl FaviconOptions {
    pub fn with_max_age(mut self, max_age: impl Into<LifetimeSpec>) -> Self {
        self.max_age = Some(max_age.into());
        self
    }

    pub fn with_route(mut self, path: impl Into<String>) -> Self {
        self.route = ResourceRoute::new(path);
        self
    }
}

/// Serves one icon with ETag validation
///
/// The snapshot is built at most once. Buffer-backed responders build it at
/// construction; source-backed responders build it on the first GET or HEAD
/// and every later or concurrent request shares that result. Requests that
/// arrive while a build is running wait on that build and share its outcome,
/// failure included.
pub struct ConditionalResponder {
    route: ResourceRoute,
    max_age_ms: u64,
    source: Arc<dyn IconSource>,
    snapshot: OnceLock<Arc<IconSnapshot>>,
    inflight: Mutex<Option<SnapshotBuild>>,
}

impl ConditionalResponder {
    /// Serve a copy of `data`
    pub fn from_bytes(data: &[u8], options: FaviconOptions) -> Self {
        let max_age_ms = normalize(options.max_age.as_ref());
        let source = MemorySource::copy_from(data);
        let snapshot = IconSnapshot::new(source.bytes().clone(), max_age_ms);

        info!(
            "Serving {} from {} (max-age: {} ms, etag: {})",
            options.route.path(),
            source.describe(),
            max_age_ms,
            snapshot.etag()
        );

        Self {
            route: options.route,
            max_age_ms,
            source: Arc::new(source),
            snapshot: OnceLock::from(Arc::new(snapshot)),
            inflight: Mutex::new(None),
        }
    }

    /// Serve the file at `path`, read lazily on first use
    ///
    /// Fails immediately if the path is missing or a directory.
    pub fn from_path(
        path: impl AsRef<Path>,
        options: FaviconOptions,
    ) -> Result<Self, ConfigError> {
        let source = FileSource::open(path)?;
        Ok(Self::with_source(Arc::new(source), options))
    }

    /// Serve bytes produced by an arbitrary source, read lazily on first use
    pub fn with_source(source: Arc<dyn IconSource>, options: FaviconOptions) -> Self {
        let max_age_ms = normalize(options.max_age.as_ref());

        info!(
            "Serving {} from {} (max-age: {} ms)",
            options.route.path(),
            source.describe(),
            max_age_ms
        );

        Self {
            route: options.route,
            max_age_ms,
            source,
            snapshot: OnceLock::new(),
            inflight: Mutex::new(None),
        }
    }

    pub fn route(&self) -> &ResourceRoute {
        &self.route
    }

    /// Normalized cache lifetime in milliseconds
    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms
    }

    /// Whether the snapshot has been built yet
    pub fn is_loaded(&self) -> bool {
        self.snapshot.get().is_some()
    }

    /// Get the snapshot, building it on first call
    ///
    /// Concurrent callers share one build. A failed build is not cached; the
    /// next call after it settles starts a new one.
    pub async fn snapshot(&self) -> Result<Arc<IconSnapshot>, IconError> {
        if let Some(snapshot) = self.snapshot.get() {
            return Ok(Arc::clone(snapshot));
        }

        let build = {
            let mut inflight = self.inflight.lock();
            if let Some(snapshot) = self.snapshot.get() {
                return Ok(Arc::clone(snapshot));
            }
            inflight
                .get_or_insert_with(|| {
                    build_snapshot(Arc::clone(&self.source), self.max_age_ms)
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let result = build.clone().await;

        let mut inflight = self.inflight.lock();
        if let Ok(snapshot) = &result {
            let _ = self.snapshot.set(Arc::clone(snapshot));
        }
        if inflight.as_ref().is_some_and(|current| current.ptr_eq(&build)) {
            *inflight = None;
        }

        result
    }

    /// Respond to `target` if it names this icon, or return `None` so the
    /// caller can pass the request on
    pub async fn handle(
        &self,
        method: &Method,
        target: &str,
        headers: &HeaderMap,
    ) -> Result<Option<Response<Bytes>>, IconError> {
        if !self.route.matches(target) {
            return Ok(None);
        }
        self.respond(method, headers).await.map(Some)
    }

    /// Build the response for a request already routed to this icon
    pub async fn respond(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<Response<Bytes>, IconError> {
        let mut response = Response::new(Bytes::new());

        if *method != Method::GET && *method != Method::HEAD {
            let status = if *method == Method::OPTIONS {
                StatusCode::OK
            } else {
                StatusCode::METHOD_NOT_ALLOWED
            };
            debug!("{} {} -> {}", method, self.route.path(), status);

            *response.status_mut() = status;
            let resp_headers = response.headers_mut();
            resp_headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
            resp_headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            return Ok(response);
        }

        let snapshot = self.snapshot().await?;

        let resp_headers = response.headers_mut();
        resp_headers.insert(CACHE_CONTROL, HeaderValue::from_str(snapshot.cache_control())?);
        resp_headers.insert(ETAG, HeaderValue::from_str(snapshot.etag())?);

        let client_tags = if_none_match(headers);
        if is_fresh(client_tags.as_deref(), snapshot.etag()) {
            debug!("{} {} -> 304 (etag {})", method, self.route.path(), snapshot.etag());
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            return Ok(response);
        }

        resp_headers.insert(CONTENT_LENGTH, HeaderValue::from(snapshot.len() as u64));
        resp_headers.insert(CONTENT_TYPE, HeaderValue::from_static(ICON_CONTENT_TYPE));

        if *method == Method::GET {
            *response.body_mut() = snapshot.body().clone();
        }

        debug!("{} {} -> 200 ({} bytes)", method, self.route.path(), snapshot.len());
        Ok(response)
    }
}

async fn build_snapshot(
    source: Arc<dyn IconSource>,
    max_age_ms: u64,
) -> Result<Arc<IconSnapshot>, IconError> {
    let body = source.load().await?;
    let snapshot = IconSnapshot::new(body, max_age_ms);
    metrics::counter!("favicon_snapshot_builds_total").increment(1);
    info!(
        "Loaded icon from {} ({} bytes, etag: {})",
        source.describe(),
        snapshot.len(),
        snapshot.etag()
    );
    Ok(Arc::new(snapshot))
}

/// Join every `If-None-Match` line into one list; non-ASCII lines are skipped
fn if_none_match(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigErrorKind;
    use crate::lifetime::ONE_YEAR_MS;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Source that counts reads and can be told to fail or stall
    struct CountingSource {
        data: Bytes,
        reads: AtomicUsize,
        failing_reads: usize,
        delay: Option<Duration>,
    }

    impl CountingSource {
        fn new(data: &'static [u8]) -> Self {
            Self {
                data: Bytes::from_static(data),
                reads: AtomicUsize::new(0),
                failing_reads: 0,
                delay: None,
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IconSource for CountingSource {
        async fn load(&self) -> Result<Bytes, IconError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            match self.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            if n < self.failing_reads {
                return Err(IconError::Read {
                    path: "counting".into(),
                    source: Arc::new(std::io::Error::other("boom")),
                });
            }
            Ok(self.data.clone())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn header(response: &Response<Bytes>, name: http::header::HeaderName) -> Option<&str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn conditional(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_get_serves_icon() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());
        let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"icon");
        assert_eq!(header(&response, CONTENT_TYPE), Some("image/x-icon"));
        assert_eq!(header(&response, CONTENT_LENGTH), Some("4"));
        assert_eq!(header(&response, CACHE_CONTROL), Some("public, max-age=31536000"));
        assert_eq!(
            header(&response, ETAG),
            Some(crate::snapshot::compute_etag(b"icon").as_str())
        );
        assert!(response.headers().get(ALLOW).is_none());
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());
        let response = responder.respond(&Method::HEAD, &HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert_eq!(header(&response, CONTENT_LENGTH), Some("4"));
        assert_eq!(header(&response, CONTENT_TYPE), Some("image/x-icon"));
    }

    #[tokio::test]
    async fn test_options_and_rejected_methods() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());

        let response = responder.respond(&Method::OPTIONS, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, ALLOW), Some(ALLOWED_METHODS));
        assert_eq!(header(&response, CONTENT_LENGTH), Some("0"));
        assert!(response.body().is_empty());
        assert!(response.headers().get(ETAG).is_none());

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            let response = responder.respond(&method, &HeaderMap::new()).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(header(&response, ALLOW), Some(ALLOWED_METHODS));
            assert_eq!(header(&response, CONTENT_LENGTH), Some("0"));
            assert!(response.headers().get(CACHE_CONTROL).is_none());
        }
    }

    #[tokio::test]
    async fn test_not_modified_round_trip() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());
        let first = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        let etag = header(&first, ETAG).unwrap().to_string();

        for value in [etag.clone(), format!("W/{}", etag), "*".to_string()] {
            let response = responder.respond(&Method::GET, &conditional(&value)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_MODIFIED, "{}", value);
            assert!(response.body().is_empty());
            assert_eq!(header(&response, ETAG), Some(etag.as_str()));
            assert!(response.headers().get(CACHE_CONTROL).is_some());
            assert!(response.headers().get(CONTENT_LENGTH).is_none());
            assert!(response.headers().get(CONTENT_TYPE).is_none());
        }

        let response = responder
            .respond(&Method::GET, &conditional("\"unrelated\""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_multiple_if_none_match_lines() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());
        let etag = crate::snapshot::compute_etag(b"icon");

        let mut headers = HeaderMap::new();
        headers.append(IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        headers.append(IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());

        let response = responder.respond(&Method::HEAD, &headers).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_max_age_option() {
        let cases: [(LifetimeSpec, &str); 4] = [
            (5000u64.into(), "public, max-age=5"),
            (0u64.into(), "public, max-age=0"),
            ("30d".into(), "public, max-age=2592000"),
            (1234u64.into(), "public, max-age=1"),
        ];

        for (max_age, expected) in cases {
            let responder = ConditionalResponder::from_bytes(
                b"icon",
                FaviconOptions::default().with_max_age(max_age),
            );
            let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
            assert_eq!(header(&response, CACHE_CONTROL), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_buffer_is_copied() {
        let mut buffer = vec![0u8; 20];
        let responder = ConditionalResponder::from_bytes(&buffer, FaviconOptions::default());
        buffer.fill(0xff);

        let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.body().as_ref(), &[0u8; 20]);
        assert!(responder.is_loaded());
        assert_eq!(responder.max_age_ms(), ONE_YEAR_MS);
    }

    #[tokio::test]
    async fn test_handle_routes_by_path() {
        let responder = ConditionalResponder::from_bytes(b"icon", FaviconOptions::default());
        let headers = HeaderMap::new();

        assert!(responder.handle(&Method::GET, "/", &headers).await.unwrap().is_none());
        assert!(
            responder
                .handle(&Method::POST, "/other", &headers)
                .await
                .unwrap()
                .is_none()
        );

        let response = responder
            .handle(&Method::GET, "/favicon.ico?v=1", &headers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_lazy_source_is_read_once() {
        let source = Arc::new(CountingSource::new(b"lazy"));
        let responder =
            ConditionalResponder::with_source(source.clone(), FaviconOptions::default());
        assert!(!responder.is_loaded());

        // Preflight does not touch the source
        responder.respond(&Method::OPTIONS, &HeaderMap::new()).await.unwrap();
        assert_eq!(source.reads(), 0);

        let first = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        let second = responder.respond(&Method::HEAD, &HeaderMap::new()).await.unwrap();

        assert_eq!(source.reads(), 1);
        assert_eq!(header(&first, ETAG), header(&second, ETAG));
        assert_eq!(first.body().as_ref(), b"lazy");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_reads_once() {
        let source = Arc::new(CountingSource::new(b"concurrent"));
        let responder = Arc::new(ConditionalResponder::with_source(
            source.clone(),
            FaviconOptions::default(),
        ));

        let tasks = (0..16).map(|_| {
            let responder = responder.clone();
            tokio::spawn(async move { responder.snapshot().await.unwrap() })
        });
        let snapshots: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(source.reads(), 1);
        for snapshot in &snapshots {
            assert!(Arc::ptr_eq(snapshot, &snapshots[0]));
        }
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let source = Arc::new(CountingSource {
            failing_reads: 1,
            ..CountingSource::new(b"retry")
        });
        let responder =
            ConditionalResponder::with_source(source.clone(), FaviconOptions::default());

        let err = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, IconError::Read { .. }));
        assert!(!responder.is_loaded());

        let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_reads_once() {
        let source = Arc::new(CountingSource {
            failing_reads: usize::MAX,
            delay: Some(Duration::from_millis(200)),
            ..CountingSource::new(b"broken")
        });
        let responder = Arc::new(ConditionalResponder::with_source(
            source.clone(),
            FaviconOptions::default(),
        ));

        let tasks = (0..8).map(|_| {
            let responder = responder.clone();
            tokio::spawn(async move { responder.snapshot().await })
        });
        let results: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(source.reads(), 1);
        assert!(results.iter().all(|r| matches!(r, Err(IconError::Read { .. }))));
        assert!(!responder.is_loaded());

        // A request after the failure settles starts a fresh read
        assert!(responder.snapshot().await.is_err());
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favicon.ico");
        std::fs::write(&path, b"from-disk").unwrap();

        let responder = ConditionalResponder::from_path(&path, FaviconOptions::default()).unwrap();
        assert!(!responder.is_loaded());

        let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.body().as_ref(), b"from-disk");

        // Later changes on disk are not picked up
        std::fs::write(&path, b"changed").unwrap();
        let response = responder.respond(&Method::GET, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.body().as_ref(), b"from-disk");
    }

    #[test]
    fn test_from_path_rejects_bad_paths() {
        let dir = tempfile::tempdir().unwrap();

        let err = ConditionalResponder::from_path(dir.path(), FaviconOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ConfigErrorKind::IsDirectory);

        let missing = dir.path().join("nothing");
        let err = ConditionalResponder::from_path(missing, FaviconOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ConfigErrorKind::NotFound);
    }
}
