//! Aircraft metadata enrichment
//!
//! [`EnrichmentCache`] memoizes one [`Lookup`] per aircraft id. Concurrent
//! lookups for the same id share a single in-flight request. Failures and
//! not-found both resolve to [`Lookup::Unknown`] and are cached like any
//! other result.
//!
//! Retention is bounded: at most `max_entries` resolved entries are kept
//! (least recently used evicted first), and with a TTL configured an entry
//! older than the TTL is resolved again on its next lookup.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("homebase-watch/", env!("CARGO_PKG_VERSION"));

/// Registry data for one aircraft
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AircraftMetadata {
    pub registration: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub typecode: Option<String>,
}

impl AircraftMetadata {
    /// Trim every field, dropping blanks
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            registration: clean(self.registration),
            manufacturer: clean(self.manufacturer),
            model: clean(self.model),
            typecode: clean(self.typecode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registration.is_none()
            && self.manufacturer.is_none()
            && self.model.is_none()
            && self.typecode.is_none()
    }
}

/// Resolved lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Known(AircraftMetadata),
    Unknown,
}

impl Lookup {
    pub fn metadata(&self) -> Option<&AircraftMetadata> {
        match self {
            Lookup::Known(metadata) => Some(metadata),
            Lookup::Unknown => None,
        }
    }
}

/// Metadata service errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Aircraft metadata source
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// `Ok(None)` when the service has no record for `id`
    async fn resolve(&self, id: &str) -> Result<Option<AircraftMetadata>, MetadataError>;
}

/// Minimum spacing between outgoing requests
struct RateLimiter {
    last_request: tokio::sync::Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: tokio::sync::Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// `GET {lookup_url}?icao=<id>`
pub struct HttpMetadataService {
    http_client: reqwest::Client,
    lookup_url: String,
    rate_limiter: RateLimiter,
}

impl HttpMetadataService {
    pub fn new(
        lookup_url: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Result<Self, MetadataError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            lookup_url: lookup_url.into(),
            rate_limiter: RateLimiter::new(min_interval),
        })
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    async fn resolve(&self, id: &str) -> Result<Option<AircraftMetadata>, MetadataError> {
        self.rate_limiter.wait().await;

        tracing::debug!(icao = %id, url = %self.lookup_url, "Querying metadata service");

        let response = self
            .http_client
            .get(&self.lookup_url)
            .query(&[("icao", id)])
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MetadataError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let metadata = match serde_json::from_slice::<Option<AircraftMetadata>>(&body) {
            Ok(metadata) => metadata.map(AircraftMetadata::normalized),
            Err(e) => return Err(MetadataError::Parse(e.to_string())),
        };
        Ok(metadata.filter(|m| !m.is_empty()))
    }
}

/// Where an id stands in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Ready,
    Pending,
    Missing,
}

type PendingLookup = Shared<BoxFuture<'static, Lookup>>;

enum Slot {
    InFlight(PendingLookup),
    Ready {
        lookup: Lookup,
        stored_at: Instant,
        last_used: Instant,
    },
}

/// Memoized, single-flight metadata cache
///
/// The slot map is behind a synchronous mutex that is never held across an
/// await.
pub struct EnrichmentCache {
    service: Arc<dyn MetadataService>,
    slots: Mutex<HashMap<String, Slot>>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl EnrichmentCache {
    pub fn new(service: Arc<dyn MetadataService>, max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            service,
            slots: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, stored_at: Instant) -> bool {
        self.ttl.map_or(true, |ttl| stored_at.elapsed() < ttl)
    }

    /// Resolve `id`, sharing any request already in flight
    pub async fn lookup(&self, id: &str) -> Lookup {
        let pending = {
            let mut slots = self.slots();
            match slots.get_mut(id) {
                Some(Slot::Ready {
                    lookup,
                    stored_at,
                    last_used,
                }) if self.is_fresh(*stored_at) => {
                    *last_used = Instant::now();
                    return lookup.clone();
                }
                Some(Slot::InFlight(pending)) => pending.clone(),
                _ => {
                    let pending = self.start(id);
                    slots.insert(id.to_string(), Slot::InFlight(pending.clone()));
                    pending
                }
            }
        };

        let lookup = pending.await;
        self.store(id, lookup.clone());
        lookup
    }

    fn start(&self, id: &str) -> PendingLookup {
        let service = Arc::clone(&self.service);
        let id = id.to_string();
        async move {
            match service.resolve(&id).await {
                Ok(Some(metadata)) => {
                    debug!(icao = %id, registration = ?metadata.registration, "Metadata resolved");
                    Lookup::Known(metadata)
                }
                Ok(None) => {
                    debug!(icao = %id, "No metadata on record");
                    Lookup::Unknown
                }
                Err(e) => {
                    warn!(icao = %id, error = %e, "Metadata lookup failed");
                    Lookup::Unknown
                }
            }
        }
        .boxed()
        .shared()
    }

    fn store(&self, id: &str, lookup: Lookup) {
        let mut slots = self.slots();
        if matches!(slots.get(id), Some(Slot::Ready { stored_at, .. }) if self.is_fresh(*stored_at)) {
            return;
        }

        let now = Instant::now();
        slots.insert(
            id.to_string(),
            Slot::Ready {
                lookup,
                stored_at: now,
                last_used: now,
            },
        );

        let ready = slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count();
        if ready > self.max_entries {
            let oldest = slots
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Ready { last_used, .. } => Some((key, *last_used)),
                    Slot::InFlight(_) => None,
                })
                .min_by_key(|(_, last_used)| *last_used)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                debug!(icao = %key, "Evicting least recently used metadata entry");
                slots.remove(&key);
            }
        }
    }

    pub fn status(&self, id: &str) -> CacheStatus {
        match self.slots().get(id) {
            Some(Slot::Ready { stored_at, .. }) if self.is_fresh(*stored_at) => CacheStatus::Ready,
            Some(Slot::InFlight(_)) => CacheStatus::Pending,
            _ => CacheStatus::Missing,
        }
    }

    /// Cached result without triggering a lookup
    pub fn peek(&self, id: &str) -> Option<Lookup> {
        let mut slots = self.slots();
        match slots.get_mut(id) {
            Some(Slot::Ready {
                lookup,
                stored_at,
                last_used,
            }) if self.is_fresh(*stored_at) => {
                *last_used = Instant::now();
                Some(lookup.clone())
            }
            _ => None,
        }
    }

    /// Resolved entries currently held
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
