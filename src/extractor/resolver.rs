use crate::extractor::descriptor::MediaDescriptor;
use crate::extractor::traits::{ExtractOptions, Extractor};
use crate::utils::config::PipelineSettings;
use crate::utils::error::PipelineError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use url::Url;

type Slot = Arc<OnceCell<Arc<MediaDescriptor>>>;

/// Resolved metadata keyed by source URL.
///
/// Entries live for as long as the cache does and are never evicted. Each key
/// is written at most once; concurrent lookups of the same key wait on the
/// same extraction. Failed extractions leave the slot empty so a later call
/// can try again.
#[derive(Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &str) -> Slot {
        let mut entries = self.entries.lock().await;
        entries.entry(key.to_string()).or_default().clone()
    }

    /// Drop `key`'s slot if it is still empty and nobody besides the caller
    /// is waiting on it
    async fn discard_empty(&self, key: &str, slot: &Slot) {
        let mut entries = self.entries.lock().await;
        let unused = entries.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(slot) <= 2
        });
        if unused {
            entries.remove(key);
        }
    }

    /// Cached descriptor for `key`, without triggering extraction
    pub async fn get(&self, key: &str) -> Option<Arc<MediaDescriptor>> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of resolved entries
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Turns arbitrary source URLs into [`MediaDescriptor`]s.
///
/// The extraction backend is pluggable; the resolver adds URL validation, a
/// hard deadline, normalization and the process-lifetime metadata cache.
pub struct SourceResolver {
    extractor: Arc<dyn Extractor>,
    options: ExtractOptions,
    timeout: Duration,
    cache: MetadataCache,
}

impl SourceResolver {
    pub fn new(extractor: Arc<dyn Extractor>, settings: &PipelineSettings) -> Self {
        Self {
            extractor,
            options: ExtractOptions::from(settings),
            timeout: settings.resolve_timeout(),
            cache: MetadataCache::new(),
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resolve `url`, serving repeated requests from the cache.
    pub async fn resolve(&self, url: &str) -> Result<Arc<MediaDescriptor>, PipelineError> {
        let url = validate_url(url)?;
        let slot = self.cache.slot(&url).await;

        if let Some(descriptor) = slot.get() {
            debug!("Metadata cache hit for {}", url);
            return Ok(descriptor.clone());
        }

        match slot.get_or_try_init(|| self.fetch(&url)).await {
            Ok(descriptor) => Ok(descriptor.clone()),
            Err(e) => {
                self.cache.discard_empty(&url, &slot).await;
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Arc<MediaDescriptor>, PipelineError> {
        info!("Resolving {} via {}", url, self.extractor.id());

        let info = match tokio::time::timeout(
            self.timeout,
            self.extractor.extract_info(url, &self.options),
        )
        .await
        {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                warn!("Extractor {} failed for {}: {:#}", self.extractor.id(), url, e);
                return Err(PipelineError::resolution(e));
            }
            Err(_) => {
                warn!("Resolution of {} timed out after {:?}", url, self.timeout);
                return Err(PipelineError::Resolution(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f64()
                )));
            }
        };

        let descriptor = MediaDescriptor::from_info(url, info);
        if descriptor.variants.is_empty() {
            return Err(PipelineError::Resolution(
                "no downloadable formats found".to_string(),
            ));
        }

        debug!(
            "Resolved {:?} with {} variants",
            descriptor.title,
            descriptor.variants.len()
        );
        Ok(Arc::new(descriptor))
    }
}

/// Trim and check that `raw` is an absolute http(s) URL
pub fn validate_url(raw: &str) -> Result<String, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Resolution("URL is empty".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| PipelineError::Resolution(format!("Invalid URL {}: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(PipelineError::Resolution(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}
