//! Local file cache for remote GRIB2 products.
//!
//! Files live at `<root>/<YYYYMMDD>/<file name>`. A present, non-empty file
//! is returned as-is without contacting the remote store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use forecast_common::{ForecastError, ForecastResult, HrrrProduct};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::RemoteStore;

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bytes_downloaded: u64,
    pub evicted_runs: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Write-once cache of remote GRIB2 files keyed by (run date, forecast hour).
pub struct GribFileCache {
    root: PathBuf,
    remote: Arc<dyn RemoteStore>,
    /// Evict old run-date directories above this many bytes
    size_limit: Option<u64>,
    key_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    stats: Mutex<CacheStats>,
}

impl GribFileCache {
    pub fn new(root: impl Into<PathBuf>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            root: root.into(),
            remote,
            size_limit: None,
            key_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn with_size_limit(mut self, limit: Option<u64>) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic local path of a product.
    pub fn local_path(&self, product: &HrrrProduct) -> PathBuf {
        self.root.join(product.cache_relative_path())
    }

    /// Return the local path of `product`, downloading it on a miss.
    ///
    /// Concurrent calls for the same product share one download.
    #[instrument(skip(self), fields(product = %product.object_key()))]
    pub async fn get_local_path(&self, product: &HrrrProduct) -> ForecastResult<PathBuf> {
        let path = self.local_path(product);
        let lock = self.key_lock(&path);
        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(product, path.clone()).await
        };
        self.release_key_lock(&path, lock);
        result
    }

    /// Hit check and download; the caller holds the key lock.
    async fn fetch_locked(&self, product: &HrrrProduct, path: PathBuf) -> ForecastResult<PathBuf> {
        if is_present(&path).await {
            debug!(path = %path.display(), "Cache hit");
            self.record(|s| s.hits += 1);
            metrics::counter!("grib_cache_hits_total").increment(1);
            return Ok(path);
        }

        self.record(|s| s.misses += 1);
        metrics::counter!("grib_cache_misses_total").increment(1);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(&path);
        let key = product.object_key();
        let bytes = match self.remote.download(&key, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                fs::remove_file(&partial).await.ok();
                return Err(e);
            }
        };
        fs::rename(&partial, &path).await?;

        self.record(|s| s.bytes_downloaded += bytes);
        info!(path = %path.display(), bytes, "Cached remote file");

        if self.size_limit.is_some() {
            let keep = product.run.date_stamp();
            if let Err(e) = self.evict_over_limit(&keep).await {
                warn!(error = %e, "Cache eviction failed");
            }
        }

        Ok(path)
    }

    /// Remove whole run-date directories, oldest first, until the cache
    /// is under its size limit. The `keep` directory is never removed.
    pub async fn evict_over_limit(&self, keep: &str) -> ForecastResult<u64> {
        let Some(limit) = self.size_limit else {
            return Ok(0);
        };

        let root = self.root.clone();
        let keep = keep.to_string();
        let evicted = tokio::task::spawn_blocking(move || evict_run_dirs(&root, limit, &keep))
            .await
            .map_err(|e| ForecastError::Io(format!("Eviction task failed: {}", e)))??;

        if evicted > 0 {
            self.record(|s| s.evicted_runs += evicted);
        }
        Ok(evicted)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        update(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn key_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drop the map entry once no other caller holds or waits on it.
    fn release_key_lock(&self, path: &Path, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.key_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

async fn is_present(path: &Path) -> bool {
    matches!(fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

fn evict_run_dirs(root: &Path, limit: u64, keep: &str) -> ForecastResult<u64> {
    let mut runs: Vec<(String, PathBuf, u64)> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let size = dir_size(&entry.path());
            (name, entry.path(), size)
        })
        .collect();

    // YYYYMMDD names sort chronologically
    runs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut total: u64 = runs.iter().map(|(_, _, size)| size).sum();
    let mut evicted = 0;

    for (name, path, size) in runs {
        if total <= limit {
            break;
        }
        if name == keep {
            continue;
        }
        std::fs::remove_dir_all(&path)?;
        total = total.saturating_sub(size);
        evicted += 1;
        info!(run_date = %name, bytes = size, "Evicted cached run");
    }

    Ok(evicted)
}
