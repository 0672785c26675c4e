//! Remote file cache behaviour against stub and in-memory remotes.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use forecast_common::{ForecastError, ForecastResult, RunIdentifier};
use object_store::memory::InMemory;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage::{GribFileCache, ObjectStorage, RemoteStore};

/// Remote that counts downloads and writes a fixed body.
struct CountingRemote {
    downloads: AtomicUsize,
    body: Vec<u8>,
    fail: bool,
}

impl CountingRemote {
    fn new(body: &[u8]) -> Self {
        Self {
            downloads: AtomicUsize::new(0),
            body: body.to_vec(),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(b"")
        }
    }

    fn count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for CountingRemote {
    async fn head(&self, _key: &str) -> ForecastResult<bool> {
        Ok(true)
    }

    async fn download(&self, key: &str, local_path: &Path) -> ForecastResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if self.fail {
            tokio::fs::write(local_path, b"trunc").await?;
            return Err(ForecastError::Transfer(format!("connection reset reading {}", key)));
        }
        tokio::fs::write(local_path, &self.body).await?;
        Ok(self.body.len() as u64)
    }

    async fn get(&self, _key: &str) -> ForecastResult<Bytes> {
        Ok(Bytes::from(self.body.clone()))
    }

    fn bucket(&self) -> &str {
        "stub"
    }
}

fn run(day: u32) -> RunIdentifier {
    RunIdentifier::new(NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), 6)
}

#[tokio::test]
async fn test_second_call_is_a_hit() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::new(b"GRIB...7777"));
    let cache = GribFileCache::new(dir.path(), remote.clone());
    let product = run(1).product(0);

    let first = cache.get_local_path(&product).await.unwrap();
    let second = cache.get_local_path(&product).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, dir.path().join("20250101").join("hrrr.t06z.wrfsfcf00.grib2"));
    assert_eq!(remote.count(), 1);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.bytes_downloaded, 11);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_download() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::new(b"GRIB...7777"));
    let cache = Arc::new(GribFileCache::new(dir.path(), remote.clone()));
    let product = run(1).product(3);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_local_path(&product).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(remote.count(), 1);
}

#[tokio::test]
async fn test_distinct_hours_download_separately() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::new(b"GRIB"));
    let cache = GribFileCache::new(dir.path(), remote.clone());

    cache.get_local_path(&run(1).product(0)).await.unwrap();
    cache.get_local_path(&run(1).product(1)).await.unwrap();

    assert_eq!(remote.count(), 2);
}

#[tokio::test]
async fn test_failed_download_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::failing());
    let cache = GribFileCache::new(dir.path(), remote.clone());
    let product = run(1).product(0);

    let result = cache.get_local_path(&product).await;

    assert!(matches!(result, Err(ForecastError::Transfer(_))));
    let day_dir = dir.path().join("20250101");
    assert_eq!(std::fs::read_dir(&day_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_empty_file_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::new(b"GRIB"));
    let cache = GribFileCache::new(dir.path(), remote.clone());
    let product = run(1).product(0);

    let path = cache.local_path(&product);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"").unwrap();

    cache.get_local_path(&product).await.unwrap();
    assert_eq!(remote.count(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), b"GRIB");
}

#[tokio::test]
async fn test_size_limit_evicts_older_runs() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(CountingRemote::new(&[0u8; 1000]));
    let cache = GribFileCache::new(dir.path(), remote.clone()).with_size_limit(Some(1500));

    cache.get_local_path(&run(1).product(0)).await.unwrap();
    cache.get_local_path(&run(2).product(0)).await.unwrap();

    assert!(!dir.path().join("20250101").exists());
    assert!(dir.path().join("20250102").exists());
    assert_eq!(cache.stats().evicted_runs, 1);
}

#[tokio::test]
async fn test_object_storage_backed_cache() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ObjectStorage::from_store(Arc::new(InMemory::new()), "noaa-hrrr-bdp-pds");
    let product = run(1).product(0);
    storage
        .put(&product.object_key(), Bytes::from_static(b"GRIB-body-7777"))
        .await
        .unwrap();

    let cache = GribFileCache::new(dir.path(), Arc::new(storage));
    let path = cache.get_local_path(&product).await.unwrap();

    assert_eq!(std::fs::read(path).unwrap(), b"GRIB-body-7777");

    let missing = cache.get_local_path(&run(1).product(1)).await;
    assert!(matches!(missing, Err(ForecastError::MissingObject(_))));
}
