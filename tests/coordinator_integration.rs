use fanout_cache::{
    CacheConfig, CacheKey, CoordinatorConfig, FanoutExecutor, FetchCoordinator, FetchError,
};
use futures::future::join_all;
use pretty_assertions::assert_eq;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn coordinator_with(capacity: usize, ttl: Duration, workers: usize) -> FetchCoordinator<String> {
    FetchCoordinator::new(
        CoordinatorConfig {
            cache: CacheConfig {
                capacity,
                default_ttl: ttl,
            },
            ..CoordinatorConfig::default()
        },
        Arc::new(FanoutExecutor::with_workers(workers)),
    )
}

/// Resolves `key` with a fetch that counts its invocations
async fn resolve_counted(
    coordinator: &FetchCoordinator<String>,
    key: &str,
    calls: &Arc<AtomicUsize>,
) -> Result<Arc<Vec<String>>, FetchError> {
    let calls = Arc::clone(calls);
    let label = key.to_string();
    coordinator
        .resolve(
            CacheKey::new(key),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FetchError>(vec![label])
            },
            |raw: String| Ok::<_, String>(raw.to_uppercase()),
            |item: &String| item.clone(),
        )
        .await
}

#[tokio::test]
async fn capacity_two_evicts_least_recently_accessed_key() {
    let _ = env_logger::builder().is_test(true).try_init();
    let coordinator = coordinator_with(2, Duration::from_millis(1000), 5);
    let calls = Arc::new(AtomicUsize::new(0));

    resolve_counted(&coordinator, "A", &calls).await.unwrap();
    resolve_counted(&coordinator, "B", &calls).await.unwrap();
    resolve_counted(&coordinator, "C", &calls).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert!(coordinator.cached(&CacheKey::new("A")).await.is_none());
    assert_eq!(coordinator.cache_stats().await.evictions, 1);

    let a = resolve_counted(&coordinator, "A", &calls).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(*a, vec!["A".to_string()]);
}

#[tokio::test]
async fn cache_hit_refreshes_recency() {
    let coordinator = coordinator_with(2, Duration::from_secs(60), 5);
    let calls = Arc::new(AtomicUsize::new(0));

    resolve_counted(&coordinator, "A", &calls).await.unwrap();
    resolve_counted(&coordinator, "B", &calls).await.unwrap();
    // hit on A makes B the eviction candidate
    resolve_counted(&coordinator, "A", &calls).await.unwrap();
    resolve_counted(&coordinator, "C", &calls).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(coordinator.cached(&CacheKey::new("B")).await.is_none());
    assert!(coordinator.cached(&CacheKey::new("A")).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fanout_is_index_stable_before_the_final_sort() {
    let coordinator: FetchCoordinator<(usize, u32)> = FetchCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(FanoutExecutor::with_workers(5)),
    );

    let raw: Vec<u32> = {
        let mut rng = rand::thread_rng();
        (0..40).map(|_| rng.gen_range(0..1000)).collect()
    };
    let completions = Arc::new(Mutex::new(Vec::new()));

    let fetched = raw.clone();
    let completions_in = Arc::clone(&completions);
    let result = coordinator
        .resolve(
            CacheKey::new("scores"),
            move || async move {
                Ok::<_, FetchError>(fetched.into_iter().enumerate().collect::<Vec<_>>())
            },
            move |(index, score): (usize, u32)| {
                let delay = rand::thread_rng().gen_range(0..10);
                std::thread::sleep(Duration::from_millis(delay));
                completions_in.lock().unwrap().push(index);
                Ok::<_, String>((index, score * 2))
            },
            |item: &(usize, u32)| item.1,
        )
        .await
        .unwrap();

    // transformed values carry their input index, so the fan-in kept every
    // item paired with the right source element
    for (index, doubled) in result.iter() {
        assert_eq!(*doubled, raw[*index] * 2);
    }

    let mut expected: Vec<(usize, u32)> = raw.iter().enumerate().map(|(i, s)| (i, s * 2)).collect();
    expected.sort_by(|a, b| b.1.cmp(&a.1));
    assert_eq!(*result, expected);

    assert_eq!(completions.lock().unwrap().len(), 40);
}

#[tokio::test]
async fn failed_fetch_is_retried_by_next_caller() {
    let coordinator = coordinator_with(10, Duration::from_secs(60), 2);
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_in = Arc::clone(&calls);
    let failed = coordinator
        .resolve(
            CacheKey::new("flaky"),
            move || async move {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Err::<Vec<String>, _>(anyhow::anyhow!("connection reset"))
            },
            |raw: String| Ok::<_, String>(raw),
            |item: &String| item.clone(),
        )
        .await;
    assert_eq!(
        failed,
        Err(FetchError::Upstream("connection reset".to_string()))
    );
    assert!(coordinator.cached(&CacheKey::new("flaky")).await.is_none());

    resolve_counted(&coordinator, "flaky", &calls).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn many_keys_resolve_independently() {
    let coordinator = coordinator_with(100, Duration::from_secs(60), 5);
    let calls = Arc::new(AtomicUsize::new(0));

    let keys: Vec<String> = (0..10).map(|i| format!("key-{}", i % 5)).collect();
    let results = join_all(keys.iter().map(|k| resolve_counted(&coordinator, k, &calls))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    // five distinct keys, each fetched once or served from cache / in-flight
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(coordinator.in_flight_count().await, 0);
}
