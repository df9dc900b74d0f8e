use {
    std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    },
    tokio::time::timeout,
    tomat::{Resource, ResourceCache, ResourceState},
};

#[tokio::test]
async fn test_concurrent_first_use_loads_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cache = Arc::new(ResourceCache::new("model", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(42u32)
    }));
    assert_eq!(cache.state(), ResourceState::Uninitialized);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_init().await })
        })
        .collect();
    for handle in handles {
        let resource = timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        let Resource::Ready(value) = resource else {
            panic!("load should succeed");
        };
        assert_eq!(*value, 42);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.state(), ResourceState::Ready);
}

#[tokio::test]
async fn test_cancelled_first_caller_does_not_reload() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cache = Arc::new(ResourceCache::new("model", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
        Ok(7u32)
    }));

    let first = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_or_init().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_or_init().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    first.abort();

    let resource = timeout(Duration::from_secs(5), second)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(resource, Resource::Ready(value) if *value == 7));

    // a second load would have started by now
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.state(), ResourceState::Ready);
}

#[tokio::test]
async fn test_failure_is_memoized() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cache: ResourceCache<u32> = ResourceCache::new("model", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err("weights missing".to_string())
    });

    assert!(matches!(cache.get_or_init().await, Resource::Unavailable));
    assert!(matches!(cache.get_or_init().await, Resource::Unavailable));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.state(), ResourceState::Unavailable);
}

#[tokio::test]
async fn test_ready_cache_skips_loader() {
    let cache = ResourceCache::ready("model", "loaded".to_string());
    assert_eq!(cache.state(), ResourceState::Ready);
    assert_eq!(cache.kind(), "model");
    let Resource::Ready(value) = cache.get_or_init().await else {
        panic!("should be ready");
    };
    assert_eq!(value.as_str(), "loaded");
}

#[tokio::test]
async fn test_state_does_not_trigger_load() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cache = ResourceCache::new("model", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    assert_eq!(cache.state(), ResourceState::Uninitialized);
    assert_eq!(cache.state(), ResourceState::Uninitialized);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}
