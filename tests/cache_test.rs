use commonlog::cache::{self, Cache, MemoryCache};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_set_global_replaces_shared_cache() {
    let first = cache::global();
    assert!(Arc::ptr_eq(&first, &cache::global()));
    assert!(cache::sweep_running());

    let replacement: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    cache::set_global(replacement.clone());
    assert!(Arc::ptr_eq(&cache::global(), &replacement));
    // A custom cache manages its own expiry
    assert!(!cache::sweep_running());

    replacement.set("commonlog_lark_chat_id:prod:ops", "oc_1", None);
    assert_eq!(cache::global().get("commonlog_lark_chat_id:prod:ops").as_deref(), Some("oc_1"));
}

#[tokio::test]
async fn test_sweeper_stops_on_request() {
    let cache = Arc::new(MemoryCache::new());
    cache.set("k", "v", Some(Duration::from_millis(10)));

    let handle = cache.spawn_sweeper(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(cache.is_empty());

    handle.stop().await;
}
