use agora_core::{Datastore, FixedClock, SpaceCache, Space, SqliteDatastore};
use chrono::Duration;
use std::sync::Arc;

#[test]
fn cached_spaces_refresh_after_ttl() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let clock = Arc::new(FixedClock::at_date(2024, 5, 13));
    let cache = SpaceCache::new(30, clock.clone());
    store.create(&Space::new("s1", "Ops")).unwrap();

    assert_eq!(cache.spaces(&store).unwrap().len(), 1);
    store.create(&Space::new("s2", "Dev")).unwrap();

    clock.advance(Duration::seconds(29));
    assert_eq!(cache.spaces(&store).unwrap().len(), 1);
    assert!(!cache.contains(&store, "s2:Dev").unwrap());

    clock.advance(Duration::seconds(1));
    assert_eq!(cache.spaces(&store).unwrap().len(), 2);
    assert!(cache.contains(&store, "s2:Dev").unwrap());
}

#[test]
fn invalidate_forces_reload() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let clock = Arc::new(FixedClock::at_date(2024, 5, 13));
    let cache = SpaceCache::new(300, clock);

    assert!(cache.spaces(&store).unwrap().is_empty());
    store.create(&Space::new("s1", "Ops")).unwrap();
    assert!(cache.spaces(&store).unwrap().is_empty());

    cache.invalidate();
    assert_eq!(
        cache.resolve(&store, "s1").unwrap().as_deref(),
        Some("s1:Ops")
    );
    assert!(cache.contains(&store, "default").unwrap());
}
