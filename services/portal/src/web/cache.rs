//! services/portal/src/web/cache.rs
//!
//! Short-lived cache of the two public listings. A successful create
//! invalidates the matching listing so the next visit re-fetches it.

use stadion_core::domain::{Facility, Instructor};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// An instructor together with the display name from their profile.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructorListing {
    pub instructor: Instructor,
    pub display_name: Option<String>,
}

/// Invalidation count of a listing, taken before a fetch.
///
/// A fetch that started before an invalidation may have read rows from before
/// the insert, so its result is dropped instead of cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// What a cache lookup found.
pub enum Lookup<T> {
    Hit(T),
    /// Nothing fresh is cached. Hand the generation back when storing.
    Miss(Generation),
}

struct Entry<T> {
    generation: u64,
    value: Option<(Instant, T)>,
}

struct Slot<T> {
    name: &'static str,
    entry: RwLock<Entry<T>>,
}

impl<T: Clone> Slot<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: RwLock::new(Entry {
                generation: 0,
                value: None,
            }),
        }
    }

    async fn get(&self, ttl: Duration) -> Lookup<T> {
        let entry = self.entry.read().await;
        match entry.value.as_ref() {
            Some((stored_at, value)) if stored_at.elapsed() < ttl => {
                debug!(listing = self.name, "listing served from cache");
                Lookup::Hit(value.clone())
            }
            _ => Lookup::Miss(Generation(entry.generation)),
        }
    }

    async fn put(&self, generation: Generation, value: T) {
        let mut entry = self.entry.write().await;
        if entry.generation != generation.0 {
            debug!(listing = self.name, "dropping a listing fetched before invalidation");
            return;
        }
        entry.value = Some((Instant::now(), value));
    }

    async fn clear(&self) {
        let mut entry = self.entry.write().await;
        entry.generation += 1;
        if entry.value.take().is_some() {
            debug!(listing = self.name, "listing invalidated");
        }
    }
}

pub struct ListingCache {
    ttl: Duration,
    facilities: Slot<Vec<Facility>>,
    instructors: Slot<Vec<InstructorListing>>,
}

impl ListingCache {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            facilities: Slot::new("facilities"),
            instructors: Slot::new("instructors"),
        }
    }

    fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn facilities(&self) -> Lookup<Vec<Facility>> {
        if !self.enabled() {
            return Lookup::Miss(Generation(0));
        }
        self.facilities.get(self.ttl).await
    }

    pub async fn store_facilities(&self, generation: Generation, facilities: Vec<Facility>) {
        if self.enabled() {
            self.facilities.put(generation, facilities).await;
        }
    }

    pub async fn invalidate_facilities(&self) {
        self.facilities.clear().await;
    }

    pub async fn instructors(&self) -> Lookup<Vec<InstructorListing>> {
        if !self.enabled() {
            return Lookup::Miss(Generation(0));
        }
        self.instructors.get(self.ttl).await
    }

    pub async fn store_instructors(&self, generation: Generation, instructors: Vec<InstructorListing>) {
        if self.enabled() {
            self.instructors.put(generation, instructors).await;
        }
    }

    pub async fn invalidate_instructors(&self) {
        self.instructors.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn facility(name: &str) -> Facility {
        Facility {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: "Rua X, 123".into(),
            facility_type: "Quadra".into(),
            capacity: Some(10),
            description: None,
            contact_phone: None,
            contact_email: None,
            operating_hours_info: None,
            status: None,
            manager_id: Uuid::new_v4(),
            manager_name: None,
        }
    }

    fn miss<T>(lookup: Lookup<T>) -> Generation {
        match lookup {
            Lookup::Miss(generation) => generation,
            Lookup::Hit(_) => panic!("expected a cache miss"),
        }
    }

    fn hit<T>(lookup: Lookup<T>) -> T {
        match lookup {
            Lookup::Hit(value) => value,
            Lookup::Miss(_) => panic!("expected a cache hit"),
        }
    }

    #[tokio::test]
    async fn stores_until_invalidated() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let generation = miss(cache.facilities().await);

        cache.store_facilities(generation, vec![facility("Quadra A")]).await;
        let cached = hit(cache.facilities().await);
        assert_eq!(cached[0].name, "Quadra A");

        cache.invalidate_facilities().await;
        miss(cache.facilities().await);
    }

    #[tokio::test]
    async fn fetch_started_before_invalidation_is_not_cached() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let before_insert = miss(cache.facilities().await);

        cache.invalidate_facilities().await;
        cache.store_facilities(before_insert, Vec::new()).await;
        let after_insert = miss(cache.facilities().await);
        assert_ne!(before_insert, after_insert);

        cache.store_facilities(after_insert, vec![facility("Quadra A")]).await;
        assert_eq!(hit(cache.facilities().await).len(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = ListingCache::new(Duration::ZERO);
        let generation = miss(cache.facilities().await);
        cache.store_facilities(generation, vec![facility("Quadra A")]).await;
        miss(cache.facilities().await);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = ListingCache::new(Duration::from_millis(20));
        let generation = miss(cache.instructors().await);
        cache.store_instructors(generation, Vec::new()).await;
        hit(cache.instructors().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        miss(cache.instructors().await);
    }

    #[tokio::test]
    async fn listings_are_invalidated_independently() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let facilities = miss(cache.facilities().await);
        let instructors = miss(cache.instructors().await);
        cache.store_facilities(facilities, vec![facility("Quadra A")]).await;
        cache.store_instructors(instructors, Vec::new()).await;
        cache.invalidate_instructors().await;
        hit(cache.facilities().await);
        miss(cache.instructors().await);
    }
}
