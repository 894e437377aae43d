//! Simulation result cache.
//!
//! This module provides:
//! - TTL-bound memoization of simulation outputs per (season, inputs
//!   fingerprint, simulation count, mode)
//! - Per-key locking: concurrent readers, one writer per key, and no lock
//!   held across keys while a simulation runs
//! - Guarantees that a cheaper or partial run never satisfies a request for
//!   more simulations
//! - Hit/miss statistics and explicit invalidation

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::LeagueSnapshot;

/// What a cached value reports about the run that produced it
pub trait CachedSimulation: Clone + Send + Sync {
    fn simulations_used(&self) -> u32;
    fn is_complete(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    Standings,
    Bracket,
    Tournament {
        include_play_in: bool,
        fixed_seeding: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub season: String,
    pub fingerprint: u64,
    pub simulations: u32,
    pub mode: SimulationMode,
}

/// Hash of every input that changes a simulation result
pub fn fingerprint(snapshot: &LeagueSnapshot) -> u64 {
    let mut hasher = FxHasher::default();
    snapshot.season.hash(&mut hasher);
    for team in &snapshot.ratings {
        team.team_id.hash(&mut hasher);
        team.conference.hash(&mut hasher);
        team.rating.to_bits().hash(&mut hasher);
        team.home_advantage.to_bits().hash(&mut hasher);
    }
    match &snapshot.records {
        Some(records) => {
            1u8.hash(&mut hasher);
            for record in records {
                record.team_id.hash(&mut hasher);
                record.wins.hash(&mut hasher);
                record.losses.hash(&mut hasher);
            }
        }
        None => 0u8.hash(&mut hasher),
    }
    for game in &snapshot.schedule {
        game.home_team_id.hash(&mut hasher);
        game.away_team_id.hash(&mut hasher);
        game.date.hash(&mut hasher);
    }
    hasher.finish()
}

/// Fold request parameters (seed, supplied standings) into a fingerprint
pub fn extend_fingerprint<T: Hash>(base: u64, extra: &T) -> u64 {
    let mut hasher = FxHasher::default();
    base.hash(&mut hasher);
    extra.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

type Slot<V> = Arc<RwLock<Option<CacheEntry<V>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

pub struct SimulationCache<V> {
    name: &'static str,
    /// Write-locked only to add or drop a slot
    slots: RwLock<FxHashMap<CacheKey, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: CachedSimulation> SimulationCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn slot(&self, key: &CacheKey) -> Slot<V> {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key.clone()).or_default())
    }

    fn usable(entry: &Option<CacheEntry<V>>, key: &CacheKey) -> Option<V> {
        entry
            .as_ref()
            .filter(|e| !e.is_expired(Instant::now()))
            .filter(|e| e.value.simulations_used() >= key.simulations)
            .map(|e| e.value.clone())
    }

    fn storable(value: &V, key: &CacheKey) -> bool {
        value.is_complete() && value.simulations_used() >= key.simulations
    }

    fn record_hit(&self, key: &CacheKey) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(
            "{} cache hit: season={} mode={:?} sims={}",
            self.name, key.season, key.mode, key.simulations
        );
    }

    fn record_miss(&self, key: &CacheKey) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            "{} cache miss: season={} mode={:?} sims={}",
            self.name, key.season, key.mode, key.simulations
        );
    }

    /// Fresh value for `key`, if one exists with enough simulations
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let slot = self.slots.read().get(key).cloned();
        let value = match slot {
            Some(slot) => {
                let entry = slot.read();
                Self::usable(&entry, key)
            }
            None => None,
        };
        match &value {
            Some(_) => self.record_hit(key),
            None => self.record_miss(key),
        }
        value
    }

    /// Store a value. Partial runs and runs short of `key.simulations` are
    /// refused; returns whether the value was stored.
    pub fn put(&self, key: CacheKey, value: V, ttl: Duration) -> bool {
        if !Self::storable(&value, &key) {
            debug!(
                "{} cache refused partial result: {}/{} simulations",
                self.name,
                value.simulations_used(),
                key.simulations
            );
            return false;
        }
        let slot = self.slot(&key);
        *slot.write() = Some(CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        });
        true
    }

    /// Return the cached value or compute and store it.
    ///
    /// The key's write lock is held while `compute` runs, so concurrent
    /// callers for the same key wait for one computation instead of racing.
    /// Waiting blocks the thread; call from a blocking task, not the async
    /// runtime.
    /// With `bypass` the cached value is ignored and replaced. The flag in
    /// the result says whether the value came from the cache.
    pub fn get_or_try_insert_with<E, F>(
        &self,
        key: CacheKey,
        ttl: Duration,
        bypass: bool,
        compute: F,
    ) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(&key);

        if !bypass {
            if let Some(value) = Self::usable(&slot.read(), &key) {
                self.record_hit(&key);
                return Ok((value, true));
            }
        }

        let mut entry = slot.write();
        if !bypass {
            // Another caller may have filled the slot while we waited
            if let Some(value) = Self::usable(&entry, &key) {
                self.record_hit(&key);
                return Ok((value, true));
            }
        }
        self.record_miss(&key);

        let value = compute()?;
        if Self::storable(&value, &key) {
            *entry = Some(CacheEntry {
                value: value.clone(),
                inserted_at: Instant::now(),
                ttl,
            });
        } else {
            debug!(
                "{} cache not storing partial result: {}/{} simulations",
                self.name,
                value.simulations_used(),
                key.simulations
            );
        }
        Ok((value, false))
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.slots.write().remove(key).is_some();
        if removed {
            debug!("{} cache invalidated season={} mode={:?}", self.name, key.season, key.mode);
        }
        removed
    }

    /// Drop every entry whose mode matches
    pub fn invalidate_mode(&self, matches: impl Fn(&SimulationMode) -> bool) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|key, _| !matches(&key.mode));
        let removed = before - slots.len();
        info!("{} cache invalidated {} entries by mode", self.name, removed);
        removed
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write();
        let removed = slots.len();
        slots.clear();
        info!("{} cache cleared ({} entries)", self.name, removed);
    }

    /// Drop expired and empty slots. Slots being computed are kept.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| match slot.try_read() {
            Some(entry) => entry.as_ref().is_some_and(|e| !e.is_expired(now)),
            None => true,
        });
        let purged = before - slots.len();
        if purged > 0 {
            debug!("{} cache purged {} expired entries", self.name, purged);
        }
        purged
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .slots
            .read()
            .values()
            .filter(|slot| slot.try_read().map_or(false, |e| e.is_some()))
            .count();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
