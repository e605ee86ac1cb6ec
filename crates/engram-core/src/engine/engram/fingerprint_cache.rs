// ── Engram: Fingerprint Cache & Service ─────────────────────────────────────
//
// Cache: file path → Arc<FingerprintEntry>.
//   - absent  → present   on first successful extraction
//   - present → present   (new Arc) on every successful recomputation
//   - failures and invalidations swap in a stale copy of the old entry
//   - a result read before an invalidation is stored stale, never fresh
//
// Entries are never mutated in place. Readers clone the Arc under a short
// read lock, so they see either the old entry or the new one, never a mix.
//
// The service owns no timers. A file watcher or poller outside the core
// decides when to call `invalidate`, `refresh_stale` or `refresh_project`.

use super::fingerprint::{ContentSource, FingerprintExtractor};
use super::project_scan::scan_project;
use crate::atoms::engram_types::{
    FingerprintConfig, FingerprintEntry, NeuralFingerprint, RefreshReport,
};
use crate::atoms::error::EngramResult;
use log::{debug, info, warn};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Cache
// ═══════════════════════════════════════════════════════════════════════════

/// One path's slot. `entry` is `None` only while the first computation for
/// the path is in flight. `generation` changes on every invalidation.
struct Slot {
    entry: Option<Arc<FingerprintEntry>>,
    generation: u64,
}

#[derive(Default)]
struct Slots {
    map: HashMap<String, Slot>,
    /// Source of generation stamps; never reused.
    clock: u64,
}

impl Slots {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn entries(&self) -> impl Iterator<Item = (&String, &Arc<FingerprintEntry>)> {
        self.map
            .iter()
            .filter_map(|(p, slot)| slot.entry.as_ref().map(|e| (p, e)))
    }
}

/// Stamp taken before a path is read. Compared again when the result is
/// stored, so an invalidation that lands during the read is not lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket(u64);

/// What happened to a computed fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Stored as current.
    Fresh,
    /// The path was invalidated during the read; stored stale.
    Superseded,
    /// The path was removed during the read; result dropped.
    Dropped,
}

fn entry(fingerprint: NeuralFingerprint, stale: bool) -> Arc<FingerprintEntry> {
    Arc::new(FingerprintEntry {
        fingerprint,
        stale,
        computed_at: chrono::Utc::now(),
    })
}

fn stale_copy(old: Arc<FingerprintEntry>) -> Arc<FingerprintEntry> {
    if old.stale {
        return old;
    }
    Arc::new(FingerprintEntry {
        stale: true,
        ..FingerprintEntry::clone(&old)
    })
}

#[derive(Default)]
pub struct FingerprintCache {
    slots: RwLock<Slots>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<FingerprintEntry>> {
        self.slots.read().map.get(path).and_then(|s| s.entry.clone())
    }

    /// Store a fresh result, replacing any previous entry whole.
    pub fn insert(&self, path: &str, fingerprint: NeuralFingerprint) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.map.get_mut(path) {
            slot.entry = Some(entry(fingerprint, false));
            return;
        }
        let generation = slots.tick();
        slots.map.insert(
            path.to_string(),
            Slot {
                entry: Some(entry(fingerprint, false)),
                generation,
            },
        );
    }

    /// Take a ticket before reading `path`. Reserves a slot for paths seen
    /// for the first time so an invalidation during the read is recorded.
    pub fn begin_read(&self, path: &str) -> ReadTicket {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.map.get(path) {
            return ReadTicket(slot.generation);
        }
        let generation = slots.tick();
        slots.map.insert(
            path.to_string(),
            Slot {
                entry: None,
                generation,
            },
        );
        ReadTicket(generation)
    }

    /// Store a result read under `ticket`. Fresh only when nothing
    /// invalidated the path since the ticket was taken.
    pub fn commit(&self, path: &str, ticket: ReadTicket, fingerprint: NeuralFingerprint) -> Commit {
        let mut slots = self.slots.write();
        let Some(slot) = slots.map.get_mut(path) else {
            return Commit::Dropped;
        };
        let current = slot.generation == ticket.0;
        slot.entry = Some(entry(fingerprint, !current));
        if current {
            Commit::Fresh
        } else {
            Commit::Superseded
        }
    }

    /// Swap in a stale copy of the current entry. Returns false when the
    /// path has no entry (nothing to retain); a slot reserved by
    /// `begin_read` is released.
    pub fn mark_stale(&self, path: &str) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.map.get_mut(path) else {
            return false;
        };
        match slot.entry.take() {
            Some(old) => {
                slot.entry = Some(stale_copy(old));
                true
            }
            None => {
                slots.map.remove(path);
                false
            }
        }
    }

    /// Called by an external watcher when `path` changed on disk. Returns
    /// true when an existing entry was marked stale. A read of `path` that
    /// is in flight will have its result stored stale.
    pub fn invalidate(&self, path: &str) -> bool {
        let mut slots = self.slots.write();
        let generation = slots.tick();
        let Some(slot) = slots.map.get_mut(path) else {
            return false;
        };
        slot.generation = generation;
        match slot.entry.take() {
            Some(old) => {
                slot.entry = Some(stale_copy(old));
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        self.slots
            .write()
            .map
            .remove(path)
            .is_some_and(|slot| slot.entry.is_some())
    }

    pub fn stale_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .slots
            .read()
            .entries()
            .filter(|(_, e)| e.stale)
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.slots.read().entries().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths
    }

    /// Sorted copy of every fingerprint (stale ones included), so equal
    /// caches always serialize to byte-identical JSON.
    pub fn snapshot(&self) -> BTreeMap<String, NeuralFingerprint> {
        self.slots
            .read()
            .entries()
            .map(|(p, e)| (p.clone(), e.fingerprint.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════

pub struct FingerprintService {
    extractor: FingerprintExtractor,
    cache: FingerprintCache,
    source: Box<dyn ContentSource>,
    scan: FingerprintConfig,
    populated: AtomicBool,
}

impl FingerprintService {
    pub fn new(
        extractor: FingerprintExtractor,
        source: Box<dyn ContentSource>,
        scan: FingerprintConfig,
    ) -> Self {
        Self {
            extractor,
            cache: FingerprintCache::new(),
            source,
            scan,
            populated: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub fn extractor(&self) -> &FingerprintExtractor {
        &self.extractor
    }

    pub fn project_root(&self) -> &Path {
        &self.scan.project_root
    }

    /// Cache key for a path given by a caller: project-relative when the
    /// path lies under the project root, unchanged otherwise.
    pub fn key_for(&self, path: &str) -> String {
        let p = Path::new(path);
        match p.strip_prefix(&self.scan.project_root) {
            Ok(rel) if p.is_absolute() => rel.to_string_lossy().replace('\\', "/"),
            _ => path.to_string(),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let p = Path::new(key);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.scan.project_root.join(p)
        }
    }

    fn compute(&self, key: &str) -> EngramResult<NeuralFingerprint> {
        self.extractor
            .extract_file(self.source.as_ref(), &self.resolve(key))
    }

    /// Recompute the given paths. Each file succeeds or fails on its own.
    pub fn refresh(&self, keys: &[String]) -> RefreshReport {
        let results: Vec<(&String, ReadTicket, EngramResult<NeuralFingerprint>)> = keys
            .par_iter()
            .map(|k| {
                let ticket = self.cache.begin_read(k);
                (k, ticket, self.compute(k))
            })
            .collect();

        let mut report = RefreshReport::default();
        for (key, ticket, result) in results {
            match result {
                Ok(fp) => match self.cache.commit(key, ticket, fp) {
                    Commit::Fresh => report.updated += 1,
                    Commit::Superseded => {
                        report.superseded += 1;
                        debug!("[engram:fingerprint] {} changed during read, left stale", key);
                    }
                    Commit::Dropped => {}
                },
                Err(e) => {
                    report.failed += 1;
                    if self.cache.mark_stale(key) {
                        report.stale_retained += 1;
                        warn!("[engram:fingerprint] {} (keeping stale entry)", e);
                    } else {
                        warn!("[engram:fingerprint] {}", e);
                    }
                }
            }
        }
        report
    }

    /// Recompute every entry that was invalidated or failed last time.
    pub fn refresh_stale(&self) -> RefreshReport {
        let stale = self.cache.stale_paths();
        if stale.is_empty() {
            return RefreshReport::default();
        }
        self.refresh(&stale)
    }

    /// Rescan the project and recompute everything; drop entries whose file
    /// left the project.
    pub fn refresh_project(&self) -> EngramResult<RefreshReport> {
        let files = scan_project(&self.scan)?;
        let current: HashSet<&str> = files.iter().map(|s| s.as_str()).collect();

        let mut removed = 0;
        for path in self.cache.paths() {
            if !current.contains(path.as_str()) && self.cache.remove(&path) {
                removed += 1;
            }
        }

        let mut report = self.refresh(&files);
        report.removed = removed;
        self.populated.store(true, Ordering::Release);

        info!(
            "[engram:fingerprint] Project refresh: {} updated, {} superseded, {} failed, {} stale kept, {} removed",
            report.updated, report.superseded, report.failed, report.stale_retained, report.removed
        );
        Ok(report)
    }

    /// Populate on first use, then only recompute stale entries.
    pub fn fingerprint_map(&self) -> EngramResult<BTreeMap<String, NeuralFingerprint>> {
        if !self.populated.load(Ordering::Acquire) {
            self.refresh_project()?;
        } else {
            self.refresh_stale();
        }
        Ok(self.cache.snapshot())
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }
}
