//! Bounded pool of reusable detector instances.
//!
//! Each detector kind has its own free list. Workers borrow an instance with
//! [`DetectorPool::acquire`] and the returned [`DetectorHandle`] puts it back
//! when dropped, so an early return or a panic cannot leak it. When every
//! instance of a kind is busy, `acquire` waits briefly and then builds a
//! throwaway overflow instance instead of failing.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::analysis::CollectedFacts;
use crate::config::{DetectorConfig, RuntimeConfig};
use crate::error::{ConfigError, DetectorError, PoolError};

use super::traits::create;
use super::{Detector, DetectorKind, Violation};

/// Lifetime counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pooled instances constructed (warm and on demand).
    pub created: u64,
    /// Acquisitions served from a free list.
    pub reused: u64,
    /// Temporary instances built because a kind was exhausted.
    pub overflow: u64,
    /// Instances thrown away after a panic.
    pub discarded: u64,
}

struct Pooled {
    id: u64,
    detector: Box<dyn Detector>,
}

#[derive(Default)]
struct SlotState {
    idle: Vec<Pooled>,
    /// Pooled instances in existence, idle or lent out. Overflow instances
    /// are not counted.
    live: usize,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    available: Condvar,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    reused: AtomicU64,
    overflow: AtomicU64,
    discarded: AtomicU64,
}

/// Builds one detector instance for a kind.
pub(crate) type Factory = fn(DetectorKind, &DetectorConfig) -> Result<Box<dyn Detector>, ConfigError>;

pub struct DetectorPool {
    config: Arc<DetectorConfig>,
    factory: Factory,
    max_instances: usize,
    acquire_timeout: Duration,
    slots: BTreeMap<DetectorKind, Slot>,
    next_id: AtomicU64,
    counters: Counters,
}

impl DetectorPool {
    /// Build a pool and pre-construct `pool_warm_instances` per kind.
    ///
    /// Every kind is constructed at least once here, so a configuration
    /// a detector cannot compile fails now rather than mid-run.
    pub fn new(config: Arc<DetectorConfig>, runtime: &RuntimeConfig) -> Result<Self, ConfigError> {
        Self::with_factory(config, runtime, create)
    }

    pub(crate) fn with_factory(
        config: Arc<DetectorConfig>,
        runtime: &RuntimeConfig,
        factory: Factory,
    ) -> Result<Self, ConfigError> {
        let pool = Self {
            config,
            factory,
            max_instances: runtime.pool_max_instances.max(1),
            acquire_timeout: Duration::from_millis(runtime.acquire_timeout_ms),
            slots: DetectorKind::ALL
                .into_iter()
                .map(|k| (k, Slot::default()))
                .collect(),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        };

        let warm = runtime.pool_warm_instances.min(pool.max_instances);
        for (kind, slot) in &pool.slots {
            if warm == 0 {
                (pool.factory)(*kind, &pool.config)?;
                continue;
            }
            let mut state = slot.state.lock();
            for _ in 0..warm {
                let item = pool.build(*kind)?;
                state.idle.push(item);
                state.live += 1;
            }
        }

        tracing::debug!(
            warm,
            max = pool.max_instances,
            kinds = pool.slots.len(),
            "detector pool ready"
        );
        Ok(pool)
    }

    fn build(&self, kind: DetectorKind) -> Result<Pooled, ConfigError> {
        let detector = (self.factory)(kind, &self.config)?;
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        Ok(Pooled {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            detector,
        })
    }

    fn slot(&self, kind: DetectorKind) -> &Slot {
        // Every kind gets a slot in `new`.
        &self.slots[&kind]
    }

    /// Borrow an instance of `kind`.
    pub fn acquire(&self, kind: DetectorKind) -> Result<DetectorHandle<'_>, PoolError> {
        let slot = self.slot(kind);
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = slot.state.lock();

        loop {
            if let Some(item) = state.idle.pop() {
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                return Ok(self.handle(kind, item, false));
            }

            if state.live < self.max_instances {
                state.live += 1;
                drop(state);
                return match self.build(kind) {
                    Ok(item) => Ok(self.handle(kind, item, false)),
                    Err(source) => {
                        slot.state.lock().live -= 1;
                        slot.available.notify_one();
                        Err(PoolError::Creation { kind, source })
                    }
                };
            }

            if slot.available.wait_until(&mut state, deadline).timed_out()
                && state.idle.is_empty()
                && state.live >= self.max_instances
            {
                break;
            }
        }
        drop(state);

        let detector = (self.factory)(kind, &self.config).map_err(|source| PoolError::Creation { kind, source })?;
        self.counters.overflow.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%kind, "pool exhausted, using overflow instance");
        let item = Pooled {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            detector,
        };
        Ok(self.handle(kind, item, true))
    }

    fn handle(&self, kind: DetectorKind, item: Pooled, overflow: bool) -> DetectorHandle<'_> {
        DetectorHandle {
            pool: self,
            kind,
            item: Some(item),
            overflow,
            poisoned: false,
        }
    }

    /// Return an instance explicitly. Dropping the handle does the same.
    pub fn release(&self, handle: DetectorHandle<'_>) {
        drop(handle);
    }

    fn give_back(&self, kind: DetectorKind, mut item: Pooled, overflow: bool, poisoned: bool) {
        if overflow {
            tracing::trace!(%kind, id = item.id, "overflow instance dropped");
            return;
        }

        let slot = self.slot(kind);
        if poisoned {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            slot.state.lock().live -= 1;
            slot.available.notify_one();
            tracing::trace!(%kind, id = item.id, "discarded detector instance");
            return;
        }

        item.detector.reset();
        slot.state.lock().idle.push(item);
        slot.available.notify_one();
    }

    /// Run one detector over one file's facts.
    ///
    /// The instance is reset before use. A panic inside the detector is
    /// caught, the instance is discarded, and the panic comes back as
    /// [`DetectorError::Panicked`].
    pub fn evaluate(
        &self,
        kind: DetectorKind,
        facts: &CollectedFacts,
    ) -> Result<Vec<Violation>, DetectorError> {
        let mut handle = self.acquire(kind)?;
        let config = &*self.config;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let detector = handle.detector();
            detector.reset();
            detector.detect(facts, config)
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                handle.discard();
                Err(DetectorError::Panicked {
                    kind,
                    message: panic_message(payload.as_ref()),
                })
            }
        }
    }

    /// Idle instances currently held for `kind`.
    pub fn idle_count(&self, kind: DetectorKind) -> usize {
        self.slot(kind).state.lock().idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.counters.created.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            overflow: self.counters.overflow.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }

    /// Drop every pooled instance and report final counters.
    pub fn shutdown(self) -> PoolStats {
        let stats = self.stats();
        for slot in self.slots.values() {
            slot.state.lock().idle.clear();
        }
        tracing::debug!(?stats, "detector pool shut down");
        stats
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A borrowed detector instance. Returns itself to the pool on drop.
pub struct DetectorHandle<'p> {
    pool: &'p DetectorPool,
    kind: DetectorKind,
    item: Option<Pooled>,
    overflow: bool,
    poisoned: bool,
}

impl DetectorHandle<'_> {
    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    /// Stable identity of the underlying instance.
    pub fn instance_id(&self) -> u64 {
        self.item.as_ref().map(|i| i.id).unwrap_or(0)
    }

    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    pub fn detector(&mut self) -> &mut dyn Detector {
        match self.item.as_mut() {
            Some(item) => item.detector.as_mut(),
            // The item is only taken in `drop`.
            None => unreachable!("detector handle used after release"),
        }
    }

    /// Drop the instance instead of returning it to the pool.
    pub fn discard(mut self) {
        self.poisoned = true;
    }
}

impl Drop for DetectorHandle<'_> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool
                .give_back(self.kind, item, self.overflow, self.poisoned);
        }
    }
}
