//! Process-local invalidation tracking
//!
//! Each object type owns an [`InvalidationTracker`]: per-object and per-parent
//! stale timestamps, one "everything stale since" timestamp and a live
//! instance counter. Writers come from arbitrary threads; tables are
//! [`DashMap`]s and counters are atomics, so no exclusive lock is taken.
//!
//! A check always consults the type-wide timestamp before the granular ones.

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

const NEVER: i64 = i64::MIN;

/// Strictly increasing wall clock. Two calls never return the same instant.
#[derive(Debug)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(NEVER),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Acquire);
        loop {
            let next = if wall > last { wall } else { last + 1 };
            match self.last_micros.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return from_micros(next),
                Err(current) => last = current,
            }
        }
    }
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos).single().unwrap_or_else(Utc::now)
}

/// Invalidation event exchanged with cooperating processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidationTask {
    Object { object_type: String, object_id: i64 },
    Children { object_type: String, parent_id: i64 },
    All { object_type: String },
}

impl InvalidationTask {
    pub fn object_type(&self) -> &str {
        match self {
            InvalidationTask::Object { object_type, .. }
            | InvalidationTask::Children { object_type, .. }
            | InvalidationTask::All { object_type } => object_type,
        }
    }
}

/// Outbound channel to other processes (web farm, pub/sub)
pub trait InvalidationBroadcaster: Send + Sync {
    fn broadcast(&self, task: &InvalidationTask);
}

/// Broadcaster for single-process deployments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl InvalidationBroadcaster for NoopBroadcaster {
    fn broadcast(&self, _task: &InvalidationTask) {}
}

/// Keeps the live instance counter up while held
#[derive(Debug)]
pub struct InstanceHandle {
    counter: Arc<AtomicUsize>,
}

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Stale-data bookkeeping for one object type
pub struct InvalidationTracker {
    object_type: String,
    clock: Arc<MonotonicClock>,
    broadcaster: Arc<dyn InvalidationBroadcaster>,
    objects: DashMap<i64, DateTime<Utc>>,
    children: DashMap<i64, DateTime<Utc>>,
    all_invalidated: AtomicI64,
    instances: Arc<AtomicUsize>,
}

impl std::fmt::Debug for InvalidationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationTracker")
            .field("object_type", &self.object_type)
            .field("objects", &self.objects.len())
            .field("children", &self.children.len())
            .field("all_invalidated", &self.all_invalidated_at())
            .field("instances", &self.instance_count())
            .finish()
    }
}

impl InvalidationTracker {
    pub fn new(
        object_type: impl Into<String>,
        clock: Arc<MonotonicClock>,
        broadcaster: Arc<dyn InvalidationBroadcaster>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            clock,
            broadcaster,
            objects: DashMap::new(),
            children: DashMap::new(),
            all_invalidated: AtomicI64::new(NEVER),
            instances: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Mark one object stale as of now and tell the other processes
    pub fn object_invalidated(&self, object_id: i64) -> DateTime<Utc> {
        let at = self.record_object(object_id);
        self.broadcaster.broadcast(&InvalidationTask::Object {
            object_type: self.object_type.clone(),
            object_id,
        });
        at
    }

    /// Mark the direct children of `parent_id` stale as of now
    pub fn children_invalidated(&self, parent_id: i64) -> DateTime<Utc> {
        let at = self.record_children(parent_id);
        self.broadcaster.broadcast(&InvalidationTask::Children {
            object_type: self.object_type.clone(),
            parent_id,
        });
        at
    }

    /// Mark every object of the type stale as of now
    pub fn invalidate_all_objects(&self) -> DateTime<Utc> {
        let at = self.record_all();
        self.broadcaster.broadcast(&InvalidationTask::All {
            object_type: self.object_type.clone(),
        });
        at
    }

    /// Apply a task received from another process; never re-broadcast
    pub fn apply_remote(&self, task: &InvalidationTask) -> DateTime<Utc> {
        match task {
            InvalidationTask::Object { object_id, .. } => self.record_object(*object_id),
            InvalidationTask::Children { parent_id, .. } => self.record_children(*parent_id),
            InvalidationTask::All { .. } => self.record_all(),
        }
    }

    /// Whether data for `object_id` that was valid at `last_valid` is stale
    pub fn is_object_invalid(&self, object_id: i64, last_valid: DateTime<Utc>) -> bool {
        if self.all_invalid_since(last_valid) {
            return true;
        }
        self.objects
            .get(&object_id)
            .is_some_and(|at| *at >= last_valid)
    }

    /// Whether children of `parent_id` loaded at `last_valid` are stale
    pub fn children_invalid(&self, parent_id: i64, last_valid: DateTime<Utc>) -> bool {
        if self.all_invalid_since(last_valid) {
            return true;
        }
        self.children
            .get(&parent_id)
            .is_some_and(|at| *at >= last_valid)
    }

    pub fn all_invalidated_at(&self) -> Option<DateTime<Utc>> {
        match self.all_invalidated.load(Ordering::Acquire) {
            NEVER => None,
            micros => Some(from_micros(micros)),
        }
    }

    /// Count one live instance until the handle drops
    pub fn track_instance(&self) -> InstanceHandle {
        self.instances.fetch_add(1, Ordering::AcqRel);
        InstanceHandle {
            counter: Arc::clone(&self.instances),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.load(Ordering::Acquire)
    }

    fn all_invalid_since(&self, last_valid: DateTime<Utc>) -> bool {
        self.all_invalidated_at().is_some_and(|at| at >= last_valid)
    }

    fn record_object(&self, object_id: i64) -> DateTime<Utc> {
        let at = self.clock.now();
        trace!(object_type = %self.object_type, object_id, "object invalidated");
        upsert_newest(&self.objects, object_id, at);
        at
    }

    fn record_children(&self, parent_id: i64) -> DateTime<Utc> {
        let at = self.clock.now();
        trace!(object_type = %self.object_type, parent_id, "children invalidated");
        upsert_newest(&self.children, parent_id, at);
        at
    }

    fn record_all(&self) -> DateTime<Utc> {
        let at = self.clock.now();
        trace!(object_type = %self.object_type, "all objects invalidated");
        self.all_invalidated
            .fetch_max(at.timestamp_micros(), Ordering::AcqRel);
        at
    }
}

fn upsert_newest(table: &DashMap<i64, DateTime<Utc>>, key: i64, at: DateTime<Utc>) {
    table
        .entry(key)
        .and_modify(|existing| {
            if at > *existing {
                *existing = at;
            }
        })
        .or_insert(at);
}
