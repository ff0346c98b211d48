//! Worker-keyed pool of output transform instances.
//!
//! The transform itself (tree + mode → final bytes) is an external
//! collaborator and typically not shareable across threads, so the pool
//! keeps one instance per worker thread. A configuration reload calls
//! [`TransformPool::invalidate`], which bumps a generation counter;
//! stale instances are rebuilt lazily on next use instead of being torn
//! down eagerly.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;
use trellis_api::{Element, RenderMode};

/// External transform turning a markup tree into response bytes.
pub trait Transform: Send {
    fn apply(&mut self, tree: &Element, mode: RenderMode) -> anyhow::Result<Vec<u8>>;
}

type TransformFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn Transform>> + Send + Sync>;

struct Slot {
    generation: u64,
    transform: Box<dyn Transform>,
}

pub struct TransformPool {
    factory: TransformFactory,
    slots: DashMap<ThreadId, Slot>,
    generation: AtomicU64,
}

impl TransformPool {
    pub fn new(factory: impl Fn() -> anyhow::Result<Box<dyn Transform>> + Send + Sync + 'static) -> Self {
        TransformPool {
            factory: Box::new(factory),
            slots: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `f` with this worker's transform instance, creating or
    /// rebuilding it first if missing or stale.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut dyn Transform) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        let generation = self.generation.load(Ordering::Acquire);
        let key = std::thread::current().id();

        let stale = match self.slots.get(&key) {
            Some(slot) => slot.generation != generation,
            None => true,
        };
        if stale {
            let transform = (self.factory)()?;
            self.slots.insert(
                key,
                Slot {
                    generation,
                    transform,
                },
            );
        }

        let mut slot = self.slots.get_mut(&key).expect("slot present for this worker");
        f(slot.transform.as_mut())
    }

    /// Mark every pooled instance stale. Called on configuration reload.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        tracing::debug!("transform pool invalidated");
    }
}
