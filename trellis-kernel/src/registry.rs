//! The page registry: concurrent handle → context store with expiration.
//!
//! Membership operations go through a sharded concurrent map, so unrelated
//! pages never serialize against each other. Per-page mutation is guarded
//! separately by each context's execution lock (see [`crate::scope`]); the
//! registry itself never holds that lock while scanning.

use crate::error::KernelError;
use crate::page::Page;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use trellis_api::Handle;

/// Where a context is in its lifecycle. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, first full build not yet completed.
    Created,
    /// Serving interactions.
    Active,
    /// Removed (explicitly or by sweep). No further mutation.
    Removed,
}

/// Notified once per context the registry actually removes.
pub trait RemovalListener: Send + Sync {
    fn on_removed(&self, ctx: &PageContext) -> anyhow::Result<()>;
}

/// Request-scoped auxiliary objects, keyed by type. Populated once at
/// context creation, read-only thereafter.
#[derive(Default)]
pub struct ScopedValues {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ScopedValues {
    pub fn seed<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }
}

struct PageMeta {
    expires_at: DateTime<Utc>,
    update_count: u64,
    state: LifecycleState,
}

/// The server-side record owning one page instance's lifecycle metadata.
pub struct PageContext {
    handle: Handle,
    remote_addr: String,
    values: ScopedValues,
    meta: Mutex<PageMeta>,
    /// The owned page, behind the per-context execution lock. `None`
    /// until initialization installs it.
    page: tokio::sync::Mutex<Option<Page>>,
}

impl PageContext {
    fn new(handle: Handle, remote_addr: &str, expires_at: DateTime<Utc>, values: ScopedValues) -> Self {
        PageContext {
            handle,
            remote_addr: remote_addr.to_string(),
            values,
            meta: Mutex::new(PageMeta {
                expires_at,
                update_count: 0,
                state: LifecycleState::Created,
            }),
            page: tokio::sync::Mutex::new(None),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Remote address the context was created from.
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn values(&self) -> &ScopedValues {
        &self.values
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.meta.lock().unwrap().expires_at
    }

    /// Optimistic version marker; bumped by every successful refresh.
    pub fn update_count(&self) -> u64 {
        self.meta.lock().unwrap().update_count
    }

    pub fn state(&self) -> LifecycleState {
        self.meta.lock().unwrap().state
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.meta.lock().unwrap().expires_at
    }

    /// Push expiration out and bump the version. `None` once removed.
    pub fn refresh(&self, expires_at: DateTime<Utc>) -> Option<u64> {
        let mut meta = self.meta.lock().unwrap();
        if meta.state == LifecycleState::Removed {
            return None;
        }
        meta.expires_at = expires_at;
        meta.update_count += 1;
        Some(meta.update_count)
    }

    /// Move expiration without bumping the version. Used by the init flow,
    /// which sets expiry only after the render completes.
    pub(crate) fn set_expires(&self, expires_at: DateTime<Utc>) {
        let mut meta = self.meta.lock().unwrap();
        if meta.state != LifecycleState::Removed {
            meta.expires_at = expires_at;
        }
    }

    /// Created → Active, on first successful full build.
    pub(crate) fn mark_active(&self) {
        let mut meta = self.meta.lock().unwrap();
        if meta.state == LifecycleState::Created {
            meta.state = LifecycleState::Active;
        }
    }

    /// Terminal transition. Returns whether this call performed it.
    fn mark_removed(&self) -> bool {
        let mut meta = self.meta.lock().unwrap();
        if meta.state == LifecycleState::Removed {
            false
        } else {
            meta.state = LifecycleState::Removed;
            true
        }
    }

    /// Acquire the exclusive execution lock for this page.
    pub(crate) async fn lock_page(&self) -> tokio::sync::MutexGuard<'_, Option<Page>> {
        self.page.lock().await
    }
}

/// Concurrent store of live page contexts.
///
/// This in-memory implementation is the reference for the storage
/// contract: an external durable store replacing it must preserve the same
/// lifecycle state machine and the same per-context exclusivity guarantee.
pub struct PageRegistry {
    pages: DashMap<Handle, Arc<PageContext>>,
    max_contexts: Option<usize>,
    removal_listener: RwLock<Option<Arc<dyn RemovalListener>>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// A registry that refuses creation beyond `max_contexts` live pages.
    pub fn with_limit(max_contexts: Option<usize>) -> Self {
        PageRegistry {
            pages: DashMap::new(),
            max_contexts,
            removal_listener: RwLock::new(None),
        }
    }

    pub fn set_removal_listener(&self, listener: Arc<dyn RemovalListener>) {
        *self.removal_listener.write().unwrap() = Some(listener);
    }

    /// Mint a handle and insert a fresh context expiring at `now + ttl`.
    ///
    /// `seed` may install request-scoped values on the context; they are
    /// immutable afterwards. The handle itself is always seeded.
    pub fn create(
        &self,
        remote_addr: &str,
        ttl: Duration,
        seed: impl FnOnce(&mut ScopedValues),
    ) -> Result<Arc<PageContext>, KernelError> {
        if let Some(max) = self.max_contexts {
            if self.pages.len() >= max {
                return Err(KernelError::RegistryFault(format!(
                    "page limit reached ({} live contexts)",
                    max
                )));
            }
        }

        let handle = Handle::mint();
        let mut values = ScopedValues::default();
        values.seed(handle);
        seed(&mut values);

        let ctx = Arc::new(PageContext::new(
            handle,
            remote_addr,
            Utc::now() + ttl,
            values,
        ));
        self.pages.insert(handle, Arc::clone(&ctx));
        tracing::debug!(%handle, remote_addr, "page context created");
        Ok(ctx)
    }

    /// Non-blocking lookup. Absent for unknown, removed, or expired
    /// handles; expiry is observed lazily here, physical removal is the
    /// sweeper's job.
    pub fn lookup(&self, handle: Handle) -> Option<Arc<PageContext>> {
        self.lookup_at(handle, Utc::now())
    }

    /// [`Self::lookup`] against an explicit clock.
    pub fn lookup_at(&self, handle: Handle, now: DateTime<Utc>) -> Option<Arc<PageContext>> {
        let ctx = self.pages.get(&handle).map(|entry| Arc::clone(entry.value()))?;
        if ctx.state() == LifecycleState::Removed || ctx.is_expired(now) {
            return None;
        }
        Some(ctx)
    }

    /// Update expiration and bump the version. `None` when the handle is
    /// unknown, removed, or already expired.
    pub fn refresh(&self, handle: Handle, expires_at: DateTime<Utc>) -> Option<u64> {
        self.lookup(handle)?.refresh(expires_at)
    }

    /// Remove a context. Idempotent; unknown handles are a no-op.
    pub fn remove(&self, handle: Handle) {
        if let Some((_, ctx)) = self.pages.remove(&handle) {
            if ctx.mark_removed() {
                self.notify_removed(&ctx);
            }
        }
    }

    /// Remove every context expired at `now`, notifying the removal
    /// listener for each. A listener failure is logged and the sweep
    /// continues. Returns the number of contexts removed.
    ///
    /// The scan touches no per-page execution lock; only individual
    /// removals do any per-context work.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Handle> = self
            .pages
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for handle in expired {
            if let Some((_, ctx)) = self.pages.remove(&handle) {
                if ctx.mark_removed() {
                    self.notify_removed(&ctx);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "expired page contexts swept");
        }
        removed
    }

    /// Number of live contexts, for admission/backpressure policy.
    pub fn context_count(&self) -> usize {
        self.pages.len()
    }

    fn notify_removed(&self, ctx: &PageContext) {
        let listener = self.removal_listener.read().unwrap().clone();
        if let Some(listener) = listener {
            if let Err(e) = listener.on_removed(ctx) {
                tracing::warn!(handle = %ctx.handle(), error = %e, "removal listener failed");
            }
        }
    }
}

impl Default for PageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        removed: Mutex<Vec<Handle>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Recorder {
                removed: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl RemovalListener for Recorder {
        fn on_removed(&self, ctx: &PageContext) -> anyhow::Result<()> {
            self.removed.lock().unwrap().push(ctx.handle());
            if self.fail {
                anyhow::bail!("cleanup backend unavailable");
            }
            Ok(())
        }
    }

    fn minutes(n: i64) -> Duration {
        Duration::minutes(n)
    }

    #[test]
    fn create_then_lookup_returns_the_context() {
        let registry = PageRegistry::new();
        let ctx = registry.create("1.2.3.4", minutes(5), |_| {}).unwrap();
        let found = registry.lookup(ctx.handle()).unwrap();
        assert_eq!(found.handle(), ctx.handle());
        assert_eq!(found.remote_addr(), "1.2.3.4");
        assert_eq!(found.state(), LifecycleState::Created);
        // The handle is always seeded as a scoped value.
        assert_eq!(found.values().get::<Handle>(), Some(&ctx.handle()));
    }

    #[test]
    fn expired_context_is_absent_at_lookup() {
        let registry = PageRegistry::new();
        let ctx = registry.create("1.2.3.4", minutes(5), |_| {}).unwrap();
        let later = Utc::now() + minutes(10);
        assert!(registry.lookup_at(ctx.handle(), later).is_none());
        // Still lookup-able before the deadline.
        assert!(registry.lookup_at(ctx.handle(), Utc::now()).is_some());
    }

    #[test]
    fn refresh_bumps_version_and_moves_expiry() {
        let registry = PageRegistry::new();
        let ctx = registry.create("1.2.3.4", minutes(5), |_| {}).unwrap();
        let t1 = Utc::now() + minutes(30);
        assert_eq!(registry.refresh(ctx.handle(), t1), Some(1));
        assert_eq!(registry.refresh(ctx.handle(), t1), Some(2));
        assert_eq!(ctx.expires_at(), t1);
        assert_eq!(ctx.update_count(), 2);
    }

    #[test]
    fn refresh_on_unknown_or_removed_handle_is_absent() {
        let registry = PageRegistry::new();
        assert_eq!(registry.refresh(Handle::mint(), Utc::now()), None);

        let ctx = registry.create("1.2.3.4", minutes(5), |_| {}).unwrap();
        registry.remove(ctx.handle());
        assert_eq!(registry.refresh(ctx.handle(), Utc::now() + minutes(5)), None);
        // The removed context itself refuses mutation too.
        assert_eq!(ctx.refresh(Utc::now() + minutes(5)), None);
        assert_eq!(ctx.update_count(), 0);
    }

    #[test]
    fn remove_is_idempotent_and_notifies_once() {
        let registry = PageRegistry::new();
        let recorder = Recorder::new(false);
        registry.set_removal_listener(recorder.clone());

        let ctx = registry.create("1.2.3.4", minutes(5), |_| {}).unwrap();
        registry.remove(ctx.handle());
        registry.remove(ctx.handle());
        registry.remove(Handle::mint());

        assert!(registry.lookup(ctx.handle()).is_none());
        assert_eq!(recorder.removed.lock().unwrap().as_slice(), &[ctx.handle()]);
    }

    #[test]
    fn sweep_removes_exactly_the_expired_contexts() {
        let registry = PageRegistry::new();
        let recorder = Recorder::new(false);
        registry.set_removal_listener(recorder.clone());

        let a = registry.create("a", minutes(1), |_| {}).unwrap();
        let b = registry.create("b", minutes(2), |_| {}).unwrap();
        let c = registry.create("c", minutes(60), |_| {}).unwrap();

        let removed = registry.sweep_expired(Utc::now() + minutes(5));
        assert_eq!(removed, 2);
        assert!(registry.lookup(a.handle()).is_none());
        assert!(registry.lookup(b.handle()).is_none());
        assert!(registry.lookup(c.handle()).is_some());
        assert_eq!(registry.context_count(), 1);

        let mut notified = recorder.removed.lock().unwrap().clone();
        notified.sort_by_key(|h| h.to_string());
        let mut expected = vec![a.handle(), b.handle()];
        expected.sort_by_key(|h| h.to_string());
        assert_eq!(notified, expected);
    }

    #[test]
    fn sweep_continues_past_listener_failures() {
        let registry = PageRegistry::new();
        let recorder = Recorder::new(true);
        registry.set_removal_listener(recorder.clone());

        registry.create("a", minutes(1), |_| {}).unwrap();
        registry.create("b", minutes(1), |_| {}).unwrap();

        assert_eq!(registry.sweep_expired(Utc::now() + minutes(5)), 2);
        assert_eq!(recorder.removed.lock().unwrap().len(), 2);
        assert_eq!(registry.context_count(), 0);
    }

    #[test]
    fn creation_fails_at_the_context_limit() {
        let registry = PageRegistry::with_limit(Some(1));
        let ctx = registry.create("a", minutes(5), |_| {}).unwrap();
        assert!(matches!(
            registry.create("b", minutes(5), |_| {}),
            Err(KernelError::RegistryFault(_))
        ));
        // Removal frees the slot; other contexts are unaffected.
        registry.remove(ctx.handle());
        assert!(registry.create("b", minutes(5), |_| {}).is_ok());
    }

    #[test]
    fn seeded_values_are_readable() {
        struct Locale(&'static str);
        let registry = PageRegistry::new();
        let ctx = registry
            .create("1.2.3.4", minutes(5), |values| values.seed(Locale("fi")))
            .unwrap();
        assert_eq!(ctx.values().get::<Locale>().unwrap().0, "fi");
    }
}
