//! Transaction resource binding and synchronization callbacks.
//!
//! A [`SynchronizationRegistry`] is the explicit, per-transaction home for
//! bound resources (such as a [`DatabaseHolder`]) and the synchronizations
//! that must run around commit and rollback. It is cheap to clone; clones
//! share state, so a synchronization can hold the registry it was
//! registered with and unbind itself from a later task.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{debug, trace, warn};

use crate::error::{MongoError, MongoResult};

/// Outcome of a finished transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
    /// The outcome could not be determined.
    Unknown,
}

/// Callbacks invoked around a transaction's lifecycle.
///
/// Every hook defaults to a no-op.
pub trait TransactionSynchronization: Send + Sync {
    /// The transaction is being suspended.
    fn suspend(&self) -> MongoResult<()> {
        Ok(())
    }

    /// The transaction is being resumed.
    fn resume(&self) -> MongoResult<()> {
        Ok(())
    }

    /// Flush pending state to the backing store.
    fn flush(&self) -> MongoResult<()> {
        Ok(())
    }

    /// Called before commit. An error here forces a rollback.
    fn before_commit(&self, _read_only: bool) -> MongoResult<()> {
        Ok(())
    }

    /// Called before commit or rollback.
    fn before_completion(&self) -> MongoResult<()> {
        Ok(())
    }

    /// Called after a successful commit.
    fn after_commit(&self) -> MongoResult<()> {
        Ok(())
    }

    /// Called after commit or rollback.
    fn after_completion(&self, _status: TransactionStatus) -> MongoResult<()> {
        Ok(())
    }
}

/// A resource that can be bound to a transaction.
pub trait ResourceHolder: Send + Sync + 'static {
    /// Reset transactional state once the transaction is complete.
    fn reset(&self);

    /// The holder has been unbound from its registry.
    fn unbound(&self);

    /// Whether the holder was invalidated and must not be reused.
    fn is_void(&self) -> bool;
}

/// Reusable state for [`ResourceHolder`] implementations.
#[derive(Debug, Default)]
pub struct ResourceHolderSupport {
    synchronized_with_transaction: AtomicBool,
    rollback_only: AtomicBool,
    reference_count: AtomicUsize,
    is_void: AtomicBool,
}

impl ResourceHolderSupport {
    /// Fresh, unreferenced state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the resource as synchronized with a transaction.
    pub fn set_synchronized_with_transaction(&self, synchronized: bool) {
        self.synchronized_with_transaction
            .store(synchronized, Ordering::SeqCst);
    }

    /// Whether the resource is synchronized with a transaction.
    pub fn is_synchronized_with_transaction(&self) -> bool {
        self.synchronized_with_transaction.load(Ordering::SeqCst)
    }

    /// Mark the transaction as rollback-only.
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    /// Whether the transaction was marked rollback-only.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    /// Increase the reference count by one.
    pub fn requested(&self) {
        self.reference_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrease the reference count by one, saturating at zero.
    pub fn released(&self) {
        let _ = self
            .reference_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
    }

    /// Whether at least one reference is held.
    pub fn is_open(&self) -> bool {
        self.reference_count.load(Ordering::SeqCst) > 0
    }

    /// Current reference count.
    pub fn reference_count(&self) -> usize {
        self.reference_count.load(Ordering::SeqCst)
    }

    /// Clear the transactional flags.
    pub fn clear(&self) {
        self.synchronized_with_transaction
            .store(false, Ordering::SeqCst);
        self.rollback_only.store(false, Ordering::SeqCst);
    }

    /// Full reset: flags and reference count.
    pub fn reset(&self) {
        self.clear();
        self.reference_count.store(0, Ordering::SeqCst);
    }

    /// Invalidate the holder.
    pub fn unbound(&self) {
        self.is_void.store(true, Ordering::SeqCst);
    }

    /// Whether the holder was invalidated.
    pub fn is_void(&self) -> bool {
        self.is_void.load(Ordering::SeqCst)
    }
}

type Resource = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    resources: HashMap<SmolStr, Resource>,
    /// `None` while synchronization is inactive.
    synchronizations: Option<Vec<Arc<dyn TransactionSynchronization>>>,
}

/// Resources and synchronizations of one transactional scope.
#[derive(Clone, Default)]
pub struct SynchronizationRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl SynchronizationRegistry {
    /// An empty registry with synchronization inactive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a resource under `key`. Fails if the key is already bound.
    pub fn bind<R>(&self, key: impl Into<SmolStr>, resource: Arc<R>) -> MongoResult<()>
    where
        R: Any + Send + Sync,
    {
        let key = key.into();
        let mut state = self.state.lock();
        if state.resources.contains_key(&key) {
            return Err(MongoError::transaction(format!(
                "a resource is already bound for key '{key}'"
            )));
        }
        debug!(key = %key, "Bound transactional resource");
        state.resources.insert(key, resource);
        Ok(())
    }

    /// Unbind the resource under `key`. Fails if nothing is bound.
    pub fn unbind(&self, key: &str) -> MongoResult<Resource> {
        self.unbind_if_possible(key).ok_or_else(|| {
            MongoError::transaction(format!("no resource is bound for key '{key}'"))
        })
    }

    /// Unbind the resource under `key` if there is one.
    pub fn unbind_if_possible(&self, key: &str) -> Option<Resource> {
        let removed = self.state.lock().resources.remove(key);
        if removed.is_some() {
            debug!(key = %key, "Unbound transactional resource");
        }
        removed
    }

    /// The resource bound under `key`, if it is an `R`.
    pub fn get_resource<R>(&self, key: &str) -> Option<Arc<R>>
    where
        R: Any + Send + Sync,
    {
        let resource = self.state.lock().resources.get(key).cloned()?;
        resource.downcast::<R>().ok()
    }

    /// Whether anything is bound under `key`.
    pub fn has_resource(&self, key: &str) -> bool {
        self.state.lock().resources.contains_key(key)
    }

    /// Activate synchronization. Fails if it is already active.
    pub fn init(&self) -> MongoResult<()> {
        let mut state = self.state.lock();
        if state.synchronizations.is_some() {
            return Err(MongoError::transaction(
                "transaction synchronization is already active",
            ));
        }
        trace!("Initializing transaction synchronization");
        state.synchronizations = Some(Vec::new());
        Ok(())
    }

    /// Whether synchronization is active.
    pub fn is_active(&self) -> bool {
        self.state.lock().synchronizations.is_some()
    }

    /// Register a synchronization. Fails unless synchronization is active.
    pub fn register_synchronization(
        &self,
        synchronization: Arc<dyn TransactionSynchronization>,
    ) -> MongoResult<()> {
        match self.state.lock().synchronizations.as_mut() {
            Some(synchronizations) => {
                synchronizations.push(synchronization);
                Ok(())
            }
            None => Err(MongoError::transaction(
                "transaction synchronization is not active",
            )),
        }
    }

    /// Snapshot of the registered synchronizations.
    pub fn synchronizations(&self) -> Vec<Arc<dyn TransactionSynchronization>> {
        self.state
            .lock()
            .synchronizations
            .clone()
            .unwrap_or_default()
    }

    /// Deactivate synchronization, dropping every registered callback.
    pub fn clear(&self) {
        trace!("Clearing transaction synchronization");
        self.state.lock().synchronizations = None;
    }

    /// Suspend every synchronization, stopping at the first error.
    pub fn suspend_all(&self) -> MongoResult<()> {
        self.synchronizations()
            .iter()
            .try_for_each(|s| s.suspend())
    }

    /// Resume every synchronization, stopping at the first error.
    pub fn resume_all(&self) -> MongoResult<()> {
        self.synchronizations()
            .iter()
            .try_for_each(|s| s.resume())
    }

    /// Flush every synchronization, stopping at the first error.
    pub fn trigger_flush(&self) -> MongoResult<()> {
        self.synchronizations().iter().try_for_each(|s| s.flush())
    }

    /// Run `before_commit`, stopping at the first error.
    pub fn trigger_before_commit(&self, read_only: bool) -> MongoResult<()> {
        self.synchronizations()
            .iter()
            .try_for_each(|s| s.before_commit(read_only))
    }

    /// Run `before_completion` on every synchronization.
    pub fn trigger_before_completion(&self) -> MongoResult<()> {
        run_all(self.synchronizations(), |s| s.before_completion())
    }

    /// Run `after_commit` on every synchronization.
    pub fn trigger_after_commit(&self) -> MongoResult<()> {
        run_all(self.synchronizations(), |s| s.after_commit())
    }

    /// Run `after_completion` on every synchronization.
    pub fn trigger_after_completion(&self, status: TransactionStatus) -> MongoResult<()> {
        run_all(self.synchronizations(), |s| s.after_completion(status))
    }

    /// Drive a commit through the full callback sequence.
    ///
    /// A `before_commit` or commit failure completes the callbacks as rolled
    /// back (or unknown) and returns that error. Errors raised after a successful commit are
    /// returned too, but the transaction stays committed. Synchronization is
    /// cleared on every path.
    pub async fn commit<F, Fut>(&self, read_only: bool, commit: F) -> MongoResult<TransactionStatus>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MongoResult<()>>,
    {
        if let Err(e) = self.trigger_before_commit(read_only) {
            warn!(error = %e, "before_commit failed, rolling back");
            let _ = self.finish(TransactionStatus::RolledBack);
            return Err(e);
        }

        let before_completion = self.trigger_before_completion();

        if let Err(e) = commit().await {
            let _ = self.finish(TransactionStatus::Unknown);
            return Err(e);
        }

        let after_commit = self.trigger_after_commit();
        let after_completion = self.finish(TransactionStatus::Committed);

        before_completion
            .and(after_commit)
            .and(after_completion)
            .map(|()| TransactionStatus::Committed)
    }

    /// Drive a rollback through the completion callbacks.
    pub async fn rollback<F, Fut>(&self, rollback: F) -> MongoResult<TransactionStatus>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MongoResult<()>>,
    {
        let before_completion = self.trigger_before_completion();
        let rolled_back = rollback().await;
        let status = if rolled_back.is_ok() {
            TransactionStatus::RolledBack
        } else {
            TransactionStatus::Unknown
        };
        let after_completion = self.finish(status);

        rolled_back
            .and(before_completion)
            .and(after_completion)
            .map(|()| status)
    }

    fn finish(&self, status: TransactionStatus) -> MongoResult<()> {
        let result = self.trigger_after_completion(status);
        self.clear();
        result
    }
}

impl fmt::Debug for SynchronizationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let mut keys: Vec<&SmolStr> = state.resources.keys().collect();
        keys.sort();
        f.debug_struct("SynchronizationRegistry")
            .field("resources", &keys)
            .field(
                "synchronizations",
                &state.synchronizations.as_ref().map(Vec::len),
            )
            .finish()
    }
}

/// Run `hook` on every synchronization and return the first error.
fn run_all<F>(
    synchronizations: Vec<Arc<dyn TransactionSynchronization>>,
    hook: F,
) -> MongoResult<()>
where
    F: Fn(&dyn TransactionSynchronization) -> MongoResult<()>,
{
    let mut first_error = None;
    for synchronization in &synchronizations {
        if let Err(e) = hook(synchronization.as_ref()) {
            warn!(error = %e, "Transaction synchronization callback failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

type HolderCallback<H> = Box<dyn Fn(&H) -> MongoResult<()> + Send + Sync>;
type CleanupCallback<H> = Box<dyn Fn(&H, bool) -> MongoResult<()> + Send + Sync>;

/// Keeps a [`ResourceHolder`] bound to a registry across a transaction.
///
/// The holder stays bound while the transaction is active, is unbound while
/// suspended, and is unbound and released at completion. Resource-specific
/// work comes from callbacks: `flush`, `release`, `cleanup` (for holders
/// that are not unbound at completion) and `after_commit` (only when the
/// holder is not released before completion).
pub struct ResourceHolderSynchronization<H: ResourceHolder> {
    holder: Arc<H>,
    key: SmolStr,
    registry: SynchronizationRegistry,
    active: AtomicBool,
    unbind_at_completion: bool,
    release_before_completion: bool,
    release_after_completion: Option<bool>,
    on_flush: Option<HolderCallback<H>>,
    on_release: Option<HolderCallback<H>>,
    on_cleanup: Option<CleanupCallback<H>>,
    on_after_commit: Option<HolderCallback<H>>,
}

impl<H: ResourceHolder> ResourceHolderSynchronization<H> {
    /// Synchronize `holder`, bound under `key` in `registry`.
    pub fn new(holder: Arc<H>, key: impl Into<SmolStr>, registry: SynchronizationRegistry) -> Self {
        Self {
            holder,
            key: key.into(),
            registry,
            active: AtomicBool::new(true),
            unbind_at_completion: true,
            release_before_completion: true,
            release_after_completion: None,
            on_flush: None,
            on_release: None,
            on_cleanup: None,
            on_after_commit: None,
        }
    }

    /// Whether to unbind the holder at completion. Defaults to `true`.
    pub fn unbind_at_completion(mut self, unbind: bool) -> Self {
        self.unbind_at_completion = unbind;
        self
    }

    /// Whether to release in `before_completion`. Defaults to `true`.
    pub fn release_before_completion(mut self, release: bool) -> Self {
        self.release_before_completion = release;
        self
    }

    /// Whether an already unbound holder is released in `after_completion`.
    /// Defaults to the opposite of [`release_before_completion`](Self::release_before_completion).
    pub fn release_after_completion(mut self, release: bool) -> Self {
        self.release_after_completion = Some(release);
        self
    }

    /// Flush callback.
    pub fn on_flush<F>(mut self, f: F) -> Self
    where
        F: Fn(&H) -> MongoResult<()> + Send + Sync + 'static,
    {
        self.on_flush = Some(Box::new(f));
        self
    }

    /// Release callback.
    pub fn on_release<F>(mut self, f: F) -> Self
    where
        F: Fn(&H) -> MongoResult<()> + Send + Sync + 'static,
    {
        self.on_release = Some(Box::new(f));
        self
    }

    /// Cleanup callback for holders not unbound at completion; receives
    /// whether the transaction committed.
    pub fn on_cleanup<F>(mut self, f: F) -> Self
    where
        F: Fn(&H, bool) -> MongoResult<()> + Send + Sync + 'static,
    {
        self.on_cleanup = Some(Box::new(f));
        self
    }

    /// Post-commit callback.
    pub fn on_after_commit<F>(mut self, f: F) -> Self
    where
        F: Fn(&H) -> MongoResult<()> + Send + Sync + 'static,
    {
        self.on_after_commit = Some(Box::new(f));
        self
    }

    /// The synchronized holder.
    pub fn holder(&self) -> &Arc<H> {
        &self.holder
    }

    /// Whether the holder is still bound for this transaction.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn release(&self) -> MongoResult<()> {
        trace!(key = %self.key, "Releasing transactional resource");
        self.on_release.as_ref().map_or(Ok(()), |f| f(&self.holder))
    }

    fn should_release_after_completion(&self) -> bool {
        self.release_after_completion
            .unwrap_or(!self.release_before_completion)
    }

    fn complete(&self, status: TransactionStatus) -> MongoResult<()> {
        if !self.unbind_at_completion {
            let committed = status == TransactionStatus::Committed;
            return self
                .on_cleanup
                .as_ref()
                .map_or(Ok(()), |f| f(&self.holder, committed));
        }

        let release = if self.active.swap(false, Ordering::SeqCst) {
            self.registry.unbind_if_possible(&self.key);
            self.holder.unbound();
            true
        } else {
            self.should_release_after_completion()
        };

        if release { self.release() } else { Ok(()) }
    }
}

impl<H: ResourceHolder> TransactionSynchronization for ResourceHolderSynchronization<H> {
    fn suspend(&self) -> MongoResult<()> {
        if self.is_active() {
            self.registry.unbind(&self.key)?;
        }
        Ok(())
    }

    fn resume(&self) -> MongoResult<()> {
        if self.is_active() {
            self.registry.bind(self.key.clone(), Arc::clone(&self.holder))?;
        }
        Ok(())
    }

    fn flush(&self) -> MongoResult<()> {
        self.on_flush.as_ref().map_or(Ok(()), |f| f(&self.holder))
    }

    fn before_completion(&self) -> MongoResult<()> {
        if self.unbind_at_completion {
            self.registry.unbind(&self.key)?;
            self.active.store(false, Ordering::SeqCst);
            if self.release_before_completion {
                self.release()?;
            }
        }
        Ok(())
    }

    fn after_commit(&self) -> MongoResult<()> {
        if self.release_before_completion {
            return Ok(());
        }
        self.on_after_commit
            .as_ref()
            .map_or(Ok(()), |f| f(&self.holder))
    }

    fn after_completion(&self, status: TransactionStatus) -> MongoResult<()> {
        let result = self.complete(status);
        self.holder.reset();
        result
    }
}

impl<H: ResourceHolder> fmt::Debug for ResourceHolderSynchronization<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHolderSynchronization")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .field("unbind_at_completion", &self.unbind_at_completion)
            .field("release_before_completion", &self.release_before_completion)
            .finish_non_exhaustive()
    }
}

/// A database handle bound to a transaction.
#[derive(Debug)]
pub struct DatabaseHolder {
    database: mongodb::Database,
    support: ResourceHolderSupport,
}

impl DatabaseHolder {
    /// Hold `database`.
    pub fn new(database: mongodb::Database) -> Self {
        Self {
            database,
            support: ResourceHolderSupport::new(),
        }
    }

    /// The held database handle.
    pub fn database(&self) -> &mongodb::Database {
        &self.database
    }

    /// Transactional state.
    pub fn support(&self) -> &ResourceHolderSupport {
        &self.support
    }
}

impl ResourceHolder for DatabaseHolder {
    fn reset(&self) {
        self.support.reset();
    }

    fn unbound(&self) {
        self.support.unbound();
    }

    fn is_void(&self) -> bool {
        self.support.is_void()
    }
}

/// Database lookup that reuses the handle bound to the current transaction.
pub mod database_utils {
    use std::sync::Arc;

    use mongodb::{Client, Database};
    use tracing::debug;

    use super::{DatabaseHolder, ResourceHolderSynchronization, SynchronizationRegistry};
    use crate::error::MongoResult;

    /// Registry key of the database `name`.
    pub fn resource_key(name: &str) -> String {
        format!("mongodb:{name}")
    }

    /// Get the database `name`, bound to the transaction when one is active.
    ///
    /// A bound, non-void holder is reused. Otherwise a fresh handle is
    /// created and, while synchronization is active, bound to `registry` with
    /// a synchronization that unbinds it at completion.
    pub fn get_database(
        client: &Client,
        name: &str,
        registry: &SynchronizationRegistry,
    ) -> MongoResult<Database> {
        let key = resource_key(name);

        if let Some(holder) = registry.get_resource::<DatabaseHolder>(&key) {
            if !holder.support().is_void() {
                holder.support().requested();
                return Ok(holder.database().clone());
            }
        }

        debug!(database = %name, "Getting database handle");
        let database = client.database(name);

        if registry.is_active() {
            let holder = Arc::new(DatabaseHolder::new(database.clone()));
            holder.support().set_synchronized_with_transaction(true);
            holder.support().requested();

            let synchronization = ResourceHolderSynchronization::new(
                Arc::clone(&holder),
                key.as_str(),
                registry.clone(),
            )
            .on_release(|holder: &DatabaseHolder| {
                holder.support().released();
                Ok(())
            });
            registry.register_synchronization(Arc::new(synchronization))?;
            registry.unbind_if_possible(&key);
            registry.bind(key, holder)?;
        }

        Ok(database)
    }
}
