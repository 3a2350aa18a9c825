//! A logical module slot: at most one live instance, reloaded on demand.
//!
//! ```text
//! Empty ──notify──▶ Loading ──ok──▶ Ready
//!                      │
//!                      └──err──▶ Failed (previous instance, if any, stays live)
//! ```
//!
//! Every `notify` takes a new ticket. Only the load holding the latest
//! ticket may commit; older loads are aborted or discarded when they
//! finish. The instance is swapped under a write lock once fully built, so
//! readers see either the old instance or the new one.

use super::instance::LiveInstance;
use super::source::{BinarySource, ErrorSink};
use crate::binding::{
    ActionBinding, CallOutcome, FunctionBinding, GlobalBinding, GlobalValue, MemoryBinding, WorkerBinding,
};
use crate::exports::{BoundExports, ExportDescriptor, ExportRegistry};
use crate::gas::BudgetKind;
use crate::marshal::{StaticArgs, StaticReturn};
use crate::runtime::{BridgeRuntime, InstanceServices};
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::logging::{LogCollector, LogLine};
use guestbridge_core::providers::{ClockProvider, RealClock};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle phase of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotPhase {
    /// Nothing requested yet.
    Empty,
    /// A load is in flight.
    Loading,
    /// The latest load succeeded.
    Ready,
    /// The latest load failed.
    Failed,
}

/// Observable state of a slot.
#[derive(Debug, Clone)]
pub struct SlotStatus {
    /// Current phase.
    pub phase: SlotPhase,
    /// Generation of the live instance, 0 when there is none.
    pub generation: u64,
    /// Latest requested generation.
    pub requested: u64,
    /// Failure of the latest load, when `phase` is `Failed`.
    pub error: Option<BridgeError>,
}

impl SlotStatus {
    fn empty() -> Self {
        Self {
            phase: SlotPhase::Empty,
            generation: 0,
            requested: 0,
            error: None,
        }
    }

    /// Whether the latest load succeeded.
    pub fn is_ready(&self) -> bool {
        self.phase == SlotPhase::Ready
    }
}

/// Counts from one [`ModuleSlot::process_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Workers that returned normally.
    pub ticked: usize,
    /// Workers that trapped, aborted or were rejected this tick.
    pub faulted: usize,
    /// Workers skipped because they are disabled.
    pub disabled: usize,
    /// Workers with nothing to call.
    pub unavailable: usize,
}

pub(crate) struct SlotShared {
    name: Arc<str>,
    runtime: Arc<BridgeRuntime>,
    source: Arc<dyn BinarySource>,
    sink: Option<Arc<dyn ErrorSink>>,
    services: InstanceServices,
    current: RwLock<Option<Arc<LiveInstance>>>,
    status_tx: watch::Sender<SlotStatus>,
    latest: AtomicU64,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    workers: RwLock<Vec<Arc<WorkerBinding>>>,
}

impl SlotShared {
    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    async fn load(self: Arc<Self>, ticket: u64, reference: String) {
        match self.build(ticket, &reference).await {
            Ok(instance) => self.commit(ticket, instance),
            Err(error) => self.fail(ticket, &reference, error),
        }
    }

    async fn build(&self, ticket: u64, reference: &str) -> Result<Arc<LiveInstance>> {
        tracing::debug!(module = %self.name, reference, generation = ticket, "Fetching module");
        let bytes = self.source.fetch(reference).await?;

        let latest = self.latest.load(Ordering::SeqCst);
        if latest != ticket {
            return Err(BridgeError::LoadSuperseded {
                generation: ticket,
                latest,
            });
        }

        let runtime = Arc::clone(&self.runtime);
        let services = self.services.clone();
        let name = self.name.to_string();
        let instance = tokio::task::spawn_blocking(move || {
            let compiled = runtime.compile(&name, &bytes)?;
            runtime.instantiate(compiled, ticket, services)
        })
        .await
        .map_err(|e| BridgeError::Engine {
            cause: format!("load task failed: {e}"),
        })??;

        Ok(Arc::new(instance))
    }

    fn commit(&self, ticket: u64, instance: Arc<LiveInstance>) {
        let mut current = self.current.write();
        if !self.is_latest(ticket) {
            tracing::debug!(module = %self.name, generation = ticket, "Discarding superseded instance");
            return;
        }
        *current = Some(instance);
        self.status_tx.send_modify(|status| {
            status.generation = ticket;
            if self.is_latest(ticket) {
                status.phase = SlotPhase::Ready;
                status.error = None;
            }
        });
        drop(current);
        tracing::info!(module = %self.name, generation = ticket, "Module ready");
    }

    fn fail(&self, ticket: u64, reference: &str, error: BridgeError) {
        if matches!(error, BridgeError::LoadSuperseded { .. }) || !self.is_latest(ticket) {
            tracing::debug!(module = %self.name, generation = ticket, "Superseded load dropped");
            return;
        }

        let reported = self.status_tx.send_if_modified(|status| {
            if !self.is_latest(ticket) {
                return false;
            }
            status.phase = SlotPhase::Failed;
            status.error = Some(error.clone());
            true
        });
        if !reported {
            return;
        }

        tracing::error!(
            module = %self.name,
            reference,
            generation = ticket,
            code = error.code(),
            "Module load failed: {error}"
        );
        if let Some(collector) = &self.services.collector {
            collector.collect(LogLine::error(format!("[{}] {error}", self.name)));
        }
        if let Some(sink) = &self.sink {
            sink.report(&self.name, &error.to_string());
        }
    }
}

/// Non-owning reference to a slot, held by bindings.
#[derive(Clone)]
pub struct SlotHandle {
    shared: Weak<SlotShared>,
    name: Arc<str>,
}

impl SlotHandle {
    /// Slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The slot's live instance, if the slot still exists and has one.
    pub fn current(&self) -> Option<Arc<LiveInstance>> {
        self.shared.upgrade()?.current.read().clone()
    }

    /// Whether the slot still exists.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl std::fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotHandle")
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Builder for [`ModuleSlot`].
pub struct ModuleSlotBuilder {
    name: String,
    runtime: Arc<BridgeRuntime>,
    source: Arc<dyn BinarySource>,
    sink: Option<Arc<dyn ErrorSink>>,
    clock: Option<Arc<dyn ClockProvider>>,
    collector: Option<Arc<LogCollector>>,
}

impl ModuleSlotBuilder {
    /// Where load failures are reported.
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Clock behind `curtime`.
    pub fn clock(mut self, clock: Arc<dyn ClockProvider>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Collector for guest and load messages.
    pub fn collector(mut self, collector: Arc<LogCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Build the slot in the `Empty` phase.
    pub fn build(self) -> ModuleSlot {
        let name: Arc<str> = Arc::from(self.name);
        let (status_tx, _) = watch::channel(SlotStatus::empty());
        let services = InstanceServices {
            clock: self.clock.unwrap_or_else(|| Arc::new(RealClock::new())),
            collector: self.collector,
        };

        ModuleSlot {
            shared: Arc::new(SlotShared {
                name,
                runtime: self.runtime,
                source: self.source,
                sink: self.sink,
                services,
                current: RwLock::new(None),
                status_tx,
                latest: AtomicU64::new(0),
                in_flight: Mutex::new(None),
                workers: RwLock::new(Vec::new()),
            }),
        }
    }
}

/// One logical module: a source reference, its live instance and the
/// workers ticked against it.
pub struct ModuleSlot {
    shared: Arc<SlotShared>,
}

impl ModuleSlot {
    /// Start building a slot.
    pub fn builder(
        name: impl Into<String>,
        runtime: Arc<BridgeRuntime>,
        source: Arc<dyn BinarySource>,
    ) -> ModuleSlotBuilder {
        ModuleSlotBuilder {
            name: name.into(),
            runtime,
            source,
            sink: None,
            clock: None,
            collector: None,
        }
    }

    /// Slot name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Runtime the slot loads into.
    pub fn runtime(&self) -> &Arc<BridgeRuntime> {
        &self.shared.runtime
    }

    /// Non-owning handle for bindings.
    pub fn handle(&self) -> SlotHandle {
        SlotHandle {
            shared: Arc::downgrade(&self.shared),
            name: Arc::clone(&self.shared.name),
        }
    }

    /// Current status.
    pub fn status(&self) -> SlotStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<SlotStatus> {
        self.shared.status_tx.subscribe()
    }

    /// The live instance, if any.
    pub fn current(&self) -> Option<Arc<LiveInstance>> {
        self.shared.current.read().clone()
    }

    /// Signal that the binary behind `reference` is available.
    ///
    /// Starts a load in the background and returns its ticket, which is
    /// also the generation the instance will carry. Any load still in
    /// flight is superseded. Must be called within a Tokio runtime.
    pub fn notify(&self, reference: impl Into<String>) -> u64 {
        let reference = reference.into();
        let ticket = self.shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.status_tx.send_modify(|status| {
            status.phase = SlotPhase::Loading;
            status.requested = ticket;
            status.error = None;
        });
        tracing::debug!(module = %self.shared.name, reference = %reference, generation = ticket, "Load requested");

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(shared.load(ticket, reference));
        if let Some(previous) = self.shared.in_flight.lock().replace(task) {
            previous.abort();
        }
        ticket
    }

    /// Wait until the load for `ticket` settles.
    pub async fn wait_for(&self, ticket: u64) -> Result<Arc<LiveInstance>> {
        let mut rx = self.subscribe();
        loop {
            // Decide under the status borrow, act after releasing it: commits
            // take the instance lock before the status lock.
            let settled = {
                let status = rx.borrow_and_update();
                if status.requested > ticket {
                    Some(Err(BridgeError::LoadSuperseded {
                        generation: ticket,
                        latest: status.requested,
                    }))
                } else {
                    match status.phase {
                        SlotPhase::Ready if status.generation == ticket => Some(Ok(())),
                        SlotPhase::Failed if status.requested == ticket => Some(Err(status
                            .error
                            .clone()
                            .unwrap_or_else(|| self.no_instance()))),
                        _ => None,
                    }
                }
            };

            match settled {
                Some(Ok(())) => return self.current().ok_or_else(|| self.no_instance()),
                Some(Err(e)) => return Err(e),
                None => {}
            }
            rx.changed().await.map_err(|_| self.no_instance())?;
        }
    }

    fn no_instance(&self) -> BridgeError {
        BridgeError::NoInstance {
            module: self.name().to_string(),
        }
    }

    /// Notify and wait for the result.
    pub async fn load(&self, reference: impl Into<String>) -> Result<Arc<LiveInstance>> {
        let ticket = self.notify(reference);
        self.wait_for(ticket).await
    }

    /// Drop the live instance and cancel any load in flight.
    pub fn unload(&self) {
        let ticket = self.shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.shared.in_flight.lock().take() {
            task.abort();
        }
        let mut current = self.shared.current.write();
        *current = None;
        self.shared.status_tx.send_modify(|status| {
            *status = SlotStatus {
                requested: ticket,
                ..SlotStatus::empty()
            };
        });
        drop(current);
        tracing::info!(module = %self.shared.name, "Module unloaded");
    }

    /// Describe the live instance's exports.
    pub fn discover(&self) -> Option<Vec<ExportDescriptor>> {
        self.current().map(|live| live.exports())
    }

    /// Bind every compatible export of the live instance.
    pub fn bind_all(&self) -> Option<BoundExports> {
        ExportRegistry::bind_all(self)
    }

    /// Typed function binding using the per-call budget.
    pub fn function<A: StaticArgs, R: StaticReturn>(&self, export: impl Into<String>) -> FunctionBinding<A, R> {
        FunctionBinding::new(self, export, BudgetKind::Call)
    }

    /// Typed action binding using the per-call budget.
    pub fn action<A: StaticArgs>(&self, export: impl Into<String>) -> ActionBinding<A> {
        FunctionBinding::new(self, export, BudgetKind::Call)
    }

    /// Typed global binding.
    pub fn global<T: GlobalValue>(&self, export: impl Into<String>) -> GlobalBinding<T> {
        GlobalBinding::new(self, export)
    }

    /// Memory binding.
    pub fn memory(&self, export: impl Into<String>) -> Arc<MemoryBinding> {
        Arc::new(MemoryBinding::new(self, export))
    }

    /// Register a worker ticked by [`process_pending`](Self::process_pending).
    ///
    /// `None` uses the configured default export name.
    pub fn register_worker(&self, export: Option<&str>) -> Arc<WorkerBinding> {
        let export = export.map_or_else(|| self.runtime().config().worker.export.clone(), str::to_string);
        let worker = Arc::new(WorkerBinding::new(self, export));
        self.shared.workers.write().push(Arc::clone(&worker));
        worker
    }

    /// Registered workers.
    pub fn workers(&self) -> Vec<Arc<WorkerBinding>> {
        self.shared.workers.read().clone()
    }

    /// Run one tick of every registered worker. Call once per host tick.
    pub fn process_pending(&self) -> TickReport {
        let workers = self.workers();
        let mut report = TickReport::default();
        for worker in workers {
            match worker.tick() {
                None => report.disabled += 1,
                Some(CallOutcome::Returned(())) => report.ticked += 1,
                Some(CallOutcome::Unavailable(_)) => report.unavailable += 1,
                Some(_) => report.faulted += 1,
            }
        }
        report
    }
}

impl Drop for ModuleSlot {
    fn drop(&mut self) {
        if let Some(task) = self.shared.in_flight.lock().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ModuleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSlot")
            .field("name", &self.shared.name)
            .field("status", &*self.shared.status_tx.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::lifecycle::MemorySource;

    fn slot() -> ModuleSlot {
        let runtime = Arc::new(BridgeRuntime::new(BridgeConfig::testing()).unwrap());
        let source = MemorySource::new();
        source.insert("v1", wat::parse_str("(module)").unwrap());
        source.insert("v2", wat::parse_str(r#"(module (memory (export "memory") 1))"#).unwrap());
        ModuleSlot::builder("game", runtime, Arc::new(source)).build()
    }

    #[tokio::test]
    async fn stale_build_is_discarded_on_commit() {
        let slot = slot();
        let shared = Arc::clone(&slot.shared);

        let stale = shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let instance = shared.build(stale, "v1").await.unwrap();
        assert_eq!(instance.generation(), stale);

        let newer = slot.load("v2").await.unwrap();
        assert!(newer.generation() > stale);
        shared.commit(stale, instance);

        assert_eq!(slot.current().map(|live| live.generation()), Some(newer.generation()));
        let status = slot.status();
        assert_eq!(status.phase, SlotPhase::Ready);
        assert_eq!(status.generation, newer.generation());
    }

    #[tokio::test]
    async fn stale_failure_is_not_reported() {
        let slot = slot();
        let shared = Arc::clone(&slot.shared);

        let stale = shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let newer = slot.load("v2").await.unwrap();
        shared.fail(
            stale,
            "v1",
            BridgeError::ModuleParse {
                module: "game".into(),
                cause: "truncated".into(),
            },
        );

        let status = slot.status();
        assert_eq!(status.phase, SlotPhase::Ready);
        assert!(status.error.is_none());
        assert_eq!(slot.current().map(|live| live.generation()), Some(newer.generation()));
    }
}
