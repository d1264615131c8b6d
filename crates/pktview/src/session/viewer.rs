use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, EvictionCache};
use crate::conf::{SettingsStore, ViewerConfig, AUTO_DECODE_KEY, EVICTION_ENABLED_KEY};
use crate::decoder::{DecodedPacket, Protocol};
use crate::error::{ViewerError, ViewerResult};
use crate::host::{invoke_with, PresentationHost, Style, WindowHandle};
use crate::log::{LogSource, Packet, SubscriptionId};
use crate::registry::{ItemRegistry, RegistryObserver};
use crate::scheduler::{ActiveContext, DecodedHook, MetricsSnapshot, ParsingScheduler, SchedulerMetrics};
use crate::unit::{Origin, ParseUnit};

use super::events::{EventHub, ListenerId, SessionEvent};
use super::SessionId;

struct AttachedLog {
    source: Arc<dyn LogSource>,
    subscription: SubscriptionId,
}

/// Counters reported by `ViewerSession::metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetrics {
    pub scheduler: MetricsSnapshot,
    pub cache: CacheStats,
    pub items: usize,
    pub pending: usize,
}

/// One viewer: a protocol, a log source, and the parse units read from it.
///
/// Protocol attach/detach runs on the presentation thread. Listener
/// notifications are posted there as well, in the order they were raised
/// on each source thread.
pub struct ViewerSession {
    id: SessionId,
    me: Weak<ViewerSession>,
    context: Arc<ActiveContext>,
    registry: ItemRegistry,
    cache: Arc<EvictionCache>,
    eviction_enabled: Arc<AtomicBool>,
    auto_decode: AtomicBool,
    scheduler: ParsingScheduler,
    host: Arc<dyn PresentationHost>,
    settings: Arc<dyn SettingsStore>,
    events: Arc<EventHub>,
    log: Mutex<Option<AttachedLog>>,
    owner: Mutex<Option<WindowHandle>>,
    closed: AtomicBool,
}

impl ViewerSession {
    pub fn new(
        config: &ViewerConfig,
        host: Arc<dyn PresentationHost>,
        settings: Arc<dyn SettingsStore>,
        runtime: Handle,
    ) -> Arc<Self> {
        let id = SessionId::next();
        let auto_decode = settings.get_bool(AUTO_DECODE_KEY).unwrap_or(config.auto_decode);
        let eviction_enabled = Arc::new(AtomicBool::new(
            settings
                .get_bool(EVICTION_ENABLED_KEY)
                .unwrap_or(config.eviction.enabled),
        ));

        let context = Arc::new(ActiveContext::new(id));
        let cache = Arc::new(EvictionCache::new(config.eviction.capacity));
        let metrics = Arc::new(SchedulerMetrics::new());
        let on_decoded = eviction_hook(
            Arc::clone(&cache),
            Arc::clone(&eviction_enabled),
            Arc::clone(&metrics),
        );

        info!(
            session = %id,
            auto_decode,
            eviction = eviction_enabled.load(Ordering::Relaxed),
            capacity = cache.capacity(),
            "Viewer session created"
        );

        Arc::new_cyclic(|me: &Weak<ViewerSession>| {
            let observer: Weak<dyn RegistryObserver> = me.clone();
            Self {
                id,
                me: me.clone(),
                scheduler: ParsingScheduler::new(
                    Arc::clone(&context),
                    config.worker,
                    metrics,
                    Some(on_decoded),
                    runtime,
                ),
                context,
                registry: ItemRegistry::with_observer(observer),
                cache,
                eviction_enabled,
                auto_decode: AtomicBool::new(auto_decode),
                host,
                settings,
                events: Arc::new(EventHub::new()),
                log: Mutex::new(None),
                owner: Mutex::new(None),
                closed: AtomicBool::new(false),
            }
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn protocol(&self) -> Option<Arc<dyn Protocol>> {
        self.context.protocol()
    }

    pub fn log(&self) -> Option<Arc<dyn LogSource>> {
        self.log.lock().as_ref().map(|attached| Arc::clone(&attached.source))
    }

    pub fn items(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn window_handle(&self) -> WindowHandle {
        self.host.window_handle()
    }

    pub fn owner(&self) -> Option<WindowHandle> {
        *self.owner.lock()
    }

    pub fn auto_decode(&self) -> bool {
        self.auto_decode.load(Ordering::Acquire)
    }

    pub fn eviction_enabled(&self) -> bool {
        self.eviction_enabled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Register a listener for session events. Listeners run on the
    /// presentation thread.
    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) -> ListenerId {
        self.events.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Switch the active protocol.
    ///
    /// The identical instance is a no-op. A protocol attached to another
    /// session is rejected and nothing changes. Otherwise the decode worker
    /// is cancelled, the old protocol is unloaded and the new one loaded on
    /// the presentation thread (blocking until done), one `ProtocolChanged`
    /// event is raised and all decode state is dropped.
    pub fn set_protocol(&self, protocol: Option<Arc<dyn Protocol>>) -> ViewerResult<()> {
        self.ensure_open()?;

        let current = self.context.protocol();
        if same_protocol(current.as_ref(), protocol.as_ref()) {
            return Ok(());
        }
        if let Some(new) = &protocol {
            if new.is_attached() {
                return Err(ViewerError::AlreadyAttached(new.name().to_string()));
            }
        }

        self.scheduler.cancel();

        let context = Arc::clone(&self.context);
        let session = self.id;
        let old = invoke_with(self.host.as_ref(), move || swap_protocol(&context, session, protocol))
            .ok_or(ViewerError::HostUnavailable)??;

        let Some(old) = old else {
            return Ok(());
        };
        let new_name = self.context.protocol().map(|p| p.name().to_string());
        let old_name = old.map(|p| p.name().to_string());
        info!(session = %self.id, old = ?old_name, new = ?new_name, "Protocol changed");

        self.emit(SessionEvent::ProtocolChanged {
            old: old_name,
            new: new_name,
        });
        self.drop_cache();
        Ok(())
    }

    /// Switch the active log source.
    ///
    /// Cancels the decode worker, unsubscribes from the old log, drops all
    /// units, then subscribes to the new log (which replays its backlog).
    pub fn set_log(&self, source: Option<Arc<dyn LogSource>>) -> ViewerResult<()> {
        self.ensure_open()?;
        self.replace_log(source);
        Ok(())
    }

    /// Queue `unit` for decoding. Returns false if it is already queued or
    /// the session is closed.
    pub fn enqueue_parsing(&self, unit: Arc<ParseUnit>) -> bool {
        if self.is_closed() {
            return false;
        }
        self.scheduler.enqueue(unit)
    }

    /// Read a unit's decoded payload. With auto-decode on, reading an
    /// undecoded unit schedules it.
    pub fn query(&self, index: usize) -> Option<Arc<DecodedPacket>> {
        self.registry.query(index)
    }

    /// Schedule the unit at `index` regardless of the auto-decode setting.
    /// Returns true if it was queued.
    pub fn decode_now(&self, index: usize) -> ViewerResult<bool> {
        self.ensure_open()?;
        match self.registry.get(index) {
            Some(unit) if !unit.is_decoded() => Ok(self.scheduler.enqueue(unit)),
            _ => Ok(false),
        }
    }

    pub fn set_auto_decode(&self, enabled: bool) {
        self.auto_decode.store(enabled, Ordering::Release);
        self.settings.set_bool(AUTO_DECODE_KEY, enabled);
        debug!(session = %self.id, enabled, "Auto-decode updated");
    }

    /// Turning eviction on drops the decode state of every unit so that the
    /// cache starts out tracking everything that is decoded. Turning it off
    /// only forgets the ring.
    pub fn set_eviction_enabled(&self, enabled: bool) {
        let was = self.eviction_enabled.swap(enabled, Ordering::AcqRel);
        self.settings.set_bool(EVICTION_ENABLED_KEY, enabled);

        match (was, enabled) {
            (false, true) => self.drop_cache(),
            (true, false) => self.cache.clear(),
            _ => {}
        }
        debug!(session = %self.id, enabled, "Eviction updated");
    }

    pub fn set_owner(&self, owner: WindowHandle) -> ViewerResult<()> {
        if owner == self.host.window_handle() {
            return Err(ViewerError::SelfOwnership);
        }
        *self.owner.lock() = Some(owner);
        Ok(())
    }

    pub fn relay_style_change(&self, style: Style) {
        self.emit(SessionEvent::StyleChanged(style));
    }

    pub fn metrics(&self) -> SessionMetrics {
        SessionMetrics {
            scheduler: self.scheduler.metrics().snapshot(),
            cache: self.cache.stats(),
            items: self.registry.len(),
            pending: self.scheduler.pending(),
        }
    }

    /// True once no unit is queued or being decoded.
    pub fn is_settled(&self) -> bool {
        self.scheduler.pending() == 0 && self.registry.snapshot().iter().all(|u| !u.is_scheduled())
    }

    /// True while the background decode worker is alive.
    pub fn is_decoding(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Forget the ring, then release every unit's decoder and payload.
    pub fn drop_cache(&self) {
        // Ring first: a unit pushed after this is released below
        self.cache.clear();
        for unit in self.registry.snapshot() {
            unit.release();
        }
        debug!(session = %self.id, "Decode state dropped");
    }

    /// Detach log and protocol and drop every unit. Later switches fail
    /// with `SessionClosed`.
    pub fn close(&self) -> ViewerResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.replace_log(None);

        self.scheduler.cancel();
        let context = Arc::clone(&self.context);
        let session = self.id;
        let unloaded = invoke_with(self.host.as_ref(), move || swap_protocol(&context, session, None))
            .ok_or(ViewerError::HostUnavailable)
            .and_then(|r| r);
        if let Ok(Some(Some(old))) = &unloaded {
            self.emit(SessionEvent::ProtocolChanged {
                old: Some(old.name().to_string()),
                new: None,
            });
        }

        self.registry.clear();
        self.cache.clear();
        info!(session = %self.id, "Viewer session closed");

        unloaded.map(|_| ())
    }

    fn replace_log(&self, source: Option<Arc<dyn LogSource>>) {
        let mut attached = self.log.lock();

        let unchanged = match (attached.as_ref(), source.as_ref()) {
            (Some(current), Some(new)) => same_log(&current.source, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.scheduler.cancel();

        let old_id = attached.take().map(|old| {
            if !old.source.unsubscribe(old.subscription) {
                warn!(session = %self.id, log = old.source.name(), "Log subscription already gone");
            }
            old.source.id()
        });

        self.drop_cache();
        self.registry.clear();
        self.cache.clear();

        let origin = self.context.attach_log(source.as_ref().map(|s| s.id()));
        let new_id = match (source, origin) {
            (Some(source), Some(origin)) => {
                let me = self.me.clone();
                let subscription = source.subscribe(Box::new(move |packet| {
                    if let Some(session) = me.upgrade() {
                        session.ingest(packet, origin);
                    }
                }));
                info!(session = %self.id, log = source.name(), items = self.registry.len(), "Log attached");
                let id = source.id();
                *attached = Some(AttachedLog { source, subscription });
                Some(id)
            }
            _ => None,
        };
        drop(attached);

        self.emit(SessionEvent::LogChanged {
            old: old_id,
            new: new_id,
        });
    }

    fn ingest(&self, packet: Packet, origin: Origin) {
        if !self.context.is_current(&origin) {
            debug!(session = %self.id, "Dropping packet from detached log");
            return;
        }
        self.registry.append(packet, origin);
    }

    fn emit(&self, event: SessionEvent) {
        let events = Arc::clone(&self.events);
        self.host.post(Box::new(move || events.dispatch(&event)));
    }

    fn ensure_open(&self) -> ViewerResult<()> {
        if self.is_closed() {
            return Err(ViewerError::SessionClosed);
        }
        Ok(())
    }
}

impl RegistryObserver for ViewerSession {
    fn item_added(&self, unit: &Arc<ParseUnit>) {
        self.emit(SessionEvent::ItemAdded { index: unit.index() });
    }

    fn item_queried(&self, unit: &Arc<ParseUnit>) {
        self.emit(SessionEvent::ItemQueried { index: unit.index() });
        if self.auto_decode() && !unit.is_decoded() {
            self.enqueue_parsing(Arc::clone(unit));
        }
    }
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("id", &self.id)
            .field("items", &self.registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Push decoded units into the eviction ring while eviction is enabled.
fn eviction_hook(
    cache: Arc<EvictionCache>,
    enabled: Arc<AtomicBool>,
    metrics: Arc<SchedulerMetrics>,
) -> DecodedHook {
    Arc::new(move |unit: &Arc<ParseUnit>| {
        if enabled.load(Ordering::Acquire) && cache.push(Arc::clone(unit)) {
            metrics.record_eviction();
        }
    })
}

/// Runs on the presentation thread. Unloads the active protocol, loads
/// `new` and installs it. Returns `Ok(None)` when `new` is already active,
/// otherwise the protocol it replaced. If `new` fails to load, the old
/// protocol is loaded back.
fn swap_protocol(
    context: &ActiveContext,
    session: SessionId,
    new: Option<Arc<dyn Protocol>>,
) -> ViewerResult<Option<Option<Arc<dyn Protocol>>>> {
    let old = context.protocol();
    if same_protocol(old.as_ref(), new.as_ref()) {
        return Ok(None);
    }

    if let Some(old) = &old {
        old.unload()?;
    }
    if let Some(new) = &new {
        if let Err(e) = new.load(session) {
            if let Some(old) = &old {
                if let Err(restore) = old.load(session) {
                    warn!(%session, protocol = old.name(), "Failed to restore protocol: {}", restore);
                }
            }
            return Err(e);
        }
    }

    Ok(Some(context.replace_protocol(new)))
}

fn same_protocol(a: Option<&Arc<dyn Protocol>>, b: Option<&Arc<dyn Protocol>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

fn same_log(a: &Arc<dyn LogSource>, b: &Arc<dyn LogSource>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
