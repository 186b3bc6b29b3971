//! Session registry.
//!
//! Maps session ids to live sessions. Creation is lazy and single-flight:
//! the map slot for a new id holds a shared creation future, so concurrent
//! callers for the same id all await one `connect`. The map lock is held
//! only while checking and inserting slots, never across the connect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::endpoint_path;
use super::engine::{Engine, EngineFactory};
use super::overrides::ConfigOverride;
use super::session::{Session, SessionId, SessionState};
use super::stream::{EventStream, open_stream};
use super::transport::{Delivery, SessionTransport};
use crate::config::EvictionPolicy;
use crate::error::BridgeError;

type Creation = Result<Arc<Session>, Arc<BridgeError>>;
type PendingSession = Shared<BoxFuture<'static, Creation>>;

struct Slot {
    generation: u64,
    session: PendingSession,
}

type SlotMap = HashMap<SessionId, Slot>;

/// Registry of live sessions.
pub struct SessionRegistry {
    default_engine: Arc<dyn Engine>,
    factory: Arc<dyn EngineFactory>,
    slots: Arc<Mutex<SlotMap>>,
    next_generation: AtomicU64,
    eviction: EvictionPolicy,
}

impl SessionRegistry {
    /// Creates an empty registry.
    ///
    /// Sessions without a configuration override share `default_engine`;
    /// sessions with one get an engine from `factory`.
    pub fn new(default_engine: Arc<dyn Engine>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            default_engine,
            factory,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            eviction: EvictionPolicy::Never,
        }
    }

    /// Sets the eviction policy.
    #[must_use]
    pub const fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Configured eviction policy.
    pub const fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Returns the session for `id`, creating it if needed.
    ///
    /// Without an id a fresh one is generated. For a known id the existing
    /// session is returned and `config` is ignored. For a new id with
    /// `config`, a dedicated engine is built from it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SessionCreation`] if the engine could not be
    /// built or connected; the id is unregistered again before the error is
    /// returned, so a later call retries creation.
    pub async fn resolve_or_create(
        &self,
        id: Option<SessionId>,
        config: Option<ConfigOverride>,
    ) -> Result<Arc<Session>, BridgeError> {
        let id = id.unwrap_or_else(SessionId::generate);

        let pending = {
            let mut slots = self.slots.lock();
            if let Some(slot) = slots.get(&id) {
                if config.is_some() {
                    debug!(session_id = %id, "ignoring configuration override for existing session");
                }
                slot.session.clone()
            } else {
                self.insert_slot(&mut slots, id, config, Delivery::Buffered)
            }
        };

        let session = pending.await.map_err(BridgeError::SessionCreation)?;
        session.touch();
        Ok(session)
    }

    /// Opens a streaming session under a freshly generated id.
    ///
    /// The returned stream starts with an `endpoint` event advertising the
    /// follow-up POST path for the session.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::SessionCreation`] if the default engine fails
    /// to connect.
    pub async fn open_stream(&self) -> Result<(Arc<Session>, EventStream), BridgeError> {
        let id = SessionId::generate();
        let (sink, events) = open_stream();
        // The stream is still held here, so this cannot fail.
        let _ = sink.send_endpoint(&endpoint_path(&id));

        let pending = {
            let mut slots = self.slots.lock();
            self.insert_slot(&mut slots, id, None, Delivery::Streaming(sink))
        };

        let session = pending.await.map_err(BridgeError::SessionCreation)?;
        Ok((session, events))
    }

    /// Current state of `id`.
    pub fn state(&self, id: &SessionId) -> SessionState {
        match self.slots.lock().get(id) {
            None => SessionState::Unregistered,
            Some(slot) => match slot.session.peek() {
                Some(Ok(_)) => SessionState::Active,
                _ => SessionState::Connecting,
            },
        }
    }

    /// Drops one session. Returns `true` if it was registered.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.slots.lock().remove(id).is_some();
        if removed {
            info!(session_id = %id, "session removed");
        }
        removed
    }

    /// Drops every session. Returns how many were registered.
    ///
    /// Transports are not closed explicitly; each winds down once the last
    /// handle to its session is released.
    pub fn disconnect_all(&self) -> usize {
        let drained = {
            let mut slots = self.slots.lock();
            std::mem::take(&mut *slots)
        };
        drained.len()
    }

    /// Number of registered sessions, including ones still connecting.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Applies the eviction policy once. Returns the number of sessions dropped.
    pub fn evict_idle(&self) -> usize {
        let EvictionPolicy::IdleFor(max_idle) = self.eviction else {
            return 0;
        };

        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|id, slot| match slot.session.peek() {
            Some(Ok(session)) => {
                let keep =
                    session.idle_for() < max_idle && !session.transport().is_stream_closed();
                if !keep {
                    info!(session_id = %id, "evicting idle session");
                }
                keep
            }
            _ => true,
        });
        before - slots.len()
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `interval` until `cancel` fires.
    ///
    /// Does nothing useful under [`EvictionPolicy::Never`].
    pub fn spawn_eviction_task(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle();
                        if evicted > 0 {
                            debug!(evicted, remaining = self.len(), "eviction sweep");
                        }
                    }
                }
            }
        })
    }

    fn insert_slot(
        &self,
        slots: &mut SlotMap,
        id: SessionId,
        config: Option<ConfigOverride>,
        delivery: Delivery,
    ) -> PendingSession {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let creation = create_session(
            id.clone(),
            config,
            delivery,
            Arc::clone(&self.default_engine),
            Arc::clone(&self.factory),
        );
        let registry_slots = Arc::downgrade(&self.slots);
        let slot_id = id.clone();

        let pending = async move {
            let result = creation.await;
            if let Err(e) = &result {
                warn!(session_id = %slot_id, error = %e, "session creation failed");
                release_slot(&registry_slots, &slot_id, generation);
            }
            result.map(Arc::new).map_err(Arc::new)
        }
        .boxed()
        .shared();

        slots.insert(
            id,
            Slot {
                generation,
                session: pending.clone(),
            },
        );
        pending
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("eviction", &self.eviction)
            .finish_non_exhaustive()
    }
}

/// Removes the slot for `id` if it still belongs to `generation`.
fn release_slot(slots: &Weak<Mutex<SlotMap>>, id: &SessionId, generation: u64) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = slots.lock();
    if slots.get(id).is_some_and(|slot| slot.generation == generation) {
        slots.remove(id);
    }
}

async fn create_session(
    id: SessionId,
    config: Option<ConfigOverride>,
    delivery: Delivery,
    default_engine: Arc<dyn Engine>,
    factory: Arc<dyn EngineFactory>,
) -> Result<Session, BridgeError> {
    let engine = match config {
        Some(config) => {
            debug!(session_id = %id, "building engine from configuration override");
            factory.build(&config)?
        }
        None => default_engine,
    };

    let transport = SessionTransport::new(id.clone(), delivery);
    let io = transport.take_engine_io()?;
    engine.connect(io).await?;

    info!(session_id = %id, streaming = transport.is_streaming(), "session connected");
    Ok(Session::new(id, transport, engine))
}
