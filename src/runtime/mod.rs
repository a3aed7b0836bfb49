//! Async console runtime: single-writer bridge between UI, engine and link.
//!
//! Everything runs on one `edge_executor::LocalExecutor`.  The engine sits
//! in a `RefCell` that is never borrowed across an `.await`, so every store
//! mutation happens in one logical execution context.  Tasks:
//!
//! 1. **Inbound pump**: drains the gateway's inbound stream in delivery
//!    order; stream end means the link was lost and the console freezes.
//! 2. **Revert timers**: one per pending write, each sleeping until its
//!    deadline via `embassy_time::Timer`.  Dropping the task handle cancels
//!    the timer; a timer that fires anyway is checked against the write's
//!    id by the engine and ignored if stale.
//!
//! ```text
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  LocalExecutor                                            │
//!  │   issue() ──▶ engine.issue ──▶ arm timers ──▶ gateway.send│
//!  │   pump    ──▶ engine.handle_inbound ──▶ cancel timer      │
//!  │   timer   ──▶ engine.expire                               │
//!  │                    │                                      │
//!  │                    └──▶ EventSink + change channel ──▶ UI │
//!  └───────────────────────────────────────────────────────────┘
//! ```

use core::cell::RefCell;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::rc::{Rc, Weak};

use edge_executor::{LocalExecutor, Task};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use futures_lite::{Stream, StreamExt};
use heapless::FnvIndexMap;
use log::{debug, info, warn};

use crate::app::commands::Intent;
use crate::app::events::{EngineEvent, EntityChangeEvent, InboundOutcome};
use crate::app::ports::{Clock, EventSink};
use crate::config::ConsoleConfig;
use crate::engine::pending::{MAX_PENDING, PendingKey, PendingWriteHandle, WriteTicket};
use crate::engine::{IssuedFrame, ReconciliationEngine};
use crate::error::Error;
use crate::protocol::frame::decode;
use crate::state::entity::{EntityRef, EntitySnapshot};
use crate::transport::{LinkParams, TransportGateway};

/// Change events buffered for the UI.  On overflow the oldest is evicted,
/// so the newest mutation is always delivered.
pub const CHANGE_DEPTH: usize = 64;

type ChangeChannel = Channel<NoopRawMutex, EntityChangeEvent, CHANGE_DEPTH>;

// ── Event fan-out ────────────────────────────────────────────

/// Forwards every event to the user sink and store changes to the UI
/// channel.
struct Fanout<'a, S> {
    sink: &'a mut S,
    changes: &'a ChangeChannel,
}

impl<S: EventSink> EventSink for Fanout<'_, S> {
    fn emit(&mut self, event: &EngineEvent) {
        if let EngineEvent::Changed(change) = event {
            if self.changes.try_send(*change).is_err() {
                if let Ok(stale) = self.changes.try_receive() {
                    debug!("change stream full, evicted update for {}", stale.snapshot.reference());
                }
                let _ = self.changes.try_send(*change);
            }
        }
        self.sink.emit(event);
    }
}

// ── Shared state ─────────────────────────────────────────────

struct Inner<G, C: Clock, S> {
    engine: RefCell<ReconciliationEngine<C>>,
    gateway: Mutex<NoopRawMutex, G>,
    sink: RefCell<S>,
    changes: Rc<ChangeChannel>,
    timers: RefCell<FnvIndexMap<PendingKey, Task<()>, MAX_PENDING>>,
    pump: RefCell<Option<Task<()>>>,
    link: LinkParams,
}

impl<G, C: Clock, S: EventSink> Inner<G, C, S> {
    fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut ReconciliationEngine<C>, &mut Fanout<'_, S>) -> R,
    ) -> R {
        let mut engine = self.engine.borrow_mut();
        let mut sink = self.sink.borrow_mut();
        let mut fanout = Fanout {
            sink: &mut *sink,
            changes: &self.changes,
        };
        f(&mut engine, &mut fanout)
    }

    fn handle_inbound(&self, bytes: &[u8]) -> InboundOutcome {
        let outcome = self.with_engine(|engine, sink| engine.handle_inbound(bytes, sink));
        if let InboundOutcome::Confirmed(_) = outcome {
            if let Some(key) = decode(bytes)
                .ok()
                .and_then(|f| f.command().map(|c| PendingKey::new(f.target_id, c)))
            {
                self.cancel_timer(&key);
            }
        }
        outcome
    }

    fn cancel_timer(&self, key: &PendingKey) {
        // Dropping the handle cancels the task.
        self.timers.borrow_mut().remove(key);
    }

    /// Cancel every timer and clear pending writes without rollback.
    fn freeze(&self) {
        self.timers.borrow_mut().clear();
        self.with_engine(|engine, sink| engine.disconnect(sink));
    }
}

// ── Tasks ────────────────────────────────────────────────────

async fn revert_timer<G, C: Clock, S: EventSink>(
    inner: Weak<Inner<G, C, S>>,
    ticket: WriteTicket,
    delay_ms: u64,
) {
    Timer::after(Duration::from_millis(delay_ms)).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.with_engine(|engine, sink| engine.expire(ticket.key, ticket.id, sink));
}

async fn inbound_pump<G, C, S, I>(inner: Weak<Inner<G, C, S>>, mut inbound: I)
where
    C: Clock,
    S: EventSink,
    I: Stream<Item = Vec<u8>> + Unpin,
{
    while let Some(chunk) = inbound.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.handle_inbound(&chunk);
    }

    if let Some(inner) = inner.upgrade() {
        warn!("inbound stream ended, link lost");
        inner.freeze();
    }
}

// ── Console ──────────────────────────────────────────────────

/// UI-facing handle.  Cheap to share by reference; all methods take `&self`.
pub struct Console<'ex, G, C, S>
where
    G: TransportGateway + 'static,
    C: Clock + 'static,
    S: EventSink + 'static,
{
    executor: &'ex LocalExecutor<'static>,
    inner: Rc<Inner<G, C, S>>,
}

impl<'ex, G, C, S> Console<'ex, G, C, S>
where
    G: TransportGateway + 'static,
    C: Clock + 'static,
    S: EventSink + 'static,
{
    pub fn new(
        executor: &'ex LocalExecutor<'static>,
        config: &ConsoleConfig,
        gateway: G,
        clock: C,
        sink: S,
    ) -> Result<Self, Error> {
        let engine = ReconciliationEngine::new(config, clock)?;
        Ok(Self {
            executor,
            inner: Rc::new(Inner {
                engine: RefCell::new(engine),
                gateway: Mutex::new(gateway),
                sink: RefCell::new(sink),
                changes: Rc::new(Channel::new()),
                timers: RefCell::new(FnvIndexMap::new()),
                pump: RefCell::new(None),
                link: config.link.clone(),
            }),
        })
    }

    // ── Link lifecycle ────────────────────────────────────────

    /// Open the link and start the inbound pump.
    pub async fn connect(&self) -> Result<(), Error> {
        let params = self.inner.link.clone();
        let inbound = {
            let mut gateway = self.inner.gateway.lock().await;
            gateway.connect(&params).await?;
            gateway.subscribe()?
        };
        info!("connected to '{}' @ {} baud", params.port, params.baud_rate);

        self.inner.with_engine(|engine, sink| engine.link_up(sink));
        let task = self
            .executor
            .spawn(inbound_pump(Rc::downgrade(&self.inner), inbound));
        *self.inner.pump.borrow_mut() = Some(task);
        Ok(())
    }

    /// Close the link.  Pending writes are dropped, the store keeps its
    /// last-known values.
    pub async fn disconnect(&self) {
        let pump = self.inner.pump.borrow_mut().take();
        drop(pump);
        self.inner.gateway.lock().await.disconnect().await;
        if self.is_linked() {
            self.inner.freeze();
        }
    }

    pub fn is_linked(&self) -> bool {
        self.inner.engine.borrow().is_linked()
    }

    // ── UI operations ─────────────────────────────────────────

    /// Apply the intent optimistically, arm its revert timers, then send.
    ///
    /// If a send fails, that frame and every later frame of the intent are
    /// rolled back at once and the transport error is returned.
    pub async fn issue(&self, intent: Intent) -> Result<PendingWriteHandle, Error> {
        let issued = self
            .inner
            .with_engine(|engine, sink| engine.issue(&intent, sink))?;

        for frame in &issued.frames {
            if let Some(ticket) = frame.ticket {
                self.arm(ticket);
            }
        }

        let mut gateway = self.inner.gateway.lock().await;
        for (i, sent) in issued.frames.iter().enumerate() {
            match gateway.send(&sent.frame.encode()).await {
                Ok(()) => {
                    self.inner
                        .with_engine(|engine, sink| engine.frame_sent(&sent.frame, sink));
                }
                Err(e) => {
                    drop(gateway);
                    self.fail_from(&issued.frames[i..], &e);
                    return Err(e.into());
                }
            }
        }

        Ok(issued.handle())
    }

    /// Feed one inbound chunk directly, bypassing the gateway.
    pub fn handle_inbound(&self, bytes: &[u8]) -> InboundOutcome {
        self.inner.handle_inbound(bytes)
    }

    pub fn snapshot_all(&self) -> Vec<EntitySnapshot> {
        self.inner.engine.borrow().snapshot_all()
    }

    pub fn get(&self, reference: EntityRef) -> Option<EntitySnapshot> {
        self.inner.engine.borrow().get(reference)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.engine.borrow().pending_count()
    }

    /// Revert timers currently armed.
    pub fn armed_timers(&self) -> usize {
        self.inner
            .timers
            .borrow()
            .values()
            .filter(|t| !t.is_finished())
            .count()
    }

    pub fn production_mode(&self) -> bool {
        self.inner.engine.borrow().store().production_mode()
    }

    /// Store changes as they happen.  Meant for a single consumer.
    pub fn changes(&self) -> ChangeStream {
        ChangeStream {
            channel: self.inner.changes.clone(),
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn arm(&self, ticket: WriteTicket) {
        let now = self.inner.engine.borrow().now_ms();
        let delay_ms = ticket.deadline_ms.saturating_sub(now);
        let task = self
            .executor
            .spawn(revert_timer(Rc::downgrade(&self.inner), ticket, delay_ms));

        let mut timers = self.inner.timers.borrow_mut();
        let finished: Vec<PendingKey> = timers
            .iter()
            .filter(|(_, t)| t.is_finished())
            .map(|(k, _)| *k)
            .collect();
        for key in &finished {
            timers.remove(key);
        }
        // Replacing an entry drops, and so cancels, the superseded timer.
        if let Err((key, _)) = timers.insert(ticket.key, task) {
            warn!("timer table full, {} will not revert", key);
        }
    }

    /// `frames[0]` is the frame whose send failed; the rest were never tried.
    fn fail_from(&self, frames: &[IssuedFrame], error: &crate::error::TransportError) {
        for (i, unsent) in frames.iter().enumerate() {
            if let Some(ticket) = unsent.ticket {
                if self.inner.engine.borrow().is_current(&ticket) {
                    self.inner.cancel_timer(&ticket.key);
                }
            }
            self.inner.with_engine(|engine, sink| {
                if i == 0 {
                    engine.send_failed(unsent, error.clone(), sink)
                } else {
                    engine.abandon(unsent, sink)
                }
            });
        }
    }
}

impl<G, C, S> Drop for Console<'_, G, C, S>
where
    G: TransportGateway + 'static,
    C: Clock + 'static,
    S: EventSink + 'static,
{
    fn drop(&mut self) {
        self.inner.pump.borrow_mut().take();
        self.inner.timers.borrow_mut().clear();
    }
}

// ── Change stream ────────────────────────────────────────────

/// `Stream` of [`EntityChangeEvent`]s, backed by the console's channel.
pub struct ChangeStream {
    channel: Rc<ChangeChannel>,
}

impl ChangeStream {
    /// Take whatever is buffered without waiting.
    pub fn drain(&self) -> Vec<EntityChangeEvent> {
        core::iter::from_fn(|| self.channel.try_receive().ok()).collect()
    }
}

impl Stream for ChangeStream {
    type Item = EntityChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.channel.poll_receive(cx).map(Some)
    }
}
