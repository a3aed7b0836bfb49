//! Shared test doubles.
//!
//! `ManualClock` lets tests move time by hand; `RecordingSink` keeps every
//! engine event so tests can assert on the full event history.  Both are
//! cheap clones over shared state so a test can keep a handle after moving
//! one into the engine or console.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use edge_executor::LocalExecutor;
use futures_lite::future;
use rigsync::app::events::{ChangeSource, EngineEvent};
use rigsync::app::ports::{Clock, EventSink};
use rigsync::config::ConsoleConfig;
use rigsync::engine::ReconciliationEngine;

// ── ManualClock ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<EngineEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    pub fn reverts(&self) -> usize {
        self.count(|e| matches!(e, EngineEvent::Reverted { .. }))
    }

    pub fn changes(&self, source: ChangeSource) -> usize {
        self.count(|e| matches!(e, EngineEvent::Changed(c) if c.source == source))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &EngineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ── Builders ──────────────────────────────────────────────────

/// Engine over the reference layout, link already up.
#[allow(dead_code)]
pub fn linked_engine() -> (ReconciliationEngine<ManualClock>, ManualClock, RecordingSink) {
    let clock = ManualClock::new();
    let mut sink = RecordingSink::new();
    let mut engine = ReconciliationEngine::new(&ConsoleConfig::default(), clock.clone())
        .expect("default config is valid");
    engine.link_up(&mut sink);
    sink.clear();
    (engine, clock, sink)
}

/// Run `fut` to completion while the executor drives spawned tasks.
#[allow(dead_code)]
pub fn drive<T: 'static>(executor: &LocalExecutor<'static>, fut: impl Future<Output = T>) -> T {
    future::block_on(future::or(fut, executor.run(future::pending())))
}
