//! In-process debugger with conditional and single-step breakpoints.
//!
//! Breakpoints are evaluated synchronously around every node and on every
//! exchange event. A breakpoint with no conditions always fires; otherwise
//! all of its conditions must match.
//!
//! ```rust,ignore
//! let bp = Arc::new(BreakpointSupport::new().on_after(|exchange, node, _| {
//!     println!("{} failed at {}", exchange.id(), node.label());
//!     Ok(())
//! }));
//! engine.debugger().add_breakpoint_with_conditions(bp, vec![Arc::new(ExceptionCondition)]);
//! ```

mod breakpoint;
mod condition;
mod processor;

use std::{
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

pub use breakpoint::{Breakpoint, BreakpointSupport};
pub use condition::{Condition, EventCondition, ExceptionCondition, FnCondition, NodeIdCondition, RouteIdCondition};
pub use processor::{DebugProcessor, DebuggerStrategy};

use crate::{
    Result, ShareLock,
    events::ExchangeEvent,
    model::NodeDefinition,
    runtime::{Exchange, ExchangeId, Processor},
    utils,
};

pub type BreakpointId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum BreakpointState {
    Active,
    Suspended,
}

#[derive(Clone)]
struct Entry {
    id: BreakpointId,
    breakpoint: Arc<dyn Breakpoint>,
    conditions: Vec<Arc<dyn Condition>>,
    state: BreakpointState,
    /// Present for single-step breakpoints: the exchange being stepped.
    stepping: Option<Arc<Mutex<Option<ExchangeId>>>>,
}

impl Entry {
    fn match_process(
        &self,
        exchange: &Exchange,
        processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> bool {
        match &self.stepping {
            Some(stepping) => stepping.lock().unwrap().as_deref() == Some(exchange.id()),
            None => self.conditions.iter().all(|c| c.match_process(exchange, processor, node)),
        }
    }

    fn match_event(
        &self,
        exchange: &Exchange,
        event: &ExchangeEvent,
    ) -> bool {
        let Some(stepping) = &self.stepping else {
            return self.conditions.iter().all(|c| c.match_event(exchange, event));
        };

        let mut current = stepping.lock().unwrap();
        match current.as_deref() {
            None if matches!(event, ExchangeEvent::Created) && self.conditions.iter().all(|c| c.match_event(exchange, event)) => {
                tracing::debug!(exchange_id = %exchange.id(), breakpoint = %self.id, "single step started");
                *current = Some(exchange.id().to_string());
                true
            }
            Some(id) if id == exchange.id() => {
                if event.is_done() {
                    tracing::debug!(exchange_id = %exchange.id(), breakpoint = %self.id, "single step ended");
                    *current = None;
                }
                true
            }
            _ => false,
        }
    }
}

pub struct Debugger {
    enabled: AtomicBool,
    breakpoints: ShareLock<Vec<Entry>>,
    debug_counter: AtomicU64,
}

impl Debugger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            breakpoints: Arc::new(RwLock::new(Vec::new())),
            debug_counter: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(
        &self,
        enabled: bool,
    ) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Add a breakpoint that fires around every node and on every event.
    pub fn add_breakpoint(
        &self,
        breakpoint: Arc<dyn Breakpoint>,
    ) -> BreakpointId {
        self.add_breakpoint_with_conditions(breakpoint, Vec::new())
    }

    pub fn add_breakpoint_with_conditions(
        &self,
        breakpoint: Arc<dyn Breakpoint>,
        conditions: Vec<Arc<dyn Condition>>,
    ) -> BreakpointId {
        self.insert(breakpoint, conditions, None)
    }

    /// Add a breakpoint stepping through one exchange at a time.
    ///
    /// The conditions are matched against the `Created` event; the exchange
    /// they select is stepped through every node until it completes or fails.
    /// Other exchanges flow unimpeded meanwhile.
    pub fn add_single_step_breakpoint(
        &self,
        breakpoint: Arc<dyn Breakpoint>,
        conditions: Vec<Arc<dyn Condition>>,
    ) -> BreakpointId {
        self.insert(breakpoint, conditions, Some(Arc::new(Mutex::new(None))))
    }

    fn insert(
        &self,
        breakpoint: Arc<dyn Breakpoint>,
        conditions: Vec<Arc<dyn Condition>>,
        stepping: Option<Arc<Mutex<Option<ExchangeId>>>>,
    ) -> BreakpointId {
        let id = utils::shortid();
        self.breakpoints.write().unwrap().push(Entry {
            id: id.clone(),
            breakpoint,
            conditions,
            state: BreakpointState::Active,
            stepping,
        });
        id
    }

    pub fn remove_breakpoint(
        &self,
        id: &str,
    ) -> bool {
        let mut breakpoints = self.breakpoints.write().unwrap();
        let before = breakpoints.len();
        breakpoints.retain(|e| e.id != id);
        breakpoints.len() != before
    }

    pub fn breakpoint_ids(&self) -> Vec<BreakpointId> {
        self.breakpoints.read().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    pub fn breakpoint_state(
        &self,
        id: &str,
    ) -> Option<BreakpointState> {
        self.breakpoints.read().unwrap().iter().find(|e| e.id == id).map(|e| e.state)
    }

    pub fn suspend_breakpoint(
        &self,
        id: &str,
    ) {
        self.set_state(Some(id), BreakpointState::Suspended);
    }

    pub fn activate_breakpoint(
        &self,
        id: &str,
    ) {
        self.set_state(Some(id), BreakpointState::Active);
    }

    pub fn suspend_all_breakpoints(&self) {
        self.set_state(None, BreakpointState::Suspended);
    }

    pub fn activate_all_breakpoints(&self) {
        self.set_state(None, BreakpointState::Active);
    }

    fn set_state(
        &self,
        id: Option<&str>,
        state: BreakpointState,
    ) {
        for entry in self.breakpoints.write().unwrap().iter_mut() {
            if id.is_none_or(|id| id == entry.id) {
                entry.state = state;
            }
        }
    }

    /// Number of node invocations seen while enabled.
    pub fn debug_counter(&self) -> u64 {
        self.debug_counter.load(Ordering::Relaxed)
    }

    pub fn reset_debug_counter(&self) {
        self.debug_counter.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the active breakpoints, so callbacks run without the lock.
    fn active(&self) -> Vec<Entry> {
        self.breakpoints.read().unwrap().iter().filter(|e| e.state == BreakpointState::Active).cloned().collect()
    }

    pub fn before_process(
        &self,
        exchange: &mut Exchange,
        processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.debug_counter.fetch_add(1, Ordering::Relaxed);
        for entry in self.active() {
            if entry.match_process(exchange, processor, node) {
                entry.breakpoint.before_process(exchange, processor, node)?;
            }
        }
        Ok(())
    }

    pub fn after_process(
        &self,
        exchange: &mut Exchange,
        processor: &dyn Processor,
        node: &NodeDefinition,
        elapsed: Duration,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        tracing::trace!(exchange_id = %exchange.id(), "debugger after {} took {}", node.label(), utils::time::format_elapsed(elapsed));
        for entry in self.active() {
            if entry.match_process(exchange, processor, node) {
                entry.breakpoint.after_process(exchange, processor, node, elapsed)?;
            }
        }
        Ok(())
    }

    pub fn on_event(
        &self,
        exchange: &mut Exchange,
        event: &ExchangeEvent,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        // every entry is matched, even after an error, so single steps
        // still start and end
        let mut result = Ok(());
        for entry in self.active() {
            if entry.match_event(exchange, event) && result.is_ok() {
                result = entry.breakpoint.on_event(exchange, event);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ProcessorRef, processor_fn};

    fn recorder(seen: Arc<Mutex<Vec<String>>>) -> Arc<BreakpointSupport> {
        let before = seen.clone();
        let event = seen.clone();
        Arc::new(
            BreakpointSupport::new()
                .on_before(move |ex, node| {
                    before.lock().unwrap().push(format!("{}@{}", ex.body_text().unwrap_or_default(), node.id().unwrap_or_default()));
                    Ok(())
                })
                .on_event(move |ex, e| {
                    event.lock().unwrap().push(format!("{}:{}", ex.body_text().unwrap_or_default(), e.str()));
                    Ok(())
                }),
        )
    }

    fn noop() -> ProcessorRef {
        processor_fn("noop", |_| Ok(()))
    }

    #[test]
    fn test_disabled_debugger_does_nothing() {
        let debugger = Debugger::new(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        debugger.add_breakpoint(recorder(seen.clone()));

        let mut exchange = Exchange::with_body("a");
        debugger.before_process(&mut exchange, noop().as_ref(), &NodeDefinition::to("mock:a").with_id("to1")).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(debugger.debug_counter(), 0);
    }

    #[test]
    fn test_conditions_and_suspend() {
        let debugger = Debugger::new(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = debugger.add_breakpoint_with_conditions(recorder(seen.clone()), vec![Arc::new(NodeIdCondition::new("to2"))]);

        let mut exchange = Exchange::with_body("a");
        for node in ["to1", "to2"] {
            debugger.before_process(&mut exchange, noop().as_ref(), &NodeDefinition::to("mock:a").with_id(node)).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec!["a@to2"]);

        debugger.suspend_all_breakpoints();
        assert_eq!(debugger.breakpoint_state(&id), Some(BreakpointState::Suspended));
        debugger.before_process(&mut exchange, noop().as_ref(), &NodeDefinition::to("mock:a").with_id("to2")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(debugger.debug_counter(), 3);

        debugger.activate_breakpoint(&id);
        assert!(debugger.remove_breakpoint(&id));
        assert!(debugger.breakpoint_ids().is_empty());
    }

    #[test]
    fn test_single_step_one_exchange_at_a_time() {
        let debugger = Debugger::new(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        debugger.add_single_step_breakpoint(recorder(seen.clone()), Vec::new());
        let node = NodeDefinition::to("mock:a").with_id("to1");

        let mut first = Exchange::with_body("a");
        let mut second = Exchange::with_body("b");
        debugger.on_event(&mut first, &ExchangeEvent::Created).unwrap();
        debugger.on_event(&mut second, &ExchangeEvent::Created).unwrap();
        debugger.before_process(&mut first, noop().as_ref(), &node).unwrap();
        debugger.before_process(&mut second, noop().as_ref(), &node).unwrap();
        debugger.on_event(&mut first, &ExchangeEvent::Completed).unwrap();

        let mut third = Exchange::with_body("c");
        debugger.on_event(&mut third, &ExchangeEvent::Created).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a:Created", "a@to1", "a:Completed", "c:Created"]);
    }
}
