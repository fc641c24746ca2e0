// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update scheduling.
//!
//! Requests queue at most one cycle at a time; further requests coalesce into
//! it. A queued cycle runs once every [`Precondition`] holds, in order:
//!
//! 1. the previous cycle's completion has settled,
//! 2. the element has been connected at least once,
//! 3. the gate from [`UpdateHooks::perform_gate`], if any, has opened.
//!
//! While a cycle runs it keeps absorbing requests until it takes its change
//! batch. Requests after that queue a follow-up cycle, which makes the running
//! cycle resolve `false`.

use core::mem;

use tracing::{debug, debug_span, trace, warn};

use crate::completion::{CycleSettler, GateState, UpdateCompletion, UpdateGate};
use crate::error::UpdateError;
use crate::hooks::UpdateHooks;
use crate::lifecycle::{LifecycleFlags, UpdatePhase};
use crate::state::ElementState;

/// A condition a queued cycle waits for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Precondition {
    /// The previous cycle has not settled.
    PreviousSettled,
    /// The element has never been connected.
    Connected,
    /// The update gate has not opened.
    Gate,
}

/// What a call to [`Element::run_pending`](crate::Element::run_pending) did.
#[derive(Clone, Debug)]
pub enum CycleStep {
    /// No cycle is queued.
    Idle,
    /// The queued cycle is waiting for a precondition.
    Blocked(Precondition),
    /// The queued cycle ran (or was rejected by a dropped gate) and settled.
    Ran {
        /// Number of the cycle.
        cycle: u64,
        /// The outcome its completion resolved with.
        outcome: Result<bool, UpdateError>,
    },
}

impl CycleStep {
    /// Returns `true` if a cycle settled.
    #[must_use]
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran { .. })
    }
}

#[derive(Debug)]
enum GateSlot {
    Unchecked,
    Open,
    Waiting(UpdateGate),
}

#[derive(Debug)]
pub(crate) struct UpdateScheduler {
    phase: UpdatePhase,
    /// The running cycle has not taken its batch yet.
    accepting: bool,
    last_cycle: u64,
    queued: Option<CycleSettler>,
    active: Option<CycleSettler>,
    latest: UpdateCompletion,
    previous: UpdateCompletion,
    gate: GateSlot,
}

impl UpdateScheduler {
    pub(crate) fn new() -> Self {
        let settled = UpdateCompletion::resolved(0, Ok(true));
        Self {
            phase: UpdatePhase::Idle,
            accepting: false,
            last_cycle: 0,
            queued: None,
            active: None,
            latest: settled.clone(),
            previous: settled,
            gate: GateSlot::Unchecked,
        }
    }

    pub(crate) fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub(crate) fn latest(&self) -> &UpdateCompletion {
        &self.latest
    }

    pub(crate) fn queued_cycle(&self) -> Option<u64> {
        self.queued.as_ref().map(CycleSettler::cycle)
    }

    pub(crate) fn is_performing(&self) -> bool {
        self.phase == UpdatePhase::Performing
    }

    /// Returns `true` if a cycle is queued or has not yet settled.
    pub(crate) fn is_update_pending(&self) -> bool {
        self.queued.is_some() || self.is_performing()
    }

    /// Requests a cycle, returning the completion of the cycle that will
    /// observe the request.
    pub(crate) fn request(&mut self, element: &'static str) -> UpdateCompletion {
        if self.queued.is_some() || (self.is_performing() && self.accepting) {
            trace!(element, cycle = self.latest.cycle(), "update request coalesced");
            return self.latest.clone();
        }

        self.last_cycle += 1;
        let cycle = self.last_cycle;
        let (completion, settler) = UpdateCompletion::pending(cycle);
        self.previous = mem::replace(&mut self.latest, completion.clone());
        self.queued = Some(settler);
        self.gate = GateSlot::Unchecked;
        if self.phase == UpdatePhase::Idle {
            self.phase = UpdatePhase::Requested;
        }
        trace!(element, cycle, "update requested");
        completion
    }

    /// Checks the preconditions that don't involve the gate.
    pub(crate) fn blocked_on(&self, lifecycle: LifecycleFlags) -> Option<Precondition> {
        if !self.previous.is_settled() {
            return Some(Precondition::PreviousSettled);
        }
        if !lifecycle.contains(LifecycleFlags::HAS_CONNECTED) {
            return Some(Precondition::Connected);
        }
        None
    }

    pub(crate) fn gate_unchecked(&self) -> bool {
        matches!(self.gate, GateSlot::Unchecked)
    }

    pub(crate) fn install_gate(&mut self, gate: Option<UpdateGate>) {
        self.gate = match gate {
            Some(gate) => GateSlot::Waiting(gate),
            None => GateSlot::Open,
        };
    }

    pub(crate) fn poll_gate(&mut self) -> GateState {
        let state = match &mut self.gate {
            GateSlot::Unchecked => GateState::Closed,
            GateSlot::Open => GateState::Open,
            GateSlot::Waiting(gate) => gate.poll_state(),
        };
        if state == GateState::Open {
            self.gate = GateSlot::Open;
        }
        state
    }

    /// Settles the queued cycle without running it.
    pub(crate) fn reject_queued(&mut self, error: UpdateError) {
        if let Some(settler) = self.queued.take() {
            settler.settle(Err(error));
        }
        self.gate = GateSlot::Unchecked;
        if self.phase == UpdatePhase::Requested {
            self.phase = UpdatePhase::Idle;
        }
    }

    /// Starts the queued cycle.
    pub(crate) fn begin(&mut self) -> Option<u64> {
        let settler = self.queued.take()?;
        let cycle = settler.cycle();
        self.active = Some(settler);
        self.phase = UpdatePhase::Performing;
        self.accepting = true;
        self.gate = GateSlot::Unchecked;
        Some(cycle)
    }

    /// The running cycle has taken its batch; later requests queue a
    /// follow-up.
    pub(crate) fn stop_accepting(&mut self) {
        self.accepting = false;
    }

    pub(crate) fn mark_settled(&mut self) {
        if self.phase == UpdatePhase::Performing {
            self.phase = UpdatePhase::Settled;
            self.accepting = false;
        }
    }

    /// Finishes the running cycle and resolves its completion.
    pub(crate) fn finish(&mut self, result: Result<(), UpdateError>) -> Result<bool, UpdateError> {
        let outcome = result.map(|()| self.queued.is_none());
        self.phase = if self.queued.is_some() {
            UpdatePhase::Requested
        } else {
            UpdatePhase::Idle
        };
        if let Some(settler) = self.active.take() {
            settler.settle(outcome.clone());
        }
        outcome
    }
}

/// Runs the queued cycle if its preconditions hold.
pub(crate) fn run_pending<H: UpdateHooks + ?Sized>(
    hooks: &mut H,
    state: &mut ElementState,
) -> CycleStep {
    let element = state.type_name();
    let Some(cycle) = state.scheduler.queued_cycle() else {
        return CycleStep::Idle;
    };

    if let Some(blocked) = state.scheduler.blocked_on(state.lifecycle) {
        trace!(element, cycle, ?blocked, "update cycle blocked");
        return CycleStep::Blocked(blocked);
    }

    if state.scheduler.gate_unchecked() {
        let gate = hooks.perform_gate(state);
        state.scheduler.install_gate(gate);
    }
    match state.scheduler.poll_gate() {
        GateState::Open => {}
        GateState::Closed => {
            trace!(element, cycle, blocked = ?Precondition::Gate, "update cycle blocked");
            return CycleStep::Blocked(Precondition::Gate);
        }
        GateState::Dropped => {
            warn!(element, cycle, "update gate dropped; rejecting cycle");
            state.scheduler.reject_queued(UpdateError::GateDropped);
            return CycleStep::Ran {
                cycle,
                outcome: Err(UpdateError::GateDropped),
            };
        }
    }

    let _span = debug_span!("update_cycle", element, cycle).entered();
    state.scheduler.begin();
    let result = hooks.perform_update(state);
    state.scheduler.mark_settled();
    if let Err(err) = &result {
        warn!(%err, "update cycle failed");
    }
    let outcome = state.scheduler.finish(result);
    debug!(?outcome, "update cycle settled");
    CycleStep::Ran { cycle, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELEMENT: &str = "Test";

    fn connected() -> LifecycleFlags {
        LifecycleFlags::HAS_CONNECTED | LifecycleFlags::CONNECTED
    }

    #[test]
    fn starts_idle_with_settled_completion() {
        let scheduler = UpdateScheduler::new();
        assert_eq!(scheduler.phase(), UpdatePhase::Idle);
        assert!(scheduler.latest().is_settled());
        assert_eq!(scheduler.queued_cycle(), None);
        assert!(!scheduler.is_update_pending());
    }

    #[test]
    fn requests_coalesce_while_queued() {
        let mut scheduler = UpdateScheduler::new();
        let first = scheduler.request(ELEMENT);
        let second = scheduler.request(ELEMENT);
        assert_eq!(first.cycle(), 1);
        assert_eq!(second.cycle(), 1);
        assert_eq!(scheduler.phase(), UpdatePhase::Requested);
        assert_eq!(scheduler.queued_cycle(), Some(1));
    }

    #[test]
    fn connection_gates_the_first_cycle() {
        let mut scheduler = UpdateScheduler::new();
        scheduler.request(ELEMENT);
        assert_eq!(
            scheduler.blocked_on(LifecycleFlags::empty()),
            Some(Precondition::Connected)
        );
        assert_eq!(scheduler.blocked_on(connected()), None);
    }

    #[test]
    fn request_while_accepting_joins_running_cycle() {
        let mut scheduler = UpdateScheduler::new();
        scheduler.request(ELEMENT);
        assert_eq!(scheduler.begin(), Some(1));
        assert_eq!(scheduler.request(ELEMENT).cycle(), 1);
        assert_eq!(scheduler.queued_cycle(), None);

        scheduler.stop_accepting();
        assert_eq!(scheduler.request(ELEMENT).cycle(), 2);
        assert_eq!(scheduler.phase(), UpdatePhase::Performing);

        scheduler.mark_settled();
        assert_eq!(scheduler.phase(), UpdatePhase::Settled);
        assert!(matches!(scheduler.finish(Ok(())), Ok(false)));
        assert_eq!(scheduler.phase(), UpdatePhase::Requested);
    }

    #[test]
    fn follow_up_waits_for_previous_cycle() {
        let mut scheduler = UpdateScheduler::new();
        let first = scheduler.request(ELEMENT);
        scheduler.begin();
        scheduler.stop_accepting();
        scheduler.request(ELEMENT);
        assert_eq!(
            scheduler.blocked_on(connected()),
            Some(Precondition::PreviousSettled)
        );
        scheduler.mark_settled();
        assert!(scheduler.finish(Ok(())).is_ok());
        assert!(first.is_settled());
        assert_eq!(scheduler.blocked_on(connected()), None);
    }

    #[test]
    fn finish_with_nothing_queued_resolves_true() {
        let mut scheduler = UpdateScheduler::new();
        let completion = scheduler.request(ELEMENT);
        scheduler.begin();
        scheduler.mark_settled();
        assert!(matches!(scheduler.finish(Ok(())), Ok(true)));
        assert!(matches!(completion.peek(), Some(Ok(true))));
        assert_eq!(scheduler.phase(), UpdatePhase::Idle);
    }

    #[test]
    fn rejected_cycle_resolves_with_error() {
        let mut scheduler = UpdateScheduler::new();
        let completion = scheduler.request(ELEMENT);
        scheduler.reject_queued(UpdateError::GateDropped);
        assert!(matches!(
            completion.peek(),
            Some(Err(UpdateError::GateDropped))
        ));
        assert_eq!(scheduler.phase(), UpdatePhase::Idle);
        assert_eq!(scheduler.request(ELEMENT).cycle(), 2);
    }

    #[test]
    fn gate_slot_transitions() {
        let mut scheduler = UpdateScheduler::new();
        scheduler.request(ELEMENT);
        assert!(scheduler.gate_unchecked());
        let (gate, opener) = UpdateGate::new();
        scheduler.install_gate(Some(gate));
        assert_eq!(scheduler.poll_gate(), GateState::Closed);
        opener.open();
        assert_eq!(scheduler.poll_gate(), GateState::Open);
        assert!(!scheduler.gate_unchecked());

        let mut scheduler = UpdateScheduler::new();
        scheduler.install_gate(None);
        assert_eq!(scheduler.poll_gate(), GateState::Open);
    }
}
