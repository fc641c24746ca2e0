// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Completion signals and update gates.
//!
//! Each update cycle owns one [`UpdateCompletion`]. It resolves once the cycle
//! has run: `Ok(true)` if no further update was requested meanwhile,
//! `Ok(false)` if another cycle is already queued, or an [`UpdateError`] if the
//! cycle failed. Completions are cheap to clone; every clone observes the same
//! outcome.
//!
//! An [`UpdateGate`] lets a hook hold a queued cycle back until some outside
//! event, signalled through the paired [`GateOpener`].

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_channel::oneshot;
use futures_util::FutureExt;
use futures_util::future::Shared;

use crate::error::UpdateError;

type Outcome = Result<bool, UpdateError>;

/// The completion signal of one update cycle.
///
/// `UpdateCompletion` is a [`Future`]; it can also be inspected without an
/// executor through [`peek`](Self::peek).
#[derive(Clone)]
pub struct UpdateCompletion {
    cycle: u64,
    inner: Shared<oneshot::Receiver<Outcome>>,
}

impl UpdateCompletion {
    pub(crate) fn pending(cycle: u64) -> (Self, CycleSettler) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                cycle,
                inner: receiver.shared(),
            },
            CycleSettler { cycle, sender },
        )
    }

    pub(crate) fn resolved(cycle: u64, outcome: Outcome) -> Self {
        let (completion, settler) = Self::pending(cycle);
        settler.settle(outcome);
        completion
    }

    /// Returns the number of the cycle this completion belongs to.
    ///
    /// Cycles are numbered from 1 in request order; 0 is the settled
    /// placeholder an element starts with.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns the outcome if the cycle has settled.
    #[must_use]
    pub fn peek(&self) -> Option<Outcome> {
        self.inner
            .clone()
            .now_or_never()
            .map(|received| received.unwrap_or(Err(UpdateError::Abandoned)))
    }

    /// Returns `true` if the cycle has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

impl Future for UpdateCompletion {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|received| received.unwrap_or(Err(UpdateError::Abandoned)))
    }
}

impl fmt::Debug for UpdateCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCompletion")
            .field("cycle", &self.cycle)
            .field("outcome", &self.peek())
            .finish_non_exhaustive()
    }
}

/// Resolves the completion of one cycle.
///
/// Dropping a settler without settling resolves the completion with
/// [`UpdateError::Abandoned`].
#[derive(Debug)]
pub(crate) struct CycleSettler {
    cycle: u64,
    sender: oneshot::Sender<Outcome>,
}

impl CycleSettler {
    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn settle(self, outcome: Outcome) {
        // Nobody holding a completion is fine.
        let _ = self.sender.send(outcome);
    }
}

/// Holds a queued update cycle back until it is opened.
///
/// Returned from [`UpdateHooks::perform_gate`](crate::UpdateHooks::perform_gate).
/// The cycle runs on the first flush after [`GateOpener::open`]; if the
/// opener is dropped instead, the cycle is rejected with
/// [`UpdateError::GateDropped`].
///
/// ```rust
/// use understory_element::UpdateGate;
///
/// let (mut gate, opener) = UpdateGate::new();
/// assert!(!gate.is_open());
/// opener.open();
/// assert!(gate.is_open());
/// ```
#[derive(Debug)]
pub struct UpdateGate {
    receiver: oneshot::Receiver<()>,
    open: bool,
}

/// Opens an [`UpdateGate`].
#[derive(Debug)]
pub struct GateOpener {
    sender: oneshot::Sender<()>,
}

/// Observed state of an [`UpdateGate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum GateState {
    Open,
    Closed,
    Dropped,
}

impl UpdateGate {
    /// Creates a closed gate and its opener.
    #[must_use]
    pub fn new() -> (Self, GateOpener) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                receiver,
                open: false,
            },
            GateOpener { sender },
        )
    }

    /// Creates a gate that is already open.
    #[must_use]
    pub fn opened() -> Self {
        let (gate, opener) = Self::new();
        opener.open();
        gate
    }

    /// Returns `true` if the gate has been opened.
    #[must_use]
    pub fn is_open(&mut self) -> bool {
        self.poll_state() == GateState::Open
    }

    pub(crate) fn poll_state(&mut self) -> GateState {
        if self.open {
            return GateState::Open;
        }
        match self.receiver.try_recv() {
            Ok(Some(())) => {
                self.open = true;
                GateState::Open
            }
            Ok(None) => GateState::Closed,
            Err(oneshot::Canceled) => GateState::Dropped,
        }
    }
}

impl GateOpener {
    /// Opens the gate.
    pub fn open(self) {
        // The gate may already be gone with its cycle.
        let _ = self.sender.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_completion_is_settled() {
        let completion = UpdateCompletion::resolved(0, Ok(true));
        assert!(completion.is_settled());
        assert!(matches!(completion.peek(), Some(Ok(true))));
        assert_eq!(completion.cycle(), 0);
    }

    #[test]
    fn pending_completion_settles_every_clone() {
        let (completion, settler) = UpdateCompletion::pending(3);
        let clone = completion.clone();
        assert!(!completion.is_settled());
        assert_eq!(settler.cycle(), 3);
        settler.settle(Ok(false));
        assert!(matches!(clone.peek(), Some(Ok(false))));
        assert!(matches!(pollster::block_on(completion), Ok(false)));
    }

    #[test]
    fn dropped_settler_abandons() {
        let (completion, settler) = UpdateCompletion::pending(1);
        drop(settler);
        assert!(matches!(completion.peek(), Some(Err(UpdateError::Abandoned))));
    }

    #[test]
    fn gate_states() {
        let (mut gate, opener) = UpdateGate::new();
        assert_eq!(gate.poll_state(), GateState::Closed);
        opener.open();
        assert_eq!(gate.poll_state(), GateState::Open);
        assert_eq!(gate.poll_state(), GateState::Open);

        let (mut gate, opener) = UpdateGate::new();
        drop(opener);
        assert_eq!(gate.poll_state(), GateState::Dropped);

        let mut gate = UpdateGate::opened();
        assert_eq!(gate.poll_state(), GateState::Open);
    }
}
