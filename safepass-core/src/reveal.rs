//! Session-scoped reveal state for record details.
//!
//! A record's login and secret are shown only after a successful biometric
//! check. State is keyed by position, lives only in memory, and starts out
//! Hidden for every record after each vault load.
//!
//! Transitions:
//! - `Hidden` → `Pending` → `Revealed` (authentication succeeded)
//! - `Pending` → `Hidden` (precondition unmet or authentication failed)
//! - `Revealed` → `Hidden` (detail view closed, record deleted, session reset)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{AuthUnavailable, Result, SafePassError};
use crate::platform::Biometric;

const REVEAL_PROMPT: &str = "Confirm your identity to show this record";

/// Visible state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Hidden,
    Revealed,
}

/// What a call to `RevealGate::reveal` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Authentication succeeded; the record is now revealed.
    Revealed,
    /// The record was already revealed; no prompt was shown.
    AlreadyRevealed,
    /// A prompt for this record is already in flight; no second prompt.
    InProgress,
    /// Authentication succeeded but the record was deleted or the session
    /// reset while the prompt was open.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Authentication in flight, tagged so the answer finds its record even
    /// if positions shift meanwhile.
    Pending(u64),
    Revealed,
}

#[derive(Debug, Default)]
struct GateState {
    slots: HashMap<usize, Slot>,
    next_ticket: u64,
}

/// Per-record reveal state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RevealGate {
    biometric: Arc<dyn Biometric>,
    state: Arc<Mutex<GateState>>,
}

impl RevealGate {
    pub fn new(biometric: Arc<dyn Biometric>) -> Self {
        Self {
            biometric,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // State is a plain map; a panic elsewhere cannot leave it half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self, index: usize) -> RevealState {
        match self.lock().slots.get(&index) {
            Some(Slot::Revealed) => RevealState::Revealed,
            Some(Slot::Pending(_)) | None => RevealState::Hidden,
        }
    }

    /// Whether a prompt for `index` is currently open.
    pub fn is_pending(&self, index: usize) -> bool {
        matches!(self.lock().slots.get(&index), Some(Slot::Pending(_)))
    }

    /// Positions currently tracked (pending or revealed).
    pub fn tracked(&self) -> usize {
        self.lock().slots.len()
    }

    /// Authenticate and reveal the record at `index`.
    pub async fn reveal(&self, index: usize) -> Result<RevealOutcome> {
        let ticket = {
            let mut state = self.lock();
            match state.slots.get(&index) {
                Some(Slot::Revealed) => return Ok(RevealOutcome::AlreadyRevealed),
                Some(Slot::Pending(_)) => {
                    debug!("Reveal of record {} already in progress", index);
                    return Ok(RevealOutcome::InProgress);
                }
                None => {}
            }
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.slots.insert(index, Slot::Pending(ticket));
            ticket
        };

        let result = self.authenticate().await;

        let mut state = self.lock();
        let position = state
            .slots
            .iter()
            .find(|(_, slot)| **slot == Slot::Pending(ticket))
            .map(|(position, _)| *position);

        match (result, position) {
            (Ok(()), Some(position)) => {
                state.slots.insert(position, Slot::Revealed);
                info!("Record {} revealed", position);
                Ok(RevealOutcome::Revealed)
            }
            (Ok(()), None) => Ok(RevealOutcome::Discarded),
            (Err(e), position) => {
                if let Some(position) = position {
                    state.slots.remove(&position);
                }
                Err(e)
            }
        }
    }

    async fn authenticate(&self) -> Result<()> {
        if !self.biometric.has_hardware().await {
            return Err(SafePassError::AuthenticationUnavailable(
                AuthUnavailable::NoHardware,
            ));
        }
        if !self.biometric.is_enrolled().await {
            return Err(SafePassError::AuthenticationUnavailable(
                AuthUnavailable::NotEnrolled,
            ));
        }
        if !self.biometric.authenticate(REVEAL_PROMPT).await {
            return Err(SafePassError::AuthenticationFailed);
        }
        Ok(())
    }

    /// Hide the record again, e.g. when its detail view closes.
    pub fn conceal(&self, index: usize) {
        let mut state = self.lock();
        if let Some(Slot::Revealed) = state.slots.get(&index) {
            state.slots.remove(&index);
        }
    }

    /// `count` records were inserted at the front of the vault.
    pub fn shift_for_prepend(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut state = self.lock();
        state.slots = state
            .slots
            .drain()
            .map(|(position, slot)| (position + count, slot))
            .collect();
    }

    /// The record at `index` was deleted; later records move up by one.
    pub fn remove(&self, index: usize) {
        let mut state = self.lock();
        state.slots = state
            .slots
            .drain()
            .filter(|(position, _)| *position != index)
            .map(|(position, slot)| {
                if position > index {
                    (position - 1, slot)
                } else {
                    (position, slot)
                }
            })
            .collect();
    }

    /// Session restart: everything back to Hidden, open prompts discarded.
    pub fn reset(&self) {
        self.lock().slots.clear();
    }
}

impl std::fmt::Debug for RevealGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealGate")
            .field("tracked", &self.tracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ScriptedBiometric;

    fn gate(biometric: ScriptedBiometric) -> (Arc<ScriptedBiometric>, RevealGate) {
        let biometric = Arc::new(biometric);
        (biometric.clone(), RevealGate::new(biometric))
    }

    #[tokio::test]
    async fn test_hidden_until_authenticated() {
        let (_, gate) = gate(ScriptedBiometric::accepting());
        assert_eq!(gate.state(0), RevealState::Hidden);

        assert_eq!(gate.reveal(0).await.unwrap(), RevealOutcome::Revealed);
        assert_eq!(gate.state(0), RevealState::Revealed);
        assert_eq!(gate.state(1), RevealState::Hidden);
    }

    #[tokio::test]
    async fn test_already_revealed_does_not_prompt_again() {
        let (biometric, gate) = gate(ScriptedBiometric::accepting());
        gate.reveal(0).await.unwrap();
        assert_eq!(gate.reveal(0).await.unwrap(), RevealOutcome::AlreadyRevealed);
        assert_eq!(biometric.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_unmet_preconditions_report_distinct_errors() {
        let (biometric, no_hw) = gate(ScriptedBiometric::new(false, true, true));
        assert!(matches!(
            no_hw.reveal(0).await,
            Err(SafePassError::AuthenticationUnavailable(
                AuthUnavailable::NoHardware
            ))
        ));
        assert_eq!(biometric.prompt_count(), 0);
        assert_eq!(no_hw.state(0), RevealState::Hidden);
        assert_eq!(no_hw.tracked(), 0);

        let (_, not_enrolled) = gate(ScriptedBiometric::new(true, false, true));
        assert!(matches!(
            not_enrolled.reveal(0).await,
            Err(SafePassError::AuthenticationUnavailable(
                AuthUnavailable::NotEnrolled
            ))
        ));

        let (_, rejected) = gate(ScriptedBiometric::new(true, true, false));
        assert!(matches!(
            rejected.reveal(0).await,
            Err(SafePassError::AuthenticationFailed)
        ));
        assert_eq!(rejected.state(0), RevealState::Hidden);
    }

    #[tokio::test]
    async fn test_concurrent_prompt_is_suppressed() {
        let (biometric, gate) = gate(ScriptedBiometric::accepting().held());

        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.reveal(2).await }
        });
        while !gate.is_pending(2) {
            tokio::task::yield_now().await;
        }

        assert_eq!(gate.reveal(2).await.unwrap(), RevealOutcome::InProgress);
        // Other records are independent
        assert_eq!(gate.state(1), RevealState::Hidden);

        biometric.release();
        assert_eq!(first.await.unwrap().unwrap(), RevealOutcome::Revealed);
        assert_eq!(biometric.prompt_count(), 1);
        assert_eq!(gate.state(2), RevealState::Revealed);
    }

    #[tokio::test]
    async fn test_pending_reveal_follows_shifted_record() {
        let (biometric, gate) = gate(ScriptedBiometric::accepting().held());

        let pending = tokio::spawn({
            let gate = gate.clone();
            async move { gate.reveal(0).await }
        });
        while !gate.is_pending(0) {
            tokio::task::yield_now().await;
        }

        gate.shift_for_prepend(1);
        biometric.release();
        assert_eq!(pending.await.unwrap().unwrap(), RevealOutcome::Revealed);
        assert_eq!(gate.state(0), RevealState::Hidden);
        assert_eq!(gate.state(1), RevealState::Revealed);
    }

    #[tokio::test]
    async fn test_pending_reveal_of_deleted_record_is_discarded() {
        let (biometric, gate) = gate(ScriptedBiometric::accepting().held());

        let pending = tokio::spawn({
            let gate = gate.clone();
            async move { gate.reveal(0).await }
        });
        while !gate.is_pending(0) {
            tokio::task::yield_now().await;
        }

        gate.remove(0);
        biometric.release();
        assert_eq!(pending.await.unwrap().unwrap(), RevealOutcome::Discarded);
        assert_eq!(gate.tracked(), 0);
    }

    #[tokio::test]
    async fn test_remove_and_shift() {
        let (_, gate) = gate(ScriptedBiometric::accepting());
        gate.reveal(0).await.unwrap();
        gate.reveal(2).await.unwrap();

        gate.remove(0);
        assert_eq!(gate.tracked(), 1);
        assert_eq!(gate.state(1), RevealState::Revealed);
        assert_eq!(gate.state(0), RevealState::Hidden);

        gate.shift_for_prepend(2);
        assert_eq!(gate.state(3), RevealState::Revealed);

        gate.conceal(3);
        assert_eq!(gate.tracked(), 0);
    }

    #[tokio::test]
    async fn test_reset_hides_everything() {
        let (_, gate) = gate(ScriptedBiometric::accepting());
        gate.reveal(0).await.unwrap();
        gate.reveal(1).await.unwrap();
        gate.reset();
        assert_eq!(gate.state(0), RevealState::Hidden);
        assert_eq!(gate.state(1), RevealState::Hidden);
        assert_eq!(gate.tracked(), 0);
    }
}
