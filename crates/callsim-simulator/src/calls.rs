//! In-memory registry of active simulated calls.
//!
//! All reads and writes go through one mutex with short, non-async critical
//! sections. Status records are snapshotted while the lock is held, so the
//! pushes that follow never touch shared state.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use callsim_core::{Call, CallId, CallStatus};
use chrono::{DateTime, Utc};

use crate::error::{Result, SimulatorError};

/// Result of one advancement pass over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancePass {
    /// Status of every call that moved to its next stage.
    pub advanced: Vec<CallStatus>,
    /// Calls removed because they had already ended.
    pub purged: Vec<CallId>,
}

/// Owned map from call identifier to call state.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Mutex<HashMap<CallId, Call>>,
}

impl CallRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallId, Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a new call and returns its initial status.
    ///
    /// # Errors
    ///
    /// Returns `SimulatorError::DuplicateCall` if the identifier is already
    /// active; the existing call is left untouched.
    pub fn insert(&self, call: Call) -> Result<CallStatus> {
        let mut calls = self.lock();
        if calls.contains_key(call.id()) {
            return Err(SimulatorError::DuplicateCall { call_id: call.id().clone() });
        }

        let status = call.status();
        calls.insert(call.id().clone(), call);
        Ok(status)
    }

    /// Runs one advancement pass.
    ///
    /// Calls already `Ended` are removed without producing a status; every
    /// other call moves one stage forward, stamped with `now`.
    pub fn advance_all(&self, now: DateTime<Utc>) -> AdvancePass {
        let mut pass = AdvancePass::default();

        self.lock().retain(|call_id, call| {
            if call.advance(now).is_some() {
                pass.advanced.push(call.status());
                true
            } else {
                pass.purged.push(call_id.clone());
                false
            }
        });

        pass
    }

    /// Copy of one call's current state.
    pub fn get(&self, call_id: &CallId) -> Option<Call> {
        self.lock().get(call_id).cloned()
    }

    /// Copy of every active call.
    pub fn snapshot(&self) -> Vec<Call> {
        self.lock().values().cloned().collect()
    }

    /// Number of active calls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no calls are active.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use callsim_core::{CallIdentity, EventType};

    use super::*;

    fn call(id: &str) -> Call {
        Call::new(
            CallIdentity {
                id: CallId::new(id),
                account_id: "acct".to_string(),
                service_type: 1,
                caller: "13100000000".to_string(),
                callee: "13200000000".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn insert_returns_calling_status() {
        let registry = CallRegistry::new();

        let status = registry.insert(call("NM1")).unwrap();

        assert_eq!(status.event_type, EventType::Calling);
        assert_eq!(status.all_event_type, vec![EventType::Calling]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let registry = CallRegistry::new();
        registry.insert(call("NM1")).unwrap();
        registry.advance_all(Utc::now());

        let result = registry.insert(call("NM1"));

        assert_eq!(result, Err(SimulatorError::DuplicateCall { call_id: CallId::new("NM1") }));
        let existing = registry.get(&CallId::new("NM1")).unwrap();
        assert_eq!(existing.event_type(), EventType::Ringing, "existing call is untouched");
    }

    #[test]
    fn ended_call_is_purged_on_the_following_pass() {
        let registry = CallRegistry::new();
        registry.insert(call("NM1")).unwrap();

        let stages: Vec<_> = (0..3)
            .map(|_| registry.advance_all(Utc::now()).advanced[0].event_type)
            .collect();
        assert_eq!(stages, vec![EventType::Ringing, EventType::Answered, EventType::Ended]);
        assert_eq!(registry.len(), 1, "Ended call survives until the next pass");

        let pass = registry.advance_all(Utc::now());
        assert!(pass.advanced.is_empty());
        assert_eq!(pass.purged, vec![CallId::new("NM1")]);
        assert!(registry.is_empty());
    }

    #[test]
    fn calls_advance_independently() {
        let registry = CallRegistry::new();
        registry.insert(call("NM1")).unwrap();
        registry.advance_all(Utc::now());
        registry.insert(call("NM2")).unwrap();

        let pass = registry.advance_all(Utc::now());

        let mut stages: Vec<_> =
            pass.advanced.iter().map(|s| (s.call_id.to_string(), s.event_type)).collect();
        stages.sort();
        assert_eq!(
            stages,
            vec![("NM1".to_string(), EventType::Answered), ("NM2".to_string(), EventType::Ringing)]
        );
    }
}
