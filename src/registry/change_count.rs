//! # Change-Count Tracker
//!
//! Per-identity record of the last applied configuration generation. Only strictly
//! newer generations are accepted, so replayed and reordered deliveries are dropped.

use crate::types::{ChangeCount, Pid};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Tracks the accepted change-count baseline for every configuration identity
#[derive(Debug, Default)]
pub struct ChangeCountTracker {
    baselines: DashMap<Pid, u64>,
}

impl ChangeCountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `candidate` if it is newer than the recorded baseline for `pid`,
    /// recording it as the new baseline. `Unknown` always accepts and leaves the
    /// baseline untouched.
    pub fn accept(&self, pid: &Pid, candidate: ChangeCount) -> bool {
        let ChangeCount::Known(candidate) = candidate else {
            return true;
        };

        match self.baselines.entry(pid.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(candidate);
                true
            }
            Entry::Occupied(mut entry) => {
                let baseline = *entry.get();
                if candidate > baseline {
                    entry.insert(candidate);
                    true
                } else {
                    debug!(
                        pid = %pid,
                        baseline,
                        candidate,
                        "Rejected stale configuration change count"
                    );
                    false
                }
            }
        }
    }

    /// Last accepted change count, or `Unknown` when nothing was recorded for `pid`
    pub fn current_count(&self, pid: &Pid) -> ChangeCount {
        self.baselines
            .get(pid)
            .map_or(ChangeCount::Unknown, |count| ChangeCount::Known(*count))
    }

    pub fn forget(&self, pid: &Pid) {
        self.baselines.remove(pid);
    }

    pub fn clear(&self) {
        self.baselines.clear();
    }
}
