//! Where a deferred value's continuations run.

use core::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::executor::{Executor, Task};

/// Execution policy for the continuations of a [`Deferred`](super::Deferred).
#[derive(Clone)]
pub enum Policy {
    /// No executor chosen yet: continuations are held until the consumer
    /// picks one (by binding, or by waiting).
    Unbound,
    /// Continuations run on whichever thread completes the previous step.
    Inline,
    /// Continuations run as tasks on this executor.
    Via(Arc<dyn Executor>),
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Unbound => f.write_str("Unbound"),
            Policy::Inline => f.write_str("Inline"),
            Policy::Via(_) => f.write_str("Via(..)"),
        }
    }
}

/// Shared by every stage of one deferred chain.
pub(crate) struct Hop {
    state: Mutex<HopState>,
}

struct HopState {
    policy: Policy,
    // A chain runs one stage at a time, so at most one task is ever held.
    held: SmallVec<[Task; 1]>,
}

impl Hop {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(HopState {
                policy: Policy::Unbound,
                held: SmallVec::new(),
            }),
        }
    }

    pub(crate) fn policy(&self) -> Policy {
        self.state.lock().policy.clone()
    }

    /// Run `task` according to the current policy, or hold it while unbound.
    pub(crate) fn dispatch(&self, task: Task) {
        let policy = {
            let mut state = self.state.lock();
            if let Policy::Unbound = state.policy {
                state.held.push(task);
                return;
            }
            state.policy.clone()
        };
        run(&policy, task);
    }

    /// Choose the policy for every continuation from now on. Held tasks are
    /// released under the new policy, on the calling thread for `Inline`.
    pub(crate) fn bind(&self, policy: Policy) {
        debug_assert!(!matches!(policy, Policy::Unbound));
        let held = {
            let mut state = self.state.lock();
            state.policy = policy.clone();
            mem::take(&mut state.held)
        };
        for task in held {
            run(&policy, task);
        }
    }
}

fn run(policy: &Policy, task: Task) {
    match policy {
        Policy::Inline | Policy::Unbound => task(),
        Policy::Via(executor) => executor.add(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn unbound_hop_holds_until_bound() {
        let hits = Arc::new(AtomicU32::new(0));
        let hop = Hop::new();
        let h = hits.clone();
        hop.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        hop.bind(Policy::Inline);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = hits.clone();
        hop.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
