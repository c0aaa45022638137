//! Worker selection policies.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lifecycle::registry::{WorkerEntry, WorkerRegistry, WorkerState};

/// How the dispatcher picks a worker for each inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SelectionPolicy {
    /// Rotate over the workers that are currently `ready`.
    RoundRobin,
    /// Always the lowest-numbered worker, whatever its state. If it is not
    /// `ready` the request fails; there is no failover.
    Fixed,
}

pub struct Balancer {
    policy: SelectionPolicy,
    registry: WorkerRegistry,
    next: AtomicUsize,
}

impl Balancer {
    pub fn new(policy: SelectionPolicy, registry: WorkerRegistry) -> Self {
        Self {
            policy,
            registry,
            next: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Picks the target for one request, or `None` when no worker qualifies.
    pub fn select(&self) -> Option<WorkerEntry> {
        match self.policy {
            SelectionPolicy::Fixed => self
                .registry
                .snapshot()
                .into_iter()
                .next()
                .filter(|worker| worker.state == WorkerState::Ready),
            SelectionPolicy::RoundRobin => {
                let ready = self.registry.ready();
                if ready.is_empty() {
                    return None;
                }
                let turn = self.next.fetch_add(1, Ordering::Relaxed);
                let index = turn % ready.len();
                ready.into_iter().nth(index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(states: &[WorkerState]) -> WorkerRegistry {
        let registry = WorkerRegistry::new();
        for (offset, state) in states.iter().enumerate() {
            let id = offset + 1;
            registry.register(id, 4000 + id as u16);
            registry.transition(id, *state);
        }
        registry
    }

    fn picks(balancer: &Balancer, n: usize) -> Vec<Option<usize>> {
        (0..n).map(|_| balancer.select().map(|w| w.id)).collect()
    }

    #[test]
    fn round_robin_rotates_over_ready_workers() {
        let registry = registry(&[WorkerState::Ready, WorkerState::Ready, WorkerState::Ready]);
        let balancer = Balancer::new(SelectionPolicy::RoundRobin, registry);
        assert_eq!(picks(&balancer, 6), vec![Some(1), Some(2), Some(3), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn round_robin_skips_workers_that_are_not_ready() {
        let registry = registry(&[
            WorkerState::Ready,
            WorkerState::Dead,
            WorkerState::Starting,
            WorkerState::Ready,
        ]);
        let balancer = Balancer::new(SelectionPolicy::RoundRobin, registry.clone());
        assert_eq!(picks(&balancer, 4), vec![Some(1), Some(4), Some(1), Some(4)]);

        registry.transition(1, WorkerState::Dead);
        assert_eq!(picks(&balancer, 2), vec![Some(4), Some(4)]);

        registry.transition(4, WorkerState::Draining);
        assert_eq!(balancer.select(), None);
    }

    #[test]
    fn fixed_always_targets_the_first_worker() {
        let registry = registry(&[WorkerState::Ready, WorkerState::Ready]);
        let balancer = Balancer::new(SelectionPolicy::Fixed, registry.clone());
        assert_eq!(picks(&balancer, 3), vec![Some(1), Some(1), Some(1)]);

        // No failover to worker 2.
        registry.transition(1, WorkerState::Dead);
        assert_eq!(balancer.select(), None);
    }

    #[test]
    fn empty_registry_selects_nothing() {
        let balancer = Balancer::new(SelectionPolicy::RoundRobin, WorkerRegistry::new());
        assert_eq!(balancer.select(), None);
        assert_eq!(balancer.policy(), SelectionPolicy::RoundRobin);
    }
}
