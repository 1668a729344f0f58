//! Execution scheduler - determines which jobs to run next

use crate::core::WorkflowRun;

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Execute jobs in plan order, one at a time
    Sequential,

    /// Execute all ready jobs concurrently
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

/// Scheduler for determining which jobs to start
#[derive(Debug, Clone, Default)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Get the next batch of jobs to start, in plan order
    pub fn next_jobs(&self, run: &WorkflowRun) -> Vec<String> {
        let limit = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => usize::MAX,
            SchedulingStrategy::LimitedParallel(max) => max.max(1),
        };

        let slots = limit.saturating_sub(run.running_jobs().len());
        if slots == 0 {
            return Vec::new();
        }

        run.ready_jobs()
            .into_iter()
            .take(slots)
            .map(|j| j.job.id.clone())
            .collect()
    }

    /// Check if there are more jobs to start
    pub fn has_more(&self, run: &WorkflowRun) -> bool {
        !self.next_jobs(run).is_empty()
    }
}
