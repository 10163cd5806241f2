//! Deferred release of GPU resources that may still be referenced by
//! in-flight work. Retired resources are held under a monotonically
//! increasing submission ticket and dropped only once the queue reports
//! that submission complete, instead of after a wall-clock delay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle passed into the queue's completion callback; marking it
/// complete releases every batch retired up to its ticket.
pub struct CompletionMark {
    ticket: u64,
    completed: Arc<AtomicU64>,
}

impl CompletionMark {
    pub fn complete(self) {
        // Callbacks can arrive out of order; only ever move forward.
        self.completed.fetch_max(self.ticket, Ordering::Release);
    }
}

/// Retirement queue generic over the resource type. Resources retired
/// during a frame are sealed under that frame's submission ticket and
/// freed by a later `sweep` once the submission has completed.
pub struct RetirementQueue<T> {
    staged: Vec<T>,
    pending: VecDeque<(u64, Vec<T>)>,
    next_ticket: u64,
    completed: Arc<AtomicU64>,
}

impl<T> RetirementQueue<T> {
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            pending: VecDeque::new(),
            next_ticket: 1,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules resources for release after the next sealed submission.
    pub fn retire(&mut self, resources: impl IntoIterator<Item = T>) {
        self.staged.extend(resources);
    }

    /// Stamps everything retired since the last seal with a fresh ticket.
    /// Returns the mark to hand to the submission's completion callback,
    /// or `None` when nothing was staged.
    pub fn seal(&mut self) -> Option<CompletionMark> {
        if self.staged.is_empty() {
            return None;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.push_back((ticket, std::mem::take(&mut self.staged)));
        Some(CompletionMark {
            ticket,
            completed: Arc::clone(&self.completed),
        })
    }

    /// Drops every batch whose submission has completed. Returns the
    /// number of resources released.
    pub fn sweep(&mut self) -> usize {
        let completed = self.completed.load(Ordering::Acquire);
        let mut released = 0;
        while self.pending.front().is_some_and(|(t, _)| *t <= completed) {
            if let Some((_, batch)) = self.pending.pop_front() {
                released += batch.len();
            }
        }
        if released > 0 {
            log::debug!("released {} retired resources", released);
        }
        released
    }

    /// Resources still awaiting completion (staged + sealed).
    pub fn outstanding(&self) -> usize {
        self.staged.len() + self.pending.iter().map(|(_, b)| b.len()).sum::<usize>()
    }
}

impl<T> Default for RetirementQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_staged_seals_nothing() {
        let mut q: RetirementQueue<&str> = RetirementQueue::new();
        assert!(q.seal().is_none());
        assert_eq!(q.sweep(), 0);
    }

    #[test]
    fn resources_survive_until_completion() {
        let mut q = RetirementQueue::new();
        q.retire(["vertex", "dims"]);
        let mark = q.seal().unwrap();

        // Submission still in flight: nothing may be freed.
        assert_eq!(q.sweep(), 0);
        assert_eq!(q.outstanding(), 2);

        mark.complete();
        assert_eq!(q.sweep(), 2);
        assert_eq!(q.outstanding(), 0);
    }

    #[test]
    fn batches_free_in_submission_order() {
        let mut q = RetirementQueue::new();
        q.retire(["a"]);
        let first = q.seal().unwrap();
        q.retire(["b", "c"]);
        let second = q.seal().unwrap();

        first.complete();
        assert_eq!(q.sweep(), 1);
        assert_eq!(q.outstanding(), 2);

        second.complete();
        assert_eq!(q.sweep(), 2);
    }

    #[test]
    fn out_of_order_completion_releases_everything_earlier() {
        let mut q = RetirementQueue::new();
        q.retire(["a"]);
        let first = q.seal().unwrap();
        q.retire(["b"]);
        let second = q.seal().unwrap();

        // The later submission completing implies the earlier one did too.
        second.complete();
        first.complete();
        assert_eq!(q.sweep(), 2);
    }

    #[test]
    fn repeated_switches_leak_nothing() {
        let mut q = RetirementQueue::new();
        let mut freed = 0;
        for i in 0..50 {
            q.retire([format!("cloud-{i}")]);
            let mark = q.seal().unwrap();
            mark.complete();
            freed += q.sweep();
        }
        assert_eq!(freed, 50);
        assert_eq!(q.outstanding(), 0);
    }
}
