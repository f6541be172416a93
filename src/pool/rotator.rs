//! Round-robin target selection per worker.

use std::sync::Arc;

use crate::config::DialTarget;

/// Walks the shared target list starting just after the worker's own index,
/// so a fresh population spreads across every node instead of piling onto
/// the first one.
#[derive(Debug, Clone)]
pub struct TargetRotator {
    targets: Arc<[DialTarget]>,
    cursor: usize,
}

impl TargetRotator {
    pub fn new(worker_id: usize, targets: Arc<[DialTarget]>) -> Self {
        let cursor = worker_id % targets.len().max(1);
        Self { targets, cursor }
    }

    /// Advance and return the target for the next connect attempt.
    ///
    /// `None` only when the target list is empty.
    pub fn next_target(&mut self) -> Option<&DialTarget> {
        if self.targets.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.targets.len();
        self.targets.get(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Arc<[DialTarget]> {
        (0..n)
            .map(|i| DialTarget::new(format!("node-{i}:6379"), false))
            .collect()
    }

    fn visit(rotator: &mut TargetRotator, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| rotator.next_target().unwrap().address.clone())
            .collect()
    }

    #[test]
    fn visits_cyclically_from_offset() {
        let mut rotator = TargetRotator::new(1, targets(3));
        assert_eq!(
            visit(&mut rotator, 4),
            vec!["node-2:6379", "node-0:6379", "node-1:6379", "node-2:6379"]
        );
    }

    #[test]
    fn worker_ids_beyond_len_wrap() {
        let mut a = TargetRotator::new(4, targets(3));
        let mut b = TargetRotator::new(1, targets(3));
        assert_eq!(visit(&mut a, 6), visit(&mut b, 6));
    }

    #[test]
    fn population_spreads_over_all_targets() {
        let shared = targets(3);
        let mut firsts: Vec<String> = (0..3)
            .map(|id| {
                TargetRotator::new(id, Arc::clone(&shared))
                    .next_target()
                    .unwrap()
                    .address
                    .clone()
            })
            .collect();
        firsts.sort();
        assert_eq!(firsts, vec!["node-0:6379", "node-1:6379", "node-2:6379"]);
    }

    #[test]
    fn single_target_always_repeats() {
        let mut rotator = TargetRotator::new(7, targets(1));
        assert_eq!(visit(&mut rotator, 3), vec!["node-0:6379"; 3]);
    }

    #[test]
    fn empty_list_yields_nothing() {
        let mut rotator = TargetRotator::new(0, targets(0));
        assert!(rotator.next_target().is_none());
    }
}
