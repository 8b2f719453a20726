//! Correlation id allocation for outgoing requests.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::Request;

/// Allocates request ids: strictly increasing, never reused.
///
/// Owned by a client (usually behind an `Arc`) rather than process-global,
/// so two clients never collide and every test starts from a known value.
/// Notifications never consume an id.
#[derive(Debug)]
pub struct RequestRegistry {
    next_id: AtomicU64,
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start allocating at `first` (replay and tests).
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first),
        }
    }

    /// Return the next unused id.
    pub fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Allocate an id and build a request with it.
    pub fn request(
        &self,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Request {
        Request::new(self.allocate(), method, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let registry = RequestRegistry::new();
        assert_eq!(registry.allocate(), 1);
        assert_eq!(registry.allocate(), 2);
        assert_eq!(registry.allocate(), 3);
        assert_eq!(registry.peek(), 4);
    }

    #[test]
    fn test_starting_at() {
        let registry = RequestRegistry::starting_at(100);
        assert_eq!(registry.allocate(), 100);
        assert_eq!(registry.allocate(), 101);
    }

    #[test]
    fn test_independent_registries_do_not_share_state() {
        let a = RequestRegistry::new();
        let b = RequestRegistry::new();
        assert_eq!(a.allocate(), 1);
        assert_eq!(a.allocate(), 2);
        assert_eq!(b.allocate(), 1);
    }

    #[test]
    fn test_request_uses_allocated_id() {
        let registry = RequestRegistry::starting_at(5);
        let request = registry.request("shutdown", None);
        assert_eq!(request.id, 5);
        assert_eq!(request.method, "shutdown");
        assert_eq!(registry.peek(), 6);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let registry = Arc::new(RequestRegistry::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let ids: Vec<u64> = (0..PER_THREAD).map(|_| registry.allocate()).collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "id {id} allocated twice");
            }
        }
        assert_eq!(all.len(), THREADS * PER_THREAD);
        assert_eq!(all.iter().copied().max(), Some((THREADS * PER_THREAD) as u64));
    }

    #[tokio::test]
    async fn test_concurrent_tasks_allocate_distinct_ids() {
        let registry = Arc::new(RequestRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.allocate() }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
    }
}
