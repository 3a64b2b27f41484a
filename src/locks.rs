// src/locks.rs

//! Per-user write serialization.
//!
//! Incremental profile updates and full recomputes for the same learner must
//! not interleave. Different learners never contend.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `user_id`, creating it on first use. Hold the
    /// guard of the returned mutex for the whole read-modify-write.
    pub fn for_user(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_user_shares_one_lock() {
        let locks = UserLocks::new();
        let a = locks.for_user(7);
        let b = locks.for_user(7);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn different_users_do_not_contend() {
        let locks = UserLocks::new();
        let a = locks.for_user(1);
        let b = locks.for_user(2);
        let _ga = a.lock().unwrap();
        assert!(b.try_lock().is_ok());
    }
}
