// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Failure injection and call counting shared by the in-memory fakes.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;

pub(crate) struct FaultPlan<C, E> {
    inner: Mutex<FaultPlanInner<C, E>>,
}

struct FaultPlanInner<C, E> {
    queued: HashMap<C, VecDeque<E>>,
    calls: HashMap<C, usize>,
}

impl<C: Copy + Eq + Hash, E> FaultPlan<C, E> {
    pub(crate) fn new() -> Self {
        FaultPlan {
            inner: Mutex::new(FaultPlanInner {
                queued: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// Queues `error` for the next call of `call`. Errors queue up in order.
    pub(crate) fn fail_next(&self, call: C, error: E) {
        self.inner
            .lock()
            .queued
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Records a call and returns the queued failure for it, if any.
    pub(crate) fn check(&self, call: C) -> Result<(), E> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(call).or_insert(0) += 1;
        match inner.queued.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub(crate) fn calls(&self, call: C) -> usize {
        self.inner.lock().calls.get(&call).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_consumed_in_order() {
        let plan: FaultPlan<u8, &str> = FaultPlan::new();
        plan.fail_next(1, "first");
        plan.fail_next(1, "second");

        assert_eq!(plan.check(1), Err("first"));
        assert_eq!(plan.check(2), Ok(()));
        assert_eq!(plan.check(1), Err("second"));
        assert_eq!(plan.check(1), Ok(()));
        assert_eq!(plan.calls(1), 3);
        assert_eq!(plan.calls(3), 0);
    }
}
