// src/dispatch/slots.rs

use tracing::warn;

use super::job::TestUnit;

/// Concurrency budget for one pass. `0 <= used <= capacity` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPool {
    capacity: usize,
    used: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }

    /// Pool sized from the configured limit; `0` means one slot per unit.
    pub fn for_backlog(concurrency_limit: usize, backlog_len: usize) -> Self {
        Self::new(Self::capacity_for(concurrency_limit, backlog_len))
    }

    pub fn capacity_for(concurrency_limit: usize, backlog_len: usize) -> usize {
        if concurrency_limit > 0 {
            concurrency_limit
        } else {
            backlog_len
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn available(&self) -> usize {
        self.capacity - self.used
    }

    /// Take one slot if any is free.
    pub fn acquire(&mut self) -> bool {
        if self.used < self.capacity {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn release(&mut self) {
        if self.used == 0 {
            warn!(capacity = self.capacity, "slot released with none in use");
            return;
        }
        self.used -= 1;
    }
}

/// Eligible units not yet handed to the launcher, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct Backlog {
    units: Vec<TestUnit>,
    cursor: usize,
}

impl Backlog {
    pub fn new(units: Vec<TestUnit>) -> Self {
        Self { units, cursor: 0 }
    }

    pub fn next_unit(&mut self) -> Option<TestUnit> {
        let unit = self.units.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(unit)
    }

    pub fn is_drained(&self) -> bool {
        self.cursor >= self.units.len()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units handed out so far.
    pub fn dispatched(&self) -> usize {
        self.cursor
    }

    /// Units never handed out.
    pub fn remaining(&self) -> &[TestUnit] {
        &self.units[self.cursor.min(self.units.len())..]
    }
}
