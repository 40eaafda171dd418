// Bounded execution history (audit trail)

use std::collections::VecDeque;

use crate::application::constants::HISTORY_CAPACITY;
use crate::domain::ExecutionRecord;

/// FIFO ring of the most recent execution records.
pub struct ExecutionHistory {
    records: VecDeque<ExecutionRecord>,
    capacity: usize,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest once past capacity.
    pub fn push(&mut self, record: ExecutionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest-first copy of the retained records.
    pub fn snapshot(&self) -> Vec<ExecutionRecord> {
        self.records.iter().cloned().collect()
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskName;

    fn record(n: i64) -> ExecutionRecord {
        ExecutionRecord {
            task: TaskName::parse("test").unwrap(),
            exit_code: Some(0),
            duration_ms: 10,
            success: true,
            timestamp_ms: n,
            warning_count: 0,
        }
    }

    #[test]
    fn keeps_only_most_recent_past_capacity() {
        let mut history = ExecutionHistory::new();
        for n in 0..150 {
            history.push(record(n));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        let snapshot = history.snapshot();
        // Oldest 50 evicted; records 50..150 retained oldest-first.
        assert_eq!(snapshot.first().unwrap().timestamp_ms, 50);
        assert_eq!(snapshot.last().unwrap().timestamp_ms, 149);
    }

    #[test]
    fn snapshot_is_oldest_first() {
        let mut history = ExecutionHistory::with_capacity(3);
        for n in 0..3 {
            history.push(record(n));
        }
        let stamps: Vec<i64> = history.snapshot().iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 1, 2]);
    }
}
