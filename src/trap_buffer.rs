//! Shared in-memory trap buffer
//!
//! The single piece of state shared between the SNMP listener and the query
//! server. Every operation takes the lock once, so a drain never observes a
//! partially applied append and a clearing drain hands each record out once.

use crate::trap::TrapRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cheap-to-clone handle; all clones refer to the same buffer
#[derive(Debug, Clone, Default)]
pub struct TrapBuffer {
    records: Arc<Mutex<Vec<TrapRecord>>>,
}

impl TrapBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: TrapRecord) {
        self.records.lock().push(record);
    }

    /// Snapshot the buffer in insertion order, emptying it when `clear` is set
    pub fn drain(&self, clear: bool) -> Vec<TrapRecord> {
        let mut records = self.records.lock();
        if clear {
            std::mem::take(&mut *records)
        } else {
            records.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
