//! Shared record accumulator

use crate::record::Record;
use std::sync::{Mutex, PoisonError};

/// Collects records from concurrent detail workers
///
/// Append order is whatever order workers finish in.
#[derive(Debug, Default)]
pub struct ResultSink {
    records: Mutex<Vec<Record>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: Record) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every accumulated record, leaving the sink empty
    pub fn drain(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_adds() {
        let sink = Arc::new(ResultSink::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                sink.add(Record::new(format!("https://example.com/p/{}", i), BTreeMap::new()));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sink.len(), 16);
        let records = sink.drain();
        assert_eq!(records.len(), 16);
        assert!(sink.is_empty());
        assert!(sink.drain().is_empty());
    }
}
