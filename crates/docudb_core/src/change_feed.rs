//! Change feed for "data changed" subscribers.
//!
//! Every successful insert, save and remove emits one event after the record
//! body and its indexes have been written. Consumers (BI sync, watchers) either
//! subscribe to a channel or poll the bounded history with a sequence cursor.
//!
//! # Usage
//!
//! ```rust,ignore
//! let receiver = engine.change_feed().subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{} {:?} {}", event.collection, event.change_type, event.primary_key);
//!     }
//! });
//! ```

use crate::types::{CollectionKey, Record};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Record was inserted.
    Insert,
    /// Existing record was saved.
    Update,
    /// Record was removed.
    Delete,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Position in the feed, starting at 1.
    pub sequence: u64,
    /// Datastore name.
    pub datastore: String,
    /// Collection name.
    pub collection: String,
    /// Primary key of the affected record.
    pub primary_key: String,
    /// Type of change.
    pub change_type: ChangeType,
    /// Viewable record after the change. None for Delete.
    pub record: Option<Record>,
}

/// Distributes change events to subscribers.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
    next_sequence: AtomicU64,
}

impl ChangeFeed {
    /// Creates a change feed with the default history limit.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Assigns the next sequence number and distributes the event.
    pub(crate) fn publish(
        &self,
        key: &CollectionKey,
        primary_key: &str,
        change_type: ChangeType,
        record: Option<Record>,
    ) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.emit(ChangeEvent {
            sequence,
            datastore: key.datastore.clone(),
            collection: key.collection.clone(),
            primary_key: primary_key.to_string(),
            change_type,
            record,
        });
        sequence
    }

    fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Disconnected subscribers are dropped here.
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns events with sequence > `cursor`, up to `limit`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|e| e.sequence).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
