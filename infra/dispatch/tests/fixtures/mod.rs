#![allow(dead_code, unreachable_pub)]

use courier_dispatch::EventHandler;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderPlaced(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderShipped(pub u32);

/// Counts every event it sees.
#[derive(Debug, Default)]
pub struct CountingHandler(AtomicUsize);

impl CountingHandler {
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl EventHandler for CountingHandler {
    fn handle_event(&self, _event: &dyn Any) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Appends `label` to a shared journal on every event.
#[derive(Debug)]
pub struct JournalHandler {
    label: &'static str,
    journal: Journal,
}

impl JournalHandler {
    #[must_use]
    pub fn shared(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self { label, journal: journal.clone() })
    }
}

impl EventHandler for JournalHandler {
    fn handle_event(&self, _event: &dyn Any) {
        self.journal.push(self.label);
    }
}

/// Ordered record of handler invocations, shared between handlers.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
