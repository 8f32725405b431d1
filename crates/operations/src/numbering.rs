//! Document number sequences.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::document::DocumentKind;

/// Hands out unique, zero-padded document numbers per kind
/// (`REC-000001`, `DEL-000001`, ...).
#[derive(Debug, Default)]
pub struct DocumentNumbers {
    counters: Mutex<HashMap<DocumentKind, u64>>,
}

impl DocumentNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, kind: DocumentKind) -> String {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let counter = counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{}-{:06}", kind.prefix(), counter)
    }
}
