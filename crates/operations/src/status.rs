//! Document and pick-wave lifecycles.
//!
//! Transition legality lives here and nowhere else; the six document kinds
//! share this one table.

use serde::{Deserialize, Serialize};

/// Operational document lifecycle.
///
/// `draft → waiting → ready → done`, with `canceled` reachable from any
/// non-done state. `done` and `canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Waiting,
    Ready,
    Done,
    Canceled,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Done | DocumentStatus::Canceled)
    }

    /// Documents are edited freely only while draft.
    pub fn can_edit(self) -> bool {
        matches!(self, DocumentStatus::Draft)
    }

    /// Validation (commit to the ledger) is allowed from any pre-terminal
    /// state.
    pub fn can_validate(self) -> bool {
        matches!(
            self,
            DocumentStatus::Draft | DocumentStatus::Waiting | DocumentStatus::Ready
        )
    }

    pub fn can_cancel(self) -> bool {
        self.can_validate()
    }

    pub fn can_transition(self, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, to),
            (Draft, Waiting)
                | (Draft, Ready)
                | (Waiting, Ready)
                | (Draft, Done)
                | (Waiting, Done)
                | (Ready, Done)
                | (Draft, Canceled)
                | (Waiting, Canceled)
                | (Ready, Canceled)
        )
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Waiting => "waiting",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Done => "done",
            DocumentStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Pick wave lifecycle: `planned → picking → completed`, cancelable until
/// completed. Waves sequence picking only; they never move stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveStatus {
    Planned,
    Picking,
    Completed,
    Canceled,
}

impl WaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WaveStatus::Completed | WaveStatus::Canceled)
    }

    pub fn can_transition(self, to: WaveStatus) -> bool {
        use WaveStatus::*;
        matches!(
            (self, to),
            (Planned, Picking) | (Picking, Completed) | (Planned, Canceled) | (Picking, Canceled)
        )
    }
}

impl core::fmt::Display for WaveStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            WaveStatus::Planned => "planned",
            WaveStatus::Picking => "picking",
            WaveStatus::Completed => "completed",
            WaveStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}
