//! Connectivity status reported by the polling controller.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Lifecycle of a polling controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Constructed, not yet started
    #[default]
    Idle,
    /// Timer running, probes issued on every tick
    Polling,
    /// Timer running, ticks skipped during user interaction
    Paused,
    /// Timer cleared; terminal
    Stopped,
}

/// Snapshot of connectivity as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub state: PollState,
    /// Result of the most recent probe. Optimistically `true` before the first.
    pub connected: bool,
    /// Time of the most recent successful update.
    pub last_update: Option<Timestamp>,
}

impl Default for PollStatus {
    fn default() -> Self {
        Self {
            state: PollState::Idle,
            connected: true,
            last_update: None,
        }
    }
}

impl PollStatus {
    pub fn is_paused(&self) -> bool {
        self.state == PollState::Paused
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PollState::Polling | PollState::Paused)
    }
}
