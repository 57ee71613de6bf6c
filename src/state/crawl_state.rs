use crate::{ReconError, Result};
use serde::Serialize;
use std::fmt;

/// Lifecycle of one crawl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    /// Created, traversal not started
    #[default]
    Idle,

    /// Traversal in progress
    Running,

    /// Traversal finished: frontier exhausted, page budget spent or deadline hit
    Completed,

    /// Crawl could not start
    Aborted,
}

impl CrawlState {
    /// Returns true for `Completed` and `Aborted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if moving to `to` is a legal transition
    pub fn can_transition_to(&self, to: CrawlState) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Aborted)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted)
        )
    }

    /// Checked transition
    pub fn transition(self, to: CrawlState) -> Result<CrawlState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ReconError::InvalidTransition { from: self, to })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
