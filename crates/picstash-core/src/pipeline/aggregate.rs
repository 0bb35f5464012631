//! Batch aggregation: ordered outcomes in, batch verdict and response out.

use serde::{Deserialize, Serialize};

use crate::types::{Outcome, Status};

/// Batch-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// At least one item was stored
    Accept,
    /// No item was stored
    Reject,
}

impl BatchStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            BatchStatus::Accept => 200,
            BatchStatus::Reject => 400,
        }
    }
}

/// Wire body: two index-aligned arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub result: Vec<Status>,
    pub ids: Vec<Option<String>>,
}

/// Aggregated result of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub status: BatchStatus,
    /// Per-item outcomes, in input order
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    pub fn response(&self) -> BatchResponse {
        let (result, ids) = self
            .outcomes
            .iter()
            .map(|o| (o.status, o.stored_id.clone()))
            .unzip();
        BatchResponse { result, ids }
    }

    pub fn stored_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }
}

/// Combine ordered outcomes into a batch report.
pub fn aggregate(outcomes: Vec<Outcome>) -> BatchReport {
    let status = if outcomes.iter().any(Outcome::is_ok) {
        BatchStatus::Accept
    } else {
        BatchStatus::Reject
    };
    BatchReport { status, outcomes }
}
