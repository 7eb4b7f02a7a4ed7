//! Engine state and run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::event::EventLog;

/// Where the engine is within a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Ready,
    SelectingActor,
    RequestingAction,
    Resolving,
    CheckingTermination,
    Terminated,
}

/// Mutable state of one run. Only the engine writes to it.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub(crate) step: u64,
    pub(crate) status: EngineStatus,
    pub(crate) log: EventLog,
    pub(crate) retired: BTreeSet<String>,
}

impl EngineState {
    pub(crate) fn new() -> Self {
        Self {
            step: 0,
            status: EngineStatus::Ready,
            log: EventLog::new(),
            retired: BTreeSet::new(),
        }
    }

    /// Index of the next step to resolve, equal to the number of resolved steps
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Names removed from play
    pub fn retired(&self) -> &BTreeSet<String> {
        &self.retired
    }

    pub fn is_retired(&self, name: &str) -> bool {
        self.retired.contains(name)
    }

    pub fn is_terminated(&self) -> bool {
        self.status == EngineStatus::Terminated
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The termination policy said stop
    Terminated,
    /// The step budget ran out first
    BudgetExhausted,
    /// A cancellation signal arrived between steps
    Cancelled,
}

/// Summary of a call to `run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// Steps resolved in total, across resumed calls
    pub steps: u64,
    /// Choices that fell back to a random pick
    pub choice_fallbacks: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
