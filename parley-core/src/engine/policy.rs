//! Pluggable engine policies
//!
//! Each policy is a small closed enum chosen at engine construction. The
//! variants that need a game master's judgement are carried out by the engine
//! itself; the rest are decided here from the engine state alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::action::ActionSpec;
use super::state::EngineState;

/// How the next actor is picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnPolicy {
    /// Live entities in roster order, wrapping around
    #[default]
    RoundRobin,
    /// A fixed sequence of names, repeated; step `s` uses `order[s % len]`
    Forced { order: Vec<String> },
    /// The game master picks among live entities
    GameMasterChoice,
}

impl TurnPolicy {
    /// The actor for `step` when the policy does not need the game master.
    ///
    /// `roster` lists every entity in construction order and `last` is the
    /// previous actor, if any. Returns `None` when no live entity is left, or
    /// for [`TurnPolicy::GameMasterChoice`].
    pub fn scheduled(
        &self,
        state: &EngineState,
        roster: &[&str],
        last: Option<&str>,
    ) -> Option<String> {
        match self {
            TurnPolicy::RoundRobin => {
                let start = last
                    .and_then(|name| roster.iter().position(|n| *n == name))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                (0..roster.len())
                    .map(|offset| roster[(start + offset) % roster.len()])
                    .find(|name| !state.is_retired(name))
                    .map(String::from)
            }
            TurnPolicy::Forced { order } if !order.is_empty() => {
                let index = (state.step() % order.len() as u64) as usize;
                Some(order[index].clone())
            }
            TurnPolicy::Forced { .. } | TurnPolicy::GameMasterChoice => None,
        }
    }
}

/// Predicate over engine state, set programmatically.
#[derive(Clone)]
pub struct TerminationPredicate(Arc<dyn Fn(&EngineState) -> bool + Send + Sync>);

impl TerminationPredicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&EngineState) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn evaluate(&self, state: &EngineState) -> bool {
        (self.0)(state)
    }
}

impl fmt::Debug for TerminationPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TerminationPredicate(..)")
    }
}

/// When a run stops before the step budget is spent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Run until the budget is exhausted
    #[default]
    Never,
    /// Stop once the latest event summary contains `keyword` (case-insensitive)
    Keyword { keyword: String },
    /// Ask the game master after every step
    GameMasterDecides,
    /// Custom predicate; not expressible in configuration files
    #[serde(skip)]
    Predicate(TerminationPredicate),
}

impl TerminationPolicy {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&EngineState) -> bool + Send + Sync + 'static,
    {
        TerminationPolicy::Predicate(TerminationPredicate::new(predicate))
    }

    /// Decide from state alone; `None` means the game master must be asked.
    pub fn decide(&self, state: &EngineState) -> Option<bool> {
        match self {
            TerminationPolicy::Never => Some(false),
            TerminationPolicy::Keyword { keyword } => {
                let keyword = keyword.to_lowercase();
                Some(
                    state
                        .log()
                        .last()
                        .is_some_and(|event| event.summary.to_lowercase().contains(&keyword)),
                )
            }
            TerminationPolicy::GameMasterDecides => None,
            TerminationPolicy::Predicate(predicate) => Some(predicate.evaluate(state)),
        }
    }
}

/// Who observes each resolved event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WitnessPolicy {
    /// The acting participant and every game master
    #[default]
    ActorAndGameMasters,
    /// Every participant still in play
    Everyone,
}

/// How a raw action becomes an event summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The summary is the raw action
    #[default]
    Verbatim,
    /// The game master narrates what happened
    GameMaster,
}

/// Where the action spec for each step comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpecPolicy {
    /// The same spec every step
    Fixed { spec: ActionSpec },
    /// The game master writes one in the textual form; unparseable output
    /// falls back to [`ActionSpec::default`]
    GameMaster,
}

impl Default for ActionSpecPolicy {
    fn default() -> Self {
        ActionSpecPolicy::Fixed {
            spec: ActionSpec::default(),
        }
    }
}
