//! The orchestration engine
//!
//! One step runs through a fixed sequence of states:
//!
//! ```text
//! READY -> SELECTING_ACTOR -> REQUESTING_ACTION -> RESOLVING -> CHECKING_TERMINATION
//!   ^                                                                  |
//!   +------------------------------------------------------------------+--> TERMINATED
//! ```
//!
//! The engine owns every participant and the event log. Exactly one step is
//! in flight at a time, and oracle calls are the only places it waits.
//!
//! Failure handling:
//! - An oracle failure that outlives the call policy's retries aborts the
//!   step with [`ParleyError::TurnFailed`]. Nothing is logged for that step,
//!   and calling [`Engine::run`] again retries it.
//! - A protocol violation ([`ParleyError::NoEligibleActor`],
//!   [`ParleyError::UnsatisfiableActionSpec`]) or a configuration error ends
//!   the run for good.
//! - If the game master cannot be reached while deciding termination, the
//!   resolved event stays logged and the next call resumes at that check.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ParleyConfig, RunConfig};
use crate::embeddings::EmbedderFactory;
use crate::error::{ParleyError, Result};
use crate::oracle::{Oracle, OracleFactory};
use crate::participant::{Participant, ParticipantBuilder};

pub mod action;
pub mod event;
pub mod policy;
pub mod state;

pub use action::{ActionSpec, OutputType};
pub use event::{Event, EventLog};
pub use policy::{
    ActionSpecPolicy, ResolutionPolicy, TerminationPolicy, TerminationPredicate, TurnPolicy,
    WitnessPolicy,
};
pub use state::{EngineState, EngineStatus, RunOutcome, RunReport};

const NEXT_ACTOR_PROMPT: &str = "Whose turn is it? Pick the participant who should act next.";
const TERMINATION_PROMPT: &str =
    "Has the simulation reached its end? Answer Yes only if it has clearly concluded.";

/// Drives a run: picks actors, requests actions, resolves events and decides
/// when to stop.
pub struct Engine {
    run_id: Uuid,
    config: RunConfig,
    participants: Vec<Participant>,
    /// Index of the arbitrating game master
    game_master: usize,
    state: EngineState,
    last_actor: Option<String>,
    outcome: Option<RunOutcome>,
    aborted: Option<String>,
    initialized: bool,
    pending_termination_check: bool,
    /// Step and actor whose game-master observation has already been delivered
    delivered_observation: Option<(u64, String)>,
}

impl Engine {
    /// Create an engine over `participants`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - the run configuration is invalid
    /// - two participants share a name
    /// - there is no game master, or no entity
    /// - the designated game master, or a name in a forced turn order, is unknown
    pub fn new(config: RunConfig, participants: Vec<Participant>) -> Result<Self> {
        config.validate()?;

        let mut names = HashSet::new();
        for participant in &participants {
            if !names.insert(participant.name()) {
                return Err(ParleyError::DuplicateParticipant(
                    participant.name().to_string(),
                ));
            }
        }

        if !participants.iter().any(|p| !p.is_game_master()) {
            return Err(ParleyError::Configuration(
                "a run needs at least one entity".to_string(),
            ));
        }

        let game_master = match &config.game_master {
            Some(name) => {
                let index = participants
                    .iter()
                    .position(|p| p.name() == name)
                    .ok_or_else(|| ParleyError::UnknownParticipant(name.clone()))?;
                if !participants[index].is_game_master() {
                    return Err(ParleyError::Configuration(format!(
                        "'{}' is not a game master",
                        name
                    )));
                }
                index
            }
            None => participants
                .iter()
                .position(|p| p.is_game_master())
                .ok_or_else(|| {
                    ParleyError::Configuration("a run needs at least one game master".to_string())
                })?,
        };

        if let TurnPolicy::Forced { order } = &config.turn_policy {
            if order.is_empty() {
                return Err(ParleyError::Configuration(
                    "forced turn order must not be empty".to_string(),
                ));
            }
            if let Some(unknown) = order.iter().find(|name| !names.contains(name.as_str())) {
                return Err(ParleyError::UnknownParticipant(unknown.clone()));
            }
        }

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            participants = participants.len(),
            game_master = %participants[game_master].name(),
            max_steps = config.max_steps,
            "Engine ready"
        );

        Ok(Self {
            run_id,
            config,
            participants,
            game_master,
            state: EngineState::new(),
            last_actor: None,
            outcome: None,
            aborted: None,
            initialized: false,
            pending_termination_check: false,
            delivered_observation: None,
        })
    }

    /// Build every participant from configuration, all sharing `oracle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a participant
    /// cannot be built.
    pub fn from_config(config: &ParleyConfig, oracle: Arc<dyn Oracle>) -> Result<Self> {
        config.validate()?;
        let embedder = EmbedderFactory::create(&config.memory)?;
        let call_policy = OracleFactory::call_policy(config.oracle.as_ref());

        let participants = config
            .participants
            .iter()
            .map(|descriptor| {
                ParticipantBuilder::from_config(
                    descriptor,
                    &config.memory,
                    embedder.clone(),
                    oracle.clone(),
                )
                .call_policy(call_policy.clone())
                .build()
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(config.run.clone(), participants)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.state.log
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name() == name)
    }

    /// The arbitrating game master
    pub fn game_master(&self) -> &Participant {
        &self.participants[self.game_master]
    }

    /// Consume the engine, keeping only the log
    pub fn into_log(self) -> EventLog {
        self.state.log
    }

    /// Remove a participant from play: it is never selected again and
    /// witnesses no further events.
    ///
    /// # Errors
    ///
    /// Fails for unknown names and for the arbitrating game master.
    pub fn retire(&mut self, name: &str) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| ParleyError::UnknownParticipant(name.to_string()))?;
        if index == self.game_master {
            return Err(ParleyError::Configuration(
                "the arbitrating game master cannot be retired".to_string(),
            ));
        }
        if self.state.retired.insert(name.to_string()) {
            info!(participant = %name, step = self.state.step, "Retired participant");
        }
        Ok(())
    }

    /// Run until termination or until the step budget is spent.
    ///
    /// # Errors
    ///
    /// See the module documentation for which failures can be resumed.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops between steps once `cancel` fires.
    ///
    /// A cancelled run keeps every resolved event and can be run again.
    pub async fn run_with_cancel(&mut self, cancel: CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(
            run_id = %self.run_id,
            from_step = self.state.step,
            max_steps = self.config.max_steps,
            "Run started"
        );

        let outcome = loop {
            if let Some(outcome) = self.outcome {
                break outcome;
            }
            if cancel.is_cancelled() {
                info!(run_id = %self.run_id, step = self.state.step, "Run cancelled");
                break RunOutcome::Cancelled;
            }
            if let Some(outcome) = self.step().await? {
                break outcome;
            }
        };

        let report = RunReport {
            run_id: self.run_id,
            outcome,
            steps: self.state.step,
            choice_fallbacks: self
                .participants
                .iter()
                .map(|p| p.stats().choice_fallbacks)
                .sum(),
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            run_id = %self.run_id,
            outcome = ?report.outcome,
            steps = report.steps,
            choice_fallbacks = report.choice_fallbacks,
            "Run finished"
        );
        Ok(report)
    }

    /// Advance exactly one step.
    ///
    /// Returns the outcome once the run has ended, `None` while it continues.
    pub async fn step(&mut self) -> Result<Option<RunOutcome>> {
        if let Some(reason) = &self.aborted {
            return Err(ParleyError::Other(format!("run was aborted: {}", reason)));
        }
        if let Some(outcome) = self.outcome {
            return Ok(Some(outcome));
        }

        self.initialize()?;

        let result = if self.pending_termination_check {
            self.check_termination().await
        } else {
            self.advance().await
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_fatal(&e) => {
                error!(run_id = %self.run_id, step = self.state.step, error = %e, "Run aborted");
                self.state.status = EngineStatus::Terminated;
                self.aborted = Some(e.to_string());
                Err(e)
            }
            Err(e) => {
                warn!(run_id = %self.run_id, step = self.state.step, error = %e, "Step failed");
                self.state.status = if self.pending_termination_check {
                    EngineStatus::CheckingTermination
                } else {
                    EngineStatus::Ready
                };
                Err(e)
            }
        }
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        for gm in self.participants.iter_mut().filter(|p| p.is_game_master()) {
            for observation in &self.config.initial_observations {
                gm.observe_at(observation.clone(), 0)?;
            }
        }
        self.initialized = true;
        debug!(
            observations = self.config.initial_observations.len(),
            "Delivered initial observations"
        );
        Ok(())
    }

    async fn advance(&mut self) -> Result<Option<RunOutcome>> {
        let step = self.state.step;
        let gm_name = self.participants[self.game_master].name().to_string();

        self.state.status = EngineStatus::SelectingActor;
        let actor = self
            .select_actor(step)
            .await
            .map_err(|e| turn_failed(step, &gm_name, e))?;
        let actor_name = self.participants[actor].name().to_string();
        debug!(step, actor = %actor_name, "Selected actor");

        self.state.status = EngineStatus::RequestingAction;
        if self.config.gm_observations {
            self.deliver_observation(step, actor)
                .await
                .map_err(|e| turn_failed(step, &gm_name, e))?;
        }
        let spec = self
            .action_spec(&actor_name)
            .await
            .map_err(|e| turn_failed(step, &gm_name, e))?;
        let raw_action = self.participants[actor]
            .act(&spec, &self.state.log)
            .await
            .map_err(|e| turn_failed(step, &actor_name, e))?;

        self.state.status = EngineStatus::Resolving;
        let summary = self
            .resolve(&actor_name, &raw_action)
            .await
            .map_err(|e| turn_failed(step, &gm_name, e))?;

        let event = Event {
            step,
            actor: actor_name.clone(),
            raw_action,
            summary,
        };
        info!(run_id = %self.run_id, step, actor = %actor_name, summary = %event.summary, "Step resolved");

        let observation = match self.config.resolution {
            ResolutionPolicy::Verbatim => format!("{}: {}", event.actor, event.summary),
            ResolutionPolicy::GameMaster => event.summary.clone(),
        };
        self.state.log.push(event);
        self.state.step = step + 1;
        self.last_actor = Some(actor_name);
        self.pending_termination_check = true;

        self.witness(actor, &observation, step)?;
        self.check_termination().await
    }

    async fn select_actor(&mut self, step: u64) -> Result<usize> {
        let roster: Vec<&str> = self
            .participants
            .iter()
            .filter(|p| !p.is_game_master())
            .map(|p| p.name())
            .collect();
        let scheduled =
            self.config
                .turn_policy
                .scheduled(&self.state, &roster, self.last_actor.as_deref());

        let requested = match scheduled {
            Some(name) => name,
            None if self.config.turn_policy == TurnPolicy::GameMasterChoice => {
                let live: Vec<String> = self
                    .participants
                    .iter()
                    .filter(|p| !p.is_game_master() && !self.state.is_retired(p.name()))
                    .map(|p| p.name().to_string())
                    .collect();
                if live.is_empty() {
                    return Err(no_eligible_actor(step, "<none>"));
                }
                let spec = ActionSpec::choice(NEXT_ACTOR_PROMPT, live).with_tag("next_actor");
                self.participants[self.game_master]
                    .act(&spec, &self.state.log)
                    .await?
            }
            None => return Err(no_eligible_actor(step, "<none>")),
        };

        match self.index_of(&requested) {
            Some(index) if !self.state.is_retired(&requested) => Ok(index),
            _ => Err(no_eligible_actor(step, &requested)),
        }
    }

    async fn deliver_observation(&mut self, step: u64, actor: usize) -> Result<()> {
        let actor_name = self.participants[actor].name().to_string();
        if self
            .delivered_observation
            .as_ref()
            .is_some_and(|(s, name)| *s == step && *name == actor_name)
        {
            return Ok(());
        }

        let spec = ActionSpec::free_text(format!(
            "What does {} observe right now? Describe it from {}'s point of view.",
            actor_name, actor_name
        ))
        .with_tag("observation");
        let observation = self.participants[self.game_master]
            .act(&spec, &self.state.log)
            .await?;
        self.participants[actor].observe_at(observation, step)?;
        self.delivered_observation = Some((step, actor_name));
        Ok(())
    }

    async fn action_spec(&mut self, actor: &str) -> Result<ActionSpec> {
        match &self.config.action_spec {
            ActionSpecPolicy::Fixed { spec } => Ok(spec.clone()),
            ActionSpecPolicy::GameMaster => {
                let request = ActionSpec::free_text(format!(
                    "Decide what kind of action {actor} should take next. Reply on one line as \
                     `prompt: <question for {actor}>;;type: free|choice|float;;options: <comma-separated, choice only>`."
                ))
                .with_tag("action_spec");
                let reply = self.participants[self.game_master]
                    .act(&request, &self.state.log)
                    .await?;
                match ActionSpec::parse(&reply) {
                    Ok(spec) => Ok(spec),
                    Err(ParleyError::UnsatisfiableActionSpec { reason, .. }) => {
                        Err(ParleyError::UnsatisfiableActionSpec {
                            actor: actor.to_string(),
                            reason,
                        })
                    }
                    Err(e) => {
                        warn!(actor = %actor, error = %e, "Game master wrote an unreadable action spec, using the default");
                        Ok(ActionSpec::default())
                    }
                }
            }
        }
    }

    async fn resolve(&mut self, actor: &str, raw_action: &str) -> Result<String> {
        match self.config.resolution {
            ResolutionPolicy::Verbatim => Ok(raw_action.to_string()),
            ResolutionPolicy::GameMaster => {
                let spec = ActionSpec::free_text(format!(
                    "{} attempted the following:\n{}\n\nState what actually happens as a result, in one or two sentences.",
                    actor, raw_action
                ))
                .with_tag("resolution");
                self.participants[self.game_master]
                    .act(&spec, &self.state.log)
                    .await
            }
        }
    }

    fn witness(&mut self, actor: usize, observation: &str, step: u64) -> Result<()> {
        let policy = self.config.witness_policy;
        for (index, participant) in self.participants.iter_mut().enumerate() {
            if self.state.retired.contains(participant.name()) {
                continue;
            }
            let witnesses = match policy {
                WitnessPolicy::ActorAndGameMasters => {
                    index == actor || participant.is_game_master()
                }
                WitnessPolicy::Everyone => true,
            };
            if witnesses {
                participant.observe_at(observation, step)?;
            }
        }
        Ok(())
    }

    async fn check_termination(&mut self) -> Result<Option<RunOutcome>> {
        self.state.status = EngineStatus::CheckingTermination;
        let resolved_step = self.state.step.saturating_sub(1);
        let budget_spent = self.state.step >= self.config.max_steps;

        let stop = match self.config.termination_policy.decide(&self.state) {
            Some(stop) => stop,
            None if budget_spent => false,
            None => {
                let gm_name = self.participants[self.game_master].name().to_string();
                let spec = ActionSpec::choice(TERMINATION_PROMPT, ["No", "Yes"])
                    .with_tag("termination");
                let answer = self.participants[self.game_master]
                    .act(&spec, &self.state.log)
                    .await
                    .map_err(|e| turn_failed(resolved_step, &gm_name, e))?;
                answer == "Yes"
            }
        };
        self.pending_termination_check = false;

        let outcome = if stop {
            Some(RunOutcome::Terminated)
        } else if budget_spent {
            Some(RunOutcome::BudgetExhausted)
        } else {
            None
        };

        match outcome {
            Some(outcome) => {
                self.state.status = EngineStatus::Terminated;
                self.outcome = Some(outcome);
                info!(run_id = %self.run_id, steps = self.state.step, outcome = ?outcome, "Run terminated");
            }
            None => self.state.status = EngineStatus::Ready,
        }
        Ok(outcome)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.name() == name)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("run_id", &self.run_id)
            .field("participants", &self.participants.len())
            .field("step", &self.state.step)
            .field("status", &self.state.status)
            .finish()
    }
}

fn no_eligible_actor(step: u64, requested: &str) -> ParleyError {
    ParleyError::NoEligibleActor {
        step,
        requested: requested.to_string(),
    }
}

fn is_fatal(e: &ParleyError) -> bool {
    e.is_protocol_violation() || e.is_configuration()
}

/// Wrap a step failure, leaving fatal errors as they are.
fn turn_failed(step: u64, actor: &str, source: ParleyError) -> ParleyError {
    if is_fatal(&source) || matches!(source, ParleyError::TurnFailed { .. }) {
        return source;
    }
    ParleyError::TurnFailed {
        step,
        actor: actor.to_string(),
        source: Box::new(source),
    }
}

pub mod prelude {
    pub use crate::engine::{
        ActionSpec, ActionSpecPolicy, Engine, Event, EventLog, OutputType, ResolutionPolicy,
        RunOutcome, RunReport, TerminationPolicy, TurnPolicy, WitnessPolicy,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LexicalEmbedder;
    use crate::oracle::{EchoOracle, RetryConfig, OracleCallPolicy, ScriptedFailure, ScriptedOracle};
    use std::time::Duration;

    fn fast_policy() -> OracleCallPolicy {
        OracleCallPolicy::new(
            Duration::from_secs(5),
            RetryConfig::default()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(1)),
        )
    }

    fn entity(name: &str, oracle: Arc<dyn Oracle>) -> Participant {
        Participant::builder(name)
            .embedder(Arc::new(LexicalEmbedder::default()))
            .oracle(oracle)
            .call_policy(fast_policy())
            .build()
            .unwrap()
    }

    fn game_master(name: &str, oracle: Arc<dyn Oracle>) -> Participant {
        ParticipantBuilder::game_master(name)
            .embedder(Arc::new(LexicalEmbedder::default()))
            .oracle(oracle)
            .call_policy(fast_policy())
            .build()
            .unwrap()
    }

    fn echo(text: &str) -> Arc<dyn Oracle> {
        Arc::new(EchoOracle::new(text))
    }

    fn cast() -> Vec<Participant> {
        vec![
            entity("A", echo("A says hello")),
            entity("B", echo("B says hello")),
            game_master("GM", echo("noted")),
        ]
    }

    #[test]
    fn test_construction_checks() {
        let dup = vec![
            entity("A", echo("x")),
            entity("A", echo("x")),
            game_master("GM", echo("x")),
        ];
        assert!(matches!(
            Engine::new(RunConfig::default(), dup),
            Err(ParleyError::DuplicateParticipant(name)) if name == "A"
        ));

        let no_gm = vec![entity("A", echo("x"))];
        assert!(matches!(
            Engine::new(RunConfig::default(), no_gm),
            Err(ParleyError::Configuration(_))
        ));

        let no_entity = vec![game_master("GM", echo("x"))];
        assert!(Engine::new(RunConfig::default(), no_entity).is_err());

        let config = RunConfig::default().with_game_master("Nobody");
        assert!(matches!(
            Engine::new(config, cast()),
            Err(ParleyError::UnknownParticipant(_))
        ));

        let config = RunConfig::default().with_game_master("A");
        assert!(matches!(
            Engine::new(config, cast()),
            Err(ParleyError::Configuration(_))
        ));

        let config = RunConfig::default().with_turn_policy(TurnPolicy::Forced {
            order: vec!["A".into(), "C".into()],
        });
        assert!(matches!(
            Engine::new(config, cast()),
            Err(ParleyError::UnknownParticipant(name)) if name == "C"
        ));

        let config = RunConfig::default().with_max_steps(0);
        assert!(Engine::new(config, cast()).is_err());
    }

    #[tokio::test]
    async fn test_budget_is_a_hard_ceiling() {
        let mut engine = Engine::new(RunConfig::default().with_max_steps(3), cast()).unwrap();
        let report = engine.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(report.steps, 3);
        assert_eq!(engine.log().len(), 3);
        assert!(engine.state().is_terminated());

        // Running a finished engine does nothing more
        let again = engine.run().await.unwrap();
        assert_eq!(again.steps, 3);
        assert_eq!(engine.log().len(), 3);
    }

    #[tokio::test]
    async fn test_step_by_step() {
        let mut engine = Engine::new(RunConfig::default().with_max_steps(2), cast()).unwrap();
        assert_eq!(engine.state().status(), EngineStatus::Ready);
        assert_eq!(engine.step().await.unwrap(), None);
        assert_eq!(engine.state().status(), EngineStatus::Ready);
        assert_eq!(engine.state().step(), 1);
        assert_eq!(
            engine.step().await.unwrap(),
            Some(RunOutcome::BudgetExhausted)
        );
        assert_eq!(engine.state().status(), EngineStatus::Terminated);
    }

    #[tokio::test]
    async fn test_initial_observations_reach_game_masters_only() {
        let config = RunConfig::default()
            .with_max_steps(1)
            .with_initial_observation("The night falls.");
        let mut engine = Engine::new(config, cast()).unwrap();
        engine.run().await.unwrap();

        let gm = engine.participant("GM").unwrap();
        assert_eq!(gm.memory().all()[0].text, "The night falls.");
        let b = engine.participant("B").unwrap();
        assert!(b.memory().is_empty());
    }

    #[tokio::test]
    async fn test_default_witnesses() {
        let mut engine = Engine::new(RunConfig::default().with_max_steps(1), cast()).unwrap();
        engine.run().await.unwrap();

        assert_eq!(
            engine.participant("A").unwrap().latest_observation(),
            Some("A: A says hello")
        );
        assert_eq!(engine.participant("GM").unwrap().memory().len(), 1);
        assert!(engine.participant("B").unwrap().memory().is_empty());
    }

    #[tokio::test]
    async fn test_everyone_witnesses() {
        let config = RunConfig::default()
            .with_max_steps(1)
            .with_witness_policy(WitnessPolicy::Everyone);
        let mut engine = Engine::new(config, cast()).unwrap();
        engine.run().await.unwrap();
        assert_eq!(engine.participant("B").unwrap().memory().len(), 1);
    }

    #[tokio::test]
    async fn test_retired_participants_neither_act_nor_witness() {
        let participants = vec![
            entity("A", echo("A speaks")),
            entity("B", echo("B speaks")),
            entity("C", echo("C speaks")),
            game_master("GM", echo("noted")),
        ];
        let config = RunConfig::default()
            .with_max_steps(4)
            .with_witness_policy(WitnessPolicy::Everyone);
        let mut engine = Engine::new(config, participants).unwrap();
        engine.retire("B").unwrap();
        engine.run().await.unwrap();

        let actors: Vec<&str> = engine.log().iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, vec!["A", "C", "A", "C"]);
        assert!(engine.participant("B").unwrap().memory().is_empty());

        assert!(engine.retire("GM").is_err());
        assert!(matches!(
            engine.retire("Z"),
            Err(ParleyError::UnknownParticipant(_))
        ));
    }

    #[tokio::test]
    async fn test_forced_order_naming_retired_actor_is_fatal() {
        let config = RunConfig::default().with_turn_policy(TurnPolicy::Forced {
            order: vec!["A".into(), "B".into()],
        });
        let mut engine = Engine::new(config, cast()).unwrap();
        engine.retire("A").unwrap();

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            ParleyError::NoEligibleActor { step: 0, ref requested } if requested == "A"
        ));
        assert_eq!(engine.state().status(), EngineStatus::Terminated);
        assert!(engine.log().is_empty());
        // Fatal errors are not retried
        assert!(engine.run().await.is_err());
    }

    #[tokio::test]
    async fn test_game_master_picks_actor() {
        let gm_oracle = Arc::new(ScriptedOracle::new(["2"]));
        let participants = vec![
            entity("A", echo("A speaks")),
            entity("B", echo("B speaks")),
            game_master("GM", gm_oracle.clone()),
        ];
        let config = RunConfig::default()
            .with_max_steps(2)
            .with_turn_policy(TurnPolicy::GameMasterChoice);
        let mut engine = Engine::new(config, participants).unwrap();
        engine.run().await.unwrap();

        let actors: Vec<&str> = engine.log().iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, vec!["B", "B"]);
        let history = gm_oracle.call_history().await;
        assert!(history[0].prompt.contains(NEXT_ACTOR_PROMPT));
    }

    #[tokio::test]
    async fn test_game_master_resolution() {
        let participants = vec![
            entity("A", echo("I open the door")),
            entity("B", echo("I wait")),
            game_master("GM", Arc::new(ScriptedOracle::new(["The door creaks open."]))),
        ];
        let config = RunConfig::default()
            .with_max_steps(1)
            .with_resolution(ResolutionPolicy::GameMaster);
        let mut engine = Engine::new(config, participants).unwrap();
        engine.run().await.unwrap();

        let event = engine.log().last().unwrap();
        assert_eq!(event.raw_action, "I open the door");
        assert_eq!(event.summary, "The door creaks open.");
        assert_eq!(
            engine.participant("A").unwrap().latest_observation(),
            Some("The door creaks open.")
        );
    }

    #[tokio::test]
    async fn test_game_master_action_spec() {
        let gm_oracle = Arc::new(ScriptedOracle::new([
            "prompt: Who does {name} vote for?;;type: choice;;options: A, B",
            "gibberish",
        ]));
        let participants = vec![
            entity("A", Arc::new(ScriptedOracle::new(["2", "free words"]))),
            entity("B", echo("unused")),
            game_master("GM", gm_oracle),
        ];
        let config = RunConfig::default()
            .with_max_steps(2)
            .with_turn_policy(TurnPolicy::Forced {
                order: vec!["A".into()],
            })
            .with_action_spec(ActionSpecPolicy::GameMaster);
        let mut engine = Engine::new(config, participants).unwrap();
        engine.run().await.unwrap();

        assert_eq!(engine.log().get(0).unwrap().raw_action, "B");
        // The second spec was unreadable, so the default free-text spec applied
        assert_eq!(engine.log().get(1).unwrap().raw_action, "free words");
    }

    #[tokio::test]
    async fn test_game_master_choice_without_options_is_fatal() {
        let a_oracle = Arc::new(ScriptedOracle::new(["I vote for nobody in particular"]));
        let participants = vec![
            entity("A", a_oracle.clone()),
            entity("B", echo("unused")),
            game_master(
                "GM",
                Arc::new(ScriptedOracle::new([
                    "prompt: Who does {name} vote for?;;type: choice",
                ])),
            ),
        ];
        let config = RunConfig::default()
            .with_max_steps(1)
            .with_action_spec(ActionSpecPolicy::GameMaster);
        let mut engine = Engine::new(config, participants).unwrap();

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            ParleyError::UnsatisfiableActionSpec { ref actor, ref reason }
                if actor == "A" && reason == "choice without options"
        ));
        assert!(engine.state().is_terminated());
        assert!(engine.log().is_empty());
        assert_eq!(a_oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_game_master_observations() {
        let participants = vec![
            entity("A", echo("A acts")),
            entity("B", echo("B acts")),
            game_master("GM", echo("You see a dark forest.")),
        ];
        let config = RunConfig::default()
            .with_max_steps(1)
            .with_gm_observations(true);
        let mut engine = Engine::new(config, participants).unwrap();
        engine.run().await.unwrap();

        let a = engine.participant("A").unwrap();
        assert_eq!(a.memory().all()[0].text, "You see a dark forest.");
        assert_eq!(a.memory().all()[1].text, "A: A acts");
    }

    #[tokio::test]
    async fn test_keyword_termination() {
        let participants = vec![
            entity("A", Arc::new(ScriptedOracle::new(["hello", "GAME OVER"]))),
            game_master("GM", echo("noted")),
        ];
        let config = RunConfig::default()
            .with_max_steps(10)
            .with_termination_policy(TerminationPolicy::Keyword {
                keyword: "game over".to_string(),
            });
        let mut engine = Engine::new(config, participants).unwrap();
        let report = engine.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Terminated);
        assert_eq!(report.steps, 2);
    }

    #[tokio::test]
    async fn test_game_master_decides_termination() {
        let participants = vec![
            entity("A", echo("A acts")),
            game_master("GM", Arc::new(ScriptedOracle::new(["1", "1", "2"]))),
        ];
        let config = RunConfig::default()
            .with_max_steps(10)
            .with_termination_policy(TerminationPolicy::GameMasterDecides);
        let mut engine = Engine::new(config, participants).unwrap();
        let report = engine.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Terminated);
        assert_eq!(report.steps, 3);
    }

    #[tokio::test]
    async fn test_predicate_termination() {
        let config = RunConfig::default()
            .with_max_steps(10)
            .with_termination_policy(TerminationPolicy::predicate(|state| {
                state.log().iter().filter(|e| e.actor == "B").count() == 2
            }));
        let mut engine = Engine::new(config, cast()).unwrap();
        let report = engine.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Terminated);
        assert_eq!(report.steps, 4);
    }

    #[tokio::test]
    async fn test_failed_turn_resumes_at_same_step() {
        let flaky = Arc::new(ScriptedOracle::with_responses(vec![
            crate::oracle::ScriptedResponse::reply("B first"),
            crate::oracle::ScriptedResponse::failure(ScriptedFailure::Unavailable("down".into())),
            crate::oracle::ScriptedResponse::failure(ScriptedFailure::Unavailable("down".into())),
            crate::oracle::ScriptedResponse::reply("B again"),
        ]));
        let participants = vec![
            entity("A", echo("A says hello")),
            entity("B", flaky),
            game_master("GM", echo("noted")),
        ];
        let mut engine = Engine::new(RunConfig::default().with_max_steps(4), participants).unwrap();

        let err = engine.run().await.unwrap_err();
        match err {
            ParleyError::TurnFailed { step, actor, source } => {
                assert_eq!(step, 3);
                assert_eq!(actor, "B");
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.log().len(), 3);
        assert_eq!(engine.state().status(), EngineStatus::Ready);

        let report = engine.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(engine.log().get(3).unwrap().raw_action, "B again");
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let mut engine = Engine::new(RunConfig::default(), cast()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let report = engine.run_with_cancel(token).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.steps, 0);
        assert!(engine.log().is_empty());
    }

    #[tokio::test]
    async fn test_unsatisfiable_spec_is_fatal() {
        let config = RunConfig::default().with_action_spec(ActionSpecPolicy::Fixed {
            spec: ActionSpec::choice("Vote", Vec::<String>::new()),
        });
        let mut engine = Engine::new(config, cast()).unwrap();
        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, ParleyError::UnsatisfiableActionSpec { .. }));
        assert!(engine.state().is_terminated());
    }
}
