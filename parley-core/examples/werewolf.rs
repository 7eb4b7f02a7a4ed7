//! Werewolf example
//!
//! Six players with secret roles and a game master that picks who acts,
//! describes what each player sees and narrates the outcome of every action.
//! Runs offline with a rule-based oracle; set `[oracle]` in `parley.toml`
//! (and enable an oracle feature) to play with a real model instead.
//!
//! ```sh
//! cargo run --example werewolf
//! RUST_LOG=parley_core=debug cargo run --example werewolf
//! ```

use async_trait::async_trait;
use parley_core::oracle::ModelInfo;
use parley_core::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const PLAYERS: [(&str, &str); 6] = [
    ("P1", "wolf"),
    ("P2", "seer"),
    ("P3", "wolf"),
    ("P4", "villager"),
    ("P5", "witch"),
    ("P6", "villager"),
];

const GM_LINES: [&str; 3] = [
    "Night phase: wolves pick a victim, the seer checks one player, the witch may save or poison.",
    "Day phase: players discuss in turn, then vote someone out.",
    "The wolves win when they equal the villagers; the village wins when every wolf is gone.",
];

/// Offline stand-in for a model: answers numbered choices in rotation and
/// free-text prompts with canned lines.
struct RuleBasedOracle {
    lines: Vec<String>,
    calls: AtomicUsize,
}

impl RuleBasedOracle {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Oracle for RuleBasedOracle {
    async fn generate_text(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("Respond ONLY with the number") {
            let options = prompt
                .lines()
                .filter(|line| line.split_once(". ").is_some_and(|(n, _)| n.parse::<usize>().is_ok()))
                .count()
                .max(1);
            return Ok(format!("{}", call % options + 1));
        }
        Ok(self.lines[call % self.lines.len()].clone())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "rule-based".to_string(),
            model_name: "werewolf-demo".to_string(),
        }
    }
}

fn role_prompt(role: &str) -> &'static str {
    match role {
        "wolf" => "You are a werewolf. Work with your teammate, hide your role and steer votes away from wolves.",
        "seer" => "You are the seer. Each night you learn one player's true role. Share it carefully.",
        "witch" => "You are the witch. You hold one healing potion and one poison.",
        _ => "You are a villager. Find the wolves by reasoning about what others say.",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    parley_core::logging::init_tracing("info");

    println!("Werewolf");
    println!("========\n");

    let config = ParleyConfig::load()?;
    let embedder = EmbedderFactory::create(&MemoryConfig {
        embedder: EmbedderKind::Lexical,
        dimension: 128,
        ..config.memory.clone()
    })?;

    let live = OracleFactory::from_config(config.oracle.as_ref())?;
    let call_policy = OracleFactory::call_policy(config.oracle.as_ref());
    let player_oracle: Arc<dyn Oracle> = live.clone().unwrap_or_else(|| {
        Arc::new(RuleBasedOracle::new(&[
            "I was asleep all night. P4 is acting strangely though.",
            "I think we should hear from P6 before voting.",
            "My gut says P3 is hiding something.",
        ]))
    });
    let gm_oracle: Arc<dyn Oracle> = live.unwrap_or_else(|| {
        Arc::new(RuleBasedOracle::new(&[
            "The village square is quiet; everyone watches you.",
            "The others murmur and glance at each other.",
        ]))
    });

    let wolves: Vec<&str> = PLAYERS
        .iter()
        .filter(|(_, role)| *role == "wolf")
        .map(|(name, _)| *name)
        .collect();

    let mut participants = Vec::new();
    for (name, role) in PLAYERS {
        let mut builder = Participant::builder(name)
            .embedder(embedder.clone())
            .oracle(player_oracle.clone())
            .call_policy(call_policy.clone())
            .instructions(role_prompt(role))
            .seed_memory(format!("role: {}", role));
        if role == "wolf" {
            for mate in wolves.iter().filter(|mate| **mate != name) {
                builder = builder.seed_memory(format!("teammate: {}", mate));
            }
        }
        participants.push(builder.build()?);
    }

    let mut gm = ParticipantBuilder::game_master("Werewolf GM")
        .embedder(embedder)
        .oracle(gm_oracle)
        .call_policy(call_policy)
        .instructions("Run a classic game of werewolf. Keep narration short and fair.");
    for line in GM_LINES {
        gm = gm.seed_memory(line);
    }
    participants.push(gm.build()?);

    let run = RunConfig::default()
        .with_max_steps(6)
        .with_initial_observation("The game begins. Night falls; everyone closes their eyes.")
        .with_turn_policy(TurnPolicy::GameMasterChoice)
        .with_resolution(ResolutionPolicy::GameMaster)
        .with_gm_observations(true);

    let mut engine = Engine::new(run, participants)?;
    let report = engine.run().await?;

    println!("Event log:");
    for event in engine.log() {
        println!("  {}", event);
    }

    println!("\nWhat P1 remembers about teammates:");
    let p1 = engine
        .participant("P1")
        .ok_or_else(|| ParleyError::UnknownParticipant("P1".to_string()))?;
    for record in p1.memory().retrieve("who is my teammate?", 2)? {
        println!("  - {}", record.text);
    }

    println!(
        "\nRun {} finished: {:?} after {} steps ({} choice fallbacks)",
        report.run_id, report.outcome, report.steps, report.choice_fallbacks
    );
    Ok(())
}
