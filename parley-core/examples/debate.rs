//! Debate example
//!
//! Two debaters alternate under a moderator until one concedes, built
//! entirely from configuration. The finished log is written as JSON Lines.
//!
//! ```sh
//! cargo run --example debate > debate.jsonl
//! ```

use parley_core::prelude::*;
use std::sync::Arc;

fn debate_config() -> ParleyConfig {
    let run = RunConfig::default()
        .with_max_steps(8)
        .with_initial_observation("Motion: renewables alone can decarbonise the grid by 2050.")
        .with_turn_policy(TurnPolicy::Forced {
            order: vec!["Renewables".to_string(), "Nuclear".to_string()],
        })
        .with_witness_policy(WitnessPolicy::Everyone)
        .with_termination_policy(TerminationPolicy::Keyword {
            keyword: "I concede".to_string(),
        })
        .with_action_spec(ActionSpecPolicy::Fixed {
            spec: ActionSpec::free_text("What is {name}'s next argument?").with_tag("argument"),
        });

    ParleyConfig {
        run,
        memory: MemoryConfig {
            embedder: EmbedderKind::Lexical,
            ..Default::default()
        },
        oracle: None,
        participants: vec![
            ParticipantConfig::entity("Renewables")
                .with_instructions("Argue that renewable energy is the best answer to climate change.")
                .with_seed_memory("Solar and wind are now the cheapest sources of new power."),
            ParticipantConfig::entity("Nuclear")
                .with_instructions("Argue that nuclear power must anchor any low-carbon grid.")
                .with_seed_memory("Nuclear plants deliver steady output regardless of weather."),
            ParticipantConfig::game_master("Moderator")
                .with_instructions("Keep the debate civil and on topic."),
        ],
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    parley_core::logging::init_tracing("warn");

    let oracle = Arc::new(ScriptedOracle::new([
        "Solar costs fell ninety percent in a decade; cheap power wins.",
        "Cheap when the sun shines. Grids need firm capacity at night.",
        "Storage and transmission already cover the gaps in several countries.",
        "Fair point on storage. On cost and speed of build, I concede.",
    ]));

    let mut engine = Engine::from_config(&debate_config(), oracle.clone())?;
    let report = engine.run().await?;

    engine.log().write_jsonl(std::io::stdout().lock())?;

    eprintln!(
        "{:?} after {} steps, {} oracle calls",
        report.outcome,
        report.steps,
        oracle.call_count()
    );
    Ok(())
}
