//! Context components: the pieces a participant's prompt is assembled from

use serde::{Deserialize, Serialize};

use super::ParticipantKind;
use crate::engine::event::EventLog;
use crate::error::Result;
use crate::memory::MemoryBank;

/// Everything a component may read while producing its fragment.
#[derive(Debug, Clone, Copy)]
pub struct ComponentContext<'a> {
    pub name: &'a str,
    pub kind: ParticipantKind,
    pub memory: &'a MemoryBank,
    pub latest_observation: Option<&'a str>,
    /// Call to action with the actor's name already substituted
    pub call_to_action: &'a str,
    pub log: &'a EventLog,
}

/// One step of a participant's prompt pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextComponent {
    /// Role prompt
    Instructions { text: String },
    /// Any fixed text under a label of its own
    Constant { label: String, text: String },
    /// Who the participant is
    Identity,
    /// The most recent observation
    LatestObservation,
    /// Last `count` memories in the order they arrived
    RecentObservations { count: usize },
    /// Top `k` memories by similarity to `query`, or to the call to action
    SimilarMemories {
        k: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    /// Last `count` events of the run
    EventLogTail { count: usize },
}

impl ContextComponent {
    /// Label shown above the fragment
    pub fn label(&self) -> &str {
        match self {
            ContextComponent::Instructions { .. } => "Instructions",
            ContextComponent::Constant { label, .. } => label.as_str(),
            ContextComponent::Identity => "Identity",
            ContextComponent::LatestObservation => "Latest observation",
            ContextComponent::RecentObservations { .. } => "Recent observations",
            ContextComponent::SimilarMemories { .. } => "Relevant memories",
            ContextComponent::EventLogTail { .. } => "Recent events",
        }
    }

    /// Produce the fragment body, or `None` when there is nothing to say.
    ///
    /// # Errors
    ///
    /// Fails only if memory retrieval fails.
    pub fn produce(&self, ctx: &ComponentContext<'_>) -> Result<Option<String>> {
        let body = match self {
            ContextComponent::Instructions { text } | ContextComponent::Constant { text, .. } => {
                non_empty(text.trim().to_string())
            }
            ContextComponent::Identity => Some(match ctx.kind {
                ParticipantKind::Entity => format!("You are {}.", ctx.name),
                ParticipantKind::GameMaster => {
                    format!("You are {}, the game master of this simulation.", ctx.name)
                }
            }),
            ContextComponent::LatestObservation => {
                ctx.latest_observation.map(|text| text.to_string())
            }
            ContextComponent::RecentObservations { count } => bullets(
                ctx.memory
                    .recent(*count)
                    .iter()
                    .map(|record| record.text.as_str()),
            ),
            ContextComponent::SimilarMemories { k, query } => {
                let query = query.as_deref().unwrap_or(ctx.call_to_action);
                let hits = ctx.memory.retrieve(query, *k)?;
                bullets(hits.into_iter().map(|record| record.text.as_str()))
            }
            ContextComponent::EventLogTail { count } => {
                let lines: Vec<String> = ctx
                    .log
                    .tail(*count)
                    .iter()
                    .map(|event| event.to_string())
                    .collect();
                non_empty(lines.join("\n"))
            }
        };
        Ok(body)
    }

    /// Produce the labelled fragment, `"{label}:\n{body}"`.
    pub fn render(&self, ctx: &ComponentContext<'_>) -> Result<Option<String>> {
        Ok(self
            .produce(ctx)?
            .map(|body| format!("{}:\n{}", self.label(), body)))
    }
}

/// Default pipeline for a participant of `kind`.
pub fn default_components(
    kind: ParticipantKind,
    instructions: Option<&str>,
    retrieval_k: usize,
    recent: usize,
) -> Vec<ContextComponent> {
    let mut components = vec![ContextComponent::Identity];
    if let Some(text) = instructions {
        components.push(ContextComponent::Instructions {
            text: text.to_string(),
        });
    }
    match kind {
        ParticipantKind::Entity => {
            components.push(ContextComponent::SimilarMemories {
                k: retrieval_k,
                query: None,
            });
            components.push(ContextComponent::RecentObservations { count: recent });
        }
        ParticipantKind::GameMaster => {
            components.push(ContextComponent::RecentObservations { count: recent });
            components.push(ContextComponent::EventLogTail { count: recent });
        }
    }
    components
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn bullets<'a>(lines: impl Iterator<Item = &'a str>) -> Option<String> {
    let body: Vec<String> = lines.map(|line| format!("- {}", line)).collect();
    non_empty(body.join("\n"))
}
