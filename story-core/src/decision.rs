//! A round's decisions, one per agent, in turn order.

use std::collections::HashMap;

/// Where a decision's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOrigin {
    /// Written by the completion service and accepted as coherent.
    Agent,
    /// Substituted because the agent's own decision was incoherent.
    Fallback,
    /// Substituted because the agent lost a conflict.
    Arbitrated,
}

/// One agent's decision for the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub agent: String,
    pub text: String,
    pub origin: DecisionOrigin,
}

/// Decisions for a round. Holds at most one entry per agent and keeps the
/// order in which agents were first inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionBatch {
    decisions: Vec<Decision>,
}

impl DecisionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `agent`'s decision, replacing any earlier one in place.
    pub fn insert(&mut self, agent: impl Into<String>, text: impl Into<String>, origin: DecisionOrigin) {
        let agent = agent.into();
        let text = text.into();
        match self.decisions.iter_mut().find(|d| d.agent == agent) {
            Some(existing) => {
                existing.text = text;
                existing.origin = origin;
            }
            None => self.decisions.push(Decision {
                agent,
                text,
                origin,
            }),
        }
    }

    /// Builder-style [`insert`](Self::insert) for agent-written decisions.
    pub fn with(mut self, agent: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(agent, text, DecisionOrigin::Agent);
        self
    }

    pub fn get(&self, agent: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.agent == agent)
    }

    pub fn text_of(&self, agent: &str) -> Option<&str> {
        self.get(agent).map(|d| d.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Number of decisions with the given origin.
    pub fn count(&self, origin: DecisionOrigin) -> usize {
        self.decisions.iter().filter(|d| d.origin == origin).count()
    }

    /// Agent name to decision text.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.decisions
            .iter()
            .map(|d| (d.agent.clone(), d.text.clone()))
            .collect()
    }
}
