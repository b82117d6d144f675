//! Research labs and base facility construction.
//!
//! Labs put their skill into the assigned topic every tick. Facilities
//! under construction count down once per simulated day.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::state_ref::{Registry, StateRef};

/// A research project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchTopic {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Work needed to finish, in skill-ticks.
    pub cost: u64,
    /// Work done so far.
    #[serde(default)]
    pub progress: u64,
}

impl ResearchTopic {
    /// Whether all required work is done.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.progress >= self.cost
    }
}

/// A lab working on at most one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    /// Registry key.
    pub id: String,
    /// Work contributed per tick.
    pub skill: u64,
    /// Topic being researched, empty when idle.
    pub current_topic: StateRef<ResearchTopic>,
}

/// Topics and the labs working on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Research {
    /// All topics.
    pub topics: Registry<ResearchTopic>,
    /// All labs.
    pub labs: Registry<Lab>,
}

impl Research {
    /// Point a lab at a topic.
    pub fn assign(&mut self, lab: &StateRef<Lab>, topic: &StateRef<ResearchTopic>) -> Result<()> {
        if !self.topics.contains(topic) {
            return Err(SimError::MissingRule(format!("research topic {topic}")));
        }
        let lab = self
            .labs
            .get_mut(lab)
            .ok_or_else(|| SimError::MissingRule(format!("lab {lab}")))?;
        lab.current_topic = topic.clone();
        Ok(())
    }

    /// Advance every lab by `ticks`, returning topics that completed.
    ///
    /// A lab whose topic completes, or whose topic no longer resolves,
    /// becomes idle.
    pub fn update(&mut self, ticks: u64) -> Vec<StateRef<ResearchTopic>> {
        let mut completed = Vec::new();
        for lab in self.labs.values_mut() {
            if lab.current_topic.is_empty() {
                continue;
            }
            let Some(topic) = self.topics.get_mut(&lab.current_topic) else {
                tracing::warn!(lab = %lab.id, topic = %lab.current_topic, "Lab topic not found");
                lab.current_topic.clear();
                continue;
            };
            if topic.is_complete() {
                lab.current_topic.clear();
                continue;
            }
            topic.progress = topic
                .progress
                .saturating_add(lab.skill.saturating_mul(ticks))
                .min(topic.cost);
            if topic.is_complete() {
                tracing::info!(topic = %topic.id, lab = %lab.id, "Research complete");
                completed.push(lab.current_topic.clone());
                lab.current_topic.clear();
            }
        }
        completed
    }
}

/// A base facility, usable once its build time reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    /// Identifier, unique within its base.
    pub id: String,
    /// Facility kind, e.g. "LAB" or "HANGAR".
    pub kind: String,
    /// Days of construction left.
    #[serde(default)]
    pub build_time_days: u32,
}

/// A player base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Facilities, built or under construction.
    #[serde(default)]
    pub facilities: Vec<Facility>,
}

impl Base {
    /// Count construction down by one day.
    ///
    /// Returns the ids of facilities finished today.
    pub fn update_end_of_day(&mut self) -> Vec<String> {
        let mut finished = Vec::new();
        for facility in &mut self.facilities {
            if facility.build_time_days > 0 {
                facility.build_time_days -= 1;
                if facility.build_time_days == 0 {
                    finished.push(facility.id.clone());
                }
            }
        }
        finished
    }
}
