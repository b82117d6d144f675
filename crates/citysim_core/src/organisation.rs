//! Organisations (factions) and the relation model between them.
//!
//! Each organisation stores a one-directional map of signed standings
//! toward other organisations. Queries derive a qualitative [`Relation`]
//! tier from the scalar. The model is read-only: standings are changed by
//! outside game logic through [`Organisation::set_relation`] and
//! [`Organisation::adjust_relation`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state_ref::StateRef;

/// Highest possible standing, always used for self-relation.
pub const MAX_RELATION: i32 = 100;

/// Lowest possible standing, always used between aliens and everyone else.
pub const MIN_RELATION: i32 = -100;

/// Standing at or below which an organisation is hostile.
pub const HOSTILE_THRESHOLD: i32 = -50;

/// Standing at or below which an organisation is unfriendly.
pub const UNFRIENDLY_THRESHOLD: i32 = -25;

/// Standing at or above which an organisation is friendly.
pub const FRIENDLY_THRESHOLD: i32 = 25;

/// Standing at or above which an organisation is allied.
pub const ALLIED_THRESHOLD: i32 = 75;

/// Qualitative relation tier, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Standing >= 75.
    Allied,
    /// Standing >= 25.
    Friendly,
    /// Anything between the unfriendly and friendly thresholds.
    Neutral,
    /// Standing <= -25.
    Unfriendly,
    /// Standing <= -50.
    Hostile,
}

impl Relation {
    /// Map a raw standing to its tier.
    ///
    /// Thresholds are tested from the extremes inward, so the allied range is
    /// never shadowed by the wider friendly range.
    #[must_use]
    pub const fn from_standing(x: i32) -> Self {
        if x <= HOSTILE_THRESHOLD {
            Self::Hostile
        } else if x <= UNFRIENDLY_THRESHOLD {
            Self::Unfriendly
        } else if x >= ALLIED_THRESHOLD {
            Self::Allied
        } else if x >= FRIENDLY_THRESHOLD {
            Self::Friendly
        } else {
            Self::Neutral
        }
    }

    /// Get the display name for this tier.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Allied => "Allied",
            Self::Friendly => "Friendly",
            Self::Neutral => "Neutral",
            Self::Unfriendly => "Unfriendly",
            Self::Hostile => "Hostile",
        }
    }
}

/// A controllable or AI-controlled party with a treasury and relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    /// Registry key of this organisation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Treasury balance.
    pub balance: i64,
    /// Weekly income added to the balance.
    pub income: i64,
    /// Aliens are hostile to and from everyone else regardless of standings.
    #[serde(default)]
    pub alien: bool,
    /// Stored standings toward other organisations. Missing means neutral.
    #[serde(default)]
    pub relations: BTreeMap<StateRef<Organisation>, i32>,
}

impl Organisation {
    /// Create an organisation with no stored relations.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, balance: i64, income: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance,
            income,
            alien: false,
            relations: BTreeMap::new(),
        }
    }

    /// Mark this organisation as alien.
    #[must_use]
    pub fn alien(mut self) -> Self {
        self.alien = true;
        self
    }

    /// A reference to this organisation.
    #[must_use]
    pub fn to_ref(&self) -> StateRef<Organisation> {
        StateRef::new(self.id.as_str())
    }

    /// Whether this organisation is alien.
    #[must_use]
    pub const fn is_alien(&self) -> bool {
        self.alien
    }

    /// Signed standing toward `other`.
    ///
    /// Self is always [`MAX_RELATION`]. If either side is alien the result is
    /// [`MIN_RELATION`], overriding anything stored.
    #[must_use]
    pub fn relation_to(&self, other: &Organisation) -> i32 {
        if other.id == self.id {
            return MAX_RELATION;
        }
        if self.alien || other.alien {
            return MIN_RELATION;
        }
        self.relations.get(&other.to_ref()).copied().unwrap_or(0)
    }

    /// Qualitative tier of the standing toward `other`.
    #[must_use]
    pub fn qualitative_relation(&self, other: &Organisation) -> Relation {
        Relation::from_standing(self.relation_to(other))
    }

    /// Standing toward `other` is zero or better.
    #[must_use]
    pub fn is_positive_to(&self, other: &Organisation) -> bool {
        self.relation_to(other) >= 0
    }

    /// Standing toward `other` is below zero.
    #[must_use]
    pub fn is_negative_to(&self, other: &Organisation) -> bool {
        self.relation_to(other) < 0
    }

    /// Store a standing toward `other`, clamped to the valid range.
    pub fn set_relation(&mut self, other: StateRef<Organisation>, value: i32) {
        self.relations
            .insert(other, value.clamp(MIN_RELATION, MAX_RELATION));
    }

    /// Shift the stored standing toward `other` by `delta`.
    pub fn adjust_relation(&mut self, other: StateRef<Organisation>, delta: i32) {
        let current = self.relations.get(&other).copied().unwrap_or(0);
        self.set_relation(other, current.saturating_add(delta));
    }
}
