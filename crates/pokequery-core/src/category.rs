//! Closed category vocabulary
//!
//! The eighteen recognized type tags. Matching is case-sensitive: `"fire"`
//! is not a category, `"Fire"` is.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PokequeryError;

// ----------------------------------------------------------------------------
// Category
// ----------------------------------------------------------------------------

/// A recognized record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Normal,
    Fire,
    Water,
    Grass,
    Electric,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl Category {
    /// Every category, in menu order
    pub const ALL: [Category; 18] = [
        Category::Normal,
        Category::Fire,
        Category::Water,
        Category::Grass,
        Category::Electric,
        Category::Ice,
        Category::Fighting,
        Category::Poison,
        Category::Ground,
        Category::Flying,
        Category::Psychic,
        Category::Bug,
        Category::Rock,
        Category::Ghost,
        Category::Dragon,
        Category::Dark,
        Category::Steel,
        Category::Fairy,
    ];

    /// The literal tag as it appears in dataset lines
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Normal => "Normal",
            Category::Fire => "Fire",
            Category::Water => "Water",
            Category::Grass => "Grass",
            Category::Electric => "Electric",
            Category::Ice => "Ice",
            Category::Fighting => "Fighting",
            Category::Poison => "Poison",
            Category::Ground => "Ground",
            Category::Flying => "Flying",
            Category::Psychic => "Psychic",
            Category::Bug => "Bug",
            Category::Rock => "Rock",
            Category::Ghost => "Ghost",
            Category::Dragon => "Dragon",
            Category::Dark => "Dark",
            Category::Steel => "Steel",
            Category::Fairy => "Fairy",
        }
    }

    /// Whether a raw category field from a dataset line names this category
    pub fn matches(&self, field: &str) -> bool {
        self.as_str() == field
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PokequeryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| PokequeryError::invalid_category(s))
    }
}
