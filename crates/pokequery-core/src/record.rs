//! Structured dataset records

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Record
// ----------------------------------------------------------------------------

/// The seven numeric battle attributes of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseStats {
    pub total: u16,
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub special_attack: u16,
    pub special_defense: u16,
    pub speed: u16,
}

/// One decoded dataset line
///
/// Records are produced by [`RecordCodec::decode`](crate::RecordCodec::decode)
/// and never modified afterwards. Unsigned field types make negative values
/// unrepresentable; the codec rejects empty names and empty primary types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub number: u16,
    pub name: String,
    pub primary_type: String,
    /// Empty when the record has a single type
    pub secondary_type: String,
    pub stats: BaseStats,
    pub generation: u8,
    pub legendary: bool,
}

impl Record {
    /// Whether the record carries a second type tag
    pub fn is_dual_type(&self) -> bool {
        !self.secondary_type.is_empty()
    }
}
