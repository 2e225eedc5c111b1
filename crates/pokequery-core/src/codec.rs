//! Delimited line codec for dataset records
//!
//! A record line carries thirteen fields in fixed order:
//!
//! ```text
//! number,name,type_1,type_2,total,hp,attack,defense,sp_attack,sp_defense,speed,generation,legendary
//! ```
//!
//! Query payloads join several record lines with the record separator, which
//! must differ from the field separator.

use core::str::FromStr;

use crate::config::CodecConfig;
use crate::errors::DecodeError;
use crate::record::{BaseStats, Record};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Field names in line order
pub const FIELD_NAMES: [&str; 13] = [
    "number",
    "name",
    "type_1",
    "type_2",
    "total",
    "hp",
    "attack",
    "defense",
    "sp_attack",
    "sp_defense",
    "speed",
    "generation",
    "legendary",
];

/// Index of the primary category field
pub const CATEGORY_FIELD_INDEX: usize = 2;

/// Literal token for a legendary record
pub const LEGENDARY_TRUE: &str = "True";

/// Literal token for a non-legendary record
pub const LEGENDARY_FALSE: &str = "False";

// ----------------------------------------------------------------------------
// Record Codec
// ----------------------------------------------------------------------------

/// Converts between delimited lines and [`Record`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    field_separator: char,
    record_separator: char,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl RecordCodec {
    /// Build a codec from validated separator configuration
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            field_separator: config.field_separator,
            record_separator: config.record_separator,
        }
    }

    pub fn field_separator(&self) -> char {
        self.field_separator
    }

    pub fn record_separator(&self) -> char {
        self.record_separator
    }

    /// Decode one line into a record
    pub fn decode(&self, line: &str) -> Result<Record, DecodeError> {
        let mut fields = Fields {
            inner: line.split(self.field_separator),
            index: 0,
        };

        let number = fields.number("number")?;
        let name = fields.non_empty("name")?;
        let primary_type = fields.non_empty("type_1")?;
        let secondary_type = fields.next_field("type_2")?.to_string();
        let stats = BaseStats {
            total: fields.number("total")?,
            hp: fields.number("hp")?,
            attack: fields.number("attack")?,
            defense: fields.number("defense")?,
            special_attack: fields.number("sp_attack")?,
            special_defense: fields.number("sp_defense")?,
            speed: fields.number("speed")?,
        };
        let generation = fields.number("generation")?;
        let legendary = match fields.next_field("legendary")? {
            LEGENDARY_TRUE => true,
            LEGENDARY_FALSE => false,
            other => {
                return Err(DecodeError::InvalidFlag {
                    value: other.to_string(),
                })
            }
        };

        let extra = fields.inner.count();
        if extra > 0 {
            return Err(DecodeError::TrailingFields { extra });
        }

        Ok(Record {
            number,
            name,
            primary_type,
            secondary_type,
            stats,
            generation,
            legendary,
        })
    }

    /// Encode a record as one line, without a line terminator
    pub fn encode(&self, record: &Record) -> String {
        let stats = &record.stats;
        let flag = if record.legendary {
            LEGENDARY_TRUE
        } else {
            LEGENDARY_FALSE
        };
        let fields: [String; 13] = [
            record.number.to_string(),
            record.name.clone(),
            record.primary_type.clone(),
            record.secondary_type.clone(),
            stats.total.to_string(),
            stats.hp.to_string(),
            stats.attack.to_string(),
            stats.defense.to_string(),
            stats.special_attack.to_string(),
            stats.special_defense.to_string(),
            stats.speed.to_string(),
            record.generation.to_string(),
            flag.to_string(),
        ];
        let mut buf = [0u8; 4];
        let separator: &str = self.field_separator.encode_utf8(&mut buf);
        fields.join(separator)
    }

    /// The raw primary category field of a line, without decoding the rest
    pub fn category_field<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.split(self.field_separator).nth(CATEGORY_FIELD_INDEX)
    }

    /// Join record lines into a query payload with no trailing separator
    pub fn join_payload<S: AsRef<str>>(&self, lines: &[S]) -> String {
        let mut payload = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                payload.push(self.record_separator);
            }
            payload.push_str(line.as_ref());
        }
        payload
    }

    /// Split a query payload back into record lines
    ///
    /// An empty payload holds zero records.
    pub fn split_payload<'a>(&self, payload: &'a str) -> Vec<&'a str> {
        if payload.is_empty() {
            return Vec::new();
        }
        payload.split(self.record_separator).collect()
    }
}

// ----------------------------------------------------------------------------
// Field Cursor
// ----------------------------------------------------------------------------

struct Fields<'a> {
    inner: core::str::Split<'a, char>,
    index: usize,
}

impl<'a> Fields<'a> {
    fn next_field(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        debug_assert_eq!(FIELD_NAMES[self.index], field);
        self.index += 1;
        self.inner
            .next()
            .ok_or(DecodeError::MalformedLine { field })
    }

    fn non_empty(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let value = self.next_field(field)?;
        if value.is_empty() {
            return Err(DecodeError::EmptyField { field });
        }
        Ok(value.to_string())
    }

    fn number<N: FromStr>(&mut self, field: &'static str) -> Result<N, DecodeError> {
        let value = self.next_field(field)?;
        let invalid = || DecodeError::InvalidNumber {
            field,
            value: value.to_string(),
        };
        // `parse` alone would accept a leading `+`
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // Leading zeros would not survive re-encoding
        if value.len() > 1 && value.starts_with('0') {
            return Err(invalid());
        }
        value.parse().map_err(|_| invalid())
    }
}
