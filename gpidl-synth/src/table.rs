//! The synthesized encoding table
//!
//! This is the persisted artifact: a `meta` block describing the spec-wide
//! layout decisions plus one entry per leaf form, keyed by the dotted
//! instruction-and-form-key path. Serialization preserves insertion order,
//! so writing the table back out reproduces it byte for byte.
//!
//! The model round-trips: downstream presentation (`gpidl-babel`) reads
//! tables that may have been produced by an earlier run or edited by hand,
//! so everything derives `Deserialize` as well.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Fixed width of every encoded instruction.
pub const INSTRUCTION_WIDTH_BITS: u32 = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingTable {
    pub meta: Meta,
    pub encodings: IndexMap<String, Encoding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub encoding_version: u32,
    pub statistics: Statistics,
}

/// Spec-wide counts and the selector widths derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub instruction_count: usize,
    pub instruction_bits: u32,
    /// Maximum branching factor per form-tree depth, over all instructions.
    pub form_level_counts: Vec<usize>,
    /// `bits_needed` of each entry in `form_level_counts`.
    pub form_level_bits: Vec<u32>,
}

/// The bit layout of one leaf form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoding {
    pub instruction: String,
    /// Form keys from the instruction's root down to this leaf.
    pub form_path: Vec<String>,
    /// LSB-first, contiguous, covering exactly `[0, INSTRUCTION_WIDTH_BITS)`.
    pub ranges: Vec<EncodingRange>,
}

/// One field in a leaf layout. Zero-length ranges are never emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncodingRange {
    /// A value baked into every instance: the instruction index or a
    /// form-selector level.
    Constant { start: u32, length: u32, constant: u64 },
    /// A variably-filled operand slot.
    Operand { start: u32, length: u32, name: String },
    /// A per-operand flag field; `oprnd_idx` names the owning operand.
    OprndFlag {
        start: u32,
        length: u32,
        name: String,
        oprnd_idx: String,
    },
    /// A variably-filled modifier field, including fields whose value a
    /// fixed-modifier commitment pins at the spec level.
    Modifier { start: u32, length: u32, name: String },
    /// Trailing padding up to the instruction width.
    Reserved { start: u32, length: u32 },
}

impl EncodingRange {
    pub fn start(&self) -> u32 {
        match self {
            EncodingRange::Constant { start, .. }
            | EncodingRange::Operand { start, .. }
            | EncodingRange::OprndFlag { start, .. }
            | EncodingRange::Modifier { start, .. }
            | EncodingRange::Reserved { start, .. } => *start,
        }
    }

    pub fn length(&self) -> u32 {
        match self {
            EncodingRange::Constant { length, .. }
            | EncodingRange::Operand { length, .. }
            | EncodingRange::OprndFlag { length, .. }
            | EncodingRange::Modifier { length, .. }
            | EncodingRange::Reserved { length, .. } => *length,
        }
    }

    /// First bit past this range.
    pub fn end(&self) -> u32 {
        self.start() + self.length()
    }

    /// The wire tag of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            EncodingRange::Constant { .. } => "constant",
            EncodingRange::Operand { .. } => "operand",
            EncodingRange::OprndFlag { .. } => "oprnd_flag",
            EncodingRange::Modifier { .. } => "modifier",
            EncodingRange::Reserved { .. } => "reserved",
        }
    }

    /// Field name, for the variants that carry one.
    pub fn name(&self) -> Option<&str> {
        match self {
            EncodingRange::Operand { name, .. }
            | EncodingRange::OprndFlag { name, .. }
            | EncodingRange::Modifier { name, .. } => Some(name),
            EncodingRange::Constant { .. } | EncodingRange::Reserved { .. } => None,
        }
    }

    pub fn constant(&self) -> Option<u64> {
        match self {
            EncodingRange::Constant { constant, .. } => Some(*constant),
            _ => None,
        }
    }

    pub fn oprnd_idx(&self) -> Option<&str> {
        match self {
            EncodingRange::OprndFlag { oprnd_idx, .. } => Some(oprnd_idx),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_serialize_with_a_type_tag_and_no_null_fields() {
        let range = EncodingRange::Constant {
            start: 0,
            length: 3,
            constant: 5,
        };
        let json = serde_json::to_value(&range).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "constant", "start": 0, "length": 3, "constant": 5 })
        );

        let range = EncodingRange::OprndFlag {
            start: 7,
            length: 1,
            name: "neg".to_string(),
            oprnd_idx: "a".to_string(),
        };
        let json = serde_json::to_value(&range).unwrap();
        assert_eq!(json["type"], "oprnd_flag");
        assert_eq!(json["oprnd_idx"], "a");
    }

    #[test]
    fn range_json_round_trips() {
        let ranges = vec![
            EncodingRange::Operand {
                start: 0,
                length: 8,
                name: "d".to_string(),
            },
            EncodingRange::Reserved {
                start: 8,
                length: 120,
            },
        ];
        let text = serde_json::to_string(&ranges).unwrap();
        let back: Vec<EncodingRange> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, ranges);
    }

    #[test]
    fn accessors_cover_every_variant() {
        let range = EncodingRange::Modifier {
            start: 10,
            length: 2,
            name: "rnd".to_string(),
        };
        assert_eq!(range.start(), 10);
        assert_eq!(range.length(), 2);
        assert_eq!(range.end(), 12);
        assert_eq!(range.type_name(), "modifier");
        assert_eq!(range.name(), Some("rnd"));
        assert_eq!(range.constant(), None);
        assert_eq!(range.oprnd_idx(), None);
    }
}
