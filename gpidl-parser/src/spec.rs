//! Typed Spec model
//!
//! The structures here mirror the GPIDL grammar one to one. They are meant
//! to be built from an already-validated parsed document; deserialization
//! alone does not enforce the scope and structural rules (that is
//! `gpidl-analysis`' job), only shapes.
//!
//! All mappings are [`IndexMap`]s: instruction and form declaration order
//! determines opcode and form-selector assignment, so iteration order must
//! match the source document.

use crate::bits::bits_needed;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Root of a GPIDL document.
#[derive(Debug, Clone, Deserialize)]
pub struct Spec {
    pub gpidl_version: String,
    /// Operand kind name to field width in bits.
    pub operand_width_bits: IndexMap<String, u32>,
    /// Allowed operand role vocabulary.
    pub canonical_roles: Vec<String>,
    /// Boolean per-operand switches, one bit each.
    pub global_oprnd_flag_defs: IndexMap<String, ModifierDef>,
    pub global_modifier_defs: IndexMap<String, ModifierDef>,
    /// Declaration order is opcode-assignment order.
    pub instructions: IndexMap<String, Instruction>,
}

impl Spec {
    /// Build the typed model from a parsed document.
    pub fn from_value(value: &Value) -> Result<Spec, serde_json::Error> {
        Spec::deserialize(value)
    }
}

/// An enumerable field definition: explicit width and/or enum labels.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierDef {
    /// Explicit field width; overrides the width derived from the enum.
    #[serde(default)]
    pub bits: Option<u32>,
    #[serde(rename = "enum")]
    pub enum_def: EnumDef,
    /// Default label; must name one of the enum's labels.
    #[serde(default)]
    pub default: Option<String>,
    /// Free-form documentation.
    #[serde(default)]
    pub meaning: Option<StringOrList>,
    /// Global modifiers only: restricts the modifier to these instructions.
    #[serde(default)]
    pub can_apply_to_inst: Option<Vec<String>>,
}

impl ModifierDef {
    /// Effective field width: explicit `bits` if given, else the enum width.
    pub fn width_bits(&self) -> u32 {
        match self.bits {
            Some(bits) => bits,
            None => self.enum_def.width_bits(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.enum_def.labels().any(|l| l == label)
    }
}

/// Enum shape: an ordered label list (codes are positional) or an explicit
/// label-to-code mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnumDef {
    Labels(Vec<String>),
    Coded(IndexMap<String, u64>),
}

impl EnumDef {
    /// Width implied by the enum alone: cardinality for label lists, enough
    /// bits to hold the maximum code for coded enums. Zero for one or no
    /// labels.
    pub fn width_bits(&self) -> u32 {
        match self {
            EnumDef::Labels(labels) => bits_needed(labels.len()),
            EnumDef::Coded(coded) => match coded.values().max() {
                Some(&max) => u64::BITS - max.leading_zeros(),
                None => 0,
            },
        }
    }

    pub fn labels(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            EnumDef::Labels(labels) => Box::new(labels.iter().map(String::as_str)),
            EnumDef::Coded(coded) => Box::new(coded.keys().map(String::as_str)),
        }
    }
}

/// Free-form documentation that may be a single string or a list of lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Free-form effect/mnemonic documentation. Not structurally significant to
/// the encoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Semantics {
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub mnemonic: Option<StringOrList>,
    #[serde(default)]
    pub notes: Option<Vec<String>>,
}

/// A top-level named instruction owning a tree of forms.
#[derive(Debug, Clone, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub semantics: Option<Semantics>,
    /// Modifier definitions scoped to this instruction and its descendants.
    #[serde(default)]
    pub local_modifier_defs: IndexMap<String, ModifierDef>,
    /// Modifiers variably encoded in every leaf under this instruction.
    #[serde(default)]
    pub inst_modifiers: Vec<String>,
    /// Modifiers whose value is committed per child form; the field is still
    /// present in every descendant encoding.
    #[serde(default)]
    pub fixed_modifiers: Vec<String>,
    pub forms: IndexMap<String, Form>,
}

impl Instruction {
    /// Number of leaf variants under this instruction.
    pub fn leaf_count(&self) -> usize {
        self.forms.values().map(Form::leaf_count).sum()
    }
}

/// A variant node in an instruction's form tree. A form without a nested
/// `forms` mapping is a leaf.
#[derive(Debug, Clone, Deserialize)]
pub struct Form {
    #[serde(default)]
    pub semantics: Option<Semantics>,
    #[serde(default)]
    pub local_modifier_defs: IndexMap<String, ModifierDef>,
    #[serde(default)]
    pub inst_modifiers: Vec<String>,
    #[serde(default)]
    pub fixed_modifiers: Vec<String>,
    /// Required exactly when the parent declared `fixed_modifiers`: the
    /// committed label for each of the parent's fixed modifiers.
    #[serde(default)]
    pub fixed_modi_vals: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub operands: Vec<Operand>,
    #[serde(default)]
    pub forms: Option<IndexMap<String, Form>>,
}

impl Form {
    pub fn is_leaf(&self) -> bool {
        self.forms.is_none()
    }

    /// Number of leaves in this subtree. Nested `forms` are containers; an
    /// empty `forms` mapping contributes no leaves.
    pub fn leaf_count(&self) -> usize {
        match &self.forms {
            Some(children) => children.values().map(Form::leaf_count).sum(),
            None => 1,
        }
    }
}

/// A named, typed operand slot.
#[derive(Debug, Clone, Deserialize)]
pub struct Operand {
    pub name: String,
    pub role: String,
    /// Must be a key of the spec's `operand_width_bits`.
    pub kind: String,
    /// Names of global operand flags attached to this slot.
    #[serde(default)]
    pub oprnd_flag: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonc::parse_document;

    fn sample_spec() -> Spec {
        let src = r#"{
            // minimal two-instruction set
            "gpidl_version": "1.0",
            "operand_width_bits": { "reg": 8, "imm16": 16 },
            "canonical_roles": ["dst", "src"],
            "global_oprnd_flag_defs": {
                "neg": { "enum": ["off", "on"] }
            },
            "global_modifier_defs": {
                "rnd": { "enum": ["rn", "rz", "rm", "rp"], "default": "rn" },
                "sat": { "bits": 1, "enum": { "off": 0, "on": 1 } }
            },
            "instructions": {
                "FADD": {
                    "inst_modifiers": ["rnd"],
                    "forms": {
                        "r_r": {
                            "operands": [
                                { "name": "d", "role": "dst", "kind": "reg" },
                                { "name": "a", "role": "src", "kind": "reg", "oprnd_flag": ["neg"] }
                            ]
                        },
                        "r_i": {
                            "operands": [
                                { "name": "d", "role": "dst", "kind": "reg" },
                                { "name": "a", "role": "src", "kind": "imm16" }
                            ],
                            "forms": {
                                "lo": {},
                                "hi": {}
                            }
                        }
                    }
                },
                "FMUL": {
                    "forms": { "only": {} }
                }
            }
        }"#;
        let doc = parse_document(src).expect("sample parses");
        Spec::from_value(&doc).expect("sample deserializes")
    }

    #[test]
    fn preserves_instruction_order() {
        let spec = sample_spec();
        let names: Vec<&String> = spec.instructions.keys().collect();
        assert_eq!(names, ["FADD", "FMUL"]);
    }

    #[test]
    fn modifier_widths() {
        let spec = sample_spec();
        assert_eq!(spec.global_modifier_defs["rnd"].width_bits(), 2);
        assert_eq!(spec.global_modifier_defs["sat"].width_bits(), 1);
        assert_eq!(spec.global_oprnd_flag_defs["neg"].width_bits(), 1);
    }

    #[test]
    fn coded_enum_width_follows_max_code() {
        let def: ModifierDef = serde_json::from_value(serde_json::json!({
            "enum": { "a": 0, "b": 5 }
        }))
        .unwrap();
        assert_eq!(def.width_bits(), 3);
    }

    #[test]
    fn coded_enum_width_handles_the_largest_code() {
        let def: ModifierDef = serde_json::from_value(serde_json::json!({
            "enum": { "a": 0, "b": u64::MAX }
        }))
        .unwrap();
        assert_eq!(def.width_bits(), 64);
    }

    #[test]
    fn explicit_bits_override_enum_width() {
        let def: ModifierDef = serde_json::from_value(serde_json::json!({
            "bits": 4,
            "enum": ["x", "y"]
        }))
        .unwrap();
        assert_eq!(def.width_bits(), 4);
    }

    #[test]
    fn leaf_counting_flattens_nested_forms() {
        let spec = sample_spec();
        assert_eq!(spec.instructions["FADD"].leaf_count(), 3);
        assert_eq!(spec.instructions["FMUL"].leaf_count(), 1);
    }

    #[test]
    fn enum_labels_iterate_in_order() {
        let spec = sample_spec();
        let labels: Vec<&str> = spec.global_modifier_defs["rnd"].enum_def.labels().collect();
        assert_eq!(labels, ["rn", "rz", "rm", "rp"]);
        assert!(spec.global_modifier_defs["sat"].has_label("off"));
        assert!(!spec.global_modifier_defs["sat"].has_label("rn"));
    }
}
