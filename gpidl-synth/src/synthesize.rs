//! The synthesis pass
//!
//! Two phases. Phase one scans the whole instruction set for the numbers
//! every leaf layout depends on: the instruction-index width and, per
//! form-tree depth, the widest branching factor. Phase two walks each
//! instruction's form tree depth-first, accumulating operands and modifier
//! names down the path, and lays out one LSB-first range list per leaf.
//!
//! Field order within a leaf: instruction-index constant, one form-selector
//! constant per non-zero-width depth (the chosen child index, or 0 past the
//! leaf's own depth), operands in accumulation order, operand flags
//! operand-major, modifiers in accumulation order, reserved padding to the
//! instruction width. A node's `fixed_modifiers` join the accumulated list
//! ahead of each child's own `inst_modifiers`; their fields stay ordinary
//! `modifier` ranges since the commitment pins values, not layout.

use crate::error::SynthError;
use crate::table::{
    Encoding, EncodingRange, EncodingTable, Meta, Statistics, INSTRUCTION_WIDTH_BITS,
};
use gpidl_parser::bits::bits_needed;
use gpidl_parser::spec::{Form, Instruction, ModifierDef, Operand, Spec};
use indexmap::IndexMap;

/// Synthesize the encoding table for a validated spec.
///
/// Deterministic in the spec's declaration order. Any error aborts the run.
pub fn synthesize(spec: &Spec) -> Result<EncodingTable, SynthError> {
    let form_level_counts = collect_form_counts(&spec.instructions);
    let form_level_bits: Vec<u32> = form_level_counts.iter().map(|&n| bits_needed(n)).collect();
    let instruction_bits = bits_needed(spec.instructions.len());

    let statistics = Statistics {
        instruction_count: spec.instructions.len(),
        instruction_bits,
        form_level_counts,
        form_level_bits: form_level_bits.clone(),
    };

    let mut synth = Synthesizer {
        spec,
        instruction_bits,
        form_level_bits,
        encodings: IndexMap::new(),
    };

    let global = ModifierScope {
        defs: &spec.global_modifier_defs,
        parent: None,
    };
    for (inst_idx, (inst_name, inst)) in spec.instructions.iter().enumerate() {
        let scope = ModifierScope {
            defs: &inst.local_modifier_defs,
            parent: Some(&global),
        };
        let mut state = WalkState {
            path: Vec::new(),
            indices: Vec::new(),
            operands: Vec::new(),
            modifiers: inst.inst_modifiers.iter().map(String::as_str).collect(),
        };
        synth.walk(
            inst_name,
            inst_idx,
            &inst.forms,
            &mut state,
            &scope,
            &inst.fixed_modifiers,
        )?;
    }

    Ok(EncodingTable {
        meta: Meta {
            encoding_version: 1,
            statistics,
        },
        encodings: synth.encodings,
    })
}

/// Maximum number of sibling forms at each depth, over all instructions.
/// Depth 0 is the instruction-level `forms` mapping.
fn collect_form_counts(instructions: &IndexMap<String, Instruction>) -> Vec<usize> {
    let mut counts = Vec::new();
    for inst in instructions.values() {
        bump_count(&mut counts, 0, inst.forms.len());
        for form in inst.forms.values() {
            collect_form_counts_rec(form, 1, &mut counts);
        }
    }
    counts
}

fn collect_form_counts_rec(form: &Form, depth: usize, counts: &mut Vec<usize>) {
    let Some(children) = &form.forms else {
        return;
    };
    if children.is_empty() {
        return;
    }
    bump_count(counts, depth, children.len());
    for child in children.values() {
        collect_form_counts_rec(child, depth + 1, counts);
    }
}

fn bump_count(counts: &mut Vec<usize>, depth: usize, count: usize) {
    if counts.len() <= depth {
        counts.resize(depth + 1, 0);
    }
    counts[depth] = counts[depth].max(count);
}

/// Immutable modifier-definition scope chain; inner definitions shadow.
struct ModifierScope<'a> {
    defs: &'a IndexMap<String, ModifierDef>,
    parent: Option<&'a ModifierScope<'a>>,
}

impl<'a> ModifierScope<'a> {
    fn lookup(&self, name: &str) -> Option<&'a ModifierDef> {
        match self.defs.get(name) {
            Some(def) => Some(def),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }
}

/// Accumulated per-path state; entries are pushed descending into a form
/// and popped on the way back out.
struct WalkState<'a> {
    path: Vec<&'a str>,
    indices: Vec<usize>,
    operands: Vec<&'a Operand>,
    modifiers: Vec<&'a str>,
}

struct Synthesizer<'a> {
    spec: &'a Spec,
    instruction_bits: u32,
    form_level_bits: Vec<u32>,
    encodings: IndexMap<String, Encoding>,
}

impl<'a> Synthesizer<'a> {
    fn walk<'s>(
        &mut self,
        inst_name: &str,
        inst_idx: usize,
        forms: &'a IndexMap<String, Form>,
        state: &mut WalkState<'a>,
        scope: &'s ModifierScope<'s>,
        parent_fixed: &'a [String],
    ) -> Result<(), SynthError> {
        for (idx, (form_key, form)) in forms.iter().enumerate() {
            state.path.push(form_key);
            state.indices.push(idx);
            let operands_mark = state.operands.len();
            let modifiers_mark = state.modifiers.len();
            state.operands.extend(form.operands.iter());
            state
                .modifiers
                .extend(parent_fixed.iter().map(String::as_str));
            state
                .modifiers
                .extend(form.inst_modifiers.iter().map(String::as_str));

            let local = ModifierScope {
                defs: &form.local_modifier_defs,
                parent: Some(scope),
            };
            let scope_here: &ModifierScope = if form.local_modifier_defs.is_empty() {
                scope
            } else {
                &local
            };

            match &form.forms {
                Some(children) => {
                    self.walk(
                        inst_name,
                        inst_idx,
                        children,
                        state,
                        scope_here,
                        &form.fixed_modifiers,
                    )?;
                }
                None => {
                    let leaf_key = format!("{inst_name}.{}", state.path.join("."));
                    let ranges = self.build_ranges(
                        &leaf_key,
                        inst_idx,
                        &state.indices,
                        &state.operands,
                        &state.modifiers,
                        scope_here,
                    )?;
                    let encoding = Encoding {
                        instruction: inst_name.to_string(),
                        form_path: state.path.iter().map(|k| k.to_string()).collect(),
                        ranges,
                    };
                    self.encodings.insert(leaf_key, encoding);
                }
            }

            state.path.pop();
            state.indices.pop();
            state.operands.truncate(operands_mark);
            state.modifiers.truncate(modifiers_mark);
        }
        Ok(())
    }

    fn build_ranges(
        &self,
        leaf: &str,
        inst_idx: usize,
        form_indices: &[usize],
        operands: &[&Operand],
        modifiers: &[&str],
        scope: &ModifierScope<'_>,
    ) -> Result<Vec<EncodingRange>, SynthError> {
        let mut ranges = Vec::new();
        // Wider than the instruction word: pathological operand widths must
        // reach the overflow check below instead of wrapping.
        let mut cursor = 0u64;

        push_range(&mut ranges, &mut cursor, self.instruction_bits, |start, length| {
            EncodingRange::Constant {
                start,
                length,
                constant: inst_idx as u64,
            }
        });

        for (depth, &bits) in self.form_level_bits.iter().enumerate() {
            if bits == 0 {
                continue;
            }
            let value = form_indices.get(depth).copied().unwrap_or(0) as u64;
            push_range(&mut ranges, &mut cursor, bits, |start, length| {
                EncodingRange::Constant {
                    start,
                    length,
                    constant: value,
                }
            });
        }

        for operand in operands {
            let width = self
                .spec
                .operand_width_bits
                .get(&operand.kind)
                .copied()
                .ok_or_else(|| SynthError::UnknownKind {
                    leaf: leaf.to_string(),
                    kind: operand.kind.clone(),
                })?;
            push_range(&mut ranges, &mut cursor, width, |start, length| {
                EncodingRange::Operand {
                    start,
                    length,
                    name: operand.name.clone(),
                }
            });
        }

        for operand in operands {
            for flag in &operand.oprnd_flag {
                let def = self
                    .spec
                    .global_oprnd_flag_defs
                    .get(flag)
                    .ok_or_else(|| SynthError::UnknownFlag {
                        leaf: leaf.to_string(),
                        name: flag.clone(),
                    })?;
                push_range(&mut ranges, &mut cursor, def.width_bits(), |start, length| {
                    EncodingRange::OprndFlag {
                        start,
                        length,
                        name: flag.clone(),
                        oprnd_idx: operand.name.clone(),
                    }
                });
            }
        }

        for &name in modifiers {
            let def = scope.lookup(name).ok_or_else(|| SynthError::UnknownModifier {
                leaf: leaf.to_string(),
                name: name.to_string(),
            })?;
            push_range(&mut ranges, &mut cursor, def.width_bits(), |start, length| {
                EncodingRange::Modifier {
                    start,
                    length,
                    name: name.to_string(),
                }
            });
        }

        if cursor > u64::from(INSTRUCTION_WIDTH_BITS) {
            return Err(SynthError::Overflow {
                leaf: leaf.to_string(),
                bits: cursor,
            });
        }
        let remaining = (u64::from(INSTRUCTION_WIDTH_BITS) - cursor) as u32;
        push_range(&mut ranges, &mut cursor, remaining, |start, length| {
            EncodingRange::Reserved { start, length }
        });

        Ok(ranges)
    }
}

/// Append a range at the cursor and advance it. Zero-width fields vanish.
/// Starts past `u32::MAX` truncate; the caller discards any range list whose
/// cursor exceeds the instruction width before the table is kept.
fn push_range(
    ranges: &mut Vec<EncodingRange>,
    cursor: &mut u64,
    length: u32,
    make: impl FnOnce(u32, u32) -> EncodingRange,
) {
    if length == 0 {
        return;
    }
    ranges.push(make(*cursor as u32, length));
    *cursor += u64::from(length);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpidl_parser::jsonc::parse_document;

    fn table(src: &str) -> EncodingTable {
        let doc = parse_document(src).expect("sample parses");
        let spec = Spec::from_value(&doc).expect("sample deserializes");
        synthesize(&spec).expect("sample synthesizes")
    }

    fn sample() -> &'static str {
        r#"{
            "gpidl_version": "1.0",
            "operand_width_bits": { "reg": 8, "imm16": 16 },
            "canonical_roles": ["dst", "src"],
            "global_oprnd_flag_defs": {
                "neg": { "enum": ["off", "on"] }
            },
            "global_modifier_defs": {
                "rnd": { "enum": ["rn", "rz", "rm", "rp"] }
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
                            "forms": { "lo": {}, "hi": {} }
                        }
                    }
                },
                "FMUL": {
                    "forms": { "only": {} }
                }
            }
        }"#
    }

    #[test]
    fn statistics_cover_the_whole_instruction_set() {
        let table = table(sample());
        let stats = &table.meta.statistics;
        assert_eq!(table.meta.encoding_version, 1);
        assert_eq!(stats.instruction_count, 2);
        assert_eq!(stats.instruction_bits, 1);
        assert_eq!(stats.form_level_counts, vec![2, 2]);
        assert_eq!(stats.form_level_bits, vec![1, 1]);
    }

    #[test]
    fn leaf_layout_follows_the_field_order() {
        let table = table(sample());
        let enc = &table.encodings["FADD.r_r"];
        assert_eq!(enc.instruction, "FADD");
        assert_eq!(enc.form_path, vec!["r_r"]);
        assert_eq!(
            enc.ranges,
            vec![
                EncodingRange::Constant { start: 0, length: 1, constant: 0 },
                EncodingRange::Constant { start: 1, length: 1, constant: 0 },
                // depth 1 selector: past the leaf's depth, value 0
                EncodingRange::Constant { start: 2, length: 1, constant: 0 },
                EncodingRange::Operand { start: 3, length: 8, name: "d".to_string() },
                EncodingRange::Operand { start: 11, length: 8, name: "a".to_string() },
                EncodingRange::OprndFlag {
                    start: 19,
                    length: 1,
                    name: "neg".to_string(),
                    oprnd_idx: "a".to_string(),
                },
                EncodingRange::Modifier { start: 20, length: 2, name: "rnd".to_string() },
                EncodingRange::Reserved { start: 22, length: 106 },
            ]
        );
    }

    #[test]
    fn nested_leaves_carry_their_selector_indices() {
        let table = table(sample());
        let enc = &table.encodings["FADD.r_i.hi"];
        assert_eq!(enc.form_path, vec!["r_i", "hi"]);
        // instruction 0, depth-0 selector 1 (r_i), depth-1 selector 1 (hi)
        assert_eq!(enc.ranges[0].constant(), Some(0));
        assert_eq!(enc.ranges[1].constant(), Some(1));
        assert_eq!(enc.ranges[2].constant(), Some(1));
    }

    #[test]
    fn every_layout_tiles_the_instruction_width() {
        let table = table(sample());
        assert_eq!(table.encodings.len(), 4);
        for (key, enc) in &table.encodings {
            let mut cursor = 0;
            for range in &enc.ranges {
                assert_eq!(range.start(), cursor, "gap in {key}");
                assert!(range.length() > 0, "zero-width range in {key}");
                cursor = range.end();
            }
            assert_eq!(cursor, INSTRUCTION_WIDTH_BITS, "short layout in {key}");
        }
    }

    #[test]
    fn selector_layout_is_shared_across_instructions() {
        let table = table(sample());
        let wide = &table.encodings["FADD.r_i.lo"];
        let narrow = &table.encodings["FMUL.only"];
        // FMUL has a single shallow form, yet its layout still spends the
        // set-wide selector bits, with zeros past its depth.
        assert_eq!(narrow.ranges[0].constant(), Some(1));
        assert_eq!(narrow.ranges[1].constant(), Some(0));
        assert_eq!(narrow.ranges[2].constant(), Some(0));
        assert_eq!(wide.ranges[2].start(), narrow.ranges[2].start());
    }

    #[test]
    fn fixed_modifiers_precede_the_childs_own() {
        let table = table(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": {},
                "canonical_roles": [],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {
                    "rnd": { "enum": ["rn", "rz"] },
                    "sat": { "enum": ["off", "on"] },
                    "ftz": { "enum": ["off", "on"] }
                },
                "instructions": {
                    "FADD": {
                        "inst_modifiers": ["ftz"],
                        "fixed_modifiers": ["sat"],
                        "forms": {
                            "a": {
                                "fixed_modi_vals": { "sat": "off" },
                                "inst_modifiers": ["rnd"]
                            }
                        }
                    }
                }
            }"#,
        );
        let names: Vec<&str> = table.encodings["FADD.a"]
            .ranges
            .iter()
            .filter(|r| r.type_name() == "modifier")
            .map(|r| r.name().unwrap())
            .collect();
        assert_eq!(names, ["ftz", "sat", "rnd"]);
    }

    #[test]
    fn form_local_defs_shadow_outer_definitions() {
        let table = table(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": {},
                "canonical_roles": [],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {
                    "mode": { "enum": ["a", "b"] }
                },
                "instructions": {
                    "LD": {
                        "forms": {
                            "wide": {
                                "local_modifier_defs": {
                                    "mode": { "enum": ["a", "b", "c", "d", "e"] }
                                },
                                "forms": {
                                    "x": { "inst_modifiers": ["mode"] }
                                }
                            }
                        }
                    }
                }
            }"#,
        );
        let enc = &table.encodings["LD.wide.x"];
        let mode = enc
            .ranges
            .iter()
            .find(|r| r.name() == Some("mode"))
            .unwrap();
        assert_eq!(mode.length(), 3);
    }

    #[test]
    fn unknown_kind_aborts_with_the_leaf_key() {
        let doc = parse_document(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": { "reg": 8 },
                "canonical_roles": ["dst"],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {},
                "instructions": {
                    "LD": {
                        "forms": {
                            "m": { "operands": [ { "name": "d", "role": "dst", "kind": "mem" } ] }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let spec = Spec::from_value(&doc).unwrap();
        let err = synthesize(&spec).unwrap_err();
        assert_eq!(
            err,
            SynthError::UnknownKind {
                leaf: "LD.m".to_string(),
                kind: "mem".to_string(),
            }
        );
    }

    #[test]
    fn oversized_layout_aborts_with_the_bit_count() {
        let doc = parse_document(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": { "huge": 200 },
                "canonical_roles": ["dst"],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {},
                "instructions": {
                    "LD": {
                        "forms": {
                            "m": { "operands": [ { "name": "d", "role": "dst", "kind": "huge" } ] }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let spec = Spec::from_value(&doc).unwrap();
        let err = synthesize(&spec).unwrap_err();
        assert_eq!(
            err,
            SynthError::Overflow {
                leaf: "LD.m".to_string(),
                bits: 200,
            }
        );
    }

    #[test]
    fn huge_operand_widths_do_not_wrap_the_cursor() {
        // Widths summing to 2^32 + 64 must report the true bit count, not a
        // wrapped cursor that would slip under the width check.
        let doc = parse_document(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": { "big": 2147483648, "pad": 64 },
                "canonical_roles": ["dst", "src"],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {},
                "instructions": {
                    "WIDE": {
                        "forms": {
                            "w": {
                                "operands": [
                                    { "name": "a", "role": "dst", "kind": "big" },
                                    { "name": "b", "role": "src", "kind": "big" },
                                    { "name": "c", "role": "src", "kind": "pad" }
                                ]
                            }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let spec = Spec::from_value(&doc).unwrap();
        let err = synthesize(&spec).unwrap_err();
        assert_eq!(
            err,
            SynthError::Overflow {
                leaf: "WIDE.w".to_string(),
                bits: 4_294_967_360,
            }
        );
    }

    #[test]
    fn rerunning_yields_identical_json() {
        let doc = parse_document(sample()).unwrap();
        let spec = Spec::from_value(&doc).unwrap();
        let first = serde_json::to_string(&synthesize(&spec).unwrap()).unwrap();
        let second = serde_json::to_string(&synthesize(&spec).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn minimal_table_shape() {
        let table = table(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": {},
                "canonical_roles": [],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {},
                "instructions": {
                    "NOP": { "forms": { "only": {} } }
                }
            }"#,
        );
        insta::assert_snapshot!(serde_json::to_string_pretty(&table).unwrap(), @r#"
        {
          "meta": {
            "encoding_version": 1,
            "statistics": {
              "instruction_count": 1,
              "instruction_bits": 0,
              "form_level_counts": [
                1
              ],
              "form_level_bits": [
                0
              ]
            }
          },
          "encodings": {
            "NOP.only": {
              "instruction": "NOP",
              "form_path": [
                "only"
              ],
              "ranges": [
                {
                  "type": "reserved",
                  "start": 0,
                  "length": 128
                }
              ]
            }
          }
        }
        "#);
    }

    #[test]
    fn empty_child_forms_produce_no_leaves() {
        let table = table(
            r#"{
                "gpidl_version": "1.0",
                "operand_width_bits": {},
                "canonical_roles": [],
                "global_oprnd_flag_defs": {},
                "global_modifier_defs": {},
                "instructions": {
                    "LD": { "forms": { "stub": { "forms": {} }, "real": {} } }
                }
            }"#,
        );
        let keys: Vec<&String> = table.encodings.keys().collect();
        assert_eq!(keys, ["LD.real"]);
    }
}
