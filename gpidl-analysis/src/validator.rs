//! The GPIDL document validator
//!
//! A single top-down traversal over the raw parsed document. Every check
//! appends to one diagnostic list; nothing aborts early. The scope state
//! needed by nested forms (resolved global definitions, accumulated local
//! modifier definitions, forbidden names, the parent's fixed-modifier
//! requirement, ancestor operand names) travels down the recursion by
//! value, so sibling subtrees cannot observe each other.
//!
//! Scope rules enforced here:
//! - `inst_modifiers` resolve against global definitions plus the local
//!   definitions accumulated along the form chain (an ancestor form's
//!   `local_modifier_defs` are visible to its descendants).
//! - `fixed_modifiers` resolve against global and instruction-level local
//!   definitions only. A fixed modifier defined solely by an intermediate
//!   form is rejected as unknown; the synthesizer may then resolve widths
//!   through the full chain without ambiguity.
//! - `can_apply_to_inst` is accepted in `global_modifier_defs` only.

use crate::diagnostics::{index_path, key_path, Diagnostic};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

type LabelSet = BTreeSet<String>;
type DefMap = BTreeMap<String, LabelSet>;

/// Validate a parsed document against the GPIDL grammar.
///
/// Returns every violation found; an empty list means the document is valid
/// and safe to hand to the synthesizer.
pub fn validate_document(doc: &Value) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.validate_root(doc);
    validator.diagnostics
}

const ROOT_KEYS: [&str; 6] = [
    "gpidl_version",
    "operand_width_bits",
    "canonical_roles",
    "global_oprnd_flag_defs",
    "global_modifier_defs",
    "instructions",
];

/// Global definitions resolved once before the instruction walk.
struct GlobalScope {
    roles: BTreeSet<String>,
    operand_kinds: BTreeSet<String>,
    flag_defs: DefMap,
    modifier_defs: DefMap,
    instruction_names: BTreeSet<String>,
}

/// Scope state threaded through the form recursion.
#[derive(Clone)]
struct FormScope {
    /// Instruction-level local definitions; the only local definitions a
    /// `fixed_modifiers` entry may resolve to.
    instr_defs: DefMap,
    /// All local definitions visible here: instruction-level plus every
    /// ancestor form's, in scope for `inst_modifiers` resolution and
    /// forbidden for redeclaration.
    local_defs: DefMap,
    /// Modifier names already claimed by an ancestor's modifier lists.
    forbidden_modifiers: BTreeSet<String>,
    /// Fixed modifiers the parent declared; each child must commit labels
    /// for exactly these.
    required_fixed: DefMap,
    /// Operand names declared by ancestor forms; redeclaration shadows.
    ancestor_operands: BTreeSet<String>,
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(path, message));
    }

    fn as_object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value.as_object() {
            Some(map) => Some(map),
            None => {
                self.error(path, "expected object");
                None
            }
        }
    }

    fn as_array<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
        match value.as_array() {
            Some(list) => Some(list),
            None => {
                self.error(path, "expected list");
                None
            }
        }
    }

    /// A list of strings, optionally with a uniqueness requirement.
    /// Non-string items are reported and skipped; duplicates are reported
    /// but kept so downstream checks still see them.
    fn string_list(&mut self, value: &Value, path: &str, unique: bool) -> Vec<String> {
        let Some(items) = self.as_array(value, path) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => {
                    if unique && !seen.insert(s.to_string()) {
                        self.error(&index_path(path, idx), format!("duplicate value '{s}'"));
                    }
                    out.push(s.to_string());
                }
                None => self.error(&index_path(path, idx), "expected string"),
            }
        }
        out
    }

    fn string_or_list(&mut self, value: &Value, path: &str) {
        match value {
            Value::String(_) => {}
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.error(&index_path(path, idx), "expected string");
                    }
                }
            }
            _ => self.error(path, "expected string or list of strings"),
        }
    }

    fn semantics(&mut self, value: &Value, path: &str) {
        let Some(map) = self.as_object(value, path) else {
            return;
        };
        for key in map.keys() {
            if !matches!(key.as_str(), "effect" | "mnemonic" | "notes") {
                self.error(&key_path(path, key), "unexpected field");
            }
        }
        if let Some(effect) = map.get("effect") {
            if !effect.is_string() {
                self.error(&key_path(path, "effect"), "expected string");
            }
        }
        if let Some(mnemonic) = map.get("mnemonic") {
            self.string_or_list(mnemonic, &key_path(path, "mnemonic"));
        }
        if let Some(notes) = map.get("notes") {
            let notes_path = key_path(path, "notes");
            if let Some(items) = self.as_array(notes, &notes_path) {
                for (idx, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.error(&index_path(&notes_path, idx), "expected string");
                    }
                }
            }
        }
    }

    /// One modifier definition. Returns its label set when the enum shape is
    /// usable, so referencing checks can proceed despite other findings.
    fn modifier_def(
        &mut self,
        value: &Value,
        path: &str,
        allow_can_apply: bool,
        instruction_names: &BTreeSet<String>,
    ) -> Option<LabelSet> {
        let Some(map) = self.as_object(value, path) else {
            return None;
        };
        for key in map.keys() {
            let known = matches!(key.as_str(), "bits" | "enum" | "default" | "meaning")
                || (allow_can_apply && key == "can_apply_to_inst");
            if !known {
                self.error(&key_path(path, key), "unexpected field");
            }
        }
        if !map.contains_key("enum") {
            self.error(path, "missing required field 'enum'");
            return None;
        }

        // Capped so every accepted width also fits the typed model.
        let bits = match map.get("bits") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_u64() {
                Some(bits) if bits <= u64::from(u32::MAX) => Some(bits),
                Some(_) => {
                    self.error(&key_path(path, "bits"), "bits value out of range");
                    None
                }
                None => {
                    self.error(&key_path(path, "bits"), "expected non-negative integer");
                    None
                }
            },
        };

        let enum_path = key_path(path, "enum");
        let mut labels = LabelSet::new();
        match map.get("enum") {
            Some(Value::Array(items)) => {
                let mut duplicate = false;
                for (idx, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(label) => duplicate |= !labels.insert(label.to_string()),
                        None => self.error(&index_path(&enum_path, idx), "expected string"),
                    }
                }
                if duplicate {
                    self.error(&enum_path, "duplicate enum labels");
                }
                if let Some(bits) = bits {
                    if !fits_in_bits(items.len() as u64, bits) {
                        self.error(&enum_path, "enum size exceeds bits capacity");
                    }
                }
            }
            Some(Value::Object(entries)) => {
                let mut values_seen = BTreeSet::new();
                let mut max_value: Option<u64> = None;
                for (label, code) in entries {
                    match code.as_u64() {
                        Some(code) => {
                            if !values_seen.insert(code) {
                                self.error(&enum_path, format!("duplicate enum value {code}"));
                            }
                            max_value = Some(max_value.map_or(code, |m| m.max(code)));
                            labels.insert(label.clone());
                        }
                        None => self.error(
                            &enum_path,
                            format!("enum value for '{label}' must be non-negative integer"),
                        ),
                    }
                }
                if let (Some(bits), Some(max_value)) = (bits, max_value) {
                    // Compared against the max code itself so a code of
                    // u64::MAX cannot overflow a count computation.
                    if bits < 64 && max_value >> bits != 0 {
                        self.error(&enum_path, "enum values exceed bits capacity");
                    }
                }
            }
            _ => self.error(&enum_path, "expected list or object"),
        }

        if let Some(default) = map.get("default") {
            let default_path = key_path(path, "default");
            match default.as_str() {
                Some(label) => {
                    if !labels.contains(label) {
                        self.error(&default_path, "default not in enum labels");
                    }
                }
                None => self.error(&default_path, "expected string"),
            }
        }
        if let Some(meaning) = map.get("meaning") {
            self.string_or_list(meaning, &key_path(path, "meaning"));
        }
        if allow_can_apply {
            if let Some(can_apply) = map.get("can_apply_to_inst") {
                let can_apply_path = key_path(path, "can_apply_to_inst");
                for name in self.string_list(can_apply, &can_apply_path, false) {
                    if !instruction_names.contains(&name) {
                        self.error(&can_apply_path, format!("unknown instruction '{name}'"));
                    }
                }
            }
        }
        Some(labels)
    }

    /// A mapping of modifier definitions. Names already visible from an
    /// outer scope are collisions.
    fn modifier_defs(
        &mut self,
        value: &Value,
        path: &str,
        allow_can_apply: bool,
        instruction_names: &BTreeSet<String>,
        forbidden_names: &BTreeSet<String>,
    ) -> DefMap {
        let Some(map) = self.as_object(value, path) else {
            return DefMap::new();
        };
        let mut defs = DefMap::new();
        for (name, entry) in map {
            let entry_path = key_path(path, name);
            if forbidden_names.contains(name) {
                self.error(
                    &entry_path,
                    format!("modifier '{name}' conflicts with outer scope"),
                );
            }
            if let Some(labels) =
                self.modifier_def(entry, &entry_path, allow_can_apply, instruction_names)
            {
                defs.insert(name.clone(), labels);
            }
        }
        defs
    }

    /// Operand list of one form. Returns the names declared here so the
    /// caller can extend the ancestor set for nested forms.
    fn operands(
        &mut self,
        value: &Value,
        path: &str,
        global: &GlobalScope,
        ancestor_names: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let Some(items) = self.as_array(value, path) else {
            return BTreeSet::new();
        };
        let mut names = BTreeSet::new();
        for (idx, operand) in items.iter().enumerate() {
            let operand_path = index_path(path, idx);
            let Some(map) = self.as_object(operand, &operand_path) else {
                continue;
            };
            for key in map.keys() {
                if !matches!(key.as_str(), "name" | "role" | "kind" | "oprnd_flag") {
                    self.error(&key_path(&operand_path, key), "unexpected field");
                }
            }
            for required in ["name", "role", "kind"] {
                if !map.contains_key(required) {
                    self.error(
                        &operand_path,
                        format!("missing required field '{required}'"),
                    );
                }
            }
            if let Some(name) = map.get("name") {
                let name_path = key_path(&operand_path, "name");
                match name.as_str() {
                    Some(name) => {
                        if names.contains(name) {
                            self.error(&name_path, format!("duplicate operand name '{name}'"));
                        }
                        if ancestor_names.contains(name) {
                            self.error(
                                &name_path,
                                format!("name '{name}' shadows ancestor operand"),
                            );
                        }
                        names.insert(name.to_string());
                    }
                    None => self.error(&name_path, "expected string"),
                }
            }
            if let Some(role) = map.get("role") {
                let role_path = key_path(&operand_path, "role");
                match role.as_str() {
                    Some(role) => {
                        if !global.roles.contains(role) {
                            self.error(&role_path, format!("unknown role '{role}'"));
                        }
                    }
                    None => self.error(&role_path, "expected string"),
                }
            }
            if let Some(kind) = map.get("kind") {
                let kind_path = key_path(&operand_path, "kind");
                match kind.as_str() {
                    Some(kind) => {
                        if !global.operand_kinds.contains(kind) {
                            self.error(&kind_path, format!("unknown kind '{kind}'"));
                        }
                    }
                    None => self.error(&kind_path, "expected string"),
                }
            }
            if let Some(flags) = map.get("oprnd_flag") {
                let flags_path = key_path(&operand_path, "oprnd_flag");
                if let Some(flags) = self.as_array(flags, &flags_path) {
                    for (fidx, flag) in flags.iter().enumerate() {
                        match flag.as_str() {
                            Some(flag) => {
                                if !global.flag_defs.contains_key(flag) {
                                    self.error(
                                        &index_path(&flags_path, fidx),
                                        format!("unknown operand flag '{flag}'"),
                                    );
                                }
                            }
                            None => self.error(&index_path(&flags_path, fidx), "expected string"),
                        }
                    }
                }
            }
        }
        names
    }

    /// The committed labels a child supplies for its parent's fixed
    /// modifiers. The key set must match the requirement exactly.
    fn fixed_modi_vals(&mut self, value: &Value, path: &str, required: &DefMap) {
        let Some(map) = self.as_object(value, path) else {
            return;
        };
        let actual: BTreeSet<&String> = map.keys().collect();
        let expected: BTreeSet<&String> = required.keys().collect();
        if actual != expected {
            self.error(path, "keys must match fixed_modifiers exactly");
        }
        for (name, label) in map {
            let Some(labels) = required.get(name) else {
                continue;
            };
            let label_path = key_path(path, name);
            match label.as_str() {
                Some(label) => {
                    if !labels.contains(label) {
                        self.error(&label_path, format!("invalid enum label '{label}'"));
                    }
                }
                None => self.error(&label_path, "expected string enum label"),
            }
        }
    }

    /// Shared handling of `inst_modifiers` and `fixed_modifiers` lists at
    /// one node: uniqueness, disjointness, ancestor claims, resolution.
    /// Returns (inst set, fixed set).
    fn modifier_lists(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        forbidden: &BTreeSet<String>,
        inst_visible: impl Fn(&str) -> bool,
        fixed_visible: impl Fn(&str) -> bool,
    ) -> (BTreeSet<String>, BTreeSet<String>) {
        let inst_mods = match map.get("inst_modifiers") {
            Some(value) => self.string_list(value, &key_path(path, "inst_modifiers"), true),
            None => Vec::new(),
        };
        let fixed_mods = match map.get("fixed_modifiers") {
            Some(value) => self.string_list(value, &key_path(path, "fixed_modifiers"), true),
            None => Vec::new(),
        };
        let inst_set: BTreeSet<String> = inst_mods.iter().cloned().collect();
        let fixed_set: BTreeSet<String> = fixed_mods.iter().cloned().collect();
        let overlap: Vec<&str> = inst_set
            .intersection(&fixed_set)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            self.error(
                path,
                format!(
                    "inst_modifiers and fixed_modifiers overlap: [{}]",
                    overlap.join(", ")
                ),
            );
        }
        for name in &inst_mods {
            let list_path = key_path(path, "inst_modifiers");
            if forbidden.contains(name) {
                self.error(&list_path, format!("modifier '{name}' is forbidden by parent"));
            }
            if !inst_visible(name) {
                self.error(&list_path, format!("unknown modifier '{name}'"));
            }
        }
        for name in &fixed_mods {
            let list_path = key_path(path, "fixed_modifiers");
            if forbidden.contains(name) {
                self.error(&list_path, format!("modifier '{name}' is forbidden by parent"));
            }
            if !fixed_visible(name) {
                self.error(&list_path, format!("unknown modifier '{name}'"));
            }
        }
        (inst_set, fixed_set)
    }

    /// Resolve a fixed-modifier requirement for the children of a node that
    /// declared `fixed_modifiers`. Unresolvable names were already reported.
    fn resolve_fixed(
        fixed: &BTreeSet<String>,
        instr_defs: &DefMap,
        global: &GlobalScope,
    ) -> DefMap {
        let mut required = DefMap::new();
        for name in fixed {
            let resolved = instr_defs
                .get(name)
                .or_else(|| global.modifier_defs.get(name));
            if let Some(labels) = resolved {
                required.insert(name.clone(), labels.clone());
            }
        }
        required
    }

    fn forms(&mut self, value: &Value, path: &str, global: &GlobalScope, scope: &FormScope) {
        let Some(forms) = self.as_object(value, path) else {
            return;
        };
        for (form_key, form) in forms {
            let form_path = key_path(path, form_key);
            let Some(map) = self.as_object(form, &form_path) else {
                continue;
            };
            for key in map.keys() {
                let known = matches!(
                    key.as_str(),
                    "semantics"
                        | "fixed_modi_vals"
                        | "local_modifier_defs"
                        | "inst_modifiers"
                        | "fixed_modifiers"
                        | "operands"
                        | "forms"
                );
                if !known {
                    self.error(&key_path(&form_path, key), "unexpected field");
                }
            }
            if let Some(semantics) = map.get("semantics") {
                self.semantics(semantics, &key_path(&form_path, "semantics"));
            }

            let mut node_local_defs = DefMap::new();
            if let Some(local_defs) = map.get("local_modifier_defs") {
                let mut forbidden: BTreeSet<String> =
                    global.modifier_defs.keys().cloned().collect();
                forbidden.extend(scope.local_defs.keys().cloned());
                node_local_defs = self.modifier_defs(
                    local_defs,
                    &key_path(&form_path, "local_modifier_defs"),
                    false,
                    &global.instruction_names,
                    &forbidden,
                );
            }

            let (inst_set, fixed_set) = self.modifier_lists(
                map,
                &form_path,
                &scope.forbidden_modifiers,
                |name| {
                    global.modifier_defs.contains_key(name)
                        || scope.local_defs.contains_key(name)
                        || node_local_defs.contains_key(name)
                },
                |name| {
                    global.modifier_defs.contains_key(name)
                        || scope.instr_defs.contains_key(name)
                },
            );

            if !fixed_set.is_empty() && !map.contains_key("forms") {
                self.error(&form_path, "fixed_modifiers requires child forms object");
            }

            if scope.required_fixed.is_empty() {
                if map.contains_key("fixed_modi_vals") {
                    self.error(
                        &form_path,
                        "fixed_modi_vals present without fixed_modifiers in parent",
                    );
                }
            } else {
                match map.get("fixed_modi_vals") {
                    Some(vals) => self.fixed_modi_vals(
                        vals,
                        &key_path(&form_path, "fixed_modi_vals"),
                        &scope.required_fixed,
                    ),
                    None => self.error(&form_path, "missing required field 'fixed_modi_vals'"),
                }
            }

            let mut current_operands = BTreeSet::new();
            if let Some(operands) = map.get("operands") {
                current_operands = self.operands(
                    operands,
                    &key_path(&form_path, "operands"),
                    global,
                    &scope.ancestor_operands,
                );
            }

            if let Some(children) = map.get("forms") {
                let mut child_scope = scope.clone();
                child_scope.local_defs.extend(node_local_defs);
                child_scope.forbidden_modifiers.extend(inst_set);
                child_scope
                    .forbidden_modifiers
                    .extend(fixed_set.iter().cloned());
                child_scope.required_fixed =
                    Self::resolve_fixed(&fixed_set, &scope.instr_defs, global);
                child_scope.ancestor_operands.extend(current_operands);
                self.forms(children, &key_path(&form_path, "forms"), global, &child_scope);
            }
        }
    }

    fn instruction(&mut self, value: &Value, path: &str, global: &GlobalScope) {
        let Some(map) = self.as_object(value, path) else {
            return;
        };
        for key in map.keys() {
            let known = matches!(
                key.as_str(),
                "semantics" | "local_modifier_defs" | "inst_modifiers" | "fixed_modifiers" | "forms"
            );
            if !known {
                self.error(&key_path(path, key), "unexpected field");
            }
        }
        if !map.contains_key("forms") {
            self.error(path, "missing required field 'forms'");
        }
        if let Some(semantics) = map.get("semantics") {
            self.semantics(semantics, &key_path(path, "semantics"));
        }

        let mut instr_defs = DefMap::new();
        if let Some(local_defs) = map.get("local_modifier_defs") {
            let forbidden: BTreeSet<String> = global.modifier_defs.keys().cloned().collect();
            instr_defs = self.modifier_defs(
                local_defs,
                &key_path(path, "local_modifier_defs"),
                false,
                &global.instruction_names,
                &forbidden,
            );
        }

        let (inst_set, fixed_set) = self.modifier_lists(
            map,
            path,
            &BTreeSet::new(),
            |name| global.modifier_defs.contains_key(name) || instr_defs.contains_key(name),
            |name| global.modifier_defs.contains_key(name) || instr_defs.contains_key(name),
        );

        if let Some(forms) = map.get("forms") {
            let mut forbidden = BTreeSet::new();
            forbidden.extend(inst_set);
            forbidden.extend(fixed_set.iter().cloned());
            let required_fixed = Self::resolve_fixed(&fixed_set, &instr_defs, global);
            let scope = FormScope {
                local_defs: instr_defs.clone(),
                instr_defs,
                forbidden_modifiers: forbidden,
                required_fixed,
                ancestor_operands: BTreeSet::new(),
            };
            self.forms(forms, &key_path(path, "forms"), global, &scope);
        }
    }

    fn validate_root(&mut self, doc: &Value) {
        let path = "root";
        let Some(map) = self.as_object(doc, path) else {
            return;
        };
        for key in map.keys() {
            if !ROOT_KEYS.contains(&key.as_str()) {
                self.error(&key_path(path, key), "unexpected field");
            }
        }
        for key in ROOT_KEYS {
            if !map.contains_key(key) {
                self.error(path, format!("missing required field '{key}'"));
            }
        }
        if let Some(version) = map.get("gpidl_version") {
            if !version.is_string() {
                self.error(&key_path(path, "gpidl_version"), "expected string");
            }
        }

        // Instruction names are needed before the walk: `can_apply_to_inst`
        // in global definitions references them.
        let instruction_names: BTreeSet<String> = map
            .get("instructions")
            .and_then(Value::as_object)
            .map(|insts| insts.keys().cloned().collect())
            .unwrap_or_default();

        let mut operand_kinds = BTreeSet::new();
        if let Some(widths) = map.get("operand_width_bits") {
            let widths_path = key_path(path, "operand_width_bits");
            if let Some(widths) = self.as_object(widths, &widths_path) {
                for (kind, width) in widths {
                    match width.as_u64() {
                        Some(width) if width <= u64::from(u32::MAX) => {
                            operand_kinds.insert(kind.clone());
                        }
                        Some(_) => {
                            self.error(&key_path(&widths_path, kind), "width value out of range");
                        }
                        None => {
                            self.error(
                                &key_path(&widths_path, kind),
                                "expected non-negative integer",
                            );
                        }
                    }
                }
            }
        }

        let mut roles = BTreeSet::new();
        if let Some(value) = map.get("canonical_roles") {
            roles = self
                .string_list(value, &key_path(path, "canonical_roles"), true)
                .into_iter()
                .collect();
        }

        let empty = BTreeSet::new();
        let flag_defs = match map.get("global_oprnd_flag_defs") {
            Some(value) => self.modifier_defs(
                value,
                &key_path(path, "global_oprnd_flag_defs"),
                false,
                &instruction_names,
                &empty,
            ),
            None => DefMap::new(),
        };
        let modifier_defs = match map.get("global_modifier_defs") {
            Some(value) => self.modifier_defs(
                value,
                &key_path(path, "global_modifier_defs"),
                true,
                &instruction_names,
                &empty,
            ),
            None => DefMap::new(),
        };

        let global = GlobalScope {
            roles,
            operand_kinds,
            flag_defs,
            modifier_defs,
            instruction_names,
        };

        if let Some(instructions) = map.get("instructions") {
            let instructions_path = key_path(path, "instructions");
            if let Some(instructions) = self.as_object(instructions, &instructions_path) {
                for (name, instruction) in instructions {
                    self.instruction(instruction, &key_path(&instructions_path, name), &global);
                }
            }
        }
    }
}

/// Whether `count` distinct values fit in a field of `bits` bits.
fn fits_in_bits(count: u64, bits: u64) -> bool {
    if bits >= 64 {
        return true;
    }
    count <= 1u64 << bits
}
