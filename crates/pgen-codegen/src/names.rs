//! Name Manager: one legal, unique Rust identifier per declaration.
//!
//! Names are memoized per [`DeclId`] for the lifetime of one job. Every
//! identifier handed out (declaration names, derived names such as the
//! `FooState` enum, and temporaries) goes through one "used" set, so no two
//! of them are ever equal. Reserved words and the generated scaffold's own
//! names are never handed out.

use std::collections::{HashMap, HashSet};

use pgen_types::ast::DeclId;

use crate::runtime::TEMP_PREFIX;

/// Rust strict, reserved and weak keywords.
const RUST_KEYWORDS: &[&str] = &[
    "Self", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
    "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Names the generated file defines or imports itself.
const SCAFFOLD_NAMES: &[&str] = &[
    "MD", "M", "MP", "PV", "EV", "PStateMachine", "Clonable", "HashMap", "mpsc", "thread",
    "Box", "Option", "Some", "None", "String", "Vec", "ProtocolEvent", "ProtocolEventName",
    "MonitorTemperature", "DefaultEvent", "PHalt", "create_new_machine", "global_functions",
    "common_data", "goto_payload", "current_machine", "current_state", "default_function",
    "exit_current_state", "take_entry_event", "observe", "observes", "temperature", "is_hot",
    "new", "default", "send_event", "create_machine", "add_to_config", "answer_requests",
    "name", "index", "execute", "print", "update_id", "event", "e", "entry_event", "main",
    "link_map", "interface_definitions", "monitor_observes", "monitor_map", "start", "MAIN",
    "tx_machine_to_config", "rx_config_to_machine", "arg", "args", "self_id",
];

/// Prelude and primitive names the generated code refers to unqualified.
const PRELUDE_NAMES: &[&str] = &[
    "std", "core", "Ok", "Err", "Result", "Clone", "Copy", "Debug", "Default", "PartialEq",
    "Eq", "Hash", "Iterator", "Send", "Sync", "Sized", "Drop", "From", "Into", "ToString",
    "bool", "char", "str", "i32", "i64", "u32", "usize", "f64",
];

/// Assigns and caches identifiers for one compilation job.
#[derive(Debug, Default)]
pub struct NameManager {
    decl_names: HashMap<DeclId, String>,
    derived_names: HashMap<(DeclId, String), String>,
    used: HashSet<String>,
    temp_counter: u32,
}

impl NameManager {
    pub fn new() -> Self {
        let mut nm = Self::default();
        for word in RUST_KEYWORDS.iter().chain(SCAFFOLD_NAMES).chain(PRELUDE_NAMES) {
            nm.used.insert((*word).to_string());
        }
        nm
    }

    /// Bind `id` to an exact, pre-reserved name (the built-in events).
    pub fn pin(&mut self, id: DeclId, name: &str) {
        self.used.insert(name.to_string());
        self.decl_names.insert(id, name.to_string());
    }

    /// The identifier for `id`, assigning one from `source_name` on first use.
    pub fn name_for(&mut self, id: DeclId, source_name: &str) -> String {
        if let Some(name) = self.decl_names.get(&id) {
            return name.clone();
        }
        let name = self.claim(&sanitize(source_name));
        self.decl_names.insert(id, name.clone());
        name
    }

    /// The identifier already assigned to `id`, if any.
    pub fn lookup(&self, id: DeclId) -> Option<&str> {
        self.decl_names.get(&id).map(String::as_str)
    }

    /// A second identifier belonging to `id`, shaped `{prefix}{base}{suffix}`
    /// where `base` is the declaration's own name.
    pub fn derived(&mut self, id: DeclId, base: &str, prefix: &str, suffix: &str) -> String {
        let key = (id, format!("{prefix}\u{0}{suffix}"));
        if let Some(name) = self.derived_names.get(&key) {
            return name.clone();
        }
        let name = self.claim(&format!("{prefix}{base}{suffix}"));
        self.derived_names.insert(key, name.clone());
        name
    }

    /// A fresh identifier for a compiler-introduced local.
    pub fn fresh_temp(&mut self, hint: &str) -> String {
        loop {
            let candidate = format!("{TEMP_PREFIX}{}_{}", sanitize(hint), self.temp_counter);
            self.temp_counter += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn claim(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Turn an arbitrary source name into a Rust identifier (uniqueness aside).
pub fn sanitize(source: &str) -> String {
    let mut out: String = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out == "_" {
        out = "anon".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    // Keep the temporary namespace for fresh_temp.
    if out.starts_with(TEMP_PREFIX) {
        out.insert_str(0, "u_");
    }
    out
}

/// The Rust identifier reserved words.
pub fn is_reserved(name: &str) -> bool {
    RUST_KEYWORDS.contains(&name) || SCAFFOLD_NAMES.contains(&name)
}
