//! Emission context threaded through one generation job.
//!
//! [`EmitContext`] owns everything that lives for exactly one job: the
//! options, the [`NameManager`] and an index from [`DeclId`] to the
//! declaration it names. Nothing here is global, so independent jobs (for
//! instance parallel tests) never observe each other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pgen_types::ast::*;

use crate::error::{CodegenError, CodegenResult};
use crate::names::NameManager;
use crate::runtime::{DEFAULT_EVENT, HALT_EVENT};

// ══════════════════════════════════════════════════════════════════════════════
// Options
// ══════════════════════════════════════════════════════════════════════════════

/// Per-job settings that shape the generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenOptions {
    pub project_name: String,
    #[serde(default)]
    pub project_dependencies: Vec<String>,
    /// Crate whose modules the prologue imports.
    #[serde(default = "default_runtime_crate")]
    pub runtime_crate: String,
    /// Module holding the lowered free functions.
    #[serde(default = "default_global_functions_module")]
    pub global_functions_module: String,
}

fn default_runtime_crate() -> String {
    "amzn_p_rust".to_string()
}

fn default_global_functions_module() -> String {
    "global_functions".to_string()
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self::new("main")
    }
}

impl CodegenOptions {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            project_dependencies: Vec::new(),
            runtime_crate: default_runtime_crate(),
            global_functions_module: default_global_functions_module(),
        }
    }

    /// Dependencies, falling back to the project itself when none are given.
    pub fn dependencies(&self) -> Vec<String> {
        if self.project_dependencies.is_empty() {
            vec![self.project_name.clone()]
        } else {
            self.project_dependencies.clone()
        }
    }

    /// `<project_name>.rs`
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.project_name)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Declaration Index
// ══════════════════════════════════════════════════════════════════════════════

/// What a [`DeclId`] refers to.
#[derive(Debug, Clone, Copy)]
pub enum DeclRef<'a> {
    Event(&'a EventDecl),
    Machine(&'a MachineDecl),
    State {
        machine: &'a MachineDecl,
        state: &'a StateDecl,
    },
    /// A free function, a method or a receive-case handler.
    Function(&'a FunctionDecl),
    Variable(&'a Variable),
    Enum(&'a EnumDecl),
    EnumElem(&'a EnumElemDecl),
    Interface(&'a InterfaceDecl),
    TypeDef(&'a TypeDefDecl),
    Module(&'a ModuleDecl),
}

/// The per-job state shared by all emitters.
pub struct EmitContext<'a> {
    pub scope: &'a Scope,
    pub options: CodegenOptions,
    pub names: NameManager,
    index: HashMap<DeclId, DeclRef<'a>>,
}

impl<'a> EmitContext<'a> {
    /// Index `scope` and assign every declaration its identifier, in
    /// declaration order, so names never depend on emission order.
    pub fn new(scope: &'a Scope, options: CodegenOptions) -> CodegenResult<Self> {
        let mut ctx = Self {
            scope,
            options,
            names: NameManager::new(),
            index: HashMap::new(),
        };
        for decl in &scope.decls {
            ctx.register_decl(decl)?;
        }
        Ok(ctx)
    }

    fn insert(&mut self, id: DeclId, entry: DeclRef<'a>) -> CodegenResult<()> {
        if self.index.insert(id, entry).is_some() {
            return Err(CodegenError::internal(format!(
                "declaration id {id} is used twice"
            )));
        }
        Ok(())
    }

    fn register_decl(&mut self, decl: &'a Decl) -> CodegenResult<()> {
        match decl {
            Decl::Event(e) => {
                self.insert(e.id, DeclRef::Event(e))?;
                match e.builtin {
                    Some(BuiltinEvent::Null) => self.names.pin(e.id, DEFAULT_EVENT),
                    Some(BuiltinEvent::Halt) => self.names.pin(e.id, HALT_EVENT),
                    None => {
                        self.names.name_for(e.id, &e.name);
                    }
                }
            }
            Decl::Function(f) => self.register_function(f)?,
            Decl::Machine(m) => {
                self.insert(m.id, DeclRef::Machine(m))?;
                let name = self.names.name_for(m.id, &m.name);
                self.names.derived(m.id, &name, "", "State");
                for state in &m.states {
                    self.insert(state.id, DeclRef::State { machine: m, state })?;
                    self.names.name_for(state.id, &state.name);
                }
                for field in &m.fields {
                    self.register_variable(field)?;
                }
                for method in &m.methods {
                    self.register_function(method)?;
                }
            }
            Decl::Enum(e) => {
                self.insert(e.id, DeclRef::Enum(e))?;
                self.names.name_for(e.id, &e.name);
                for elem in &e.elements {
                    self.insert(elem.id, DeclRef::EnumElem(elem))?;
                    self.names.name_for(elem.id, &elem.name);
                }
            }
            // Elements may also be listed on their own next to their enum.
            Decl::EnumElem(elem) => {
                if !self.index.contains_key(&elem.id) {
                    self.insert(elem.id, DeclRef::EnumElem(elem))?;
                    self.names.name_for(elem.id, &elem.name);
                }
            }
            Decl::Interface(i) => {
                self.insert(i.id, DeclRef::Interface(i))?;
                self.names.name_for(i.id, &i.name);
            }
            Decl::TypeDef(t) => {
                self.insert(t.id, DeclRef::TypeDef(t))?;
                self.names.name_for(t.id, &t.name);
            }
            Decl::Implementation(m) | Decl::SafetyTest(m) => {
                self.insert(m.id, DeclRef::Module(m))?;
                self.names.name_for(m.id, &m.name);
            }
        }
        Ok(())
    }

    fn register_function(&mut self, f: &'a FunctionDecl) -> CodegenResult<()> {
        self.insert(f.id, DeclRef::Function(f))?;
        self.names.name_for(f.id, &f.name);
        for var in f.params.iter().chain(&f.locals) {
            self.register_variable(var)?;
        }
        self.register_stmts(&f.body)
    }

    fn register_variable(&mut self, var: &'a Variable) -> CodegenResult<()> {
        self.insert(var.id, DeclRef::Variable(var))?;
        self.names.name_for(var.id, &var.name);
        Ok(())
    }

    /// Receive-case handlers are nested in statement bodies.
    fn register_stmts(&mut self, stmts: &'a [Stmt]) -> CodegenResult<()> {
        for stmt in stmts {
            match stmt {
                Stmt::Receive(r) => {
                    for case in &r.cases {
                        self.register_function(&case.handler)?;
                    }
                }
                Stmt::If(i) => {
                    self.register_stmts(&i.then_branch)?;
                    self.register_stmts(&i.else_branch)?;
                }
                Stmt::While(w) => self.register_stmts(&w.body)?,
                Stmt::Compound(body) => self.register_stmts(body)?,
                _ => {}
            }
        }
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn lookup(&self, id: DeclId) -> CodegenResult<DeclRef<'a>> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("declaration {id}")))
    }

    /// The identifier assigned to `id`.
    pub fn name(&self, id: DeclId) -> CodegenResult<String> {
        self.names
            .lookup(id)
            .map(str::to_string)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("name of declaration {id}")))
    }

    pub fn event(&self, id: DeclId) -> CodegenResult<&'a EventDecl> {
        match self.lookup(id)? {
            DeclRef::Event(e) => Ok(e),
            other => Err(mismatch(id, "an event", other)),
        }
    }

    pub fn machine(&self, id: DeclId) -> CodegenResult<&'a MachineDecl> {
        match self.lookup(id)? {
            DeclRef::Machine(m) => Ok(m),
            other => Err(mismatch(id, "a machine", other)),
        }
    }

    pub fn function(&self, id: DeclId) -> CodegenResult<&'a FunctionDecl> {
        match self.lookup(id)? {
            DeclRef::Function(f) => Ok(f),
            other => Err(mismatch(id, "a function", other)),
        }
    }

    pub fn variable(&self, id: DeclId) -> CodegenResult<&'a Variable> {
        match self.lookup(id)? {
            DeclRef::Variable(v) => Ok(v),
            other => Err(mismatch(id, "a variable", other)),
        }
    }

    pub fn enum_elem(&self, id: DeclId) -> CodegenResult<&'a EnumElemDecl> {
        match self.lookup(id)? {
            DeclRef::EnumElem(e) => Ok(e),
            other => Err(mismatch(id, "an enum element", other)),
        }
    }

    /// The generated name of the `State` enum of machine `id`.
    pub fn state_enum(&mut self, id: DeclId) -> CodegenResult<String> {
        let machine = self.name(id)?;
        Ok(self.names.derived(id, &machine, "", "State"))
    }

    /// `MachineState::Variant` for state `id` of `machine`.
    pub fn state_path(&mut self, machine: DeclId, state: DeclId) -> CodegenResult<String> {
        let owner = self.machine(machine)?;
        if owner.state(state).is_none() {
            return Err(CodegenError::internal(format!(
                "state {state} does not belong to machine {}",
                owner.name
            )));
        }
        Ok(format!("{}::{}", self.state_enum(machine)?, self.name(state)?))
    }

    /// The name under which the runtime creates the machine behind a
    /// machine or interface declaration.
    pub fn creatable_machine(&self, id: DeclId) -> CodegenResult<String> {
        match self.lookup(id)? {
            DeclRef::Machine(m) if !m.is_spec => self.name(m.id),
            DeclRef::Interface(i) => {
                if let Some(implementer) = i.implementer {
                    return self.creatable_machine(implementer);
                }
                let stripped = i.name.strip_prefix("I_").unwrap_or(&i.name);
                self.scope
                    .machines()
                    .find(|m| !m.is_spec && m.name == stripped)
                    .map(|m| self.name(m.id))
                    .unwrap_or_else(|| {
                        Err(CodegenError::UnresolvedSymbol(format!(
                            "no machine implements interface {}",
                            i.name
                        )))
                    })
            }
            other => Err(mismatch(id, "a machine or interface", other)),
        }
    }
}

fn mismatch(id: DeclId, expected: &str, found: DeclRef<'_>) -> CodegenError {
    let found = match found {
        DeclRef::Event(_) => "an event",
        DeclRef::Machine(_) => "a machine",
        DeclRef::State { .. } => "a state",
        DeclRef::Function(_) => "a function",
        DeclRef::Variable(_) => "a variable",
        DeclRef::Enum(_) => "an enum",
        DeclRef::EnumElem(_) => "an enum element",
        DeclRef::Interface(_) => "an interface",
        DeclRef::TypeDef(_) => "a type definition",
        DeclRef::Module(_) => "a module",
    };
    CodegenError::internal(format!("declaration {id} is {found}, expected {expected}"))
}

// ══════════════════════════════════════════════════════════════════════════════
// Function Scope
// ══════════════════════════════════════════════════════════════════════════════

/// Where a function body is being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnKind {
    /// A method of an ordinary machine. `self` is the machine.
    Method,
    /// A method of a monitor. `self` is the monitor.
    Monitor,
    /// A free function. The calling machine is passed in explicitly.
    Free,
}

/// The enclosing function of the statements being lowered.
#[derive(Debug, Clone)]
pub struct FuncScope<'a> {
    pub kind: FnKind,
    pub machine: Option<&'a MachineDecl>,
    pub function: &'a FunctionDecl,
    /// Generated name of the owning machine's state enum.
    pub state_enum: String,
}

impl<'a> FuncScope<'a> {
    pub fn method(machine: &'a MachineDecl, function: &'a FunctionDecl, state_enum: String) -> Self {
        let kind = if machine.is_spec {
            FnKind::Monitor
        } else {
            FnKind::Method
        };
        Self {
            kind,
            machine: Some(machine),
            function,
            state_enum,
        }
    }

    pub fn free(function: &'a FunctionDecl) -> Self {
        Self {
            kind: FnKind::Free,
            machine: None,
            function,
            state_enum: String::new(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind == FnKind::Free
    }

    pub fn is_monitor(&self) -> bool {
        self.kind == FnKind::Monitor
    }

    /// The place holding the current state.
    pub fn state_place(&self) -> &'static str {
        match self.kind {
            FnKind::Monitor => "self.current_state",
            _ => "self.common_data.current_state",
        }
    }

    /// Whether the owning machine has any exit handler.
    pub fn has_exits(&self) -> bool {
        self.machine.is_some_and(MachineDecl::has_exit_handlers)
    }

    /// The receiver through which machine capabilities are reached.
    pub fn receiver(&self) -> &'static str {
        match self.kind {
            FnKind::Free => crate::runtime::CURRENT_MACHINE,
            _ => "self",
        }
    }

    pub fn returns_value(&self) -> bool {
        !self.function.return_type.is_null()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Code Writer
// ══════════════════════════════════════════════════════════════════════════════

/// Line-based writer that indents by bracket structure.
///
/// A line ending in an opening bracket indents the lines after it; a line
/// starting with a closing bracket is dedented first. `} else {` does both.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for raw in text.as_ref().lines() {
            let line = raw.trim();
            if line.is_empty() {
                self.buf.push('\n');
                continue;
            }
            if line.starts_with(|c: char| matches!(c, '}' | ')' | ']')) {
                self.indent = self.indent.saturating_sub(1);
            }
            for _ in 0..self.indent {
                self.buf.push_str("    ");
            }
            self.buf.push_str(line);
            self.buf.push('\n');
            if line.ends_with(|c: char| matches!(c, '{' | '(' | '[')) {
                self.indent += 1;
            }
        }
    }

    pub fn blank(&mut self) {
        if !self.buf.is_empty() && !self.buf.ends_with("\n\n") {
            self.buf.push('\n');
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
