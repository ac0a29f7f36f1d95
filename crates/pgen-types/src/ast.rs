//! The resolved program model handed to code generation.
//!
//! Upstream phases (parsing, name resolution, type checking) build this once.
//! Every reference to another declaration is a [`DeclId`], and every
//! expression carries its resolved [`PType`]. Declaration order in a
//! [`Scope`] is source order and is preserved in the output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ty::PType;
use crate::Span;

/// Identity of one declaration within a compilation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Global Scope
// ══════════════════════════════════════════════════════════════════════════════

/// The fully resolved global scope: top-level declarations in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub decls: Vec<Decl>,
}

impl Scope {
    pub fn events(&self) -> impl Iterator<Item = &EventDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Event(e) => Some(e),
            _ => None,
        })
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Machine(m) => Some(m),
            _ => None,
        })
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decl {
    Event(EventDecl),
    /// A free function (methods live inside their machine).
    Function(FunctionDecl),
    /// A machine or, when `is_spec` is set, a monitor.
    Machine(MachineDecl),
    Enum(EnumDecl),
    EnumElem(EnumElemDecl),
    Interface(InterfaceDecl),
    TypeDef(TypeDefDecl),
    Implementation(ModuleDecl),
    SafetyTest(ModuleDecl),
}

impl Decl {
    pub fn id(&self) -> DeclId {
        match self {
            Decl::Event(d) => d.id,
            Decl::Function(d) => d.id,
            Decl::Machine(d) => d.id,
            Decl::Enum(d) => d.id,
            Decl::EnumElem(d) => d.id,
            Decl::Interface(d) => d.id,
            Decl::TypeDef(d) => d.id,
            Decl::Implementation(d) | Decl::SafetyTest(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Decl::Event(d) => &d.name,
            Decl::Function(d) => &d.name,
            Decl::Machine(d) => &d.name,
            Decl::Enum(d) => &d.name,
            Decl::EnumElem(d) => &d.name,
            Decl::Interface(d) => &d.name,
            Decl::TypeDef(d) => &d.name,
            Decl::Implementation(d) | Decl::SafetyTest(d) => &d.name,
        }
    }

    /// Source position, unknown for enum elements.
    pub fn span(&self) -> Span {
        match self {
            Decl::Event(d) => d.span,
            Decl::Function(d) => d.span,
            Decl::Machine(d) => d.span,
            Decl::Enum(d) => d.span,
            Decl::EnumElem(_) => Span::unknown(),
            Decl::Interface(d) => d.span,
            Decl::TypeDef(d) => d.span,
            Decl::Implementation(d) | Decl::SafetyTest(d) => d.span,
        }
    }

    /// Human-readable kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Decl::Event(_) => "event",
            Decl::Function(_) => "function",
            Decl::Machine(m) if m.is_spec => "spec machine",
            Decl::Machine(_) => "machine",
            Decl::Enum(_) => "enum",
            Decl::EnumElem(_) => "enum element",
            Decl::Interface(_) => "interface",
            Decl::TypeDef(_) => "type definition",
            Decl::Implementation(_) => "implementation",
            Decl::SafetyTest(_) => "safety test",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Events, Enums, Interfaces, Type Definitions
// ══════════════════════════════════════════════════════════════════════════════

/// The implicit events every program has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinEvent {
    /// The null event, delivered to run a state's entry handler.
    Null,
    Halt,
}

/// `event Name : PayloadType;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecl {
    pub id: DeclId,
    pub name: String,
    /// `Null` when the event carries no payload.
    pub payload: PType,
    #[serde(default)]
    pub builtin: Option<BuiltinEvent>,
    #[serde(default)]
    pub span: Span,
}

/// `enum Name { A = 0, B = 1 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub id: DeclId,
    pub name: String,
    pub elements: Vec<EnumElemDecl>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumElemDecl {
    pub id: DeclId,
    pub name: String,
    pub value: i64,
    pub parent: DeclId,
}

/// `interface Name(PayloadType) receives E1, E2;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub id: DeclId,
    pub name: String,
    pub payload: PType,
    #[serde(default)]
    pub receives: Vec<DeclId>,
    /// The machine that implements this interface, when bound statically.
    #[serde(default)]
    pub implementer: Option<DeclId>,
    #[serde(default)]
    pub span: Span,
}

/// `type Name = T;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: PType,
    #[serde(default)]
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Machines & States
// ══════════════════════════════════════════════════════════════════════════════

/// `machine Name { ... }` or `spec Name observes ... { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDecl {
    pub id: DeclId,
    pub name: String,
    pub fields: Vec<Variable>,
    pub states: Vec<StateDecl>,
    /// Named and anonymous functions owned by this machine.
    pub methods: Vec<FunctionDecl>,
    /// Type of the creation payload handed to the start state's entry.
    pub payload: PType,
    pub start_state: DeclId,
    #[serde(default)]
    pub sends: Vec<DeclId>,
    #[serde(default)]
    pub receives: Vec<DeclId>,
    #[serde(default)]
    pub creates: Vec<DeclId>,
    /// Events a monitor observes. Empty for ordinary machines.
    #[serde(default)]
    pub observes: Vec<DeclId>,
    #[serde(default)]
    pub is_spec: bool,
    #[serde(default)]
    pub span: Span,
}

impl MachineDecl {
    pub fn state(&self, id: DeclId) -> Option<&StateDecl> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn method(&self, id: DeclId) -> Option<&FunctionDecl> {
        self.methods.iter().find(|f| f.id == id)
    }

    pub fn has_exit_handlers(&self) -> bool {
        self.states.iter().any(|s| s.exit.is_some())
    }
}

/// Liveness annotation of a monitor state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Cold,
    #[default]
    Warm,
}

/// `state Name { entry ...; exit ...; on E do ...; }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub id: DeclId,
    pub name: String,
    #[serde(default)]
    pub entry: Option<DeclId>,
    #[serde(default)]
    pub exit: Option<DeclId>,
    /// The handler table, one entry per handled event.
    #[serde(default)]
    pub handlers: Vec<EventHandler>,
    #[serde(default)]
    pub is_start: bool,
    #[serde(default)]
    pub temperature: Temperature,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHandler {
    pub event: DeclId,
    pub action: StateAction,
}

/// What a state does when a handled event arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAction {
    /// `on E do f;`
    Do { function: DeclId },
    /// `on E goto S [with f];`
    Goto {
        target: DeclId,
        #[serde(default)]
        transition: Option<DeclId>,
    },
    /// `on E push S;`
    Push { target: DeclId },
    /// `defer E;`
    Defer,
    /// `ignore E;`
    Ignore,
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions & Variables
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: DeclId,
    pub name: String,
    /// The owning machine. `None` for free functions.
    #[serde(default)]
    pub owner: Option<DeclId>,
    #[serde(default)]
    pub params: Vec<Variable>,
    #[serde(default)]
    pub locals: Vec<Variable>,
    pub return_type: PType,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Inline handler whose single optional parameter is the triggering
    /// event's payload.
    #[serde(default)]
    pub is_anon: bool,
    /// Declared without a body; implemented outside the model.
    #[serde(default)]
    pub is_foreign: bool,
    /// The body may block in a `receive`.
    #[serde(default)]
    pub can_receive: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    Field,
    Param,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: DeclId,
    pub name: String,
    pub ty: PType,
    pub role: VariableRole,
}

// ══════════════════════════════════════════════════════════════════════════════
// Test Harness Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// An `implementation` or `test` declaration with its resolved module info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub id: DeclId,
    pub name: String,
    /// The machine started by this module.
    #[serde(default)]
    pub main: Option<DeclId>,
    /// Per creating interface: requested interface → bound interface.
    #[serde(default)]
    pub link_map: Vec<LinkEntry>,
    /// Interface → implementing machine.
    #[serde(default)]
    pub interface_definitions: Vec<InterfaceBinding>,
    /// Monitor → interfaces it monitors.
    #[serde(default)]
    pub monitor_map: Vec<MonitorBinding>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub creator: DeclId,
    pub requested: DeclId,
    pub bound: DeclId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceBinding {
    pub interface: DeclId,
    pub machine: DeclId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorBinding {
    pub monitor: DeclId,
    pub interfaces: Vec<DeclId>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    /// `announce E, payload;`
    Announce(AnnounceStmt),
    /// `assert cond, "message";`
    Assert(AssertStmt),
    /// `location = value;`
    Assign(AssignStmt),
    /// `{ stmts }`
    Compound(Vec<Stmt>),
    /// `new Machine(args);` with the created reference discarded.
    Ctor(CtorStmt),
    /// `f(args);`
    Call(CallStmt),
    /// `goto S, payload;`
    Goto(GotoStmt),
    If(IfStmt),
    /// `set += (value);`
    Add(AddStmt),
    /// `seq += (index, value);` / `map += (key, value);`
    Insert(InsertStmt),
    /// `location = var move;`
    MoveAssign(MoveAssignStmt),
    Nop,
    /// `pop;`
    Pop,
    Print(PrintStmt),
    /// `raise E, args;`
    Raise(RaiseStmt),
    Receive(ReceiveStmt),
    /// `collection -= key;`
    Remove(RemoveStmt),
    Return(ReturnStmt),
    Break,
    Continue,
    /// `send target, E, args;`
    Send(SendStmt),
    /// `location = var swap;`
    SwapAssign(SwapAssignStmt),
    While(WhileStmt),
}

impl Stmt {
    pub fn tag(&self) -> &'static str {
        match self {
            Stmt::Announce(_) => "announce",
            Stmt::Assert(_) => "assert",
            Stmt::Assign(_) => "assign",
            Stmt::Compound(_) => "compound",
            Stmt::Ctor(_) => "new",
            Stmt::Call(_) => "call",
            Stmt::Goto(_) => "goto",
            Stmt::If(_) => "if",
            Stmt::Add(_) => "add",
            Stmt::Insert(_) => "insert",
            Stmt::MoveAssign(_) => "move-assign",
            Stmt::Nop => "nop",
            Stmt::Pop => "pop",
            Stmt::Print(_) => "print",
            Stmt::Raise(_) => "raise",
            Stmt::Receive(_) => "receive",
            Stmt::Remove(_) => "remove",
            Stmt::Return(_) => "return",
            Stmt::Break => "break",
            Stmt::Continue => "continue",
            Stmt::Send(_) => "send",
            Stmt::SwapAssign(_) => "swap-assign",
            Stmt::While(_) => "while",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceStmt {
    pub event: Expr,
    #[serde(default)]
    pub payload: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertStmt {
    pub condition: Expr,
    /// A string-typed expression.
    pub message: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub location: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtorStmt {
    /// A machine or an interface.
    pub interface: DeclId,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStmt {
    pub function: DeclId,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoStmt {
    pub state: DeclId,
    #[serde(default)]
    pub payload: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    #[serde(default)]
    pub else_branch: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddStmt {
    pub collection: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStmt {
    pub collection: Expr,
    pub index: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAssignStmt {
    pub location: Expr,
    pub from: DeclId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintStmt {
    pub message: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaiseStmt {
    pub event: Expr,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// `receive { case E1: (p) { ... } case E2: { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveStmt {
    pub cases: Vec<ReceiveCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveCase {
    pub event: DeclId,
    /// Anonymous function whose optional parameter binds the payload.
    pub handler: FunctionDecl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveStmt {
    pub collection: Expr,
    pub key: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendStmt {
    pub target: Expr,
    pub event: Expr,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapAssignStmt {
    pub location: Expr,
    pub with: DeclId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// A typed expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: PType,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: PType) -> Self {
        Self { kind, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    // ── Literals ──
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StringLit(String),
    NullLit,
    /// `format("{0} of {1}", a, b)`
    Format { base: String, args: Vec<Expr> },

    // ── References ──
    /// A field, parameter or local.
    Var(DeclId),
    /// `x move` / `x swap`
    LinearRef { var: DeclId, linear: LinearKind },
    EnumElem(DeclId),
    EventRef(DeclId),
    This,

    // ── Operators ──
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `e as T`, with `T` the node's type.
    Cast(Box<Expr>),
    /// Implicit conversion inserted by the checker, to the node's type.
    Coerce(Box<Expr>),
    Clone(Box<Expr>),

    // ── Nondeterminism ──
    /// `choose()` / `choose(n)` / `choose(seq)`
    Choose(Option<Box<Expr>>),
    /// `$`
    Nondet,
    /// `$$`
    FairNondet,

    // ── Calls & Construction ──
    Call { function: DeclId, args: Vec<Expr> },
    /// `new Machine(args)`, yielding the created machine's reference.
    Ctor { interface: DeclId, args: Vec<Expr> },
    /// `default(T)`, with `T` the node's type.
    Default,
    /// `(a = e1, b = e2)`; field names come from the node's type.
    NamedTuple(Vec<Expr>),
    /// `(e1, e2)`
    Tuple(Vec<Expr>),

    // ── Collections ──
    /// `item in collection`
    Contains { item: Box<Expr>, collection: Box<Expr> },
    Sizeof(Box<Expr>),
    Keys(Box<Expr>),
    Values(Box<Expr>),

    // ── Access (also used as assignable locations) ──
    MapAccess { map: Box<Expr>, key: Box<Expr> },
    SetAccess { set: Box<Expr>, index: Box<Expr> },
    NamedTupleAccess { tuple: Box<Expr>, field: String },
    SeqAccess { seq: Box<Expr>, index: Box<Expr> },
    TupleAccess { tuple: Box<Expr>, index: usize },
}

impl ExprKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ExprKind::IntLit(_) => "int literal",
            ExprKind::FloatLit(_) => "float literal",
            ExprKind::BoolLit(_) => "bool literal",
            ExprKind::StringLit(_) => "string literal",
            ExprKind::NullLit => "null literal",
            ExprKind::Format { .. } => "format",
            ExprKind::Var(_) => "variable",
            ExprKind::LinearRef { .. } => "linear reference",
            ExprKind::EnumElem(_) => "enum element",
            ExprKind::EventRef(_) => "event reference",
            ExprKind::This => "this",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Cast(_) => "cast",
            ExprKind::Coerce(_) => "coercion",
            ExprKind::Clone(_) => "clone",
            ExprKind::Choose(_) => "choose",
            ExprKind::Nondet => "$",
            ExprKind::FairNondet => "$$",
            ExprKind::Call { .. } => "call",
            ExprKind::Ctor { .. } => "new",
            ExprKind::Default => "default",
            ExprKind::NamedTuple(_) => "named tuple",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Contains { .. } => "in",
            ExprKind::Sizeof(_) => "sizeof",
            ExprKind::Keys(_) => "keys",
            ExprKind::Values(_) => "values",
            ExprKind::MapAccess { .. } => "map access",
            ExprKind::SetAccess { .. } => "set access",
            ExprKind::NamedTupleAccess { .. } => "named tuple access",
            ExprKind::SeqAccess { .. } => "sequence access",
            ExprKind::TupleAccess { .. } => "tuple access",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearKind {
    Move,
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    // Logical
    And,
    Or,
}

impl BinOp {
    /// The target-language operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}
