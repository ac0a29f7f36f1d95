//! Programmatic construction of resolved scopes.
//!
//! Upstream tooling and tests use [`ScopeBuilder`] to allocate declaration
//! identities and assemble machines without spelling out every field. The
//! [`expr`] and [`stmt`] modules hold small constructors for typed nodes.

use crate::ast::*;
use crate::ty::{EnumType, InterfaceType, PType};
use crate::Span;

/// Builds a [`Scope`], handing out fresh [`DeclId`]s.
#[derive(Debug, Default)]
pub struct ScopeBuilder {
    next_id: u32,
    decls: Vec<Decl>,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope that already declares the two built-in events.
    pub fn with_builtins() -> (Self, DeclId, DeclId) {
        let mut sb = Self::new();
        let null = sb.builtin_event("null", BuiltinEvent::Null);
        let halt = sb.builtin_event("halt", BuiltinEvent::Halt);
        (sb, null, halt)
    }

    pub fn fresh_id(&mut self) -> DeclId {
        let id = DeclId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    pub fn event(&mut self, name: &str, payload: PType) -> DeclId {
        let id = self.fresh_id();
        self.push(Decl::Event(EventDecl {
            id,
            name: name.into(),
            payload,
            builtin: None,
            span: Span::unknown(),
        }));
        id
    }

    pub fn builtin_event(&mut self, name: &str, kind: BuiltinEvent) -> DeclId {
        let id = self.fresh_id();
        self.push(Decl::Event(EventDecl {
            id,
            name: name.into(),
            payload: PType::Null,
            builtin: Some(kind),
            span: Span::unknown(),
        }));
        id
    }

    /// Declare an enum; returns its type and the element ids in order.
    pub fn enumeration(&mut self, name: &str, elements: &[(&str, i64)]) -> (PType, Vec<DeclId>) {
        let id = self.fresh_id();
        let elems: Vec<EnumElemDecl> = elements
            .iter()
            .map(|(elem, value)| EnumElemDecl {
                id: self.fresh_id(),
                name: (*elem).into(),
                value: *value,
                parent: id,
            })
            .collect();
        let ids = elems.iter().map(|e| e.id).collect();
        let default_value = elements.first().map(|(_, v)| *v).unwrap_or(0);
        self.push(Decl::Enum(EnumDecl {
            id,
            name: name.into(),
            elements: elems,
            span: Span::unknown(),
        }));
        let ty = PType::Enum(EnumType {
            decl: id,
            name: name.into(),
            default_value,
        });
        (ty, ids)
    }

    pub fn interface(&mut self, name: &str, payload: PType, implementer: Option<DeclId>) -> (PType, DeclId) {
        let id = self.fresh_id();
        self.push(Decl::Interface(InterfaceDecl {
            id,
            name: name.into(),
            payload,
            receives: Vec::new(),
            implementer,
            span: Span::unknown(),
        }));
        let ty = PType::Interface(InterfaceType {
            decl: id,
            name: name.into(),
        });
        (ty, id)
    }

    pub fn type_def(&mut self, name: &str, ty: PType) -> DeclId {
        let id = self.fresh_id();
        self.push(Decl::TypeDef(TypeDefDecl {
            id,
            name: name.into(),
            ty,
            span: Span::unknown(),
        }));
        id
    }

    /// Declare a free function.
    pub fn function<F>(&mut self, name: &str, return_type: PType, build: F) -> DeclId
    where
        F: FnOnce(&mut FunctionBuilder<'_>),
    {
        let decl = build_function(&mut self.next_id, name, None, return_type, false, build);
        let id = decl.id;
        self.push(Decl::Function(decl));
        id
    }

    pub fn machine(&mut self, name: &str) -> MachineBuilder<'_> {
        self.machine_decl(name, false)
    }

    pub fn monitor(&mut self, name: &str) -> MachineBuilder<'_> {
        self.machine_decl(name, true)
    }

    fn machine_decl(&mut self, name: &str, is_spec: bool) -> MachineBuilder<'_> {
        let id = self.fresh_id();
        MachineBuilder {
            decl: MachineDecl {
                id,
                name: name.into(),
                fields: Vec::new(),
                states: Vec::new(),
                methods: Vec::new(),
                payload: PType::Null,
                start_state: id,
                sends: Vec::new(),
                receives: Vec::new(),
                creates: Vec::new(),
                observes: Vec::new(),
                is_spec,
                span: Span::unknown(),
            },
            scope: self,
        }
    }

    pub fn module(&mut self, name: &str, main: Option<DeclId>) -> ModuleDecl {
        ModuleDecl {
            id: self.fresh_id(),
            name: name.into(),
            main,
            link_map: Vec::new(),
            interface_definitions: Vec::new(),
            monitor_map: Vec::new(),
            span: Span::unknown(),
        }
    }

    pub fn finish(self) -> Scope {
        Scope { decls: self.decls }
    }
}

fn build_function<F>(
    next_id: &mut u32,
    name: &str,
    owner: Option<DeclId>,
    return_type: PType,
    is_anon: bool,
    build: F,
) -> FunctionDecl
where
    F: FnOnce(&mut FunctionBuilder<'_>),
{
    let id = DeclId(*next_id);
    *next_id += 1;
    let mut fb = FunctionBuilder {
        next_id,
        decl: FunctionDecl {
            id,
            name: name.into(),
            owner,
            params: Vec::new(),
            locals: Vec::new(),
            return_type,
            body: Vec::new(),
            is_anon,
            is_foreign: false,
            can_receive: false,
            span: Span::unknown(),
        },
    };
    build(&mut fb);
    fb.decl
}

/// Collects parameters, locals and the body of one function.
pub struct FunctionBuilder<'a> {
    next_id: &'a mut u32,
    decl: FunctionDecl,
}

impl FunctionBuilder<'_> {
    pub fn id(&self) -> DeclId {
        self.decl.id
    }

    fn variable(&mut self, name: &str, ty: PType, role: VariableRole) -> Variable {
        let id = DeclId(*self.next_id);
        *self.next_id += 1;
        Variable {
            id,
            name: name.into(),
            ty,
            role,
        }
    }

    /// Add a parameter; returns an expression reading it.
    pub fn param(&mut self, name: &str, ty: PType) -> Expr {
        let var = self.variable(name, ty, VariableRole::Param);
        let e = expr::var(&var);
        self.decl.params.push(var);
        e
    }

    /// Add a local; returns an expression reading it.
    pub fn local(&mut self, name: &str, ty: PType) -> Expr {
        let var = self.variable(name, ty, VariableRole::Local);
        let e = expr::var(&var);
        self.decl.locals.push(var);
        e
    }

    pub fn stmt(&mut self, stmt: Stmt) -> &mut Self {
        self.decl.body.push(stmt);
        self
    }

    pub fn body(&mut self, stmts: Vec<Stmt>) -> &mut Self {
        self.decl.body.extend(stmts);
        self
    }

    pub fn can_receive(&mut self) -> &mut Self {
        self.decl.can_receive = true;
        self
    }

    pub fn foreign(&mut self) -> &mut Self {
        self.decl.is_foreign = true;
        self
    }

    /// Build a receive case handler (an anonymous function).
    pub fn receive_case<F>(&mut self, event: DeclId, build: F) -> ReceiveCase
    where
        F: FnOnce(&mut FunctionBuilder<'_>),
    {
        let owner = self.decl.owner;
        let handler = build_function(self.next_id, "receive_case", owner, PType::Null, true, build);
        ReceiveCase { event, handler }
    }
}

/// Assembles one machine or monitor.
pub struct MachineBuilder<'a> {
    scope: &'a mut ScopeBuilder,
    decl: MachineDecl,
}

impl MachineBuilder<'_> {
    pub fn id(&self) -> DeclId {
        self.decl.id
    }

    /// Add a field; returns an expression reading it.
    pub fn field(&mut self, name: &str, ty: PType) -> Expr {
        let var = Variable {
            id: self.scope.fresh_id(),
            name: name.into(),
            ty,
            role: VariableRole::Field,
        };
        let e = expr::var(&var);
        self.decl.fields.push(var);
        e
    }

    pub fn payload(&mut self, ty: PType) -> &mut Self {
        self.decl.payload = ty;
        self
    }

    /// Declare a state. The first state declared is the start state until
    /// [`MachineBuilder::start`] says otherwise.
    pub fn state(&mut self, name: &str) -> DeclId {
        let id = self.scope.fresh_id();
        let is_start = self.decl.states.is_empty();
        if is_start {
            self.decl.start_state = id;
        }
        self.decl.states.push(StateDecl {
            id,
            name: name.into(),
            entry: None,
            exit: None,
            handlers: Vec::new(),
            is_start,
            temperature: Temperature::Warm,
            span: Span::unknown(),
        });
        id
    }

    pub fn start(&mut self, state: DeclId) -> &mut Self {
        self.decl.start_state = state;
        for s in &mut self.decl.states {
            s.is_start = s.id == state;
        }
        self
    }

    pub fn temperature(&mut self, state: DeclId, temperature: Temperature) -> &mut Self {
        if let Some(s) = self.state_mut(state) {
            s.temperature = temperature;
        }
        self
    }

    /// Add an anonymous handler taking the triggering event's payload.
    pub fn anon<F>(&mut self, name: &str, build: F) -> DeclId
    where
        F: FnOnce(&mut FunctionBuilder<'_>),
    {
        self.add_method(name, PType::Null, true, build)
    }

    /// Add a named method.
    pub fn method<F>(&mut self, name: &str, return_type: PType, build: F) -> DeclId
    where
        F: FnOnce(&mut FunctionBuilder<'_>),
    {
        self.add_method(name, return_type, false, build)
    }

    fn add_method<F>(&mut self, name: &str, return_type: PType, is_anon: bool, build: F) -> DeclId
    where
        F: FnOnce(&mut FunctionBuilder<'_>),
    {
        let owner = Some(self.decl.id);
        let decl = build_function(&mut self.scope.next_id, name, owner, return_type, is_anon, build);
        let id = decl.id;
        self.decl.methods.push(decl);
        id
    }

    pub fn entry(&mut self, state: DeclId, function: DeclId) -> &mut Self {
        if let Some(s) = self.state_mut(state) {
            s.entry = Some(function);
        }
        self
    }

    pub fn exit(&mut self, state: DeclId, function: DeclId) -> &mut Self {
        if let Some(s) = self.state_mut(state) {
            s.exit = Some(function);
        }
        self
    }

    pub fn on(&mut self, state: DeclId, event: DeclId, action: StateAction) -> &mut Self {
        if let Some(s) = self.state_mut(state) {
            s.handlers.push(EventHandler { event, action });
        }
        self
    }

    pub fn on_do(&mut self, state: DeclId, event: DeclId, function: DeclId) -> &mut Self {
        self.on(state, event, StateAction::Do { function })
    }

    pub fn on_goto(&mut self, state: DeclId, event: DeclId, target: DeclId) -> &mut Self {
        self.on(
            state,
            event,
            StateAction::Goto {
                target,
                transition: None,
            },
        )
    }

    pub fn observes(&mut self, events: &[DeclId]) -> &mut Self {
        self.decl.observes.extend_from_slice(events);
        self
    }

    fn state_mut(&mut self, state: DeclId) -> Option<&mut StateDecl> {
        self.decl.states.iter_mut().find(|s| s.id == state)
    }

    /// Push the machine into the scope and return its id.
    pub fn finish(self) -> DeclId {
        let id = self.decl.id;
        self.scope.push(Decl::Machine(self.decl));
        id
    }
}

/// Constructors for typed expressions.
pub mod expr {
    use crate::ast::*;
    use crate::ty::PType;

    pub fn var(v: &Variable) -> Expr {
        Expr::new(ExprKind::Var(v.id), v.ty.clone())
    }

    pub fn int(v: i64) -> Expr {
        Expr::new(ExprKind::IntLit(v), PType::Int)
    }

    pub fn float(v: f64) -> Expr {
        Expr::new(ExprKind::FloatLit(v), PType::Float)
    }

    pub fn boolean(v: bool) -> Expr {
        Expr::new(ExprKind::BoolLit(v), PType::Bool)
    }

    pub fn string(v: &str) -> Expr {
        Expr::new(ExprKind::StringLit(v.into()), PType::String)
    }

    pub fn null() -> Expr {
        Expr::new(ExprKind::NullLit, PType::Null)
    }

    pub fn event(id: DeclId) -> Expr {
        Expr::new(ExprKind::EventRef(id), PType::Event)
    }

    pub fn this() -> Expr {
        Expr::new(ExprKind::This, PType::Machine)
    }

    /// A binary operation. Comparisons and logic yield `bool`; arithmetic
    /// takes the left operand's type.
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        let ty = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => left.ty.clone(),
            _ => PType::Bool,
        };
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            PType::Bool,
        )
    }

    pub fn call(function: DeclId, args: Vec<Expr>, ty: PType) -> Expr {
        Expr::new(ExprKind::Call { function, args }, ty)
    }

    pub fn ctor(interface: DeclId, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Ctor { interface, args }, PType::Machine)
    }

    pub fn field(tuple: Expr, name: &str, ty: PType) -> Expr {
        Expr::new(
            ExprKind::NamedTupleAccess {
                tuple: Box::new(tuple),
                field: name.into(),
            },
            ty,
        )
    }

    pub fn index(seq: Expr, index: Expr) -> Expr {
        let elem = match seq.ty.canonical() {
            PType::Seq(elem) => (**elem).clone(),
            other => other.clone(),
        };
        Expr::new(
            ExprKind::SeqAccess {
                seq: Box::new(seq),
                index: Box::new(index),
            },
            elem,
        )
    }

    pub fn sizeof(collection: Expr) -> Expr {
        Expr::new(ExprKind::Sizeof(Box::new(collection)), PType::Int)
    }

    pub fn named_tuple(values: Vec<Expr>, ty: PType) -> Expr {
        Expr::new(ExprKind::NamedTuple(values), ty)
    }

    pub fn tuple(values: Vec<Expr>) -> Expr {
        let ty = PType::Tuple(values.iter().map(|v| v.ty.clone()).collect());
        Expr::new(ExprKind::Tuple(values), ty)
    }

    pub fn default(ty: PType) -> Expr {
        Expr::new(ExprKind::Default, ty)
    }
}

/// Constructors for statements.
pub mod stmt {
    use crate::ast::*;

    pub fn assign(location: Expr, value: Expr) -> Stmt {
        Stmt::Assign(AssignStmt { location, value })
    }

    pub fn goto(state: DeclId) -> Stmt {
        Stmt::Goto(GotoStmt {
            state,
            payload: None,
        })
    }

    pub fn goto_with(state: DeclId, payload: Expr) -> Stmt {
        Stmt::Goto(GotoStmt {
            state,
            payload: Some(payload),
        })
    }

    pub fn raise(event: Expr, args: Vec<Expr>) -> Stmt {
        Stmt::Raise(RaiseStmt { event, args })
    }

    pub fn send(target: Expr, event: Expr, args: Vec<Expr>) -> Stmt {
        Stmt::Send(SendStmt {
            target,
            event,
            args,
        })
    }

    pub fn ret(value: Option<Expr>) -> Stmt {
        Stmt::Return(ReturnStmt { value })
    }

    pub fn print(message: Expr) -> Stmt {
        Stmt::Print(PrintStmt { message })
    }

    pub fn assert(condition: Expr, message: Expr) -> Stmt {
        Stmt::Assert(AssertStmt { condition, message })
    }

    pub fn if_else(condition: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
        Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While(WhileStmt { condition, body })
    }

    pub fn call(function: DeclId, args: Vec<Expr>) -> Stmt {
        Stmt::Call(CallStmt { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_nested_declarations() {
        let (mut sb, _, _) = ScopeBuilder::with_builtins();
        let mut m = sb.machine("M");
        let x = m.field("x", PType::Int);
        let s = m.state("S");
        let f = m.anon("entry_S", |f| {
            f.local("tmp", PType::Int);
        });
        m.entry(s, f);
        let mid = m.finish();
        let scope = sb.finish();

        let machine = scope.machines().next().unwrap();
        let mut ids = vec![mid, s, f, machine.methods[0].locals[0].id];
        if let ExprKind::Var(id) = x.kind {
            ids.push(id);
        }
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn test_first_state_is_start() {
        let mut sb = ScopeBuilder::new();
        let mut m = sb.machine("M");
        let a = m.state("A");
        let b = m.state("B");
        m.finish();
        let scope = sb.finish();
        let machine = scope.machines().next().unwrap();
        assert_eq!(machine.start_state, a);
        assert!(machine.state(a).unwrap().is_start);
        assert!(!machine.state(b).unwrap().is_start);
    }

    #[test]
    fn test_start_override() {
        let mut sb = ScopeBuilder::new();
        let mut m = sb.machine("M");
        let _a = m.state("A");
        let b = m.state("B");
        m.start(b);
        m.finish();
        let scope = sb.finish();
        let machine = scope.machines().next().unwrap();
        assert_eq!(machine.start_state, b);
        assert_eq!(machine.states.iter().filter(|s| s.is_start).count(), 1);
    }

    #[test]
    fn test_enum_default_is_first_element() {
        let mut sb = ScopeBuilder::new();
        let (ty, elems) = sb.enumeration("Color", &[("Red", 3), ("Green", 1)]);
        assert_eq!(elems.len(), 2);
        match ty {
            PType::Enum(e) => assert_eq!(e.default_value, 3),
            other => panic!("expected enum type, got {other}"),
        }
    }
}
