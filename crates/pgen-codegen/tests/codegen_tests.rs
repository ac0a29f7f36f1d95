//! Integration tests for the P Rust code generator.
//!
//! Tests validate:
//! - The Counter machine: state enum, dispatch arms, entry routing, catch-all
//! - Machine creation with a multi-argument payload
//! - Terminal statements end their block
//! - Unsupported types fail the whole job with the declaration named
//! - Monitors: temperatures, observe dispatch, no creation entry
//! - Blocking receive, bootstrap modules, free functions, collections
//! - Value-aware equality, including comparisons against `null`
//! - Deterministic output and collision-free naming, prelude names included

use pgen_codegen::{generate, CodegenError, CodegenOptions};
use pgen_types::ast::*;
use pgen_types::builder::{expr, stmt, ScopeBuilder};
use pgen_types::PType;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn gen(scope: &Scope) -> String {
    generate(scope, CodegenOptions::new("test")).unwrap_or_else(|e| panic!("codegen failed: {e}"))
}

fn gen_err(scope: &Scope) -> CodegenError {
    match generate(scope, CodegenOptions::new("test")) {
        Ok(out) => panic!("expected a codegen error, got:\n{out}"),
        Err(e) => e,
    }
}

fn assert_contains(out: &str, needle: &str) {
    assert!(out.contains(needle), "missing `{needle}` in:\n{out}");
}

fn increment(var: &Expr) -> Stmt {
    stmt::assign(
        var.clone(),
        expr::binary(BinOp::Add, var.clone(), expr::int(1)),
    )
}

/// `Counter`: `Init` increments and goes to `Running`; `Running` handles
/// `Bump` by incrementing and re-entering itself.
fn counter_scope() -> Scope {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let bump = sb.event("Bump", PType::Null);
    let mut m = sb.machine("Counter");
    let count = m.field("count", PType::Int);
    let init = m.state("Init");
    let running = m.state("Running");
    let entry = m.anon("entry_Init", |fb| {
        fb.stmt(increment(&count));
        fb.stmt(stmt::goto(running));
    });
    m.entry(init, entry);
    let on_bump = m.anon("on_Bump", |fb| {
        fb.stmt(increment(&count));
        fb.stmt(stmt::goto(running));
    });
    m.on_do(running, bump, on_bump);
    m.finish();
    sb.finish()
}

// ══════════════════════════════════════════════════════════════════════════════
// File Structure
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_prologue_and_event_block() {
    let out = gen(&counter_scope());
    assert!(out.starts_with("// Generated code for project test.\n// Dependencies: test\n#![allow("));
    assert_contains(&out, "use amzn_p_rust::common_machine_data as MD;");
    assert_contains(&out, "use amzn_p_rust::p_state_machine::PStateMachine;");
    assert_contains(&out, "use amzn_p_rust::p_value as PV;");
    assert_contains(&out, "use std::sync::mpsc;");
    assert_contains(
        &out,
        "pub enum ProtocolEventName {\n    DefaultEvent,\n    PHalt,\n    Bump,\n}",
    );
    assert_contains(&out, "impl EV::PEvent for ProtocolEvent {");
    assert_contains(
        &out,
        "pub fn new_Bump() -> Self {\n        ProtocolEvent { name: ProtocolEventName::Bump, payload: PV::PValue::DefaultVal }",
    );
}

#[test]
fn test_custom_runtime_crate_and_dependencies() {
    let mut options = CodegenOptions::new("pingpong");
    options.runtime_crate = "p_runtime".into();
    options.project_dependencies = vec!["core".into(), "pingpong".into()];
    let out = generate(&counter_scope(), options).unwrap();
    assert_contains(&out, "// Dependencies: core, pingpong");
    assert_contains(&out, "use p_runtime::machine_index as M;");
    assert!(!out.contains("amzn_p_rust"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Machines
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_counter_state_enum_and_record() {
    let out = gen(&counter_scope());
    assert_contains(&out, "pub enum CounterState {\n    Init,\n    Running,\n}");
    assert_contains(&out, "matches!(self, CounterState::Init)");
    assert_contains(&out, "common_data: MD::CommonMachineData<ProtocolEvent, CounterState>,");
    assert_contains(&out, "goto_payload: Option<PV::PValue>,");
    assert_contains(&out, "count: i32,");
    assert_contains(&out, "let current_state = CounterState::Init;");
    assert_contains(&out, "count: 0,");
}

#[test]
fn test_counter_dispatch() {
    let out = gen(&counter_scope());
    assert_contains(&out, "impl PStateMachine for Counter {");
    assert_contains(&out, "CounterState::Init => match event_name {");
    assert_contains(&out, "self.entry_Init(entry_event);");
    assert_contains(&out, "CounterState::Running => match event_name {");
    assert_contains(&out, "ProtocolEventName::Bump => {\n                    self.on_Bump(event);");
    assert_contains(&out, "self.default_function(entry_event);");
    assert_contains(
        &out,
        "panic!(\"machine {:?} in state {:?} cannot handle event {:?}\", self.common_data.self_id, current_state, event_name);",
    );
}

#[test]
fn test_dispatch_arms_are_exactly_the_handled_events() {
    let out = gen(&counter_scope());
    let execute = &out[out.find("fn execute(").unwrap()..];
    let running = &execute[execute.find("CounterState::Running => match event_name {").unwrap()..];
    let running = &running[..running.find("\n            },").unwrap()];
    let arms: Vec<&str> = running
        .lines()
        .filter(|l| l.starts_with("                ") && !l.starts_with("                 "))
        .map(str::trim)
        .collect();
    assert_eq!(
        arms,
        vec!["ProtocolEventName::DefaultEvent => {", "}", "ProtocolEventName::Bump => {", "}", "_ => {", "}"]
    );
}

#[test]
fn test_counter_handlers() {
    let out = gen(&counter_scope());
    assert_contains(&out, "fn entry_Init(&mut self, event: ProtocolEvent) {\n        self.common_data.execution_status = MP::default_status();");
    assert_contains(&out, "self.count = (self.count + 1);");
    assert_contains(&out, "self.goto_payload = None;\n        self.common_data.current_state = CounterState::Running;\n        self.common_data.execution_status = MP::ExecutionStatus::CanExecuteFurther;\n        return;");
}

#[test]
fn test_halt_terminates_unless_handled() {
    let out = gen(&counter_scope());
    assert_contains(
        &out,
        "_ => {\n                    if event_name != ProtocolEventName::PHalt {",
    );
    assert_contains(
        &out,
        "}\n                    self.common_data.execution_status = MP::ExecutionStatus::Terminated;\n                }",
    );
    assert!(!out.contains("ProtocolEventName::PHalt => {"));
}

#[test]
fn test_start_state_receives_creation_payload() {
    let out = gen(&counter_scope());
    assert_contains(
        &out,
        "None if self.common_data.current_state.is_start() => self.common_data.payload.clone(),",
    );
}

#[test]
fn test_capabilities() {
    let out = gen(&counter_scope());
    assert_contains(&out, "fn send_event(&self, receiver: M::Index, event: Self::Event) {\n        self.common_data.send_event(receiver, event)");
    assert_contains(&out, "let machine = create_new_machine(name, args);");
    assert_contains(&out, ".send(MP::MachineToConfigMsg::CreateMachineRequest(machine))");
    assert_contains(&out, "if let Ok(MP::ConfigToMachineMsg::CreateMachineResponse(new_index)) = self.common_data.rx_config_to_machine.recv() {");
    assert_contains(&out, "Ok(MP::ConfigToMachineMsg::ExecuteRequest(event)) => {");
    assert_contains(&out, "if matches!(execution_status, MP::ExecutionStatus::Terminated) {");
    assert_contains(&out, "_ => panic!(\"machine {:?} received an invalid request\", self.common_data.self_id),");
    assert_contains(&out, "fn name(&self) -> &'static str {\n        \"Counter\"");
}

#[test]
fn test_create_new_machine_lists_machines() {
    let out = gen(&counter_scope());
    assert_contains(&out, "pub fn create_new_machine(name: &'static str, args: PV::PValue) -> MP::Machine<ProtocolEvent> {");
    assert_contains(&out, "\"Counter\" => Counter::new(tx_machine_to_config, rx_config_to_machine, args),");
    assert_contains(&out, "_ => panic!(\"Unrecognized machine name {}\", name),");
    assert_contains(&out, "execute_status: MP::ExecutionStatus::CanExecuteFurther,");
}

#[test]
fn test_create_with_two_arguments() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut b = sb.machine("B");
    b.payload(PType::Tuple(vec![PType::Int, PType::Int]));
    b.state("Start");
    let bid = b.finish();

    let mut a = sb.machine("A");
    let start = a.state("Start");
    let entry = a.anon("entry_Start", |fb| {
        fb.stmt(Stmt::Ctor(CtorStmt {
            interface: bid,
            args: vec![expr::int(1), expr::int(2)],
        }));
    });
    a.entry(start, entry);
    a.finish();
    let out = gen(&sb.finish());

    assert_contains(
        &out,
        "self.create_machine(\"B\", PV::PValue::NamedTuple(PV::PValue::to_hashmap(vec![(\"0\", PV::PValue::Int(1)), (\"1\", PV::PValue::Int(2))])));",
    );
    assert_contains(&out, "\"B\" => B::new(tx_machine_to_config, rx_config_to_machine, args),");
    assert_contains(&out, "\"A\" => A::new(tx_machine_to_config, rx_config_to_machine, args),");
}

#[test]
fn test_goto_with_payload_is_threaded() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let b = m.state("B");
    let entry_a = m.anon("entry_A", |fb| {
        fb.stmt(stmt::goto_with(b, expr::int(5)));
    });
    m.entry(a, entry_a);
    let entry_b = m.anon("entry_B", |fb| {
        fb.param("n", PType::Int);
    });
    m.entry(b, entry_b);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "let PGEN_payload_0 = PV::PValue::Int(5);");
    assert_contains(&out, "self.goto_payload = Some(PGEN_payload_0);");
    assert_contains(&out, "let mut n: i32 = event.payload.extract_int();");
}

#[test]
fn test_exit_handlers_run_before_state_change() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let go = sb.event("Go", PType::Int);
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let b = m.state("B");
    let exit_a = m.anon("exit_A", |fb| {
        fb.stmt(stmt::print(expr::string("leaving")));
    });
    m.exit(a, exit_a);
    m.on_goto(a, go, b);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "fn exit_current_state(&mut self) {");
    assert_contains(&out, "NodeState::A => self.exit_A(ProtocolEvent { name: ProtocolEventName::DefaultEvent, payload: PV::PValue::DefaultVal }),");
    assert_contains(
        &out,
        "ProtocolEventName::Go => {\n                    self.exit_current_state();\n                    self.goto_payload = Some(event.payload);\n                    self.common_data.current_state = NodeState::B;",
    );
    assert_contains(&out, "println!(\"<PrintLog> {}\", String::from(\"leaving\"));");
}

#[test]
fn test_named_handler_goes_through_wrapper() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let add = sb.event("Add", PType::Int);
    let mut m = sb.machine("Node");
    let total = m.field("total", PType::Int);
    let s = m.state("S");
    let handler = m.method("accumulate", PType::Null, |fb| {
        let amount = fb.param("amount", PType::Int);
        fb.stmt(stmt::assign(
            total.clone(),
            expr::binary(BinOp::Add, total.clone(), amount),
        ));
    });
    m.on_do(s, add, handler);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "fn accumulate(&mut self, mut amount: i32) {");
    assert_contains(&out, "self.total = (self.total + amount);");
    assert_contains(&out, "fn _accumulate(&mut self, event: ProtocolEvent) {");
    assert_contains(&out, "self.accumulate(event.payload.extract_int());");
    assert_contains(&out, "self._accumulate(event);");
}

#[test]
fn test_defer_and_ignore() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let later = sb.event("Later", PType::Null);
    let noise = sb.event("Noise", PType::Null);
    let mut m = sb.machine("Node");
    let s = m.state("S");
    m.on(s, later, StateAction::Defer);
    m.on(s, noise, StateAction::Ignore);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "NodeState::S => &[ProtocolEventName::Later],");
    assert_contains(&out, "ProtocolEventName::Noise => {\n                    self.default_function(event);");
    assert!(!out.contains("ProtocolEventName::Later => {"));
}

#[test]
fn test_push_and_pop() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let call = sb.event("Call", PType::Null);
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let b = m.state("B");
    m.on(a, call, StateAction::Push { target: b });
    let entry_b = m.anon("entry_B", |fb| {
        fb.stmt(Stmt::Pop);
    });
    m.entry(b, entry_b);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "self.common_data.push_state(NodeState::B);");
    assert_contains(&out, "self.common_data.pop_state();");
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_nothing_is_emitted_after_a_terminal_statement() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::goto(a));
        fb.stmt(stmt::print(expr::string("dead code")));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());
    assert!(!out.contains("dead code"));
}

#[test]
fn test_raise_redispatches_and_returns() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Null);
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::raise(expr::event(ping), vec![]));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());
    assert_contains(
        &out,
        "self.execute(ProtocolEvent { name: ProtocolEventName::Ping, payload: PV::PValue::DefaultVal });\n        return;",
    );
}

#[test]
fn test_send_boxes_payload() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Int);
    let mut m = sb.machine("Node");
    let peer = m.field("peer", PType::Machine);
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::send(peer.clone(), expr::event(ping), vec![expr::int(3)]));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());
    assert_contains(
        &out,
        "self.send_event(self.peer.clone(), ProtocolEvent { name: ProtocolEventName::Ping, payload: PV::PValue::Int(3) });",
    );
}

#[test]
fn test_always_failing_assert_ends_block() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::assert(expr::boolean(false), expr::string("never")));
        fb.stmt(stmt::print(expr::string("after")));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());
    assert_contains(
        &out,
        "panic!(\"Assertion Failed: {} (machine {:?})\", String::from(\"never\"), self.common_data.self_id);",
    );
    assert!(!out.contains("\"after\""));
}

#[test]
fn test_receive_blocks_for_expected_events() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Int);
    let mut m = sb.machine("Server");
    let wait = m.state("Wait");
    let entry = m.anon("entry_Wait", |fb| {
        fb.can_receive();
        let case = fb.receive_case(ping, |cb| {
            let n = cb.param("n", PType::Int);
            cb.stmt(stmt::print(n));
        });
        fb.stmt(Stmt::Receive(ReceiveStmt { cases: vec![case] }));
    });
    m.entry(wait, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, ".send(MP::MachineToConfigMsg::ExecuteResponse(MP::default_status()))");
    assert_contains(&out, "let PGEN_event_0 = match self.common_data.rx_config_to_machine.recv() {");
    assert_contains(&out, "Ok(MP::ConfigToMachineMsg::ExecuteRequest(PGEN_event_0)) => PGEN_event_0,");
    assert_contains(&out, "match PGEN_event_0.name {");
    assert_contains(&out, "let mut n: i32 = PGEN_event_0.payload.extract_int();");
    assert_contains(&out, "println!(\"<PrintLog> {}\", n);");
}

#[test]
fn test_receive_requires_capability() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Null);
    let mut m = sb.machine("Server");
    let wait = m.state("Wait");
    let entry = m.anon("entry_Wait", |fb| {
        let case = fb.receive_case(ping, |_| {});
        fb.stmt(Stmt::Receive(ReceiveStmt { cases: vec![case] }));
    });
    m.entry(wait, entry);
    m.finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::Internal(_)));
    assert_eq!(err.decl(), Some("Server"));
}

#[test]
fn test_sequence_insert_shifts_elements() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let items = m.field("items", PType::seq(PType::Int));
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(Stmt::Insert(InsertStmt {
            collection: items.clone(),
            index: expr::int(0),
            value: expr::int(7),
        }));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "items: HashMap<i32, PV::PValue>,");
    assert_contains(&out, "let PGEN_index_0: i32 = 0;");
    assert_contains(&out, "let PGEN_value_1 = PV::PValue::Int(7);");
    assert_contains(&out, "let mut PGEN_k_2 = self.items.len() as i32;");
    assert_contains(&out, "let PGEN_moved_3 = self.items.remove(&(PGEN_k_2 - 1)).unwrap_or(PV::PValue::DefaultVal);");
    assert_contains(&out, "self.items.insert(PGEN_index_0, PGEN_value_1);");
}

#[test]
fn test_sequence_remove_shifts_tail_down() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let items = m.field("items", PType::seq(PType::Int));
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(Stmt::Remove(RemoveStmt {
            collection: items.clone(),
            key: expr::int(1),
        }));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "let PGEN_index_0: i32 = 1;");
    assert_contains(&out, "let PGEN_len_1 = self.items.len() as i32;");
    assert_contains(&out, "self.items.remove(&PGEN_index_0);");
    assert_contains(&out, "let mut PGEN_k_2 = PGEN_index_0 + 1;");
    assert_contains(&out, "while PGEN_k_2 < PGEN_len_1 {");
    assert_contains(&out, "let PGEN_moved_3 = self.items.remove(&PGEN_k_2).unwrap_or(PV::PValue::DefaultVal);");
    assert_contains(&out, "self.items.insert(PGEN_k_2 - 1, PGEN_moved_3);");
    assert_contains(&out, "PGEN_k_2 += 1;");
}

#[test]
fn test_nested_element_store_writes_back() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let row = PType::named_tuple([("x", PType::Int)]);
    let mut m = sb.machine("Node");
    let rows = m.field("rows", PType::seq(row.clone()));
    let pair = m.field("pair", PType::Tuple(vec![PType::Int, PType::Int]));
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::assign(
            expr::field(expr::index(rows.clone(), expr::int(0)), "x", PType::Int),
            expr::int(5),
        ));
        fb.stmt(stmt::assign(
            Expr::new(
                ExprKind::TupleAccess {
                    tuple: Box::new(pair.clone()),
                    index: 1,
                },
                PType::Int,
            ),
            expr::int(3),
        ));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "let PGEN_value_0 = PV::PValue::Int(5);");
    assert_contains(&out, "let mut PGEN_inner_1 = self.rows[&(0)].extract_namedtuple();");
    assert_contains(&out, "PGEN_inner_1.insert(\"x\", PGEN_value_0);");
    assert_contains(&out, "let PGEN_index_2: i32 = 0;");
    assert_contains(&out, "let PGEN_value_3 = PV::PValue::NamedTuple(PGEN_inner_1);");
    assert_contains(&out, "self.rows.insert(PGEN_index_2, PGEN_value_3);");
    assert_contains(&out, "let PGEN_value_4 = PV::PValue::Int(3);");
    assert_contains(&out, "self.pair.insert(\"1\", PGEN_value_4);");
}

#[test]
fn test_equality_is_value_aware() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let row = PType::named_tuple([("x", PType::Int)]);
    let mut m = sb.machine("Node");
    let first = m.field("first", row.clone());
    let second = m.field("second", row);
    let label = m.field("label", PType::String);
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::if_else(
            expr::binary(BinOp::Eq, first.clone(), second.clone()),
            vec![stmt::print(expr::string("same"))],
            vec![],
        ));
        fb.stmt(stmt::if_else(
            expr::binary(BinOp::Ne, label.clone(), expr::string("idle")),
            vec![stmt::print(expr::string("busy"))],
            vec![],
        ));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(
        &out,
        "if PV::PValue::equals(&PV::PValue::NamedTuple(self.first.clone()), &PV::PValue::NamedTuple(self.second.clone())) {",
    );
    assert_contains(&out, "if (self.label.clone() != String::from(\"idle\")) {");
}

#[test]
fn test_null_comparison_matches_null_assignment() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let (peer_ty, _) = sb.interface("Peer", PType::Null, None);
    let mut m = sb.machine("Node");
    let peer = m.field("peer", PType::Machine);
    let worker = m.field("worker", peer_ty);
    let count = m.field("count", PType::Int);
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::assign(peer.clone(), expr::null()));
        let checks = [
            expr::binary(BinOp::Eq, peer.clone(), expr::null()),
            expr::binary(BinOp::Ne, worker.clone(), expr::null()),
            expr::binary(BinOp::Eq, count.clone(), expr::null()),
            expr::binary(BinOp::Ne, expr::null(), count.clone()),
        ];
        for check in checks {
            fb.stmt(stmt::if_else(check, vec![stmt::print(expr::string("hit"))], vec![]));
        }
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "self.peer = M::Index::dummy_index();");
    assert_contains(
        &out,
        "if PV::PValue::equals(&PV::PValue::Machine(self.peer.clone()), &PV::PValue::Machine(M::Index::dummy_index())) {",
    );
    assert_contains(
        &out,
        "if (!PV::PValue::equals(&PV::PValue::Machine(self.worker.clone()), &PV::PValue::Machine(M::Index::dummy_index()))) {",
    );
    assert_contains(&out, "if (self.count == 0) {");
    assert_contains(&out, "if (0 != self.count) {");
    assert!(!out.contains("&PV::PValue::DefaultVal)"));
}

#[test]
fn test_format_placeholders_are_rewritten() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let count = m.field("count", PType::Int);
    let peer = m.field("peer", PType::Machine);
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        let message = Expr::new(
            ExprKind::Format {
                base: "{1} has {0} {x}".into(),
                args: vec![count.clone(), peer.clone()],
            },
            PType::String,
        );
        fb.stmt(stmt::print(message));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(
        &out,
        "println!(\"<PrintLog> {}\", format!(\"{:?} has {} {{x}}\", self.peer.clone(), self.count));",
    );
}

#[test]
fn test_format_placeholder_without_argument_fails() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let count = m.field("count", PType::Int);
    let a = m.state("A");
    let entry = m.anon("entry_A", |fb| {
        let message = Expr::new(
            ExprKind::Format {
                base: "{0} then {2}".into(),
                args: vec![count.clone()],
            },
            PType::String,
        );
        fb.stmt(stmt::print(message));
    });
    m.entry(a, entry);
    m.finish();
    let err = gen_err(&sb.finish());

    assert!(matches!(err.root(), CodegenError::Internal(_)));
    assert!(err.to_string().contains("format placeholder {2} has no argument"));
}

#[test]
fn test_int_widens_to_float() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let count = m.field("count", PType::Int);
    let ratio = m.field("ratio", PType::Float);
    let a = m.state("A");
    let scale = m.method("scale", PType::Null, |fb| {
        fb.param("factor", PType::Float);
    });
    let entry = m.anon("entry_A", |fb| {
        fb.stmt(stmt::assign(ratio.clone(), count.clone()));
        fb.stmt(stmt::call(scale, vec![expr::int(2)]));
    });
    m.entry(a, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "self.ratio = (self.count as f64);");
    assert_contains(&out, "self.scale((2 as f64));");
}

#[test]
fn test_free_function_takes_calling_machine() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let add = sb.function("add", PType::Int, |fb| {
        let a = fb.param("a", PType::Int);
        let b = fb.param("b", PType::Int);
        fb.stmt(stmt::ret(Some(expr::binary(BinOp::Add, a, b))));
    });
    let mut m = sb.machine("Node");
    let count = m.field("count", PType::Int);
    let s = m.state("S");
    let entry = m.anon("entry_S", |fb| {
        fb.stmt(stmt::assign(
            count.clone(),
            expr::call(add, vec![count.clone(), expr::int(1)], PType::Int),
        ));
    });
    m.entry(s, entry);
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "pub mod global_functions {\n    use super::*;");
    assert_contains(
        &out,
        "pub fn add(mut a: i32, mut b: i32, current_machine: &mut dyn PStateMachine<Event = ProtocolEvent>) -> i32 {\n        return (a + b);",
    );
    assert_contains(&out, "self.count = global_functions::add(self.count, 1, self);");
}

#[test]
fn test_value_function_gets_unreachable_guard() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    sb.function("pick", PType::Int, |fb| {
        let flag = fb.param("flag", PType::Bool);
        fb.stmt(stmt::if_else(flag, vec![stmt::ret(Some(expr::int(1)))], vec![]));
    });
    let out = gen(&sb.finish());
    assert_contains(&out, "if flag {\n            return 1;\n        }");
    assert_contains(&out, "unreachable!(\"pick ended without returning a value\");");
}

// ══════════════════════════════════════════════════════════════════════════════
// Monitors
// ══════════════════════════════════════════════════════════════════════════════

fn liveness_monitor() -> (ScopeBuilder, DeclId) {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let bump = sb.event("Bump", PType::Null);
    let mut spec = sb.monitor("Liveness");
    let idle = spec.state("Idle");
    let busy = spec.state("Busy");
    spec.temperature(busy, Temperature::Hot);
    spec.temperature(idle, Temperature::Cold);
    spec.on_goto(idle, bump, busy);
    spec.on_goto(busy, bump, idle);
    spec.observes(&[bump]);
    let id = spec.finish();
    (sb, id)
}

fn monitor_scope() -> Scope {
    liveness_monitor().0.finish()
}

#[test]
fn test_monitor_lowering() {
    let out = gen(&monitor_scope());
    assert_contains(&out, "pub enum MonitorTemperature {");
    assert_contains(&out, "LivenessState::Busy => MonitorTemperature::Hot,");
    assert_contains(&out, "LivenessState::Idle => MonitorTemperature::Cold,");
    assert_contains(&out, "pub struct Liveness {\n    current_state: LivenessState,\n}");
    assert_contains(&out, "pub fn observes() -> &'static [ProtocolEventName] {\n        &[ProtocolEventName::Bump]");
    assert_contains(&out, "pub fn observe(&mut self, event: ProtocolEvent) {");
    assert_contains(&out, "self.current_state = LivenessState::Busy;");
    assert_contains(
        &out,
        "self.observe(ProtocolEvent { name: ProtocolEventName::DefaultEvent, payload: event.payload });",
    );
    assert_contains(&out, "self.temperature() == MonitorTemperature::Hot");
}

#[test]
fn test_monitor_is_not_creatable() {
    let out = gen(&monitor_scope());
    assert!(!out.contains("\"Liveness\" =>"));
    assert!(!out.contains("impl PStateMachine for Liveness"));
}

#[test]
fn test_monitor_cannot_send() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Null);
    let mut spec = sb.monitor("Watcher");
    let s = spec.state("S");
    let entry = spec.anon("entry_S", |fb| {
        fb.stmt(stmt::send(expr::this(), expr::event(ping), vec![]));
    });
    spec.entry(s, entry);
    spec.finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::Unsupported { .. }));
    assert_eq!(err.decl(), Some("Watcher"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Bootstrap Modules
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_implementation_module() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut b = sb.machine("B");
    b.state("Start");
    let bid = b.finish();
    let mut a = sb.machine("A");
    a.state("Start");
    let aid = a.finish();
    let (_, iface) = sb.interface("I_B", PType::Null, Some(bid));
    let mut module = sb.module("Impl", Some(aid));
    module.link_map.push(LinkEntry {
        creator: aid,
        requested: iface,
        bound: iface,
    });
    module.interface_definitions.push(InterfaceBinding {
        interface: iface,
        machine: bid,
    });
    sb.push(Decl::Implementation(module));
    let out = gen(&sb.finish());

    assert_contains(&out, "pub mod Impl {\n    use super::*;");
    assert_contains(&out, "link_map.entry(\"A\").or_default().insert(\"I_B\", \"I_B\");");
    assert_contains(&out, "interface_definitions.insert(\"I_B\", \"B\");");
    assert_contains(&out, "pub const MAIN: &str = \"A\";");
    assert_contains(&out, "create_new_machine(MAIN, PV::PValue::DefaultVal)");
}

#[test]
fn test_safety_test_monitor_tables() {
    let (mut sb, monitor) = liveness_monitor();
    let mut module = sb.module("Check", None);
    module.monitor_map.push(MonitorBinding {
        monitor,
        interfaces: vec![],
    });
    sb.push(Decl::SafetyTest(module));
    let out = gen(&sb.finish());

    assert_contains(&out, "monitor_observes.insert(\"Liveness\", vec![ProtocolEventName::Bump]);");
    assert_contains(&out, "monitor_map.insert(\"Liveness\", vec![]);");
    assert!(!out.contains("pub const MAIN"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_any_field_fails_whole_job() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Bad");
    m.field("blob", PType::Any);
    m.state("S");
    m.finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::Unsupported { .. }));
    assert_eq!(err.decl(), Some("Bad"));
    assert!(err.to_string().contains("(in machine Bad)"));
}

#[test]
fn test_missing_start_state_is_reported() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    sb.machine("Hollow").finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::MissingStartState(name) if name == "Hollow"));
}

#[test]
fn test_entry_and_null_handler_conflict() {
    let (mut sb, null, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let s = m.state("S");
    let entry = m.anon("entry_S", |_| {});
    m.entry(s, entry);
    m.on(s, null, StateAction::Ignore);
    m.finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::Unsupported { .. }));
}

#[test]
fn test_unknown_event_reference_is_unresolved() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Node");
    let s = m.state("S");
    let entry = m.anon("entry_S", |fb| {
        fb.stmt(stmt::raise(expr::event(DeclId(999)), vec![]));
    });
    m.entry(s, entry);
    m.finish();
    let err = gen_err(&sb.finish());
    assert!(matches!(err.root(), CodegenError::UnresolvedSymbol(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism & Naming
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_generation_is_deterministic() {
    let first = gen(&counter_scope());
    for _ in 0..5 {
        assert_eq!(gen(&counter_scope()), first);
    }
}

#[test]
fn test_colliding_source_names_stay_distinct() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    sb.event("ProtocolEvent", PType::Null);
    let mut m = sb.machine("type");
    m.field("self", PType::Int);
    m.field("common_data", PType::Int);
    m.state("S");
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "ProtocolEvent_1,");
    assert_contains(&out, "pub struct type_1 {");
    assert_contains(&out, "self_1: i32,");
    assert_contains(&out, "common_data_1: i32,");
    assert_contains(&out, "common_data: MD::CommonMachineData<ProtocolEvent, type_1State>,");
}

#[test]
fn test_prelude_names_are_not_shadowed() {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Ok");
    m.state("S");
    m.finish();
    let out = gen(&sb.finish());

    assert_contains(&out, "pub struct Ok_1 {");
    assert!(!out.contains("pub struct Ok {"));
    assert_contains(&out, "Ok(MP::ConfigToMachineMsg::ExecuteRequest(event)) => {");
}

#[test]
fn test_options_load_from_json() {
    let options: CodegenOptions = serde_json::from_str(r#"{"project_name": "pingpong"}"#).unwrap();
    assert_eq!(options, CodegenOptions::new("pingpong"));
    assert_eq!(options.runtime_crate, "amzn_p_rust");
    assert_eq!(options.global_functions_module, "global_functions");
}
