//! End-to-end pipeline tests.
//!
//! Tests validate:
//! - A job over a ping-pong scope produces `<project_name>.rs`
//! - Results carry a stable SHA-256 fingerprint
//! - Failures name the construct, the declaration and its position, with no files
//! - JSON input for both the scope and the job
//! - Independent jobs do not observe each other

use pgen_compiler::{
    compile, compile_json, compile_to_result, fingerprint, load_scope, CompilationJob,
    CompileError, CompileResult,
};
use pgen_types::ast::*;
use pgen_types::builder::{expr, stmt, ScopeBuilder};
use pgen_types::{PType, Span};
use std::thread;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// `Client` creates a `Server` and pings it; the server answers with `Pong`.
fn ping_pong() -> Scope {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let ping = sb.event("Ping", PType::Machine);
    let pong = sb.event("Pong", PType::Null);

    let mut server = sb.machine("Server");
    let wait = server.state("WaitPing");
    let on_ping = server.anon("on_Ping", |fb| {
        let client = fb.param("client", PType::Machine);
        fb.stmt(stmt::send(client, expr::event(pong), vec![]));
    });
    server.on_do(wait, ping, on_ping);
    let server_id = server.finish();

    let mut client = sb.machine("Client");
    let peer = client.field("server", PType::Machine);
    let init = client.state("Init");
    let done = client.state("Done");
    let entry = client.anon("entry_Init", |fb| {
        fb.stmt(stmt::assign(peer.clone(), expr::ctor(server_id, vec![])));
        fb.stmt(stmt::send(peer.clone(), expr::event(ping), vec![expr::this()]));
    });
    client.entry(init, entry);
    client.on_goto(init, pong, done);
    let client_id = client.finish();

    let module = sb.module("PingPong", Some(client_id));
    sb.push(Decl::Implementation(module));
    sb.finish()
}

fn broken() -> Scope {
    let (mut sb, _, _) = ScopeBuilder::with_builtins();
    let mut m = sb.machine("Ledger");
    m.field("accounts", PType::Map(Box::new(PType::Int), Box::new(PType::Int)));
    m.state("Open");
    m.finish();
    sb.finish()
}

fn job() -> CompilationJob {
    CompilationJob::new("pingpong")
}

// ══════════════════════════════════════════════════════════════════════════════
// Successful Jobs
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_job_produces_project_file() {
    let file = compile(&ping_pong(), &job()).unwrap();
    assert_eq!(file.name, "pingpong.rs");
    assert!(file.contents.starts_with("// Generated code for project pingpong."));
    assert!(file.contents.contains("pub struct Server {"));
    assert!(file.contents.contains("pub struct Client {"));
    assert!(file.contents.contains("pub mod PingPong {"));
    assert!(file.contents.contains("pub const MAIN: &str = \"Client\";"));
}

#[test]
fn test_send_and_create_are_lowered() {
    let contents = compile(&ping_pong(), &job()).unwrap().contents;
    assert!(contents.contains("self.server = self.create_machine(\"Server\", PV::PValue::DefaultVal);"));
    assert!(contents.contains(
        "self.send_event(self.server.clone(), ProtocolEvent { name: ProtocolEventName::Ping, payload: PV::PValue::Machine(self.index()) });"
    ));
    assert!(contents.contains("let mut client: M::Index = event.payload.extract_machine();"));
}

#[test]
fn test_result_carries_fingerprint() {
    let result = compile_to_result(&ping_pong(), &job());
    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.files.len(), 1);
    let hash = result.output_hash.unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, fingerprint(&result.files[0].contents));
}

#[test]
fn test_repeated_jobs_are_identical() {
    let first = compile_to_result(&ping_pong(), &job());
    for _ in 0..3 {
        let again = compile_to_result(&ping_pong(), &job());
        assert_eq!(again.output_hash, first.output_hash);
        assert_eq!(again.files, first.files);
    }
}

#[test]
fn test_parallel_jobs_do_not_interfere() {
    let expected = compile_to_result(&ping_pong(), &job()).output_hash;
    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| compile_to_result(&ping_pong(), &job()).output_hash))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_job_settings_reach_the_output() {
    let mut job = CompilationJob::new("elevator");
    job.project_dependencies = vec!["core".into()];
    job.runtime_crate = "p_runtime".into();
    let contents = compile(&ping_pong(), &job).unwrap().contents;
    assert!(contents.contains("// Dependencies: core"));
    assert!(contents.contains("use p_runtime::message_passing as MP;"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Failures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_failure_returns_no_files() {
    let result = compile_to_result(&broken(), &job());
    assert!(!result.success);
    assert!(result.files.is_empty());
    assert!(result.output_hash.is_none());
    let error = result.error.unwrap();
    assert_eq!(error.kind, "unsupported");
    assert_eq!(error.decl.as_deref(), Some("Ledger"));
    assert_eq!(error.span, None);
    assert!(error.message.contains("(in machine Ledger)"));
}

#[test]
fn test_failure_reports_declaration_position() {
    let mut scope = broken();
    for decl in &mut scope.decls {
        if let Decl::Machine(m) = decl {
            m.span = Span::new(14, 1);
        }
    }
    let error = compile_to_result(&scope, &job()).error.unwrap();
    assert_eq!(error.span, Some(Span::new(14, 1)));
    assert!(error.message.ends_with("(in machine Ledger at 14:1)"));
}

#[test]
fn test_compile_error_wraps_codegen() {
    match compile(&broken(), &job()) {
        Err(CompileError::Codegen(e)) => assert_eq!(e.decl(), Some("Ledger")),
        other => panic!("expected a codegen error, got {other:?}"),
    }
}

#[test]
fn test_bad_job_json_is_reported() {
    let scope_json = serde_json::to_string(&ping_pong()).unwrap();
    let result = compile_json(&scope_json, r#"{"dependencies": []}"#);
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, "invalid_job");
}

// ══════════════════════════════════════════════════════════════════════════════
// JSON Input
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_json_inputs_match_direct_job() {
    let scope_json = serde_json::to_string(&ping_pong()).unwrap();
    let from_json = compile_json(&scope_json, r#"{"project_name": "pingpong"}"#);
    let direct = compile_to_result(&ping_pong(), &job());
    assert_eq!(from_json, direct);
}

#[test]
fn test_load_scope_rejects_unknown_declaration() {
    let err = load_scope(r#"{"decls": [{"widget": {}}]}"#).unwrap_err();
    assert!(matches!(err, CompileError::Scope(_)));
}

#[test]
fn test_result_serializes_to_json() {
    let result = compile_to_result(&broken(), &job());
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"success\":false"));
    let back: CompileResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
