//! Declaration Emitter: assembles one generated Rust file from a scope.
//!
//! The file is laid out as:
//!
//! 1. header comment and prologue (lint allowances, runtime imports)
//! 2. the event block
//! 3. `MonitorTemperature`, when any monitor exists
//! 4. the free-function module
//! 5. every other top-level declaration, in source order
//! 6. `create_new_machine`
//!
//! Generation is all-or-nothing. The first error aborts the job, tagged with
//! the declaration it was raised in.

use log::{debug, trace, warn};

use pgen_types::ast::*;

use crate::context::{CodeWriter, CodegenOptions, EmitContext, FuncScope};
use crate::error::CodegenResult;
use crate::harness::emit_module;
use crate::machine::emit_machine;
use crate::monitor::emit_monitor;
use crate::runtime::*;
use crate::states::emit_temperature_enum;
use crate::stmt::emit_body;
use crate::types::*;

const LINT_ALLOWANCES: &str = "#![allow(dead_code, non_camel_case_types, non_snake_case, unused_imports, unused_mut, unused_variables, unreachable_code, unreachable_patterns)]";

/// Generate the Rust source for `scope`.
pub fn generate(scope: &Scope, options: CodegenOptions) -> CodegenResult<String> {
    let mut ctx = EmitContext::new(scope, options)?;
    let mut w = CodeWriter::new();

    emit_prologue(&ctx, &mut w);
    w.blank();
    emit_events(&mut ctx, &mut w)?;

    if scope.machines().any(|m| m.is_spec) {
        w.blank();
        emit_temperature_enum(&mut w);
    }

    w.blank();
    emit_global_functions(&mut ctx, &mut w)?;

    for decl in &scope.decls {
        emit_decl(decl, &mut ctx, &mut w).map_err(|e| e.in_decl(decl.kind(), decl.name(), decl.span()))?;
    }

    w.blank();
    emit_create_new_machine(&ctx, &mut w)?;
    Ok(w.finish())
}

fn emit_prologue(ctx: &EmitContext<'_>, w: &mut CodeWriter) {
    let options = &ctx.options;
    w.line(format!("// Generated code for project {}.", options.project_name));
    w.line(format!("// Dependencies: {}", options.dependencies().join(", ")));
    w.line(LINT_ALLOWANCES);
    w.blank();

    let runtime = &options.runtime_crate;
    for (module, alias) in [MOD_COMMON_DATA, MOD_INDEX, MOD_MESSAGES, MOD_EVENT] {
        w.line(format!("use {runtime}::{module} as {alias};"));
    }
    w.line(format!("use {runtime}::{MACHINE_TRAIT_PATH};"));
    w.line(format!("use {runtime}::{} as {};", MOD_VALUE.0, MOD_VALUE.1));
    w.line(format!("use {runtime}::{CLONABLE_PATH};"));
    w.line("use std::collections::HashMap;");
    w.line("use std::sync::mpsc;");
    w.line("use std::thread;");
}

// ══════════════════════════════════════════════════════════════════════════════
// Events
// ══════════════════════════════════════════════════════════════════════════════

fn emit_events(ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let scope = ctx.scope;
    let user_events: Vec<&EventDecl> = scope.events().filter(|e| e.builtin.is_none()).collect();

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
    w.line(format!("pub enum {EVENT_NAME_TYPE} {{"));
    w.line(format!("{DEFAULT_EVENT},"));
    w.line(format!("{HALT_EVENT},"));
    for event in &user_events {
        w.line(format!("{},", ctx.name(event.id)?));
    }
    w.line("}");
    w.blank();

    w.line("#[derive(Debug, Clone)]");
    w.line(format!("pub struct {EVENT_TYPE} {{"));
    w.line(format!("pub name: {EVENT_NAME_TYPE},"));
    w.line(format!("pub payload: {VALUE_TYPE},"));
    w.line("}");
    w.blank();

    w.line(format!("impl EV::PEvent for {EVENT_TYPE} {{"));
    w.line("fn default() -> Self {");
    w.line(default_event(VALUE_DEFAULT));
    w.line("}");
    w.line("}");

    if user_events.is_empty() {
        return Ok(());
    }
    w.blank();
    w.line(format!("impl {EVENT_TYPE} {{"));
    let mut first = true;
    for event in user_events {
        let name = ctx.name(event.id)?;
        let variant = event_variant(&name);
        let (params, payload) = if event.payload.is_null() {
            (String::new(), VALUE_DEFAULT.to_string())
        } else {
            match box_value(&event.payload, "payload") {
                Ok(boxed) => (format!("payload: {}", map_type(&event.payload)?), boxed),
                Err(e) => {
                    debug!("no typed constructor for event {}: {e}", event.name);
                    continue;
                }
            }
        };
        if !first {
            w.blank();
        }
        first = false;
        let ctor = ctx.names.derived(event.id, &name, "new_", "");
        w.line(format!("pub fn {ctor}({params}) -> Self {{"));
        w.line(event_literal(&variant, &payload));
        w.line("}");
    }
    w.line("}");
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Free Functions
// ══════════════════════════════════════════════════════════════════════════════

fn emit_global_functions(ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let module = ctx.options.global_functions_module.clone();
    w.line(format!("pub mod {module} {{"));
    w.line("use super::*;");
    let scope = ctx.scope;
    let functions: Vec<&FunctionDecl> = scope
        .decls
        .iter()
        .filter_map(|d| match d {
            Decl::Function(f) if f.owner.is_none() => Some(f),
            _ => None,
        })
        .collect();
    for f in functions {
        if f.is_foreign {
            warn!("skipping foreign function {}", f.name);
            continue;
        }
        w.blank();
        emit_free_function(f, ctx, w).map_err(|e| e.in_decl("function", &f.name, f.span))?;
    }
    w.line("}");
    Ok(())
}

fn emit_free_function(f: &FunctionDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    trace!("lowering free function {}", f.name);
    let fs = FuncScope::free(f);
    let mut params = Vec::with_capacity(f.params.len() + 1);
    for p in &f.params {
        params.push(format!("mut {}: {}", ctx.name(p.id)?, map_type(&p.ty)?));
    }
    params.push(format!("{CURRENT_MACHINE}: &mut dyn {MACHINE_TRAIT}<Event = {EVENT_TYPE}>"));
    w.line(format!(
        "pub fn {}({}){} {{",
        ctx.name(f.id)?,
        params.join(", "),
        return_suffix(&f.return_type)?
    ));
    emit_body(ctx, &fs, w)?;
    w.line("}");
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

fn emit_decl(decl: &Decl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    match decl {
        // Events are emitted as one block; free functions live in their module.
        Decl::Event(_) | Decl::Function(_) => Ok(()),
        Decl::Enum(_) | Decl::EnumElem(_) | Decl::Interface(_) => Ok(()),
        Decl::TypeDef(t) => {
            match map_type(&t.ty) {
                Ok(rust) => {
                    debug!("emitting type alias {}", t.name);
                    w.blank();
                    w.line(format!("pub type {} = {rust};", ctx.name(t.id)?));
                }
                Err(e) => warn!("skipping type definition {}: {e}", t.name),
            }
            Ok(())
        }
        Decl::Machine(m) if m.is_spec => {
            debug!("emitting monitor {}", m.name);
            w.blank();
            emit_monitor(m, ctx, w)
        }
        Decl::Machine(m) => {
            debug!("emitting machine {}", m.name);
            w.blank();
            emit_machine(m, ctx, w)
        }
        Decl::Implementation(module) | Decl::SafetyTest(module) => {
            debug!("emitting bootstrap module {}", module.name);
            w.blank();
            emit_module(module, ctx, w)
        }
    }
}

/// `create_new_machine`: spawn a machine task by name.
fn emit_create_new_machine(ctx: &EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    w.line(format!(
        "pub fn {CREATE_FN}(name: &'static str, args: {VALUE_TYPE}) -> MP::Machine<{EVENT_TYPE}> {{"
    ));
    w.line("let (tx_machine_to_config, rx_machine_to_config) = mpsc::channel();");
    w.line("let (tx_config_to_machine, rx_config_to_machine) = mpsc::channel();");
    w.line("let thread_handle = thread::spawn(move || {");
    w.line(format!(
        "let mut state_machine: Box<dyn {MACHINE_TRAIT}<Event = {EVENT_TYPE}>> = match name {{"
    ));
    for machine in ctx.scope.machines().filter(|m| !m.is_spec) {
        let name = ctx.name(machine.id)?;
        w.line(format!(
            "{name:?} => {name}::new(tx_machine_to_config, rx_config_to_machine, args),"
        ));
    }
    w.line("_ => panic!(\"Unrecognized machine name {}\", name),");
    w.line("};");
    w.line("state_machine.add_to_config();");
    w.line("state_machine.answer_requests();");
    w.line("});");
    w.line("MP::Machine {");
    w.line("thread_handle,");
    w.line("tx_config_to_machine,");
    w.line("rx_machine_to_config,");
    w.line(format!("execute_status: {STATUS_CONTINUE},"));
    w.line("}");
    w.line("}");
    Ok(())
}
