//! Statement code generation.
//!
//! Each `emit_*` function writes complete Rust statements and reports whether
//! the statement terminates its block. `goto`, `raise`, `return`, `pop`,
//! `break`, `continue` and a literal-false `assert` terminate; once one has
//! been written, nothing else in that block is emitted.

use pgen_types::ast::*;
use pgen_types::ty::PType;

use crate::context::{CodeWriter, EmitContext, FnKind, FuncScope};
use crate::error::{CodegenError, CodegenResult};
use crate::expr::*;
use crate::runtime::*;
use crate::types::*;

/// Emit a slice of statements, stopping after the first terminal one.
pub fn emit_block(
    stmts: &[Stmt],
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<bool> {
    for stmt in stmts {
        if emit_stmt(stmt, ctx, fs, w)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Emit a single statement. Returns `true` when control cannot fall through.
pub fn emit_stmt(
    stmt: &Stmt,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<bool> {
    match stmt {
        Stmt::Announce(a) => emit_announce(a, ctx, fs, w).map(|_| false),
        Stmt::Assert(a) => emit_assert(a, ctx, fs, w),
        Stmt::Assign(a) => {
            let value = emit_expr_as(&a.value, &a.location.ty, ctx, fs)?;
            emit_store(&a.location, value, ctx, fs, w)?;
            Ok(false)
        }
        Stmt::Compound(body) => {
            w.line("{");
            let terminated = emit_block(body, ctx, fs, w)?;
            w.line("}");
            Ok(terminated)
        }
        Stmt::Ctor(c) => {
            w.line(format!("{};", emit_create(c.interface, &c.args, ctx, fs)?));
            Ok(false)
        }
        Stmt::Call(c) => {
            let call = emit_call(c.function, &c.args, ctx, fs)?;
            if ctx.function(c.function)?.return_type.is_null() {
                w.line(format!("{call};"));
            } else {
                w.line(format!("let _ = {call};"));
            }
            Ok(false)
        }
        Stmt::Goto(g) => emit_goto(g, ctx, fs, w),
        Stmt::If(i) => emit_if(i, ctx, fs, w),
        Stmt::Add(a) => Err(CodegenError::unsupported(
            "add",
            format!("adding to {} is not available in the Rust target", a.collection.ty),
        )),
        Stmt::Insert(i) => emit_insert(i, ctx, fs, w).map(|_| false),
        Stmt::MoveAssign(m) => {
            let value = emit_move(m.from, ctx, fs)?;
            emit_store(&m.location, value, ctx, fs, w)?;
            Ok(false)
        }
        Stmt::Nop => Ok(false),
        Stmt::Pop => emit_pop(ctx, fs, w),
        Stmt::Print(p) => {
            let message = emit_expr(&p.message, ctx, fs)?;
            let spec = if is_displayable(&p.message.ty) { "{}" } else { "{:?}" };
            w.line(format!("println!(\"<PrintLog> {spec}\", {message});"));
            Ok(false)
        }
        Stmt::Raise(r) => emit_raise(r, ctx, fs, w),
        Stmt::Receive(r) => emit_receive(r, ctx, fs, w),
        Stmt::Remove(r) => emit_remove(r, ctx, fs, w).map(|_| false),
        Stmt::Return(r) => {
            match (&r.value, fs.returns_value()) {
                (Some(value), true) => {
                    let value = emit_expr_as(value, &fs.function.return_type, ctx, fs)?;
                    w.line(format!("return {value};"));
                }
                _ => w.line(return_line(fs)?),
            }
            Ok(true)
        }
        Stmt::Break => {
            w.line("break;");
            Ok(true)
        }
        Stmt::Continue => {
            w.line("continue;");
            Ok(true)
        }
        Stmt::Send(s) => emit_send(s, ctx, fs, w).map(|_| false),
        Stmt::SwapAssign(_) => Err(CodegenError::unsupported(
            "swap-assign",
            "swapped references have no lowering in the Rust target",
        )),
        Stmt::While(wh) => {
            let condition = emit_expr(&wh.condition, ctx, fs)?;
            w.line(format!("while {condition} {{"));
            emit_block(&wh.body, ctx, fs, w)?;
            w.line("}");
            Ok(false)
        }
    }
}

/// `return;` or `return <default>;` for the enclosing function.
pub fn return_line(fs: &FuncScope<'_>) -> CodegenResult<String> {
    if fs.returns_value() {
        Ok(format!("return {};", default_value(&fs.function.return_type)?))
    } else {
        Ok("return;".to_string())
    }
}

/// `let mut x: T = <default>;` for each local.
pub fn declare_locals(locals: &[Variable], ctx: &EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    for local in locals {
        w.line(format!(
            "let mut {}: {} = {};",
            ctx.name(local.id)?,
            map_type(&local.ty)?,
            default_value(&local.ty)?
        ));
    }
    Ok(())
}

/// Bind the payload carried by `event` to the handler's only parameter.
pub fn bind_payload(
    function: &FunctionDecl,
    event: &str,
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    match function.params.as_slice() {
        [] => Ok(()),
        [param] => {
            let name = ctx.name(param.id)?;
            if param.ty.is_null() {
                w.line(format!("let mut {name}: () = ();"));
            } else {
                w.line(format!(
                    "let mut {name}: {} = {};",
                    map_type(&param.ty)?,
                    unbox_value(&param.ty, &format!("{event}.payload"))?
                ));
            }
            Ok(())
        }
        _ => Err(CodegenError::internal(format!(
            "handler {} takes more than one payload parameter",
            function.name
        ))),
    }
}

/// Locals, body and, for value-returning functions that can fall off the
/// end, an `unreachable!` guard.
pub fn emit_body(ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    declare_locals(&fs.function.locals, ctx, w)?;
    let terminated = emit_block(&fs.function.body, ctx, fs, w)?;
    if !terminated && fs.returns_value() {
        w.line(format!(
            "unreachable!(\"{} ended without returning a value\");",
            ctx.name(fs.function.id)?
        ));
    }
    Ok(())
}

fn emit_exit(fs: &FuncScope<'_>, w: &mut CodeWriter) {
    if fs.has_exits() {
        w.line(format!("self.{EXIT_FN}();"));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Control Flow
// ══════════════════════════════════════════════════════════════════════════════

fn emit_if(i: &IfStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    let condition = emit_expr(&i.condition, ctx, fs)?;
    w.line(format!("if {condition} {{"));
    let then_terminated = emit_block(&i.then_branch, ctx, fs, w)?;
    if i.else_branch.is_empty() {
        w.line("}");
        return Ok(false);
    }
    w.line("} else {");
    let else_terminated = emit_block(&i.else_branch, ctx, fs, w)?;
    w.line("}");
    Ok(then_terminated && else_terminated)
}

/// Change state and end the step. The payload, if any, is held for the
/// target state's entry handler.
fn emit_goto(g: &GotoStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    let machine = match (fs.kind, fs.machine) {
        (FnKind::Free, _) | (_, None) => {
            return Err(CodegenError::internal(format!(
                "goto in {}, which does not belong to a machine",
                fs.function.name
            )))
        }
        (_, Some(machine)) => machine,
    };
    let target = ctx.state_path(machine.id, g.state)?;
    let payload = match &g.payload {
        Some(p) => {
            let tmp = ctx.names.fresh_temp("payload");
            w.line(format!("let {tmp} = {};", emit_boxed(p, ctx, fs)?));
            Some(tmp)
        }
        None => None,
    };
    emit_exit(fs, w);

    if fs.is_monitor() {
        let payload = payload.unwrap_or_else(|| VALUE_DEFAULT.to_string());
        w.line(format!("{} = {target};", fs.state_place()));
        w.line(format!("self.{OBSERVE_FN}({});", default_event(&payload)));
    } else {
        match payload {
            Some(tmp) => w.line(format!("self.{GOTO_PAYLOAD} = Some({tmp});")),
            None => w.line(format!("self.{GOTO_PAYLOAD} = None;")),
        }
        w.line(format!("{} = {target};", fs.state_place()));
        w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_CONTINUE};"));
    }
    w.line(return_line(fs)?);
    Ok(true)
}

/// Re-dispatch the raised event immediately, then end the step.
fn emit_raise(r: &RaiseStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    let event = emit_expr(&r.event, ctx, fs)?;
    let payload = emit_payload(&r.args, ctx, fs)?;
    let literal = event_literal(&event, &payload);
    match fs.kind {
        FnKind::Method => w.line(format!("self.execute({literal});")),
        FnKind::Free => w.line(format!("{CURRENT_MACHINE}.execute({literal});")),
        FnKind::Monitor => w.line(format!("self.{OBSERVE_FN}({literal});")),
    }
    w.line(return_line(fs)?);
    Ok(true)
}

fn emit_pop(ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    match fs.kind {
        FnKind::Method => {}
        FnKind::Monitor => {
            return Err(CodegenError::unsupported("pop", "monitors have no state stack"))
        }
        FnKind::Free => {
            return Err(CodegenError::internal(format!(
                "pop in free function {}",
                ctx.name(fs.function.id)?
            )))
        }
    }
    emit_exit(fs, w);
    w.line(format!("self.{COMMON_DATA}.pop_state();"));
    w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_CONTINUE};"));
    w.line(return_line(fs)?);
    Ok(true)
}

// ══════════════════════════════════════════════════════════════════════════════
// Communication
// ══════════════════════════════════════════════════════════════════════════════

fn emit_send(s: &SendStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    if fs.is_monitor() {
        return Err(CodegenError::unsupported("send", "monitors cannot send events"));
    }
    let target = emit_expr(&s.target, ctx, fs)?;
    let event = emit_expr(&s.event, ctx, fs)?;
    let payload = emit_payload(&s.args, ctx, fs)?;
    w.line(format!(
        "{}.send_event({target}, {});",
        fs.receiver(),
        event_literal(&event, &payload)
    ));
    Ok(())
}

fn emit_announce(a: &AnnounceStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    if fs.is_monitor() {
        return Err(CodegenError::unsupported("announce", "monitors cannot announce events"));
    }
    let event = emit_expr(&a.event, ctx, fs)?;
    let payload = match &a.payload {
        Some(p) => emit_boxed(p, ctx, fs)?,
        None => VALUE_DEFAULT.to_string(),
    };
    w.line(format!("{ANNOUNCE}({});", event_literal(&event, &payload)));
    Ok(())
}

/// Block until the coordinator delivers one of the awaited events.
///
/// The machine first reports its step as finished, then waits on its
/// request channel; the next execute request carries the event.
fn emit_receive(r: &ReceiveStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    match fs.kind {
        FnKind::Method => {}
        FnKind::Monitor => {
            return Err(CodegenError::unsupported("receive", "monitors cannot block"))
        }
        FnKind::Free => {
            return Err(CodegenError::internal(format!(
                "receive in free function {}",
                fs.function.name
            )))
        }
    }
    if !fs.function.can_receive {
        return Err(CodegenError::internal(format!(
            "receive in {}, which is not marked as able to receive",
            fs.function.name
        )));
    }

    let event = ctx.names.fresh_temp("event");
    w.line(format!("self.{COMMON_DATA}"));
    w.line(".tx_machine_to_config");
    w.line(format!(".send({MSG_EXECUTE_RESPONSE}({STATUS_DEFAULT}))"));
    w.line(".expect(\"coordinator hung up during receive\");");
    w.line(format!(
        "let {event} = match self.{COMMON_DATA}.rx_config_to_machine.recv() {{"
    ));
    w.line(format!("Ok({MSG_EXECUTE_REQUEST}({event})) => {event},"));
    w.line(format!("_ => panic!(\"machine {{:?}} expected an event while blocked in receive\", {SELF_ID}),"));
    w.line("};");

    w.line(format!("match {event}.name {{"));
    let mut all_terminated = !r.cases.is_empty();
    for case in &r.cases {
        ctx.event(case.event)?;
        w.line(format!("{} => {{", event_variant(&ctx.name(case.event)?)));
        bind_payload(&case.handler, &event, ctx, w)?;
        declare_locals(&case.handler.locals, ctx, w)?;
        all_terminated &= emit_block(&case.handler.body, ctx, fs, w)?;
        w.line("}");
    }
    w.line(format!(
        "_ => panic!(\"machine {{:?}} received unexpected event {{:?}} in receive\", {SELF_ID}, {event}.name),"
    ));
    w.line("}");
    Ok(all_terminated)
}

fn emit_assert(a: &AssertStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<bool> {
    let message = emit_expr(&a.message, ctx, fs)?;
    let who = match fs.kind {
        FnKind::Method => SELF_ID.to_string(),
        FnKind::Free => format!("{CURRENT_MACHINE}.index()"),
        FnKind::Monitor => "self.name()".to_string(),
    };
    if matches!(a.condition.kind, ExprKind::BoolLit(false)) {
        w.line(format!(
            "panic!(\"Assertion Failed: {{}} (machine {{:?}})\", {message}, {who});"
        ));
        return Ok(true);
    }
    let condition = emit_expr(&a.condition, ctx, fs)?;
    w.line(format!(
        "assert!({condition}, \"Assertion Failed: {{}} (machine {{:?}})\", {message}, {who});"
    ));
    Ok(false)
}

// ══════════════════════════════════════════════════════════════════════════════
// Stores & Collections
// ══════════════════════════════════════════════════════════════════════════════

/// Assign `value` (native code of `location`'s type) to `location`.
///
/// Element locations are written through `insert` on their container. When
/// the container is itself an element, it is read out, updated and stored
/// back, recursively.
pub fn emit_store(
    location: &Expr,
    value: String,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    match &location.kind {
        ExprKind::Var(id) => {
            w.line(format!("{} = {value};", var_place(*id, ctx, fs)?));
            Ok(())
        }
        ExprKind::NamedTupleAccess { tuple, field } => {
            store_element(tuple, format!("{field:?}"), &location.ty, value, ctx, fs, w)
        }
        ExprKind::TupleAccess { tuple, index } => {
            store_element(tuple, format!("\"{index}\""), &location.ty, value, ctx, fs, w)
        }
        ExprKind::SeqAccess { seq, index } => {
            let key = ctx.names.fresh_temp("index");
            w.line("{");
            w.line(format!("let {key}: i32 = {};", emit_expr(index, ctx, fs)?));
            store_element(seq, key, &location.ty, value, ctx, fs, w)?;
            w.line("}");
            Ok(())
        }
        ExprKind::MapAccess { map, .. } => Err(CodegenError::unsupported(
            "map access",
            format!("assigning into {} is not available in the Rust target", map.ty),
        )),
        ExprKind::SetAccess { set, .. } => Err(CodegenError::unsupported(
            "set access",
            format!("assigning into {} is not available in the Rust target", set.ty),
        )),
        other => Err(CodegenError::internal(format!(
            "{} is not an assignable location",
            other.tag()
        ))),
    }
}

fn store_element(
    container: &Expr,
    key: String,
    elem_ty: &PType,
    value: String,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    let tmp = ctx.names.fresh_temp("value");
    w.line("{");
    w.line(format!("let {tmp} = {};", box_value(elem_ty, &value)?));
    let (target, write_back) = collection_target(container, ctx, fs, w)?;
    w.line(format!("{target}.insert({key}, {tmp});"));
    if write_back {
        emit_store(container, target, ctx, fs, w)?;
    }
    w.line("}");
    Ok(())
}

/// A mutable place for `collection`: the variable itself, or a temporary
/// holding a copy that must be stored back afterwards.
fn collection_target(
    collection: &Expr,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<(String, bool)> {
    if let ExprKind::Var(id) = collection.kind {
        return Ok((var_place(id, ctx, fs)?, false));
    }
    let tmp = ctx.names.fresh_temp("inner");
    w.line(format!("let mut {tmp} = {};", emit_expr(collection, ctx, fs)?));
    Ok((tmp, true))
}

/// `seq += (i, v)`: shift elements at `i..` up by one, then store at `i`.
fn emit_insert(i: &InsertStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let PType::Seq(elem) = i.collection.ty.canonical() else {
        return Err(CodegenError::unsupported(
            "insert",
            format!("inserting into {} is not available in the Rust target", i.collection.ty),
        ));
    };
    let index = ctx.names.fresh_temp("index");
    let value = ctx.names.fresh_temp("value");
    let k = ctx.names.fresh_temp("k");
    let moved = ctx.names.fresh_temp("moved");

    w.line("{");
    w.line(format!("let {index}: i32 = {};", emit_expr(&i.index, ctx, fs)?));
    let native = emit_expr_as(&i.value, elem, ctx, fs)?;
    w.line(format!("let {value} = {};", box_value(elem, &native)?));
    let (target, write_back) = collection_target(&i.collection, ctx, fs, w)?;
    w.line(format!("let mut {k} = {target}.len() as i32;"));
    w.line(format!("while {k} > {index} {{"));
    w.line(format!(
        "let {moved} = {target}.remove(&({k} - 1)).unwrap_or({VALUE_DEFAULT});"
    ));
    w.line(format!("{target}.insert({k}, {moved});"));
    w.line(format!("{k} -= 1;"));
    w.line("}");
    w.line(format!("{target}.insert({index}, {value});"));
    if write_back {
        emit_store(&i.collection, target, ctx, fs, w)?;
    }
    w.line("}");
    Ok(())
}

/// `seq -= i`: drop element `i` and shift the tail down by one.
fn emit_remove(r: &RemoveStmt, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    if !matches!(r.collection.ty.canonical(), PType::Seq(_)) {
        return Err(CodegenError::unsupported(
            "remove",
            format!("removing from {} is not available in the Rust target", r.collection.ty),
        ));
    }
    let index = ctx.names.fresh_temp("index");
    let len = ctx.names.fresh_temp("len");
    let k = ctx.names.fresh_temp("k");
    let moved = ctx.names.fresh_temp("moved");

    w.line("{");
    w.line(format!("let {index}: i32 = {};", emit_expr(&r.key, ctx, fs)?));
    let (target, write_back) = collection_target(&r.collection, ctx, fs, w)?;
    w.line(format!("let {len} = {target}.len() as i32;"));
    w.line(format!("{target}.remove(&{index});"));
    w.line(format!("let mut {k} = {index} + 1;"));
    w.line(format!("while {k} < {len} {{"));
    w.line(format!(
        "let {moved} = {target}.remove(&{k}).unwrap_or({VALUE_DEFAULT});"
    ));
    w.line(format!("{target}.insert({k} - 1, {moved});"));
    w.line(format!("{k} += 1;"));
    w.line("}");
    if write_back {
        emit_store(&r.collection, target, ctx, fs, w)?;
    }
    w.line("}");
    Ok(())
}
