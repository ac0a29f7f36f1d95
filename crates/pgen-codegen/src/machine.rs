//! Machine Lowering Pipeline.
//!
//! For one non-spec machine `X` this emits, in order:
//!
//! 1. `enum XState` with its annotations (see `states.rs`)
//! 2. `struct X` holding the common machine data, the pending goto payload
//!    and one field per declared variable
//! 3. `impl X`: constructor, the unhandled-step function, entry payload
//!    routing, the exit helper, every method and the named-function wrappers
//! 4. `impl PStateMachine for X`: the runtime capabilities and the dispatch
//!    function `execute`
//!
//! Monitors share the method and action lowering below but get their own
//! record and dispatch in `monitor.rs`.

use log::{trace, warn};

use pgen_types::ast::*;

use crate::context::{CodeWriter, EmitContext, FuncScope};
use crate::error::{CodegenError, CodegenResult};
use crate::runtime::*;
use crate::states::{emit_state_enum, start_state};
use crate::stmt::{bind_payload, emit_body};
use crate::types::*;

pub fn emit_machine(machine: &MachineDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let name = ctx.name(machine.id)?;
    let state_enum = ctx.state_enum(machine.id)?;
    let start = start_state(machine)?;
    let start_path = ctx.state_path(machine.id, start.id)?;

    emit_state_enum(machine, ctx, w)?;
    w.blank();

    // ── Record ──
    w.line(format!("pub struct {name} {{"));
    w.line(format!("{COMMON_DATA}: MD::CommonMachineData<{EVENT_TYPE}, {state_enum}>,"));
    w.line(format!("{GOTO_PAYLOAD}: Option<{VALUE_TYPE}>,"));
    for field in &machine.fields {
        w.line(format!("{}: {},", ctx.name(field.id)?, map_type(&field.ty)?));
    }
    w.line("}");
    w.blank();

    w.line(format!("impl {name} {{"));
    emit_constructor(machine, &name, &start_path, ctx, w)?;
    w.blank();
    w.line(format!("fn {DEFAULT_FN}(&mut self, event: {EVENT_TYPE}) {{"));
    w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_DEFAULT};"));
    w.line("}");
    w.blank();
    emit_take_entry_event(w);
    if machine.has_exit_handlers() {
        w.blank();
        emit_exit_helper(machine, ctx, w)?;
    }
    for method in &machine.methods {
        w.blank();
        emit_method(machine, method, &state_enum, ctx, w)?;
    }
    for method in wrapped_methods(machine)? {
        w.blank();
        emit_wrapper(machine, method, ctx, w)?;
    }
    w.line("}");
    w.blank();

    emit_capabilities(machine, &name, ctx, w)
}

fn emit_constructor(
    machine: &MachineDecl,
    name: &str,
    start_path: &str,
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    w.line("pub fn new(");
    w.line(format!("tx_machine_to_config: mpsc::Sender<MP::MachineToConfigMsg<{EVENT_TYPE}>>,"));
    w.line(format!("rx_config_to_machine: mpsc::Receiver<MP::ConfigToMachineMsg<{EVENT_TYPE}>>,"));
    w.line(format!("arg: {VALUE_TYPE},"));
    w.line(") -> Box<Self> {");
    w.line(format!("let name = {name:?};"));
    w.line("let self_id = M::Index::create_index(name, 0);");
    w.line(format!("let current_state = {start_path};"));
    w.line(format!("Box::new({name} {{"));
    w.line(format!(
        "{COMMON_DATA}: MD::CommonMachineData::create(name, self_id, current_state, tx_machine_to_config, rx_config_to_machine, arg),"
    ));
    w.line(format!("{GOTO_PAYLOAD}: None,"));
    for field in &machine.fields {
        w.line(format!("{}: {},", ctx.name(field.id)?, default_value(&field.ty)?));
    }
    w.line("})");
    w.line("}");
    Ok(())
}

/// The payload for the next entry handler: a pending goto payload, else the
/// creation payload when entering the start state, else nothing.
fn emit_take_entry_event(w: &mut CodeWriter) {
    w.line(format!("fn {TAKE_ENTRY_FN}(&mut self) -> {EVENT_TYPE} {{"));
    w.line(format!("let payload = match self.{GOTO_PAYLOAD}.take() {{"));
    w.line("Some(payload) => payload,");
    w.line(format!(
        "None if self.{COMMON_DATA}.current_state.is_start() => self.{COMMON_DATA}.payload.clone(),"
    ));
    w.line(format!("None => {VALUE_DEFAULT},"));
    w.line("};");
    w.line(default_event("payload"));
    w.line("}");
}

/// `exit_current_state`: run the current state's exit handler, if any.
pub(crate) fn emit_exit_helper(machine: &MachineDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let state_place = if machine.is_spec {
        "self.current_state".to_string()
    } else {
        format!("self.{COMMON_DATA}.current_state")
    };
    w.line(format!("fn {EXIT_FN}(&mut self) {{"));
    w.line(format!("let current_state = {state_place};"));
    w.line("match current_state {");
    for state in &machine.states {
        if let Some(exit) = state.exit {
            let call = handler_call(machine, exit, &default_event(VALUE_DEFAULT), ctx)?;
            w.line(format!("{} => {call},", ctx.state_path(machine.id, state.id)?));
        }
    }
    w.line("_ => {}");
    w.line("}");
    w.line("}");
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Methods & Wrappers
// ══════════════════════════════════════════════════════════════════════════════

/// Lower one method. Anonymous handlers take the triggering event.
pub(crate) fn emit_method(
    machine: &MachineDecl,
    f: &FunctionDecl,
    state_enum: &str,
    ctx: &mut EmitContext<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    if f.is_foreign {
        warn!("skipping foreign method {}.{}", machine.name, f.name);
        return Ok(());
    }
    trace!("lowering method {}.{}", machine.name, f.name);
    let fs = FuncScope::method(machine, f, state_enum.to_string());
    let name = ctx.name(f.id)?;
    let ret = return_suffix(&f.return_type)?;

    if f.is_anon {
        w.line(format!("fn {name}(&mut self, event: {EVENT_TYPE}){ret} {{"));
        if !machine.is_spec {
            w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_DEFAULT};"));
        }
        bind_payload(f, "event", ctx, w)?;
    } else {
        let mut params = String::new();
        for p in &f.params {
            params.push_str(&format!(", mut {}: {}", ctx.name(p.id)?, map_type(&p.ty)?));
        }
        w.line(format!("fn {name}(&mut self{params}){ret} {{"));
    }
    emit_body(ctx, &fs, w)?;
    w.line("}");
    Ok(())
}

/// Named methods reached from a state table, entry or exit, in declaration
/// order.
pub(crate) fn wrapped_methods(machine: &MachineDecl) -> CodegenResult<Vec<&FunctionDecl>> {
    let mut referenced = Vec::new();
    for state in &machine.states {
        referenced.extend(state.entry);
        referenced.extend(state.exit);
        for handler in &state.handlers {
            match handler.action {
                StateAction::Do { function } => referenced.push(function),
                StateAction::Goto {
                    transition: Some(function),
                    ..
                } => referenced.push(function),
                _ => {}
            }
        }
    }
    for id in &referenced {
        if machine.method(*id).is_none() {
            return Err(CodegenError::internal(format!(
                "handler {id} is not a method of {}",
                machine.name
            )));
        }
    }
    Ok(machine
        .methods
        .iter()
        .filter(|f| !f.is_anon && !f.is_foreign && referenced.contains(&f.id))
        .collect())
}

fn wrapper_name(f: &FunctionDecl, ctx: &mut EmitContext<'_>) -> CodegenResult<String> {
    let name = ctx.name(f.id)?;
    Ok(ctx.names.derived(f.id, &name, "_", ""))
}

/// `_f(&mut self, event)`: unbox the payload into `f`'s parameters.
pub(crate) fn emit_wrapper(machine: &MachineDecl, f: &FunctionDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let wrapper = wrapper_name(f, ctx)?;
    w.line(format!("fn {wrapper}(&mut self, event: {EVENT_TYPE}) {{"));
    if !machine.is_spec {
        w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_DEFAULT};"));
    }
    let args = match f.params.as_slice() {
        [] => Vec::new(),
        [param] => vec![unbox_arg(&param.ty, "event.payload")?],
        params => {
            let tuple = ctx.names.fresh_temp("args");
            w.line(format!("let {tuple} = event.payload{EXTRACT_NAMED_TUPLE};"));
            params
                .iter()
                .enumerate()
                .map(|(i, p)| unbox_arg(&p.ty, &format!("{tuple}[\"{i}\"]")))
                .collect::<CodegenResult<Vec<_>>>()?
        }
    };
    let call = format!("self.{}({})", ctx.name(f.id)?, args.join(", "));
    if f.return_type.is_null() {
        w.line(format!("{call};"));
    } else {
        w.line(format!("let _ = {call};"));
    }
    w.line("}");
    Ok(())
}

fn unbox_arg(ty: &pgen_types::PType, boxed: &str) -> CodegenResult<String> {
    if ty.is_null() {
        Ok("()".to_string())
    } else {
        unbox_value(ty, boxed)
    }
}

/// A call of method `id` with the event expression `event`: directly for
/// anonymous handlers, through the wrapper otherwise.
pub(crate) fn handler_call(
    machine: &MachineDecl,
    id: DeclId,
    event: &str,
    ctx: &mut EmitContext<'_>,
) -> CodegenResult<String> {
    let f = machine.method(id).ok_or_else(|| {
        CodegenError::internal(format!("handler {id} is not a method of {}", machine.name))
    })?;
    if f.is_foreign {
        return Err(CodegenError::unsupported(
            "foreign function",
            format!("{} cannot be used as a handler in the Rust target", f.name),
        ));
    }
    let name = if f.is_anon {
        ctx.name(f.id)?
    } else {
        wrapper_name(f, ctx)?
    };
    Ok(format!("self.{name}({event})"))
}

// ══════════════════════════════════════════════════════════════════════════════
// Dispatch
// ══════════════════════════════════════════════════════════════════════════════

/// Whether `event` is the built-in null event.
fn is_null_event(event: DeclId, ctx: &EmitContext<'_>) -> CodegenResult<bool> {
    Ok(ctx.event(event)?.builtin == Some(BuiltinEvent::Null))
}

/// The handler a state declares for the null event, rejected when the state
/// also has an entry handler.
pub(crate) fn null_event_handler<'m>(
    state: &'m StateDecl,
    ctx: &EmitContext<'_>,
) -> CodegenResult<Option<&'m EventHandler>> {
    let mut found = None;
    for handler in &state.handlers {
        if is_null_event(handler.event, ctx)? && !matches!(handler.action, StateAction::Defer) {
            found = Some(handler);
        }
    }
    if found.is_some() && state.entry.is_some() {
        return Err(CodegenError::unsupported(
            "null-event handler",
            format!("state {} has both an entry handler and a null-event handler", state.name),
        ));
    }
    Ok(found)
}

/// Handlers that become dispatch arms: neither deferred nor on the null event.
pub(crate) fn dispatch_handlers<'m>(
    state: &'m StateDecl,
    ctx: &EmitContext<'_>,
) -> CodegenResult<Vec<&'m EventHandler>> {
    let mut arms = Vec::new();
    for handler in &state.handlers {
        if matches!(handler.action, StateAction::Defer) || is_null_event(handler.event, ctx)? {
            continue;
        }
        arms.push(handler);
    }
    Ok(arms)
}

/// The body of one dispatch arm handling `event` with `action`.
pub(crate) fn emit_action(
    machine: &MachineDecl,
    action: &StateAction,
    event: &str,
    ctx: &mut EmitContext<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    match action {
        StateAction::Do { function } => {
            w.line(format!("{};", handler_call(machine, *function, event, ctx)?));
        }
        StateAction::Goto { target, transition } => {
            let target = ctx.state_path(machine.id, *target)?;
            if machine.has_exit_handlers() {
                w.line(format!("self.{EXIT_FN}();"));
            }
            if let Some(function) = transition {
                let call = handler_call(machine, *function, &format!("{event}.clone()"), ctx)?;
                w.line(format!("{call};"));
            }
            if machine.is_spec {
                w.line(format!("self.current_state = {target};"));
                w.line(format!("self.{OBSERVE_FN}({});", default_event(&format!("{event}.payload"))));
            } else {
                w.line(format!("self.{GOTO_PAYLOAD} = Some({event}.payload);"));
                w.line(format!("self.{COMMON_DATA}.current_state = {target};"));
                w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_CONTINUE};"));
            }
        }
        StateAction::Push { target } => {
            if machine.is_spec {
                return Err(CodegenError::unsupported("push", "monitors have no state stack"));
            }
            let target = ctx.state_path(machine.id, *target)?;
            w.line(format!("self.{COMMON_DATA}.push_state({target});"));
            w.line(format!("self.{GOTO_PAYLOAD} = None;"));
            w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_CONTINUE};"));
        }
        StateAction::Ignore => {
            if !machine.is_spec {
                w.line(format!("self.{DEFAULT_FN}({event});"));
            }
        }
        StateAction::Defer => {
            return Err(CodegenError::internal("deferred events have no dispatch arm"))
        }
    }
    Ok(())
}

fn dispatch_miss() -> String {
    format!("panic!(\"machine {{:?}} in state {{:?}} cannot handle event {{:?}}\", {SELF_ID}, current_state, event_name)")
}

fn emit_execute(machine: &MachineDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    w.line("fn execute(&mut self, event: Self::Event) {");
    w.line(format!("let current_state = self.{COMMON_DATA}.current_state;"));
    w.line("let event_name = event.name;");
    w.line("match current_state {");
    for state in &machine.states {
        trace!("dispatch table for {}.{}", machine.name, state.name);
        let path = ctx.state_path(machine.id, state.id)?;
        w.line(format!("{path} => match event_name {{"));

        w.line(format!("{} => {{", event_variant(DEFAULT_EVENT)));
        w.line(format!("let entry_event = self.{TAKE_ENTRY_FN}();"));
        match (state.entry, null_event_handler(state, ctx)?) {
            (Some(entry), _) => {
                w.line(format!("{};", handler_call(machine, entry, "entry_event", ctx)?));
            }
            (None, Some(handler)) => emit_action(machine, &handler.action, "entry_event", ctx, w)?,
            (None, None) => w.line(format!("self.{DEFAULT_FN}(entry_event);")),
        }
        w.line("}");

        let mut handles_halt = false;
        for handler in dispatch_handlers(state, ctx)? {
            let event = ctx.event(handler.event)?;
            handles_halt |= event.builtin == Some(BuiltinEvent::Halt);
            w.line(format!("{} => {{", event_variant(&ctx.name(handler.event)?)));
            emit_action(machine, &handler.action, "event", ctx, w)?;
            w.line("}");
        }
        // An unhandled halt stops the machine; anything else is fatal.
        if handles_halt {
            w.line(format!("_ => {},", dispatch_miss()));
        } else {
            w.line("_ => {");
            w.line(format!("if event_name != {} {{", event_variant(HALT_EVENT)));
            w.line(format!("{};", dispatch_miss()));
            w.line("}");
            w.line(format!("self.{COMMON_DATA}.execution_status = {STATUS_TERMINATED};"));
            w.line("}");
        }
        w.line("},");
    }
    w.line("}");
    w.line("}");
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Runtime Capabilities
// ══════════════════════════════════════════════════════════════════════════════

fn emit_capabilities(machine: &MachineDecl, name: &str, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    w.line(format!("impl {MACHINE_TRAIT} for {name} {{"));
    w.line(format!("type Event = {EVENT_TYPE};"));
    w.blank();

    w.line(format!("fn send_event(&self, receiver: {INDEX_TYPE}, event: Self::Event) {{"));
    w.line(format!("self.{COMMON_DATA}.send_event(receiver, event)"));
    w.line("}");
    w.blank();

    w.line(format!("fn create_machine(&self, name: &'static str, args: {VALUE_TYPE}) -> {INDEX_TYPE} {{"));
    w.line(format!("let machine = {CREATE_FN}(name, args);"));
    w.line(format!("self.{COMMON_DATA}"));
    w.line(".tx_machine_to_config");
    w.line(format!(".send({MSG_CREATE_REQUEST}(machine))"));
    w.line(".expect(\"coordinator hung up during create\");");
    w.line(format!(
        "if let Ok({MSG_CREATE_RESPONSE}(new_index)) = self.{COMMON_DATA}.rx_config_to_machine.recv() {{"
    ));
    w.line("new_index");
    w.line("} else {");
    w.line(format!("panic!(\"machine {{:?}} did not receive a create machine response\", {SELF_ID})"));
    w.line("}");
    w.line("}");
    w.blank();

    w.line("fn add_to_config(&mut self) {");
    w.line(format!("self.{COMMON_DATA}.add_to_config()"));
    w.line("}");
    w.blank();

    w.line("fn answer_requests(&mut self) {");
    w.line("loop {");
    w.line(format!("match self.{COMMON_DATA}.rx_config_to_machine.recv() {{"));
    w.line(format!("Ok({MSG_EXECUTE_REQUEST}(event)) => {{"));
    w.line("self.execute(event);");
    w.line(format!("let execution_status = self.{COMMON_DATA}.execution_status;"));
    w.line(format!("self.{COMMON_DATA}"));
    w.line(".tx_machine_to_config");
    w.line(format!(".send({MSG_EXECUTE_RESPONSE}(execution_status))"));
    w.line(".expect(\"coordinator hung up during execute\");");
    w.line(format!("if matches!(execution_status, {STATUS_TERMINATED}) {{"));
    w.line("break;");
    w.line("}");
    w.line("}");
    w.line(format!("_ => panic!(\"machine {{:?}} received an invalid request\", {SELF_ID}),"));
    w.line("}");
    w.line("}");
    w.line("}");
    w.blank();

    w.line("fn name(&self) -> &'static str {");
    w.line(format!("{name:?}"));
    w.line("}");
    w.blank();
    w.line(format!("fn index(&self) -> {INDEX_TYPE} {{"));
    w.line(format!("self.{COMMON_DATA}.index()"));
    w.line("}");
    w.blank();
    w.line("fn print(&self) {");
    w.line(format!("self.{COMMON_DATA}.print()"));
    w.line("}");
    w.blank();
    w.line("fn update_id(&mut self, instance: i32) {");
    w.line(format!("self.{COMMON_DATA}.update_id(instance)"));
    w.line("}");
    w.blank();

    emit_execute(machine, ctx, w)?;
    w.line("}");
    Ok(())
}
