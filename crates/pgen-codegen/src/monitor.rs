//! Monitor (spec machine) lowering.
//!
//! A monitor has no coordinator channels: it cannot send, create, pop or
//! block. Its record holds the current state and its fields, and `observe`
//! runs one observed event to completion, following gotos synchronously.

use log::trace;

use pgen_types::ast::*;

use crate::context::{CodeWriter, EmitContext};
use crate::error::CodegenResult;
use crate::machine::{
    dispatch_handlers, emit_action, emit_exit_helper, emit_method, emit_wrapper, handler_call,
    null_event_handler, wrapped_methods,
};
use crate::runtime::*;
use crate::states::{emit_state_enum, start_state};
use crate::types::*;

pub fn emit_monitor(machine: &MachineDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let name = ctx.name(machine.id)?;
    let state_enum = ctx.state_enum(machine.id)?;
    let start = start_state(machine)?;
    let start_path = ctx.state_path(machine.id, start.id)?;

    emit_state_enum(machine, ctx, w)?;
    w.blank();

    w.line(format!("pub struct {name} {{"));
    w.line(format!("current_state: {state_enum},"));
    for field in &machine.fields {
        w.line(format!("{}: {},", ctx.name(field.id)?, map_type(&field.ty)?));
    }
    w.line("}");
    w.blank();

    w.line(format!("impl {name} {{"));
    w.line("pub fn new() -> Box<Self> {");
    w.line(format!("let mut monitor = Box::new({name} {{"));
    w.line(format!("current_state: {start_path},"));
    for field in &machine.fields {
        w.line(format!("{}: {},", ctx.name(field.id)?, default_value(&field.ty)?));
    }
    w.line("});");
    w.line(format!("monitor.{OBSERVE_FN}({});", default_event(VALUE_DEFAULT)));
    w.line("monitor");
    w.line("}");
    w.blank();

    w.line("pub fn name(&self) -> &'static str {");
    w.line(format!("{name:?}"));
    w.line("}");
    w.blank();

    let mut observed = Vec::with_capacity(machine.observes.len());
    for event in &machine.observes {
        ctx.event(*event)?;
        observed.push(event_variant(&ctx.name(*event)?));
    }
    w.line(format!("pub fn observes() -> &'static [{EVENT_NAME_TYPE}] {{"));
    w.line(format!("&[{}]", observed.join(", ")));
    w.line("}");
    w.blank();

    w.line(format!("pub fn temperature(&self) -> {TEMPERATURE_TYPE} {{"));
    w.line("self.current_state.temperature()");
    w.line("}");
    w.blank();
    w.line("pub fn is_hot(&self) -> bool {");
    w.line(format!("self.temperature() == {TEMPERATURE_TYPE}::Hot"));
    w.line("}");
    w.blank();

    emit_observe(machine, ctx, w)?;
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
    Ok(())
}

fn emit_observe(machine: &MachineDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    w.line(format!("pub fn {OBSERVE_FN}(&mut self, event: {EVENT_TYPE}) {{"));
    w.line("let current_state = self.current_state;");
    w.line("let event_name = event.name;");
    w.line("match current_state {");
    for state in &machine.states {
        trace!("observe table for {}.{}", machine.name, state.name);
        w.line(format!("{} => match event_name {{", ctx.state_path(machine.id, state.id)?));

        w.line(format!("{} => {{", event_variant(DEFAULT_EVENT)));
        match (state.entry, null_event_handler(state, ctx)?) {
            (Some(entry), _) => w.line(format!("{};", handler_call(machine, entry, "event", ctx)?)),
            (None, Some(handler)) => emit_action(machine, &handler.action, "event", ctx, w)?,
            (None, None) => {}
        }
        w.line("}");

        for handler in dispatch_handlers(state, ctx)? {
            w.line(format!("{} => {{", event_variant(&ctx.name(handler.event)?)));
            emit_action(machine, &handler.action, "event", ctx, w)?;
            w.line("}");
        }
        w.line(format!(
            "_ => panic!(\"monitor {{}} in state {{:?}} cannot handle event {{:?}}\", self.name(), current_state, event_name),"
        ));
        w.line("},");
    }
    w.line("}");
    w.line("}");
    Ok(())
}
