//! State enumeration and per-state annotations.
//!
//! The annotations are metadata the runtime may query; dispatch lives in
//! `machine.rs` and `monitor.rs`.

use pgen_types::ast::*;

use crate::context::{CodeWriter, EmitContext};
use crate::error::{CodegenError, CodegenResult};
use crate::runtime::*;

/// The unique start state of `machine`.
pub fn start_state(machine: &MachineDecl) -> CodegenResult<&StateDecl> {
    let start = machine
        .state(machine.start_state)
        .ok_or_else(|| CodegenError::MissingStartState(machine.name.clone()))?;
    let flagged = machine.states.iter().filter(|s| s.is_start).count();
    if flagged > 1 || (flagged == 1 && !start.is_start) {
        return Err(CodegenError::MissingStartState(machine.name.clone()));
    }
    Ok(start)
}

/// The events `state` handles with `action`-shaped entries, as variants.
fn events_with(
    state: &StateDecl,
    ctx: &EmitContext<'_>,
    matches: fn(&StateAction) -> bool,
) -> CodegenResult<Vec<String>> {
    state
        .handlers
        .iter()
        .filter(|h| matches(&h.action))
        .map(|h| Ok(event_variant(&ctx.name(h.event)?)))
        .collect()
}

fn hook_name(hook: Option<DeclId>, ctx: &EmitContext<'_>) -> CodegenResult<String> {
    match hook {
        Some(id) => Ok(format!("Some({:?})", ctx.name(id)?)),
        None => Ok("None".to_string()),
    }
}

/// `enum XState { .. }` plus its annotation accessors.
pub fn emit_state_enum(
    machine: &MachineDecl,
    ctx: &mut EmitContext<'_>,
    w: &mut CodeWriter,
) -> CodegenResult<()> {
    let start = start_state(machine)?;
    let enum_name = ctx.state_enum(machine.id)?;
    let mut variants = Vec::with_capacity(machine.states.len());
    for state in &machine.states {
        variants.push((state, format!("{enum_name}::{}", ctx.name(state.id)?)));
    }

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
    w.line(format!("pub enum {enum_name} {{"));
    for state in &machine.states {
        w.line(format!("{},", ctx.name(state.id)?));
    }
    w.line("}");
    w.blank();

    w.line(format!("impl {enum_name} {{"));
    w.line("pub fn is_start(&self) -> bool {");
    w.line(format!("matches!(self, {enum_name}::{})", ctx.name(start.id)?));
    w.line("}");
    w.blank();

    w.line("pub fn entry_handler(&self) -> Option<&'static str> {");
    w.line("match self {");
    for (state, path) in &variants {
        w.line(format!("{path} => {},", hook_name(state.entry, ctx)?));
    }
    w.line("}");
    w.line("}");
    w.blank();

    w.line("pub fn exit_handler(&self) -> Option<&'static str> {");
    w.line("match self {");
    for (state, path) in &variants {
        w.line(format!("{path} => {},", hook_name(state.exit, ctx)?));
    }
    w.line("}");
    w.line("}");
    w.blank();

    w.line(format!("pub fn deferred_events(&self) -> &'static [{EVENT_NAME_TYPE}] {{"));
    w.line("match self {");
    for (state, path) in &variants {
        let events = events_with(state, ctx, |a| matches!(a, StateAction::Defer))?;
        w.line(format!("{path} => &[{}],", events.join(", ")));
    }
    w.line("}");
    w.line("}");
    w.blank();

    w.line(format!("pub fn ignored_events(&self) -> &'static [{EVENT_NAME_TYPE}] {{"));
    w.line("match self {");
    for (state, path) in &variants {
        let events = events_with(state, ctx, |a| matches!(a, StateAction::Ignore))?;
        w.line(format!("{path} => &[{}],", events.join(", ")));
    }
    w.line("}");
    w.line("}");

    if machine.is_spec {
        w.blank();
        w.line(format!("pub fn temperature(&self) -> {TEMPERATURE_TYPE} {{"));
        w.line("match self {");
        for (state, path) in &variants {
            let temperature = match state.temperature {
                Temperature::Hot => "Hot",
                Temperature::Cold => "Cold",
                Temperature::Warm => "Warm",
            };
            w.line(format!("{path} => {TEMPERATURE_TYPE}::{temperature},"));
        }
        w.line("}");
        w.line("}");
    }
    w.line("}");
    Ok(())
}

/// `enum MonitorTemperature`, emitted once when any monitor exists.
pub fn emit_temperature_enum(w: &mut CodeWriter) {
    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
    w.line(format!("pub enum {TEMPERATURE_TYPE} {{"));
    w.line("Hot,");
    w.line("Cold,");
    w.line("Warm,");
    w.line("}");
}
