//! Bootstrap modules for `implementation` and `test` declarations.
//!
//! Each becomes `pub mod <name>` with deterministic lookup tables for the
//! runtime's startup sequence. Table entries follow the order of the
//! declaration's own lists, so the output never depends on hashing.

use pgen_types::ast::*;

use crate::context::{CodeWriter, DeclRef, EmitContext};
use crate::error::{CodegenError, CodegenResult};
use crate::runtime::*;

pub fn emit_module(module: &ModuleDecl, ctx: &mut EmitContext<'_>, w: &mut CodeWriter) -> CodegenResult<()> {
    let name = ctx.name(module.id)?;
    w.line(format!("pub mod {name} {{"));
    w.line("use super::*;");
    w.blank();

    // Creator → (requested interface → bound interface).
    w.line("pub fn link_map() -> HashMap<&'static str, HashMap<&'static str, &'static str>> {");
    w.line("let mut link_map: HashMap<&'static str, HashMap<&'static str, &'static str>> = HashMap::new();");
    for entry in &module.link_map {
        w.line(format!(
            "link_map.entry({:?}).or_default().insert({:?}, {:?});",
            ctx.name(entry.creator)?,
            ctx.name(entry.requested)?,
            ctx.name(entry.bound)?
        ));
    }
    w.line("link_map");
    w.line("}");
    w.blank();

    w.line("pub fn interface_definitions() -> HashMap<&'static str, &'static str> {");
    w.line("let mut interface_definitions = HashMap::new();");
    for binding in &module.interface_definitions {
        w.line(format!(
            "interface_definitions.insert({:?}, {:?});",
            ctx.name(binding.interface)?,
            ctx.creatable_machine(binding.machine)?
        ));
    }
    w.line("interface_definitions");
    w.line("}");
    w.blank();

    w.line(format!(
        "pub fn monitor_observes() -> HashMap<&'static str, Vec<{EVENT_NAME_TYPE}>> {{"
    ));
    w.line("let mut monitor_observes = HashMap::new();");
    for binding in &module.monitor_map {
        let monitor = monitor(binding.monitor, ctx)?;
        let mut events = Vec::with_capacity(monitor.observes.len());
        for event in &monitor.observes {
            events.push(event_variant(&ctx.name(*event)?));
        }
        w.line(format!(
            "monitor_observes.insert({:?}, vec![{}]);",
            ctx.name(monitor.id)?,
            events.join(", ")
        ));
    }
    w.line("monitor_observes");
    w.line("}");
    w.blank();

    w.line("pub fn monitor_map() -> HashMap<&'static str, Vec<&'static str>> {");
    w.line("let mut monitor_map = HashMap::new();");
    for binding in &module.monitor_map {
        let mut interfaces = Vec::with_capacity(binding.interfaces.len());
        for interface in &binding.interfaces {
            interfaces.push(format!("{:?}", ctx.name(*interface)?));
        }
        w.line(format!(
            "monitor_map.insert({:?}, vec![{}]);",
            ctx.name(binding.monitor)?,
            interfaces.join(", ")
        ));
    }
    w.line("monitor_map");
    w.line("}");

    if let Some(main) = module.main {
        let main = ctx.creatable_machine(main)?;
        w.blank();
        w.line(format!("pub const MAIN: &str = {main:?};"));
        w.blank();
        w.line(format!("pub fn start() -> MP::Machine<{EVENT_TYPE}> {{"));
        w.line(format!("{CREATE_FN}(MAIN, {VALUE_DEFAULT})"));
        w.line("}");
    }
    w.line("}");
    Ok(())
}

fn monitor<'a>(id: DeclId, ctx: &EmitContext<'a>) -> CodegenResult<&'a MachineDecl> {
    match ctx.lookup(id)? {
        DeclRef::Machine(m) if m.is_spec => Ok(m),
        _ => Err(CodegenError::internal(format!(
            "monitor map entry {id} is not a spec machine"
        ))),
    }
}
