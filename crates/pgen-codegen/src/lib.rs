//! P Rust code generator: lowers a resolved scope to one Rust source file.
//!
//! # Architecture
//!
//! [`generate`] walks the scope's declarations in source order and writes a
//! single file that runs against the external P runtime crate. Every machine
//! becomes a state enum, a record and an `impl PStateMachine` whose `execute`
//! is the dispatch function; the runtime's coordinator drives machines over
//! channels, one event per step.
//!
//! ## Generated file
//! - prologue: lint allowances, runtime module aliases (`MD`, `M`, `MP`, `PV`, `EV`)
//! - `ProtocolEventName` / `ProtocolEvent`
//! - `global_functions`: free functions, taking the calling machine explicitly
//! - per machine: `XState`, `struct X`, `impl X`, `impl PStateMachine for X`
//! - per monitor: `XState` with temperatures, `struct X` with `observe`
//! - per implementation / test: a bootstrap module with lookup tables
//! - `create_new_machine(name, args)`
//!
//! ## Value Representation
//!
//! Scalars stay native (`i32`, `f64`, `bool`, `String`). Values crossing an
//! event or creation boundary travel as the runtime's tagged `PV::PValue`.
//! See [`types`] for the full mapping.

pub mod compiler;
pub mod context;
pub mod error;
pub mod expr;
pub mod harness;
pub mod machine;
pub mod monitor;
pub mod names;
pub mod runtime;
pub mod states;
pub mod stmt;
pub mod types;

pub use compiler::generate;
pub use context::CodegenOptions;
pub use error::{CodegenError, CodegenResult};
