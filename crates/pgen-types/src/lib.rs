//! Shared types for the P code generator.
//!
//! This crate defines the resolved program model (declarations, states,
//! statements, typed expressions) that the upstream checker hands to code
//! generation, plus source spans and a builder for assembling scopes.

mod span;
pub mod ast;
pub mod builder;
pub mod ty;

pub use span::Span;
pub use ty::PType;
