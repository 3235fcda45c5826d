//! Core pipeline for the Prism expression language.
//!
//! Prism is a small numeric language with user-definable operators.
//! Every value is an f64, and every top-level form compiles into its
//! own IR unit:
//!
//!   source text
//!     -> lexer      (tokens)
//!     -> parser     (AST, driven by the live precedence table)
//!     -> codegen    (one IR unit per form)
//!     -> engine     (block-walking execution)
//!
//! A [`session::Session`] holds the state shared across forms: the
//! function registry and the operator precedence table. Drivers (CLI,
//! REPL) should depend on this crate rather than reimplementing the
//! pipeline.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod token;
pub mod lexer;
pub mod ast;
pub mod precedence;
pub mod parser;

// ---------------------------------------------------------------------
// Lowering: registry, IR, code generation
// ---------------------------------------------------------------------

pub mod registry;
pub mod ir;
pub mod codegen;

// ---------------------------------------------------------------------
// Execution: backends, intrinsics, the interpreter
// ---------------------------------------------------------------------

pub mod backend;
pub mod intrinsics;
pub mod engine;

// ---------------------------------------------------------------------
// Session orchestration
// ---------------------------------------------------------------------

pub mod session;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use backend::Backend;
pub use engine::Interpreter;
pub use error::{CodegenError, CompileError, EngineError, ParseError};
pub use ir::{Module, link_units};
pub use session::{CompiledUnit, Session, UnitKind, UnitMode};
