//! Compilation session: the state that survives across forms.
//!
//! One session owns the prototype registry and the precedence table.
//! Feeding it source produces one IR unit per top-level form; a failed
//! form reports an error instead and leaves the session exactly as it
//! was, so the next form compiles against clean state.

use crate::ast::{Function, Item, Prototype};
use crate::codegen::CodeGenerator;
use crate::error::CompileError;
use crate::intrinsics::INTRINSICS;
use crate::ir::Module;
use crate::parser::Parser;
use crate::precedence::PrecedenceTable;
use crate::registry::Registry;

/// Name a bare interactive expression compiles under.
pub const ANON_FUNCTION: &str = "__anon_expr";
/// Name a bare script expression compiles under.
pub const ENTRY_FUNCTION: &str = "main";

/// How bare top-level expressions are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitMode {
    /// Scripts: a bare expression becomes `main`, registered and kept.
    Batch,
    /// The REPL: a bare expression becomes a throwaway anonymous
    /// function the driver invokes once and unloads.
    Interactive,
}

/// What kind of form a unit came from, so drivers know what to do
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    Definition { name: String },
    Extern { name: String },
    /// A wrapped bare expression; `name` is the symbol to invoke.
    Expression { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    pub module: Module,
    pub kind: UnitKind,
}

pub struct Session {
    registry: Registry,
    table: PrecedenceTable,
    next_unit: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with the print intrinsics pre-registered, so
    /// programs can call them without an `extern` line.
    pub fn new() -> Self {
        let mut registry = Registry::new();
        for descriptor in INTRINSICS {
            registry
                .declare(&descriptor.prototype())
                .expect("intrinsic prototypes never conflict");
        }
        Session {
            registry,
            table: PrecedenceTable::new(),
            next_unit: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn precedence(&self) -> &PrecedenceTable {
        &self.table
    }

    /// Compile every top-level form in `source`, one unit per form.
    /// Processing always reaches the end of the input: a bad form
    /// contributes an error and the loop carries on with the next one.
    pub fn compile(
        &mut self,
        source: &str,
        mode: UnitMode,
    ) -> Vec<Result<CompiledUnit, CompileError>> {
        let mut outcomes = Vec::new();
        let mut parser = Parser::new(source);
        loop {
            match parser.next_item(&self.table) {
                None => return outcomes,
                Some(Err(error)) => outcomes.push(Err(error.into())),
                Some(Ok(item)) => outcomes.push(self.compile_item(item, mode)),
            }
        }
    }

    fn compile_item(&mut self, item: Item, mode: UnitMode) -> Result<CompiledUnit, CompileError> {
        let unit_name = format!("unit{}", self.next_unit);
        self.next_unit += 1;
        let mut generator = CodeGenerator::new(&unit_name, &mut self.registry, &mut self.table);
        let kind = match item {
            Item::Definition(function) => {
                generator.gen_definition(&function)?;
                UnitKind::Definition {
                    name: function.proto.name,
                }
            }
            Item::Extern(proto) => {
                generator.gen_extern(&proto)?;
                UnitKind::Extern { name: proto.name }
            }
            Item::Expression(expr) => match mode {
                UnitMode::Interactive => {
                    generator.gen_anonymous(ANON_FUNCTION, &expr)?;
                    UnitKind::Expression {
                        name: ANON_FUNCTION.to_string(),
                    }
                }
                UnitMode::Batch => {
                    let wrapped = Function {
                        proto: Prototype::new(ENTRY_FUNCTION, Vec::new()),
                        body: expr,
                    };
                    generator.gen_definition(&wrapped)?;
                    UnitKind::Expression {
                        name: ENTRY_FUNCTION.to_string(),
                    }
                }
            },
        };
        Ok(CompiledUnit {
            module: generator.finish(),
            kind,
        })
    }
}
