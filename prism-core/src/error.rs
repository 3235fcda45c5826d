//! Error types for every stage of the pipeline.

use crate::token::Token;
use thiserror::Error;

/// A syntax error. The parser reports one of these per bad form and
/// then discards a single token so the caller can resume.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown token when expecting an expression: found {0}")]
    ExpectedExpression(Token),

    #[error("expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: Token,
    },

    #[error("operator precedence must lie in 1..=100, got {0}")]
    PrecedenceOutOfRange(i32),

    #[error("operator '{op}' must take exactly {expected} parameter(s), found {found}")]
    OperatorArity {
        op: char,
        expected: usize,
        found: usize,
    },
}

/// A semantic error raised while lowering a form to IR. Any of these
/// aborts the current unit and rolls back its staged side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("unknown variable name '{0}'")]
    UnknownVariable(String),

    #[error("unknown function referenced: '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s) but {found} were passed")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("destination of '=' must be a variable")]
    InvalidAssignTarget,

    #[error("function '{0}' cannot be redefined")]
    DuplicateDefinition(String),

    #[error("function '{name}' was declared with {expected} parameter(s), not {found}")]
    SignatureMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("operator '{0}' has no registered implementation")]
    UnknownOperator(char),
}

/// A failure during execution of generated code.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("call to unresolved function '{0}'")]
    UnresolvedSymbol(String),

    #[error("function '{name}' expects {expected} argument(s) but {found} were passed")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("malformed unit: {0}")]
    MalformedUnit(&'static str),

    #[error("write to output sink failed")]
    Output(#[from] std::io::Error),
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
