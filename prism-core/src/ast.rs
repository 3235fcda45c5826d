//! Syntax tree for the language.
//!
//! Everything is an expression; the only statement-like forms are the
//! top-level `def` and `extern` items. The expression enum is closed on
//! purpose: code generation matches it exhaustively, so adding a node
//! here forces every consumer to handle it.

/// A single expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Reference to a named variable (parameter, loop or `var` binding).
    Variable(String),
    /// Prefix operator application.
    Unary { op: char, operand: Box<Expr> },
    /// Infix operator application. `=` is handled specially during
    /// code generation; everything else is either a builtin or a call
    /// to a user-defined operator function.
    Binary {
        op: char,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Call to a named function.
    Call { callee: String, args: Vec<Expr> },
    /// Conditional producing the value of the taken arm.
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Counted loop. `step` defaults to 1.0 when absent. Always
    /// evaluates to 0.0.
    For {
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    /// `var a = 1, b in body`: introduces mutable bindings scoped to
    /// `body`. Missing initializers default to 0.0.
    Var {
        bindings: Vec<(String, Option<Expr>)>,
        body: Box<Expr>,
    },
}

/// Whether a prototype names a plain function or a user operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    None,
    Unary,
    Binary,
}

/// A function signature: its name and parameter names.
///
/// User operators are functions with a synthetic name (`unary!`,
/// `binary@`); the trailing character is the operator itself. A unary
/// operator always has exactly one parameter and a binary operator
/// exactly two; the parser enforces this.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
    pub kind: OperatorKind,
    /// Binding strength for binary operators; ignored otherwise.
    pub precedence: i32,
}

impl Prototype {
    /// A plain, non-operator prototype.
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Prototype {
            name: name.into(),
            params,
            kind: OperatorKind::None,
            precedence: 0,
        }
    }

    pub fn is_unary_op(&self) -> bool {
        self.kind == OperatorKind::Unary
    }

    pub fn is_binary_op(&self) -> bool {
        self.kind == OperatorKind::Binary
    }

    /// The operator character of an operator prototype.
    pub fn operator_char(&self) -> Option<char> {
        match self.kind {
            OperatorKind::None => None,
            OperatorKind::Unary | OperatorKind::Binary => self.name.chars().last(),
        }
    }
}

/// A function definition: prototype plus body expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub proto: Prototype,
    pub body: Expr,
}

/// One top-level form as produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `def name(params) body`
    Definition(Function),
    /// `extern name(params)`
    Extern(Prototype),
    /// A bare expression. The session wraps it in a synthetic
    /// zero-parameter function before code generation.
    Expression(Expr),
}
