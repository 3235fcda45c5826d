//! Recursive-descent parser.
//!
//! Binary expressions use precedence climbing against a
//! [`PrecedenceTable`] that the caller owns and may mutate between
//! top-level forms; the table is therefore passed into
//! [`Parser::next_item`] on every call rather than captured up front.
//!
//! The parser is resilient: when a form fails, `next_item` reports the
//! error, discards exactly one token, and the next call picks up from
//! there.

use crate::ast::{Expr, Function, Item, OperatorKind, Prototype};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::precedence::{PrecedenceTable, DEFAULT_BINARY_PRECEDENCE, PRECEDENCE_RANGE};
use crate::token::Token;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Parser { lexer, current }
    }

    fn bump(&mut self) -> Token {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ParseError> {
        if self.current == token {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::Expected {
                expected,
                found: self.current.clone(),
            })
        }
    }

    /// Parse the next top-level form, or `None` at end of input.
    /// Stray semicolons between forms are skipped. On an error the
    /// offending token has already been discarded, so calling again
    /// resumes parsing.
    pub fn next_item(&mut self, table: &PrecedenceTable) -> Option<Result<Item, ParseError>> {
        loop {
            let parsed = match &self.current {
                Token::Eof => return None,
                Token::Char(';') => {
                    self.bump();
                    continue;
                }
                Token::Def => self.parse_definition(table).map(Item::Definition),
                Token::Extern => self.parse_extern().map(Item::Extern),
                _ => self.parse_expression(table).map(Item::Expression),
            };
            return Some(parsed.inspect_err(|_| {
                self.bump();
            }));
        }
    }

    fn parse_definition(&mut self, table: &PrecedenceTable) -> Result<Function, ParseError> {
        self.bump(); // def
        let proto = self.parse_prototype()?;
        let body = self.parse_expression(table)?;
        Ok(Function { proto, body })
    }

    fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.bump(); // extern
        self.parse_prototype()
    }

    /// `name(params)`, `unary!(p)` or `binary@ 50 (a b)`. Parameters
    /// are whitespace-separated identifiers. The precedence literal of
    /// a binary operator is optional and truncated toward zero before
    /// the range check.
    fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let (name, kind, precedence) = match self.current.clone() {
            Token::Ident(name) => {
                self.bump();
                (name, OperatorKind::None, 0)
            }
            Token::Unary => {
                self.bump();
                let op = self.operator_char("unary operator character")?;
                (format!("unary{op}"), OperatorKind::Unary, 0)
            }
            Token::Binary => {
                self.bump();
                let op = self.operator_char("binary operator character")?;
                let mut precedence = DEFAULT_BINARY_PRECEDENCE;
                if let Token::Number(value) = self.current {
                    let value = value as i32;
                    if !PRECEDENCE_RANGE.contains(&value) {
                        return Err(ParseError::PrecedenceOutOfRange(value));
                    }
                    precedence = value;
                    self.bump();
                }
                (format!("binary{op}"), OperatorKind::Binary, precedence)
            }
            found => {
                return Err(ParseError::Expected {
                    expected: "function name in prototype",
                    found,
                });
            }
        };

        self.expect(Token::Char('('), "'(' in prototype")?;
        let mut params = Vec::new();
        while let Token::Ident(param) = &self.current {
            params.push(param.clone());
            self.bump();
        }
        self.expect(Token::Char(')'), "')' in prototype")?;

        let required = match kind {
            OperatorKind::None => None,
            OperatorKind::Unary => Some(1),
            OperatorKind::Binary => Some(2),
        };
        if let Some(required) = required {
            if params.len() != required {
                return Err(ParseError::OperatorArity {
                    op: name.chars().last().unwrap_or('?'),
                    expected: required,
                    found: params.len(),
                });
            }
        }

        Ok(Prototype {
            name,
            params,
            kind,
            precedence,
        })
    }

    pub fn parse_expression(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        let lhs = self.parse_unary(table)?;
        self.parse_binary_rhs(table, 0, lhs)
    }

    fn parse_binary_rhs(
        &mut self,
        table: &PrecedenceTable,
        min_precedence: i32,
        mut lhs: Expr,
    ) -> Result<Expr, ParseError> {
        loop {
            let precedence = table.token_precedence(&self.current);
            if precedence < min_precedence {
                return Ok(lhs);
            }
            let Some(op) = self.current.as_char() else {
                return Ok(lhs);
            };
            self.bump();

            let mut rhs = self.parse_unary(table)?;
            // A tighter operator to the right claims the rhs first.
            if precedence < table.token_precedence(&self.current) {
                rhs = self.parse_binary_rhs(table, precedence + 1, rhs)?;
            }
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// Any raw ASCII character other than grouping or argument
    /// punctuation binds as a prefix operator here; whether an
    /// implementation for it exists is codegen's problem.
    fn parse_unary(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        match self.current {
            Token::Char(op) if op.is_ascii() && op != '(' && op != ',' => {
                self.bump();
                let operand = self.parse_unary(table)?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(table),
        }
    }

    fn parse_primary(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        match self.current.clone() {
            Token::Number(value) => {
                self.bump();
                Ok(Expr::Number(value))
            }
            Token::Ident(name) => {
                self.bump();
                self.parse_call_or_variable(table, name)
            }
            Token::Char('(') => self.parse_paren_expr(table),
            Token::If => self.parse_if(table),
            Token::For => self.parse_for(table),
            Token::Var => self.parse_var(table),
            found => Err(ParseError::ExpectedExpression(found)),
        }
    }

    fn parse_call_or_variable(
        &mut self,
        table: &PrecedenceTable,
        name: String,
    ) -> Result<Expr, ParseError> {
        if self.current != Token::Char('(') {
            return Ok(Expr::Variable(name));
        }
        self.bump(); // (
        let mut args = Vec::new();
        if self.current != Token::Char(')') {
            loop {
                args.push(self.parse_expression(table)?);
                match &self.current {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        self.bump();
                    }
                    _ => {
                        return Err(ParseError::Expected {
                            expected: "')' or ',' in argument list",
                            found: self.current.clone(),
                        });
                    }
                }
            }
        }
        self.bump(); // )
        Ok(Expr::Call { callee: name, args })
    }

    fn parse_paren_expr(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        self.bump(); // (
        let inner = self.parse_expression(table)?;
        self.expect(Token::Char(')'), "')'")?;
        Ok(inner)
    }

    fn parse_if(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        self.bump(); // if
        let cond = self.parse_expression(table)?;
        self.expect(Token::Then, "'then'")?;
        let then_branch = self.parse_expression(table)?;
        self.expect(Token::Else, "'else'")?;
        let else_branch = self.parse_expression(table)?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_for(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        self.bump(); // for
        let Token::Ident(var) = self.current.clone() else {
            return Err(ParseError::Expected {
                expected: "loop variable name after 'for'",
                found: self.current.clone(),
            });
        };
        self.bump();
        self.expect(Token::Char('='), "'=' after loop variable")?;
        let start = self.parse_expression(table)?;
        self.expect(Token::Char(','), "',' after loop start value")?;
        let end = self.parse_expression(table)?;
        let step = if self.current == Token::Char(',') {
            self.bump();
            Some(Box::new(self.parse_expression(table)?))
        } else {
            None
        };
        self.expect(Token::In, "'in' after 'for'")?;
        let body = self.parse_expression(table)?;
        Ok(Expr::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
        })
    }

    fn parse_var(&mut self, table: &PrecedenceTable) -> Result<Expr, ParseError> {
        self.bump(); // var
        let mut bindings = Vec::new();
        loop {
            let Token::Ident(name) = self.current.clone() else {
                return Err(ParseError::Expected {
                    expected: "identifier after 'var'",
                    found: self.current.clone(),
                });
            };
            self.bump();
            let init = if self.current == Token::Char('=') {
                self.bump();
                Some(self.parse_expression(table)?)
            } else {
                None
            };
            bindings.push((name, init));
            if self.current != Token::Char(',') {
                break;
            }
            self.bump();
        }
        self.expect(Token::In, "'in' after 'var'")?;
        let body = self.parse_expression(table)?;
        Ok(Expr::Var {
            bindings,
            body: Box::new(body),
        })
    }

    fn operator_char(&mut self, expected: &'static str) -> Result<char, ParseError> {
        match self.current {
            Token::Char(c) if c.is_ascii() => {
                self.bump();
                Ok(c)
            }
            _ => Err(ParseError::Expected {
                expected,
                found: self.current.clone(),
            }),
        }
    }
}
