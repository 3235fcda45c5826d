use std::fmt;

/// A single token produced by the lexer.
///
/// Keywords are recognized eagerly; every other run of alphabetic
/// characters becomes an `Ident`. Characters the lexer does not
/// understand are passed through as `Char` tokens, which is how
/// operator characters (including user-defined ones) reach the
/// parser unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of the source stream. Terminal: the lexer keeps
    /// returning it once the input is exhausted.
    Eof,

    // Keywords
    Def,
    Extern,
    If,
    Then,
    Else,
    For,
    In,
    Var,
    Binary,
    Unary,

    /// Identifier with its text.
    Ident(String),
    /// Numeric literal with its (leniently parsed) value.
    Number(f64),
    /// Any other single character: operators and punctuation.
    Char(char),
}

impl Token {
    /// The raw character of a `Char` token, if that is what this is.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Token::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::If => write!(f, "'if'"),
            Token::Then => write!(f, "'then'"),
            Token::Else => write!(f, "'else'"),
            Token::For => write!(f, "'for'"),
            Token::In => write!(f, "'in'"),
            Token::Var => write!(f, "'var'"),
            Token::Binary => write!(f, "'binary'"),
            Token::Unary => write!(f, "'unary'"),
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Number(value) => write!(f, "number {value}"),
            Token::Char(c) => write!(f, "'{c}'"),
        }
    }
}
