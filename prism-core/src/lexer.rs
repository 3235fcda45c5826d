//! Hand-written pull lexer.
//!
//! The lexer holds exactly one character of lookahead and produces one
//! token per call to [`Lexer::next_token`]. It knows nothing about
//! operators or precedence; any character it cannot classify is handed
//! to the parser as a raw [`Token::Char`].

use crate::token::Token;
use std::str::Chars;

pub struct Lexer<'src> {
    chars: Chars<'src>,
    /// The next unconsumed character, `None` once the input is spent.
    lookahead: Option<char>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut chars = source.chars();
        let lookahead = chars.next();
        Lexer { chars, lookahead }
    }

    fn bump(&mut self) -> Option<char> {
        let current = self.lookahead;
        self.lookahead = self.chars.next();
        current
    }

    /// Produce the next token. Returns [`Token::Eof`] at the end of the
    /// input and keeps returning it on every later call.
    pub fn next_token(&mut self) -> Token {
        loop {
            while matches!(self.lookahead, Some(c) if c.is_whitespace()) {
                self.bump();
            }

            let Some(c) = self.lookahead else {
                return Token::Eof;
            };

            if c.is_ascii_alphabetic() {
                return self.ident_or_keyword();
            }
            if c.is_ascii_digit() || c == '.' {
                return self.number();
            }
            if c == '#' {
                // Line comment: skip to the end of the line and rescan.
                while !matches!(self.lookahead, None | Some('\n') | Some('\r')) {
                    self.bump();
                }
                continue;
            }

            self.bump();
            return Token::Char(c);
        }
    }

    fn ident_or_keyword(&mut self) -> Token {
        let mut text = String::new();
        while matches!(self.lookahead, Some(c) if c.is_ascii_alphanumeric()) {
            if let Some(c) = self.bump() {
                text.push(c);
            }
        }
        match text.as_str() {
            "def" => Token::Def,
            "extern" => Token::Extern,
            "if" => Token::If,
            "then" => Token::Then,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "var" => Token::Var,
            "binary" => Token::Binary,
            "unary" => Token::Unary,
            _ => Token::Ident(text),
        }
    }

    fn number(&mut self) -> Token {
        let mut text = String::new();
        while matches!(self.lookahead, Some(c) if c.is_ascii_digit() || c == '.') {
            if let Some(c) = self.bump() {
                text.push(c);
            }
        }
        Token::Number(lenient_number(&text))
    }
}

/// Numeric scan is deliberately lenient: the scanned text may contain
/// several dots, and the value is that of the longest prefix that still
/// parses as a number. `1.2.3` is the number 1.2 and a bare `.` is 0.0.
fn lenient_number(text: &str) -> f64 {
    for end in (1..=text.len()).rev() {
        if let Ok(value) = text[..end].parse::<f64>() {
            return value;
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token == Token::Eof;
            out.push(token);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            tokens_of("def deffy extern if then else for in var binary unary"),
            vec![
                Token::Def,
                Token::Ident("deffy".into()),
                Token::Extern,
                Token::If,
                Token::Then,
                Token::Else,
                Token::For,
                Token::In,
                Token::Var,
                Token::Binary,
                Token::Unary,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_take_trailing_digits() {
        assert_eq!(
            tokens_of("x1 fib2n"),
            vec![
                Token::Ident("x1".into()),
                Token::Ident("fib2n".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn number_literals() {
        assert_eq!(
            tokens_of("42 3.5 .5"),
            vec![
                Token::Number(42.0),
                Token::Number(3.5),
                Token::Number(0.5),
                Token::Eof
            ]
        );
    }

    #[test]
    fn multi_dot_number_keeps_longest_valid_prefix() {
        assert_eq!(
            tokens_of("1.2.3"),
            vec![Token::Number(1.2), Token::Eof]
        );
    }

    #[test]
    fn lone_dot_is_zero() {
        assert_eq!(tokens_of("."), vec![Token::Number(0.0), Token::Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens_of("# leading comment\n1 # trailing\n2"),
            vec![Token::Number(1.0), Token::Number(2.0), Token::Eof]
        );
    }

    #[test]
    fn comment_at_end_of_input() {
        assert_eq!(tokens_of("# nothing after"), vec![Token::Eof]);
    }

    #[test]
    fn unknown_characters_pass_through() {
        assert_eq!(
            tokens_of("a @ b ; ("),
            vec![
                Token::Ident("a".into()),
                Token::Char('@'),
                Token::Ident("b".into()),
                Token::Char(';'),
                Token::Char('('),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn eof_is_terminal() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token(), Token::Ident("x".into()));
        assert_eq!(lexer.next_token(), Token::Eof);
        assert_eq!(lexer.next_token(), Token::Eof);
        assert_eq!(lexer.next_token(), Token::Eof);
    }
}
