//! Lexer for the C-subset frontend.
//!
//! The lexer converts source text into a stream of tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{LexerError, LexerErrorKind};
use crate::utils::location::{SourceLocation, Span};
use std::iter::Peekable;
use std::str::Chars;
use unicode_xid::UnicodeXID;

/// A lexer for tokenizing source code.
pub struct Lexer<'a> {
    /// The source text
    source: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte offset
    offset: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Start of current token
    token_start: SourceLocation,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            token_start: SourceLocation::start(),
        }
    }

    /// Get the current location.
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }

    /// Create a span from token start to current location.
    fn make_span(&self) -> Span {
        Span::from_locations(self.token_start, self.current_location())
    }

    /// Peek at the current character without consuming it.
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Peek at the next character (one ahead).
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.offset..].chars();
        chars.next();
        chars.next()
    }

    /// Consume and return the current character.
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume the current character if it matches.
    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments.
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') => {
                    if self.peek_next() == Some('/') {
                        while self.peek().is_some() && self.peek() != Some('\n') {
                            self.advance();
                        }
                    } else if self.peek_next() == Some('*') {
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                Some('*') if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                None => break,
                                _ => {}
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Create a token with the given kind.
    fn make_token(&self, kind: TokenKind) -> Token {
        let span = self.make_span();
        let lexeme = self.source[span.start_offset..span.end_offset].to_string();
        Token::new(kind, span, lexeme)
    }

    /// Create an error.
    fn make_error(&self, message: &str, kind: LexerErrorKind) -> LexerError {
        LexerError {
            message: message.to_string(),
            span: self.make_span(),
            kind,
        }
    }

    /// Scan a number literal.
    fn scan_number(&mut self) -> Result<Token, LexerError> {
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }

        let mut is_float = false;

        if self.peek() == Some('.')
            && self.peek_next().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            is_float = true;
            self.advance();
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }

        if self.peek() == Some('e') || self.peek() == Some('E') {
            is_float = true;
            self.advance();
            if self.peek() == Some('+') || self.peek() == Some('-') {
                self.advance();
            }
            if !self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                return Err(self.make_error(
                    "Invalid floating-point exponent",
                    LexerErrorKind::InvalidNumber,
                ));
            }
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }

        if is_float {
            Ok(self.make_token(TokenKind::Float))
        } else {
            Ok(self.make_token(TokenKind::Integer))
        }
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .map(|c| c.is_xid_continue() || c == '_')
            .unwrap_or(false)
        {
            self.advance();
        }

        let span = self.make_span();
        let lexeme = &self.source[span.start_offset..span.end_offset];

        let kind = TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, span, lexeme.to_string())
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();
        self.token_start = self.current_location();

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(self.make_token(TokenKind::Eof)),
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            '%' => Ok(self.make_token(TokenKind::Percent)),

            '+' => {
                if self.match_char('+') {
                    Ok(self.make_token(TokenKind::PlusPlus))
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::PlusEqual))
                } else {
                    Ok(self.make_token(TokenKind::Plus))
                }
            }
            '-' => {
                if self.match_char('-') {
                    Ok(self.make_token(TokenKind::MinusMinus))
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::MinusEqual))
                } else {
                    Ok(self.make_token(TokenKind::Minus))
                }
            }
            '*' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::StarEqual))
                } else {
                    Ok(self.make_token(TokenKind::Star))
                }
            }
            '/' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::SlashEqual))
                } else {
                    Ok(self.make_token(TokenKind::Slash))
                }
            }

            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }
            '&' => {
                if self.match_char('&') {
                    Ok(self.make_token(TokenKind::AmpAmp))
                } else {
                    Err(self.make_error("Unexpected character '&'", LexerErrorKind::UnexpectedChar))
                }
            }
            '|' => {
                if self.match_char('|') {
                    Ok(self.make_token(TokenKind::PipePipe))
                } else {
                    Err(self.make_error("Unexpected character '|'", LexerErrorKind::UnexpectedChar))
                }
            }

            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_xid_start() || c == '_' => Ok(self.scan_identifier()),

            c => Err(self.make_error(
                &format!("Unexpected character '{}'", c),
                LexerErrorKind::UnexpectedChar,
            )),
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("x[i] += 1;"),
            vec![
                TokenKind::Identifier,
                TokenKind::LeftBracket,
                TokenKind::Identifier,
                TokenKind::RightBracket,
                TokenKind::PlusEqual,
                TokenKind::Integer,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_for_header() {
        assert_eq!(
            kinds("for (i = 0; i < n; i++)"),
            vec![
                TokenKind::For,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Integer,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::PlusPlus,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("int i; // trailing\n/* block\ncomment */ i++;"),
            vec![
                TokenKind::Int,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::PlusPlus,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_have_offsets() {
        let tokens = Lexer::new("x = y;").tokenize().unwrap();
        assert_eq!(tokens[2].span.start_offset, 4);
        assert_eq!(tokens[2].span.end_offset, 5);
        assert_eq!(tokens[2].lexeme, "y");
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(
            kinds("1.5 2e3"),
            vec![TokenKind::Float, TokenKind::Float, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lone_ampersand_rejected() {
        let result = Lexer::new("a & b").tokenize();
        assert!(result.is_err());
    }
}
