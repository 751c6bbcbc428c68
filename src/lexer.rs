// ABOUTME: Lazily tokenizes Pluto source text into a stream of Tokens

use crate::token::{lookup_keyword, Position, Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

/// Tokenizes source text one token at a time. Whitespace and `#`
/// line-comments are consumed silently. Once the source is exhausted the
/// lexer yields `Eof` tokens forever — callers that peek one token ahead
/// (as the parser does) must tolerate reading past the logical end.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
    exhausted: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
            exhausted: false,
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos();

        let Some(c) = self.peek_char() else {
            self.exhausted = true;
            return Token::new(TokenKind::Eof, "", start, start);
        };

        if c.is_ascii_digit() || (c == '.' && self.peek_is_digit_after_dot()) {
            return self.lex_number(start);
        }

        if c == '"' {
            return self.lex_string(start);
        }

        if c == '`' {
            return self.lex_raw_string(start);
        }

        if c == '\'' {
            return self.lex_char(start);
        }

        if c == '$' {
            return self.lex_param(start);
        }

        if is_ident_start(c) {
            return self.lex_ident(start);
        }

        self.lex_punct(start)
    }

    fn peek_is_digit_after_dot(&self) -> bool {
        let mut clone = self.chars.clone();
        if clone.next() != Some('.') {
            return false;
        }
        matches!(clone.next(), Some(d) if d.is_ascii_digit())
    }

    fn lex_number(&mut self, start: Position) -> Token {
        let mut lit = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                lit.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            let mut clone = self.chars.clone();
            clone.next();
            if matches!(clone.next(), Some(d) if d.is_ascii_digit()) || lit.is_empty() {
                lit.push('.');
                self.bump();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        lit.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        let end = self.pos_before_bump_adjust();
        Token::new(TokenKind::Number, lit, start, end)
    }

    /// The token `end` is the column of the last character already consumed.
    fn pos_before_bump_adjust(&self) -> Position {
        let col = if self.col > 1 { self.col - 1 } else { 1 };
        Position::new(self.line, col)
    }

    fn lex_string(&mut self, start: Position) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => break,
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek_char() {
                        Some('n') => {
                            value.push('\n');
                            self.bump();
                        }
                        Some('"') => {
                            value.push('"');
                            self.bump();
                        }
                        Some('a') => {
                            value.push('\u{07}');
                            self.bump();
                        }
                        Some('b') => {
                            value.push('\u{08}');
                            self.bump();
                        }
                        Some('f') => {
                            value.push('\u{0C}');
                            self.bump();
                        }
                        Some('r') => {
                            value.push('\r');
                            self.bump();
                        }
                        Some('t') => {
                            value.push('\t');
                            self.bump();
                        }
                        Some('v') => {
                            value.push('\u{0B}');
                            self.bump();
                        }
                        Some('\\') => {
                            value.push('\\');
                            self.bump();
                        }
                        Some(other) => {
                            value.push(other);
                            self.bump();
                        }
                        None => {}
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        let end = self.pos_before_bump_adjust();
        Token::new(TokenKind::String, value, start, end)
    }

    fn lex_raw_string(&mut self, start: Position) -> Token {
        self.bump(); // opening backtick
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => break,
                Some('`') => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        let end = self.pos_before_bump_adjust();
        Token::new(TokenKind::String, value, start, end)
    }

    fn lex_char(&mut self, start: Position) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        if self.peek_char() == Some('\\') {
            self.bump();
            match self.bump() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some('\\') => value.push('\\'),
                Some('\'') => value.push('\''),
                Some(other) => value.push(other),
                None => {}
            }
        } else if let Some(c) = self.bump() {
            value.push(c);
        }
        if self.peek_char() == Some('\'') {
            self.bump();
        }
        let end = self.pos_before_bump_adjust();
        Token::new(TokenKind::Char, value, start, end)
    }

    fn lex_param(&mut self, start: Position) -> Token {
        self.bump(); // $
        let mut lit = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                lit.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let end = self.pos_before_bump_adjust();
        Token::new(TokenKind::Param, lit, start, end)
    }

    fn lex_ident(&mut self, start: Position) -> Token {
        let mut lit = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                lit.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let end = self.pos_before_bump_adjust();
        let kind = lookup_keyword(&lit).unwrap_or(TokenKind::Ident);
        Token::new(kind, lit, start, end)
    }

    fn lex_punct(&mut self, start: Position) -> Token {
        // Longest-match-first: two-character operators are tried before
        // their single-character prefix.
        let two = {
            let mut clone = self.chars.clone();
            let a = clone.next();
            let b = clone.next();
            match (a, b) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            }
        };

        if let Some((a, b)) = two {
            let kind = match (a, b) {
                ('*', '*') => Some(TokenKind::Exp),
                ('/', '/') => Some(TokenKind::FloorDiv),
                ('<', '=') => Some(TokenKind::Lte),
                ('>', '=') => Some(TokenKind::Gte),
                ('=', '=') => Some(TokenKind::Eq),
                ('!', '=') => Some(TokenKind::NotEq),
                (':', '=') => Some(TokenKind::Declare),
                ('-', '>') => Some(TokenKind::Arrow),
                ('=', '>') => Some(TokenKind::FatArrow),
                ('|', '|') => Some(TokenKind::Or),
                ('&', '&') => Some(TokenKind::And),
                _ => None,
            };
            if let Some(kind) = kind {
                self.bump();
                self.bump();
                let end = self.pos_before_bump_adjust();
                let lit = format!("{}{}", a, b);
                return Token::new(kind, lit, start, end);
            }
        }

        let c = self.bump().expect("lex_punct called at end of input");
        let kind = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '\\' => Some(TokenKind::Backslash),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '<' => Some(TokenKind::Lt),
            '>' => Some(TokenKind::Gt),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '[' => Some(TokenKind::LSquare),
            ']' => Some(TokenKind::RSquare),
            ';' => Some(TokenKind::Semi),
            '|' => Some(TokenKind::BitOr),
            '&' => Some(TokenKind::BitAnd),
            '=' => Some(TokenKind::Assign),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '%' => Some(TokenKind::Mod),
            '?' => Some(TokenKind::QMark),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };

        let end = self.pos_before_bump_adjust();
        match kind {
            Some(kind) => Token::new(kind, c.to_string(), start, end),
            None => Token::new(TokenKind::Illegal, c.to_string(), start, end),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '?' || c == '!'
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.exhausted {
            return None;
        }
        let tok = self.next_token();
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_numbers() {
        let mut lexer = Lexer::new("42 3.14 0.5");
        assert_eq!(lexer.next_token().literal, "42");
        assert_eq!(lexer.next_token().literal, "3.14");
        assert_eq!(lexer.next_token().literal, "0.5");
    }

    #[test]
    fn prefers_longest_punctuation() {
        assert_eq!(
            kinds("** * // / <= < == = := : => -> && &"),
            vec![
                TokenKind::Exp,
                TokenKind::Star,
                TokenKind::FloorDiv,
                TokenKind::Slash,
                TokenKind::Lte,
                TokenKind::Lt,
                TokenKind::Eq,
                TokenKind::Assign,
                TokenKind::Declare,
                TokenKind::Colon,
                TokenKind::FatArrow,
                TokenKind::Arrow,
                TokenKind::And,
                TokenKind::BitAnd,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_aliases() {
        assert_eq!(kinds("true yes false no null"), kinds("true true false false null"));
    }

    #[test]
    fn lexes_param_tokens() {
        let mut lexer = Lexer::new("$name");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Param);
        assert_eq!(tok.literal, "name");
    }

    #[test]
    fn string_escapes_map_tab_to_tab_not_carriage_return() {
        let mut lexer = Lexer::new(r#""a\tb""#);
        let tok = lexer.next_token();
        assert_eq!(tok.literal, "a\tb");
    }

    #[test]
    fn raw_strings_skip_escape_processing() {
        let mut lexer = Lexer::new(r"`a\nb`");
        let tok = lexer.next_token();
        assert_eq!(tok.literal, r"a\nb");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("1 # comment\n2"), vec![TokenKind::Number, TokenKind::Number]);
    }

    #[test]
    fn illegal_characters_are_tagged() {
        assert_eq!(kinds("@"), vec![TokenKind::Illegal]);
    }

    #[test]
    fn lexer_tolerates_reading_past_eof() {
        let mut lexer = Lexer::new("1");
        assert_eq!(lexer.next_token().kind, TokenKind::Number);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
}
