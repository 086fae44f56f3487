use crate::{
    common::Span,
    token::{Token, TokenKind},
};

use unicode_xid::UnicodeXID;

/// Pull-model tokenizer shared by the declaration parser and the
/// expression evaluator.
///
/// Dots continue an identifier, so `hero.health` and `hero.attack` arrive as
/// single identifier tokens. A `-` directly followed by a digit starts a
/// negative number unless the previous token was an operand.
#[derive(Debug, Clone)]
pub struct Lexer {
    pub source: Vec<char>,

    start: usize,
    current: usize,
    line: usize,
    start_line: usize,
    previous: Option<TokenKind>,
    finished: bool,
}

impl Lexer {
    pub fn from_str(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            start: 0,
            current: 0,
            line: 1,
            start_line: 1,
            previous: None,
            finished: false,
        }
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn get_span(&self) -> Span {
        self.start..self.current
    }

    pub fn slice(&self, span: &Span) -> String {
        let end = span.end.min(self.source.len());
        let start = span.start.min(end);
        self.source[start..end].iter().collect()
    }

    fn create_token(&mut self, kind: TokenKind, text: String, number: i64) -> Token {
        self.previous = Some(kind);
        Token {
            kind,
            text,
            number,
            span: self.get_span(),
            line: self.start_line,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while !self.at_end() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Token {
        self.advance(); // opening quote
        let mut out = String::new();

        // an unterminated literal runs to the end of the input
        while let Some(c) = self.advance() {
            if c == quote {
                break;
            }
            if c == '\\' {
                match self.advance() {
                    Some('n') => out.push('\n'),
                    Some(escaped) => out.push(escaped),
                    None => out.push('\\'),
                }
                continue;
            }
            out.push(c);
        }

        let kind = if quote == '"' {
            TokenKind::String
        } else {
            TokenKind::StringDecl
        };
        self.create_token(kind, out, 0)
    }

    fn lex_number(&mut self) -> Token {
        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let text = self.slice(&self.get_span());
        // out-of-range literals quietly become 0
        let number = text.parse::<i64>().unwrap_or(0);
        self.create_token(TokenKind::Number, text, number)
    }

    fn lex_ident(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_xid_continue() || c == '.') {
            self.advance();
        }

        let text = self.slice(&self.get_span());
        let kind = TokenKind::from_keyword_str(&text).unwrap_or(TokenKind::Ident);
        self.create_token(kind, text, 0)
    }

    fn lex_symbol(&mut self, c: char) -> Token {
        let two = self.peek_next().map(|next| [c, next]);
        let double = match two {
            Some(['<', '=']) => Some(TokenKind::LesserEqual),
            Some(['>', '=']) => Some(TokenKind::GreaterEqual),
            Some(['=', '=']) => Some(TokenKind::EqualEqual),
            Some(['!', '=']) => Some(TokenKind::BangEqual),
            Some(['-', '>']) => Some(TokenKind::Arrow),
            _ => None,
        };

        if let Some(kind) = double {
            self.advance();
            self.advance();
            let text = self.slice(&self.get_span());
            return self.create_token(kind, text, 0);
        }

        self.advance();
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '=' => TokenKind::Equal,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => TokenKind::Lesser,
            '>' => TokenKind::Greater,
            _ => TokenKind::Unknown,
        };
        self.create_token(kind, c.to_string(), 0)
    }

    /// Produces exactly one token per call; after the input is exhausted
    /// every call returns an end-of-input token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        self.start = self.current;
        self.start_line = self.line;

        let c = match self.peek() {
            Some(c) => c,
            None => return self.create_token(TokenKind::Eof, String::new(), 0),
        };

        let negative_literal = c == '-'
            && matches!(self.peek_next(), Some(next) if next.is_ascii_digit())
            && !self.previous.map_or(false, |kind| kind.is_operand());

        match c {
            '"' | '\'' => self.lex_string(c),
            _ if c.is_ascii_digit() || negative_literal => self.lex_number(),
            _ if c.is_xid_start() || c == '_' => self.lex_ident(),
            _ => self.lex_symbol(c),
        }
    }

    /// Every remaining token, including the final end-of-input token.
    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
            return None;
        }
        Some(token)
    }
}
