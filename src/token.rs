use crate::common::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// `"..."`
    String,
    /// `'...'`, only meaningful as a `string` variable initializer
    StringDecl,
    Eof,

    // keywords
    True,
    False,
    Picture,
    Load,

    // symbols
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    Comma,
    Colon,
    Semicolon,
    Equal,
    Arrow,

    // binary operators
    Plus,
    Minus,
    Star,
    Slash,

    Lesser,
    Greater,
    LesserEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,

    Unknown,
}

impl TokenKind {
    pub fn from_keyword_str(name: &str) -> Option<TokenKind> {
        match name {
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "picture" => Some(TokenKind::Picture),
            "load" => Some(TokenKind::Load),
            _ => None,
        }
    }

    pub fn is_binary_op(&self) -> bool {
        matches!(
            *self,
            Self::Plus
                | Self::Minus
                | Self::Star
                | Self::Slash
                | Self::Lesser
                | Self::Greater
                | Self::LesserEqual
                | Self::GreaterEqual
                | Self::EqualEqual
                | Self::BangEqual
        )
    }

    /// Tokens after which a `-` is subtraction rather than a negative literal.
    pub fn is_operand(&self) -> bool {
        matches!(
            *self,
            Self::Ident
                | Self::Number
                | Self::String
                | Self::StringDecl
                | Self::True
                | Self::False
                | Self::RightParen
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The lexeme, or the decoded contents for string literals.
    pub text: String,
    pub number: i64,
    pub span: Span,
    pub line: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    /// Text as it would appear in a diagnostic.
    pub fn describe(&self) -> &str {
        if self.kind == TokenKind::Eof {
            "end of file"
        } else {
            &self.text
        }
    }
}
