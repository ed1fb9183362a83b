//! Token kinds shared by the lexer, the expression evaluator, and the
//! public [`crate::driver::TokenIterator`] surface.

/// Check if a character can start an identifier (letter or underscore)
pub const fn is_identifier_start(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore)
pub const fn is_identifier_continue(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || (c >= '0' && c <= '9') || c == '_'
}

/// A half-open byte range into an [`crate::include::IncludeFrame`]'s owned source text.
///
/// Spans are never retained past the popping of the frame that produced
/// them; a synthetic frame created during macro substitution owns its
/// flattened text for exactly this reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u32,
    pub len: u32,
}

impl Span {
    #[must_use]
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    #[must_use]
    pub fn resolve<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset as usize..(self.offset + self.len) as usize]
    }
}

/// One lexical unit as produced by the line lexer in [`crate::engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    /// `#`
    Hash,
    /// `##`
    HashHash,
    Increment,
    Decrement,
    LShift,
    RShift,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    AndAnd,
    OrOr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LShiftAssign,
    RShiftAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Newline,
    Whitespace,
    IncompleteComment,
    BadChars,
    EndOfInput,
    PreprocessingError,
    /// A single-character punctuation token, carrying the character itself.
    Punctuation(char),
    // Directive keywords, recognized only in directive position.
    DirectiveInclude,
    DirectiveLine,
    DirectiveDefine,
    DirectiveUndef,
    DirectiveIf,
    DirectiveIfdef,
    DirectiveIfndef,
    DirectiveElse,
    DirectiveElif,
    DirectiveEndif,
    DirectiveError,
    DirectiveWarning,
    DirectivePragma,
}

impl TokenKind {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            TokenKind::IncompleteComment | TokenKind::BadChars | TokenKind::PreprocessingError
        )
    }

    #[must_use]
    pub const fn is_directive_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::DirectiveInclude
                | TokenKind::DirectiveLine
                | TokenKind::DirectiveDefine
                | TokenKind::DirectiveUndef
                | TokenKind::DirectiveIf
                | TokenKind::DirectiveIfdef
                | TokenKind::DirectiveIfndef
                | TokenKind::DirectiveElse
                | TokenKind::DirectiveElif
                | TokenKind::DirectiveEndif
                | TokenKind::DirectiveError
                | TokenKind::DirectiveWarning
                | TokenKind::DirectivePragma
        )
    }
}

/// A lexed token: a classification plus a span into the frame it was lexed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.resolve(source)
    }
}

/// An owned token yielded by [`crate::driver::TokenIterator`]: the same
/// classification as [`Token`], but carrying its own spelling instead of
/// a span into a frame that may since have been popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedToken {
    pub kind: TokenKind,
    pub text: String,
}

/// Tokens as consumed by the constant-expression evaluator (`#if`/`#elif`).
///
/// Distinct from [`TokenKind`] because the evaluator works over owned
/// values (an already-macro-expanded integer or identifier), not spans
/// into a particular frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExprToken {
    Number(i64),
    Identifier(String),
    Defined,
    LParen,
    RParen,
    Not,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,
}
