//! Token types for the C++ lexer.
//!
//! Defines the [`CppToken`] enum covering the keywords the structural parser
//! and the analyzers care about, punctuation, and literals, plus the
//! [`Token`] struct pairing a token kind with its source [`Span`].
//!
//! Contextual keywords (`override`, `final`, `import`) are lexed as
//! identifiers and recognized by text where it matters.

use hybrid_source::Span;
use serde::{Deserialize, Serialize};

/// A C++ token kind.
///
/// Literal values are not stored in the token; they are retrieved from the
/// source text using the token's span. `>>` is always lexed as two
/// [`CppToken::Greater`] tokens so template argument lists close cleanly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CppToken {
    // === Keywords ===
    /// `auto`
    Auto,
    /// `bool`
    Bool,
    /// `break`
    Break,
    /// `case`
    Case,
    /// `catch`
    Catch,
    /// `char`
    Char,
    /// `class`
    Class,
    /// `co_await`
    CoAwait,
    /// `co_return`
    CoReturn,
    /// `co_yield`
    CoYield,
    /// `concept`
    Concept,
    /// `const`
    Const,
    /// `consteval`
    Consteval,
    /// `constexpr`
    Constexpr,
    /// `constinit`
    Constinit,
    /// `continue`
    Continue,
    /// `decltype`
    Decltype,
    /// `default`
    Default,
    /// `delete`
    Delete,
    /// `do`
    Do,
    /// `double`
    Double,
    /// `else`
    Else,
    /// `enum`
    Enum,
    /// `explicit`
    Explicit,
    /// `extern`
    Extern,
    /// `false`
    False,
    /// `float`
    Float,
    /// `for`
    For,
    /// `friend`
    Friend,
    /// `if`
    If,
    /// `inline`
    Inline,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `mutable`
    Mutable,
    /// `namespace`
    Namespace,
    /// `new`
    New,
    /// `noexcept`
    Noexcept,
    /// `nullptr`
    Nullptr,
    /// `operator`
    Operator,
    /// `private`
    Private,
    /// `protected`
    Protected,
    /// `public`
    Public,
    /// `requires`
    Requires,
    /// `return`
    Return,
    /// `short`
    Short,
    /// `signed`
    Signed,
    /// `sizeof`
    Sizeof,
    /// `static`
    Static,
    /// `static_assert`
    StaticAssert,
    /// `struct`
    Struct,
    /// `switch`
    Switch,
    /// `template`
    Template,
    /// `this`
    This,
    /// `thread_local`
    ThreadLocal,
    /// `throw`
    Throw,
    /// `true`
    True,
    /// `try`
    Try,
    /// `typedef`
    Typedef,
    /// `typename`
    Typename,
    /// `union`
    Union,
    /// `unsigned`
    Unsigned,
    /// `using`
    Using,
    /// `virtual`
    Virtual,
    /// `void`
    Void,
    /// `volatile`
    Volatile,
    /// `while`
    While,

    // === Literals ===
    /// An identifier.
    Identifier,
    /// An integer literal (`42`, `0x2A`, `1'000u`).
    IntLiteral,
    /// A floating literal (`1.5`, `2e10f`).
    FloatLiteral,
    /// A string literal, including prefixed and raw forms.
    StringLiteral,
    /// A character literal.
    CharLiteral,

    // === Punctuation ===
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `<<`
    ShiftLeft,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `::`
    ColonColon,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `...`
    Ellipsis,
    /// `->`
    Arrow,
    /// `?`
    Question,
    /// `=`
    Assign,
    /// `==`
    EqualEqual,
    /// `!=`
    BangEqual,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `&&`
    AmpAmp,
    /// `|`
    Pipe,
    /// `||`
    PipePipe,
    /// `^`
    Caret,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// Compound assignment (`+=`, `-=`, `<<=`, ...).
    CompoundAssign,
    /// `#` or `##` outside a preprocessor line.
    Hash,

    // === Special ===
    /// A byte the lexer does not recognize.
    Unknown,
    /// End of input.
    Eof,
}

impl CppToken {
    /// True for keywords that can start or continue a builtin type name.
    pub fn is_builtin_type(self) -> bool {
        matches!(
            self,
            CppToken::Auto
                | CppToken::Bool
                | CppToken::Char
                | CppToken::Double
                | CppToken::Float
                | CppToken::Int
                | CppToken::Long
                | CppToken::Short
                | CppToken::Signed
                | CppToken::Unsigned
                | CppToken::Void
        )
    }

    /// True for `const` and `volatile`.
    pub fn is_cv(self) -> bool {
        matches!(self, CppToken::Const | CppToken::Volatile)
    }

    /// True for `public`, `protected` and `private`.
    pub fn is_access(self) -> bool {
        matches!(
            self,
            CppToken::Public | CppToken::Protected | CppToken::Private
        )
    }
}

/// A token with its kind and source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The kind of this token.
    pub kind: CppToken,
    /// The source span of this token.
    pub span: Span,
}

/// Looks up a keyword from its text. Returns `None` for non-keywords.
pub fn lookup_keyword(s: &str) -> Option<CppToken> {
    match s {
        "auto" => Some(CppToken::Auto),
        "bool" => Some(CppToken::Bool),
        "break" => Some(CppToken::Break),
        "case" => Some(CppToken::Case),
        "catch" => Some(CppToken::Catch),
        "char" => Some(CppToken::Char),
        "class" => Some(CppToken::Class),
        "co_await" => Some(CppToken::CoAwait),
        "co_return" => Some(CppToken::CoReturn),
        "co_yield" => Some(CppToken::CoYield),
        "concept" => Some(CppToken::Concept),
        "const" => Some(CppToken::Const),
        "consteval" => Some(CppToken::Consteval),
        "constexpr" => Some(CppToken::Constexpr),
        "constinit" => Some(CppToken::Constinit),
        "continue" => Some(CppToken::Continue),
        "decltype" => Some(CppToken::Decltype),
        "default" => Some(CppToken::Default),
        "delete" => Some(CppToken::Delete),
        "do" => Some(CppToken::Do),
        "double" => Some(CppToken::Double),
        "else" => Some(CppToken::Else),
        "enum" => Some(CppToken::Enum),
        "explicit" => Some(CppToken::Explicit),
        "extern" => Some(CppToken::Extern),
        "false" => Some(CppToken::False),
        "float" => Some(CppToken::Float),
        "for" => Some(CppToken::For),
        "friend" => Some(CppToken::Friend),
        "if" => Some(CppToken::If),
        "inline" => Some(CppToken::Inline),
        "int" => Some(CppToken::Int),
        "long" => Some(CppToken::Long),
        "mutable" => Some(CppToken::Mutable),
        "namespace" => Some(CppToken::Namespace),
        "new" => Some(CppToken::New),
        "noexcept" => Some(CppToken::Noexcept),
        "nullptr" => Some(CppToken::Nullptr),
        "operator" => Some(CppToken::Operator),
        "private" => Some(CppToken::Private),
        "protected" => Some(CppToken::Protected),
        "public" => Some(CppToken::Public),
        "requires" => Some(CppToken::Requires),
        "return" => Some(CppToken::Return),
        "short" => Some(CppToken::Short),
        "signed" => Some(CppToken::Signed),
        "sizeof" => Some(CppToken::Sizeof),
        "static" => Some(CppToken::Static),
        "static_assert" => Some(CppToken::StaticAssert),
        "struct" => Some(CppToken::Struct),
        "switch" => Some(CppToken::Switch),
        "template" => Some(CppToken::Template),
        "this" => Some(CppToken::This),
        "thread_local" => Some(CppToken::ThreadLocal),
        "throw" => Some(CppToken::Throw),
        "true" => Some(CppToken::True),
        "try" => Some(CppToken::Try),
        "typedef" => Some(CppToken::Typedef),
        "typename" => Some(CppToken::Typename),
        "union" => Some(CppToken::Union),
        "unsigned" => Some(CppToken::Unsigned),
        "using" => Some(CppToken::Using),
        "virtual" => Some(CppToken::Virtual),
        "void" => Some(CppToken::Void),
        "volatile" => Some(CppToken::Volatile),
        "while" => Some(CppToken::While),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(lookup_keyword("class"), Some(CppToken::Class));
        assert_eq!(lookup_keyword("co_await"), Some(CppToken::CoAwait));
        assert_eq!(lookup_keyword("noexcept"), Some(CppToken::Noexcept));
        assert_eq!(lookup_keyword("override"), None);
        assert_eq!(lookup_keyword("Class"), None);
    }

    #[test]
    fn classification() {
        assert!(CppToken::Unsigned.is_builtin_type());
        assert!(!CppToken::Identifier.is_builtin_type());
        assert!(CppToken::Volatile.is_cv());
        assert!(CppToken::Protected.is_access());
    }
}
