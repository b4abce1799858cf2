//! Structural recursive-descent parser for C++ translation units.
//!
//! The parser recognizes declarations only: classes and structs with their
//! access sections, bases, fields and methods; free functions; namespace
//! scope variables; enums; aliases. Function bodies are kept as opaque text
//! for the analyzers and generators. `namespace` and `extern "C"` blocks are
//! transparent.
//!
//! Anything the parser cannot match is skipped up to the next `;` or
//! balanced `{...}` and reported as [`W101`]; unbalanced braces are reported
//! as [`W102`] and the affected construct runs to end of input.

use crate::errors::{W101, W102, W103};
use crate::token::{CppToken, Token};
use crate::types::TypeResolver;
use hybrid_common::{find_matching, find_top_level, split_top_level};
use hybrid_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use hybrid_ir::type_map::normalize;
use hybrid_ir::{
    AccessLevel, BaseClass, ClassDecl, EnumDecl, ExceptionSpec, Function, Ir, MemberInit, Type,
    Variable,
};
use hybrid_source::{FileId, Span};
use tracing::{debug, trace};

/// One parsed declaration.
enum Declaration {
    /// A function, with the `A::B` qualifier of an out-of-line definition.
    Function(Box<Function>, Option<String>),
    /// The variables of one declaration, with the qualifier of a static
    /// member definition.
    Variables(Vec<Variable>, Option<String>),
    /// Recognized and dropped: friends, deleted functions.
    Ignored,
}

/// What `class`/`struct`/`union` at the current position turned out to be.
enum ClassOutcome {
    Defined(ClassDecl),
    Forward,
    /// An elaborated type in a declaration (`struct Point p;`); the position
    /// is restored to the keyword.
    NotADefinition,
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
struct Specifiers {
    is_static: bool,
    is_virtual: bool,
    is_constexpr: bool,
    is_mutable: bool,
    is_friend: bool,
}

/// Structural parser over a token stream.
pub struct CppParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    file: FileId,
    sink: &'src DiagnosticSink,
    resolver: TypeResolver,
    ir: Ir,
}

impl<'src> CppParser<'src> {
    /// Creates a parser over `tokens`, which must end with an EOF token.
    pub fn new(
        tokens: Vec<Token>,
        source: &'src str,
        file: FileId,
        sink: &'src DiagnosticSink,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            file,
            sink,
            resolver: TypeResolver::new(),
            ir: Ir::new(),
        }
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn kind_at(&self, index: usize) -> CppToken {
        self.tokens.get(index).map_or(CppToken::Eof, |t| t.kind)
    }

    fn current(&self) -> CppToken {
        self.kind_at(self.pos)
    }

    fn peek_kind(&self, offset: usize) -> CppToken {
        self.kind_at(self.pos + offset)
    }

    fn span_at(&self, index: usize) -> Span {
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last())
            .map_or(Span::new(self.file, 0, 0), |t| t.span)
    }

    fn current_span(&self) -> Span {
        self.span_at(self.pos)
    }

    fn text_at(&self, index: usize) -> &'src str {
        let source: &'src str = self.source;
        match self.tokens.get(index) {
            Some(t) => &source[t.span.start as usize..t.span.end as usize],
            None => "",
        }
    }

    fn current_text(&self) -> &'src str {
        self.text_at(self.pos)
    }

    fn at(&self, kind: CppToken) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.at(CppToken::Eof)
    }

    fn at_ident(&self, text: &str) -> bool {
        self.at(CppToken::Identifier) && self.current_text() == text
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: CppToken) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Span from token `start` through the last consumed token.
    fn span_from(&self, start: usize) -> Span {
        let first = self.span_at(start);
        if self.pos > start {
            first.to(self.span_at(self.pos - 1))
        } else {
            first
        }
    }

    /// Source text from token `start` through token `end - 1`.
    fn slice(&self, start: usize, end: usize) -> &'src str {
        let source: &'src str = self.source;
        if end <= start || end > self.tokens.len() {
            return "";
        }
        let from = self.tokens[start].span.start as usize;
        let to = self.tokens[end - 1].span.end as usize;
        &source[from..to]
    }

    /// Source text strictly between two tokens.
    fn slice_between(&self, open: usize, close: usize) -> &'src str {
        let source: &'src str = self.source;
        let from = self.span_at(open).end as usize;
        let to = self.span_at(close).start as usize;
        if to <= from {
            return "";
        }
        &source[from..to]
    }

    fn warn(&self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        let message = message.into();
        debug!(%code, %message, "parse warning");
        self.sink.emit(Diagnostic::warning(code, message, span));
    }

    /// First line of the declaration at `start`, shortened for messages.
    fn excerpt(&self, start: usize) -> String {
        let from = self.span_at(start).start as usize;
        let line = self.source[from..].lines().next().unwrap_or("").trim();
        if line.chars().count() > 60 {
            format!("{}...", line.chars().take(60).collect::<String>())
        } else {
            line.to_string()
        }
    }

    // ========================================================================
    // Bracket matching
    // ========================================================================

    /// Index of the token closing the `(`, `[` or `{` at `open`.
    fn find_closing(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = open;
        loop {
            match self.kind_at(i) {
                CppToken::Eof => return None,
                CppToken::LeftBrace | CppToken::LeftParen | CppToken::LeftBracket => depth += 1,
                CppToken::RightBrace | CppToken::RightParen | CppToken::RightBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Index of the `>` closing the template argument list at `open`.
    ///
    /// Gives up at `;`, braces or end of input, which means `<` was a
    /// comparison.
    fn find_closing_angle(&self, open: usize) -> Option<usize> {
        if self.kind_at(open) != CppToken::Less {
            return None;
        }
        let mut depth = 0usize;
        let mut i = open;
        loop {
            match self.kind_at(i) {
                CppToken::Eof | CppToken::Semicolon | CppToken::LeftBrace | CppToken::RightBrace => {
                    return None
                }
                CppToken::Less => depth += 1,
                CppToken::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                CppToken::LeftParen | CppToken::LeftBracket => i = self.find_closing(i)?,
                _ => {}
            }
            i += 1;
        }
    }

    /// Skips the bracketed group at the current position. Returns the index
    /// of the closing token, or `None` (positioned at EOF) if it never closes.
    fn skip_balanced(&mut self) -> Option<usize> {
        match self.find_closing(self.pos) {
            Some(close) => {
                self.pos = close + 1;
                Some(close)
            }
            None => {
                self.pos = self.tokens.len().saturating_sub(1);
                None
            }
        }
    }

    fn skip_angles(&mut self) -> bool {
        match self.find_closing_angle(self.pos) {
            Some(close) => {
                self.pos = close + 1;
                true
            }
            None => false,
        }
    }

    /// Skips `[[...]]`, `alignas(...)` and compiler attribute macros.
    fn skip_attributes(&mut self) {
        loop {
            if self.at(CppToken::LeftBracket) && self.peek_kind(1) == CppToken::LeftBracket {
                self.skip_balanced();
            } else if self.at(CppToken::Identifier)
                && is_attribute_macro(self.current_text())
                && self.peek_kind(1) == CppToken::LeftParen
            {
                self.advance();
                self.skip_balanced();
            } else {
                return;
            }
        }
    }

    /// Skips to just past the next `;` at depth zero, or past a balanced
    /// `{...}` block. Stops before a `}` that closes the enclosing scope.
    fn recover_declaration(&mut self) {
        loop {
            match self.current() {
                CppToken::Eof | CppToken::RightBrace => return,
                CppToken::Semicolon => {
                    self.advance();
                    return;
                }
                CppToken::LeftBrace => {
                    self.skip_balanced();
                    self.eat(CppToken::Semicolon);
                    return;
                }
                CppToken::LeftParen | CppToken::LeftBracket => {
                    self.skip_balanced();
                }
                _ => self.advance(),
            }
        }
    }

    /// Reports the declaration at `start` as skipped and recovers.
    fn unrecognized(&mut self, start: usize) -> Option<Declaration> {
        let excerpt = self.excerpt(start);
        self.warn(
            W101,
            format!("skipped unrecognized declaration `{excerpt}`"),
            self.span_at(start),
        );
        self.recover_declaration();
        None
    }

    // ========================================================================
    // Top level
    // ========================================================================

    /// Parses the whole token stream into an [`Ir`].
    pub fn parse_translation_unit(mut self) -> Ir {
        while !self.at_eof() {
            if self.at(CppToken::RightBrace) {
                self.warn(W102, "unbalanced braces: unmatched `}`", self.current_span());
                self.advance();
                continue;
            }
            self.parse_item(None);
        }
        debug!(
            classes = self.ir.classes.len(),
            functions = self.ir.functions.len(),
            globals = self.ir.globals.len(),
            enums = self.ir.enums.len(),
            "parsed translation unit"
        );
        self.ir
    }

    /// Parses items up to the `}` closing a namespace or linkage block.
    fn parse_block_items(&mut self, open: Span) {
        loop {
            if self.at_eof() {
                self.warn(W102, "unbalanced braces: block is never closed", open);
                return;
            }
            if self.eat(CppToken::RightBrace) {
                return;
            }
            self.parse_item(None);
        }
    }

    fn parse_item(&mut self, header: Option<String>) {
        let start = self.pos;
        match self.current() {
            CppToken::Semicolon => self.advance(),
            CppToken::Namespace => self.parse_namespace(),
            CppToken::Inline if self.peek_kind(1) == CppToken::Namespace => {
                self.advance();
                self.parse_namespace();
            }
            CppToken::Extern if self.peek_kind(1) == CppToken::StringLiteral => {
                self.advance();
                self.advance();
                if self.at(CppToken::LeftBrace) {
                    let open = self.current_span();
                    self.advance();
                    self.parse_block_items(open);
                } else {
                    self.parse_item(header);
                }
            }
            CppToken::Template => self.parse_template_item(),
            CppToken::Using | CppToken::Typedef => self.parse_alias(),
            CppToken::StaticAssert | CppToken::Concept => self.recover_declaration(),
            CppToken::Class | CppToken::Struct | CppToken::Union => {
                match self.parse_class(header.clone(), None) {
                    ClassOutcome::Defined(class) => self.ir.add_class(class),
                    ClassOutcome::NotADefinition => self.parse_top_declaration(header),
                    ClassOutcome::Forward | ClassOutcome::Skipped => {}
                }
            }
            CppToken::Enum => {
                if !self.parse_enum(None) {
                    self.parse_top_declaration(header);
                }
            }
            CppToken::Hash | CppToken::Unknown => {
                trace!(token = self.current_text(), "skipping stray token");
                self.advance();
            }
            _ => self.parse_top_declaration(header),
        }
        if self.pos == start && !self.at_eof() {
            self.advance();
        }
    }

    fn parse_namespace(&mut self) {
        self.advance();
        while matches!(
            self.current(),
            CppToken::Identifier | CppToken::ColonColon | CppToken::Inline
        ) {
            self.advance();
        }
        self.skip_attributes();
        if self.at(CppToken::LeftBrace) {
            let open = self.current_span();
            self.advance();
            self.parse_block_items(open);
        } else {
            // namespace alias
            self.recover_declaration();
        }
    }

    fn parse_template_item(&mut self) {
        let Some(header) = self.parse_template_header() else {
            return;
        };
        self.resolver
            .push_template_scope(template_param_names(&header));
        self.parse_item(Some(header));
        self.resolver.pop_template_scope();
    }

    /// Parses `template<...>` and a following `requires` clause. Explicit
    /// instantiations (`template class Box<int>;`) are consumed and yield
    /// `None`.
    fn parse_template_header(&mut self) -> Option<String> {
        let start = self.pos;
        self.advance();
        if !self.at(CppToken::Less) {
            self.recover_declaration();
            return None;
        }
        if !self.skip_angles() {
            self.warn(
                W101,
                "skipped template with an unterminated parameter list",
                self.span_at(start),
            );
            self.recover_declaration();
            return None;
        }
        let mut header = self.slice(start, self.pos).to_string();
        if self.at(CppToken::Requires) {
            let clause_start = self.pos;
            self.advance();
            self.skip_constraint_expression();
            header.push(' ');
            header.push_str(self.slice(clause_start, self.pos));
        }
        Some(header)
    }

    /// Skips a constraint expression: primaries joined by `&&` / `||`.
    fn skip_constraint_expression(&mut self) {
        loop {
            while self.eat(CppToken::Bang) {}
            match self.current() {
                CppToken::LeftParen => {
                    self.skip_balanced();
                }
                CppToken::True | CppToken::False => self.advance(),
                CppToken::Requires => {
                    self.advance();
                    if self.at(CppToken::LeftParen) {
                        self.skip_balanced();
                    }
                    if self.at(CppToken::LeftBrace) {
                        self.skip_balanced();
                    }
                }
                CppToken::Identifier | CppToken::ColonColon => {
                    while matches!(self.current(), CppToken::Identifier | CppToken::ColonColon) {
                        self.advance();
                    }
                    if self.at(CppToken::Less) {
                        self.skip_angles();
                    }
                }
                _ => return,
            }
            if !(self.eat(CppToken::AmpAmp) || self.eat(CppToken::PipePipe)) {
                return;
            }
        }
    }

    fn parse_alias(&mut self) {
        if self.eat(CppToken::Using) {
            if self.at(CppToken::Identifier) && self.peek_kind(1) == CppToken::Assign {
                let name = self.current_text().to_string();
                self.advance();
                self.advance();
                let target_start = self.pos;
                self.recover_declaration();
                let end = self.statement_end();
                let target = self.slice(target_start, end).trim().to_string();
                trace!(%name, %target, "type alias");
                self.resolver.add_alias(name, target);
            } else {
                // using-directive or using-declaration
                self.recover_declaration();
            }
            return;
        }

        self.advance();
        let has_body = self.typedef_has_body();
        if has_body && matches!(self.current(), CppToken::Struct | CppToken::Class | CppToken::Union) {
            let alias = self.typedef_alias_name();
            if let ClassOutcome::Defined(class) = self.parse_class(None, alias.clone()) {
                if let Some(alias) = alias.filter(|a| *a != class.name) {
                    self.resolver.add_alias(alias, class.name.clone());
                }
                self.ir.add_class(class);
            }
            return;
        }
        if has_body && self.at(CppToken::Enum) {
            let alias = self.typedef_alias_name();
            self.parse_enum(alias);
            return;
        }

        let body_start = self.pos;
        self.recover_declaration();
        let end = self.statement_end();
        let fn_pointer = (body_start..end.saturating_sub(2)).find(|&i| {
            self.kind_at(i) == CppToken::LeftParen
                && self.kind_at(i + 1) == CppToken::Star
                && self.kind_at(i + 2) == CppToken::Identifier
        });
        let alias = match fn_pointer {
            Some(i) => Some((
                self.text_at(i + 2).to_string(),
                format!("{}{}", self.slice(body_start, i + 2), self.slice(i + 3, end)),
            )),
            None if end > body_start + 1 && self.kind_at(end - 1) == CppToken::Identifier => Some((
                self.text_at(end - 1).to_string(),
                self.slice(body_start, end - 1).to_string(),
            )),
            None => None,
        };
        if let Some((name, target)) = alias {
            trace!(%name, %target, "typedef");
            self.resolver.add_alias(name, target);
        }
    }

    /// Token index just past the statement that ends before the current
    /// position, excluding its `;`.
    fn statement_end(&self) -> usize {
        if self.pos > 0 && self.kind_at(self.pos - 1) == CppToken::Semicolon {
            self.pos - 1
        } else {
            self.pos
        }
    }

    /// True if a `typedef` introduces a braced struct or enum body.
    fn typedef_has_body(&self) -> bool {
        if !matches!(
            self.current(),
            CppToken::Class | CppToken::Struct | CppToken::Union | CppToken::Enum
        ) {
            return false;
        }
        let mut i = self.pos + 1;
        while matches!(
            self.kind_at(i),
            CppToken::Identifier | CppToken::Class | CppToken::Struct | CppToken::Colon | CppToken::ColonColon
        ) || self.kind_at(i).is_builtin_type()
        {
            i += 1;
        }
        self.kind_at(i) == CppToken::LeftBrace
    }

    /// The name a `typedef struct {...} Name;` introduces.
    fn typedef_alias_name(&self) -> Option<String> {
        let mut depth = 0usize;
        let mut i = self.pos;
        loop {
            match self.kind_at(i) {
                CppToken::Eof => return None,
                CppToken::LeftBrace => depth += 1,
                CppToken::RightBrace => depth = depth.saturating_sub(1),
                CppToken::Semicolon if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
        (i > 0 && self.kind_at(i - 1) == CppToken::Identifier).then(|| self.text_at(i - 1).to_string())
    }

    fn parse_top_declaration(&mut self, header: Option<String>) {
        match self.parse_declaration(None, header, AccessLevel::Public) {
            Some(Declaration::Function(function, qualifier)) => {
                self.add_function(*function, qualifier)
            }
            Some(Declaration::Variables(vars, qualifier)) => self.add_globals(vars, qualifier),
            Some(Declaration::Ignored) | None => {}
        }
    }

    /// Adds a free function, or attaches an out-of-line definition to the
    /// method it defines.
    fn add_function(&mut self, function: Function, qualifier: Option<String>) {
        let Some(qualifier) = qualifier else {
            self.ir.add_function(function);
            return;
        };
        let class_name = qualifier_class(&qualifier);
        if self.ir.find_class(&class_name).is_none() {
            if self.resolver.is_user_type(&class_name) {
                self.warn(
                    W103,
                    format!(
                        "definition of `{class_name}::{}` has no class body to attach to",
                        function.name
                    ),
                    function.span,
                );
            }
            // A namespace qualifier: the function is free.
            self.ir.add_function(function);
            return;
        }

        let unmatched = match self.ir.find_class_mut(&class_name) {
            Some(class) => {
                let index = class
                    .methods
                    .iter()
                    .position(|m| {
                        m.name == function.name
                            && m.body.is_none()
                            && m.params.len() == function.params.len()
                    })
                    .or_else(|| {
                        class
                            .methods
                            .iter()
                            .position(|m| m.name == function.name && m.body.is_none())
                    });
                match index {
                    Some(i) => {
                        merge_definition(&mut class.methods[i], function);
                        None
                    }
                    None => {
                        let found = (function.name.clone(), function.span);
                        class.record_member(AccessLevel::Public, function.name.clone());
                        class.methods.push(function);
                        Some(found)
                    }
                }
            }
            None => None,
        };
        if let Some((name, span)) = unmatched {
            self.warn(
                W103,
                format!("out-of-line definition of `{class_name}::{name}` does not match any declaration"),
                span,
            );
        }
    }

    /// Adds namespace-scope variables, or applies the initializer of a
    /// static member definition (`int Counter::count = 0;`).
    fn add_globals(&mut self, vars: Vec<Variable>, qualifier: Option<String>) {
        let class_name = qualifier.as_deref().map(qualifier_class);
        for var in vars {
            let field = class_name
                .as_deref()
                .and_then(|name| self.ir.find_class_mut(name))
                .and_then(|class| class.fields.iter_mut().find(|f| f.name == var.name));
            match field {
                Some(field) => {
                    if var.initializer.is_some() {
                        field.initializer = var.initializer;
                    }
                }
                None => self.ir.add_global(var),
            }
        }
    }

    // ========================================================================
    // Classes and enums
    // ========================================================================

    fn parse_class(&mut self, header: Option<String>, fallback_name: Option<String>) -> ClassOutcome {
        let start = self.pos;
        let is_struct = !self.at(CppToken::Class);
        self.advance();
        self.skip_attributes();

        let mut name = None;
        if self.at(CppToken::Identifier) && !self.at_ident("final") {
            let mut n = self.current_text().to_string();
            self.advance();
            while self.at(CppToken::ColonColon) && self.peek_kind(1) == CppToken::Identifier {
                self.advance();
                n = self.current_text().to_string();
                self.advance();
            }
            name = Some(n);
        }
        let mut template_args = None;
        if name.is_some() && self.at(CppToken::Less) {
            let open = self.pos;
            if !self.skip_angles() {
                self.pos = start;
                return ClassOutcome::NotADefinition;
            }
            template_args = Some(self.slice(open + 1, self.pos - 1).trim().to_string());
        }
        if self.at_ident("final") {
            self.advance();
        }

        match self.current() {
            CppToken::Colon | CppToken::LeftBrace => {}
            CppToken::Semicolon if template_args.is_none() => {
                if let Some(name) = &name {
                    self.register_class_name(name, is_struct);
                }
                self.advance();
                return ClassOutcome::Forward;
            }
            _ => {
                self.pos = start;
                return ClassOutcome::NotADefinition;
            }
        }

        let Some(name) = name.or(fallback_name) else {
            self.warn(W101, "skipped anonymous class or struct", self.span_at(start));
            if self.at(CppToken::LeftBrace) {
                self.skip_balanced();
            }
            self.recover_declaration();
            return ClassOutcome::Skipped;
        };

        self.register_class_name(&name, is_struct);
        let mut class = ClassDecl::new(name, is_struct);
        class.template_header = header;
        class.template_args = template_args;
        if self.eat(CppToken::Colon) {
            class.bases = self.parse_base_list(is_struct);
        }
        if !self.at(CppToken::LeftBrace) {
            self.unrecognized(start);
            return ClassOutcome::Skipped;
        }
        let open = self.current_span();
        self.advance();
        self.parse_class_body(&mut class, open);
        class.span = self.span_from(start);
        // Declarators after the closing brace (`struct P {...} origin;`) are dropped.
        if !self.eat(CppToken::Semicolon) {
            self.recover_declaration();
        }
        debug!(
            class = %class.name,
            fields = class.fields.len(),
            methods = class.methods.len(),
            bases = class.bases.len(),
            "parsed class"
        );
        ClassOutcome::Defined(class)
    }

    fn register_class_name(&mut self, name: &str, is_struct: bool) {
        if is_struct {
            self.resolver.add_struct(name);
        } else {
            self.resolver.add_class(name);
        }
    }

    fn parse_base_list(&mut self, is_struct: bool) -> Vec<BaseClass> {
        let mut bases = Vec::new();
        loop {
            let mut access = if is_struct {
                AccessLevel::Public
            } else {
                AccessLevel::Private
            };
            let mut is_virtual = false;
            loop {
                match self.current() {
                    CppToken::Virtual => is_virtual = true,
                    CppToken::Public => access = AccessLevel::Public,
                    CppToken::Protected => access = AccessLevel::Protected,
                    CppToken::Private => access = AccessLevel::Private,
                    _ => break,
                }
                self.advance();
            }
            let name_start = self.pos;
            while !matches!(
                self.current(),
                CppToken::Comma | CppToken::LeftBrace | CppToken::Semicolon | CppToken::Eof
            ) {
                if self.at(CppToken::Less) {
                    if !self.skip_angles() {
                        break;
                    }
                } else {
                    self.advance();
                }
            }
            let name = normalize(self.slice(name_start, self.pos));
            let name = name.trim_end_matches("...").to_string();
            if !name.is_empty() {
                bases.push(BaseClass {
                    name,
                    access,
                    is_virtual,
                });
            }
            if !self.eat(CppToken::Comma) {
                return bases;
            }
        }
    }

    fn parse_class_body(&mut self, class: &mut ClassDecl, open: Span) {
        let mut access = class.default_access();
        loop {
            match self.current() {
                CppToken::Eof => {
                    self.warn(
                        W102,
                        format!("unbalanced braces: `{}` is never closed", class.name),
                        open,
                    );
                    return;
                }
                CppToken::RightBrace => {
                    self.advance();
                    return;
                }
                CppToken::Semicolon => self.advance(),
                kind if kind.is_access() && self.peek_kind(1) == CppToken::Colon => {
                    access = match kind {
                        CppToken::Public => AccessLevel::Public,
                        CppToken::Protected => AccessLevel::Protected,
                        _ => AccessLevel::Private,
                    };
                    self.advance();
                    self.advance();
                }
                CppToken::Template => {
                    if let Some(header) = self.parse_template_header() {
                        self.resolver
                            .push_template_scope(template_param_names(&header));
                        self.parse_member(class, access, Some(header));
                        self.resolver.pop_template_scope();
                    }
                }
                _ => self.parse_member(class, access, None),
            }
        }
    }

    fn parse_member(&mut self, class: &mut ClassDecl, access: AccessLevel, header: Option<String>) {
        let start = self.pos;
        match self.current() {
            CppToken::Class | CppToken::Struct | CppToken::Union => {
                match self.parse_class(header.clone(), None) {
                    ClassOutcome::Defined(nested) => {
                        self.ir.add_class(nested);
                        return;
                    }
                    ClassOutcome::NotADefinition => {}
                    ClassOutcome::Forward | ClassOutcome::Skipped => return,
                }
            }
            CppToken::Enum => {
                if self.parse_enum(None) {
                    return;
                }
            }
            CppToken::Using | CppToken::Typedef => {
                self.parse_alias();
                return;
            }
            CppToken::Friend | CppToken::StaticAssert => {
                self.recover_declaration();
                return;
            }
            _ => {}
        }
        match self.parse_declaration(Some(&class.name), header, access) {
            Some(Declaration::Function(function, _)) => {
                class.record_member(access, function.name.clone());
                class.methods.push(*function);
            }
            Some(Declaration::Variables(vars, _)) => {
                for var in vars {
                    class.record_member(access, var.name.clone());
                    class.fields.push(var);
                }
            }
            Some(Declaration::Ignored) | None => {}
        }
        if self.pos == start && !self.at_eof() && !self.at(CppToken::RightBrace) {
            self.advance();
        }
    }

    /// Parses an enum definition or opaque declaration. Returns `false` with
    /// the position restored when the keyword starts an ordinary declaration.
    fn parse_enum(&mut self, fallback_name: Option<String>) -> bool {
        let start = self.pos;
        self.advance();
        let is_scoped = self.eat(CppToken::Class) || self.eat(CppToken::Struct);
        self.skip_attributes();
        let mut name = None;
        if self.at(CppToken::Identifier) {
            name = Some(self.current_text().to_string());
            self.advance();
        }
        let mut underlying = None;
        if self.eat(CppToken::Colon) {
            let type_start = self.pos;
            while !matches!(
                self.current(),
                CppToken::LeftBrace | CppToken::Semicolon | CppToken::Eof
            ) {
                self.advance();
            }
            underlying = Some(normalize(self.slice(type_start, self.pos)));
        }
        match self.current() {
            CppToken::Semicolon => {
                if let Some(name) = name {
                    self.resolver.add_enum(name);
                }
                self.advance();
                return true;
            }
            CppToken::LeftBrace => {}
            _ => {
                self.pos = start;
                return false;
            }
        }

        let open = self.pos;
        let Some(close) = self.skip_balanced() else {
            self.warn(W102, "unbalanced braces: enum body is never closed", self.span_at(open));
            return true;
        };
        let variants: Vec<(String, Option<String>)> = split_top_level(self.slice_between(open, close), ',')
            .into_iter()
            .map(|v| match find_top_level(v, '=') {
                Some(eq) => (v[..eq].trim().to_string(), Some(v[eq + 1..].trim().to_string())),
                None => (v.to_string(), None),
            })
            .collect();
        let span = self.span_from(start);
        if !self.eat(CppToken::Semicolon) {
            self.recover_declaration();
        }

        match name.or(fallback_name) {
            Some(name) => {
                trace!(%name, variants = variants.len(), "parsed enum");
                self.resolver.add_enum(name.clone());
                self.ir.add_enum(EnumDecl {
                    name,
                    is_scoped,
                    underlying,
                    variants,
                    span,
                });
            }
            None => {
                // Anonymous enumerators behave as integer constants.
                for (variant, value) in variants {
                    let mut var = Variable::new(variant, Type::integer("int").with_const(true));
                    var.initializer = value;
                    var.span = span;
                    self.ir.add_global(var);
                }
            }
        }
        true
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_declaration(
        &mut self,
        class_name: Option<&str>,
        header: Option<String>,
        access: AccessLevel,
    ) -> Option<Declaration> {
        let start = self.pos;
        let specs = self.parse_specifiers();
        if specs.is_friend {
            self.recover_declaration();
            return Some(Declaration::Ignored);
        }

        if let Some((qualifier, name, is_destructor)) = self.special_member_name(class_name) {
            let function = if is_destructor {
                Function::destructor(&name)
            } else {
                Function::constructor(name)
            };
            return self.finish_function(function, qualifier, start, specs, header, access);
        }

        // Conversion operator: `operator bool() const`.
        if self.at(CppToken::Operator) {
            let name = self.parse_operator_name()?;
            let target = name.strip_prefix("operator").unwrap_or(&name).trim();
            let ret = self.resolver.resolve(target);
            let function = Function::new(name, ret);
            return self.finish_function(function, None, start, specs, header, access);
        }

        let type_start = self.pos;
        if !self.parse_type_specifier() {
            return self.unrecognized(start);
        }
        let base = self.slice(type_start, self.pos).to_string();
        let ptr_start = self.pos;
        self.parse_pointer_ops();
        let ptr = self.slice(ptr_start, self.pos).to_string();

        // Function pointer variable: `int (*callback)(int);`
        if self.at(CppToken::LeftParen)
            && self.peek_kind(1) == CppToken::Star
            && self.peek_kind(2) == CppToken::Identifier
            && self.peek_kind(3) == CppToken::RightParen
        {
            self.advance();
            self.advance();
            let name = self.current_text().to_string();
            let name_span = self.current_span();
            self.advance();
            self.advance();
            if !self.at(CppToken::LeftParen) {
                return self.unrecognized(start);
            }
            let params_start = self.pos;
            self.skip_balanced();
            let params = self.slice(params_start, self.pos);
            let ty = self.resolver.resolve(&format!("{base} {ptr}(*){params}"));
            let mut var = Variable::new(name, ty);
            apply_specifiers(&mut var, specs, access);
            var.span = name_span;
            var.initializer = self.parse_initializer();
            if !self.eat(CppToken::Semicolon) {
                return self.unrecognized(start);
            }
            return Some(Declaration::Variables(vec![var], None));
        }

        let Some((qualifier, name, template_args)) = self.parse_declarator_name() else {
            return self.unrecognized(start);
        };

        if self.at(CppToken::LeftParen)
            && (class_name.is_some() || base == "void" || !self.looks_like_value_arguments())
        {
            let return_type = self.resolver.resolve(&format!("{base} {ptr}"));
            let mut function = Function::new(name, return_type);
            function.template_args = template_args;
            return self.finish_function(function, qualifier, start, specs, header, access);
        }
        self.finish_variables(&base, &ptr, name, qualifier, start, specs, access)
    }

    fn parse_specifiers(&mut self) -> Specifiers {
        let mut specs = Specifiers::default();
        loop {
            match self.current() {
                CppToken::Static => specs.is_static = true,
                CppToken::Virtual => specs.is_virtual = true,
                CppToken::Constexpr | CppToken::Consteval | CppToken::Constinit => {
                    specs.is_constexpr = true
                }
                CppToken::Mutable => specs.is_mutable = true,
                CppToken::Friend => specs.is_friend = true,
                CppToken::Inline | CppToken::Extern | CppToken::ThreadLocal => {}
                CppToken::Explicit => {
                    self.advance();
                    if self.at(CppToken::LeftParen) {
                        self.skip_balanced();
                    }
                    continue;
                }
                CppToken::LeftBracket | CppToken::Identifier => {
                    let before = self.pos;
                    self.skip_attributes();
                    if self.pos == before {
                        return specs;
                    }
                    continue;
                }
                _ => return specs,
            }
            self.advance();
        }
    }

    /// Detects a constructor or destructor name, which has no return type.
    ///
    /// In a class body that is `Name(` or `~Name(`; at namespace scope it is
    /// the out-of-line form `Name::Name(` or `Name<T>::~Name(`.
    fn special_member_name(&mut self, class_name: Option<&str>) -> Option<(Option<String>, String, bool)> {
        if let Some(class) = class_name {
            if self.at(CppToken::Tilde)
                && self.peek_kind(1) == CppToken::Identifier
                && self.peek_kind(2) == CppToken::LeftParen
            {
                let name = self.text_at(self.pos + 1).to_string();
                self.pos += 2;
                return Some((None, name, true));
            }
            if self.at_ident(class) && self.peek_kind(1) == CppToken::LeftParen {
                self.advance();
                return Some((None, class.to_string(), false));
            }
            return None;
        }

        let mut segments: Vec<&str> = Vec::new();
        let mut i = self.pos;
        loop {
            if self.kind_at(i) != CppToken::Identifier {
                return None;
            }
            segments.push(self.text_at(i));
            i += 1;
            if self.kind_at(i) == CppToken::Less {
                i = self.find_closing_angle(i)? + 1;
            }
            if self.kind_at(i) != CppToken::ColonColon {
                return None;
            }
            i += 1;
            let owner = segments.last().copied().unwrap_or_default();
            let (name_index, is_destructor) = match self.kind_at(i) {
                CppToken::Tilde if self.kind_at(i + 1) == CppToken::Identifier => (i + 1, true),
                CppToken::Identifier => (i, false),
                _ => return None,
            };
            let name = self.text_at(name_index);
            if self.kind_at(name_index + 1) == CppToken::LeftParen && name == owner {
                let qualifier = segments.join("::");
                self.pos = name_index + 1;
                return Some((Some(qualifier), name.to_string(), is_destructor));
            }
            if is_destructor {
                return None;
            }
        }
    }

    /// Parses the declaration specifiers that name a type: cv qualifiers,
    /// builtin keyword sequences, elaborated and qualified names with
    /// template arguments, `decltype(...)`.
    fn parse_type_specifier(&mut self) -> bool {
        let mut seen_name = false;
        let mut seen_builtin = false;
        loop {
            let kind = self.current();
            match kind {
                CppToken::Const | CppToken::Volatile => self.advance(),
                CppToken::Typename | CppToken::Struct | CppToken::Class | CppToken::Enum | CppToken::Union
                    if !seen_name && !seen_builtin =>
                {
                    self.advance()
                }
                _ if kind.is_builtin_type() && !seen_name => {
                    seen_builtin = true;
                    self.advance();
                }
                CppToken::Decltype if !seen_name && !seen_builtin => {
                    self.advance();
                    if self.at(CppToken::LeftParen) {
                        self.skip_balanced();
                    }
                    seen_name = true;
                }
                CppToken::Identifier | CppToken::ColonColon if !seen_name && !seen_builtin => {
                    if !self.parse_qualified_type_name() {
                        return false;
                    }
                    seen_name = true;
                }
                _ => return seen_name || seen_builtin,
            }
        }
    }

    fn parse_qualified_type_name(&mut self) -> bool {
        self.eat(CppToken::ColonColon);
        loop {
            self.eat(CppToken::Template);
            if !self.at(CppToken::Identifier) {
                return false;
            }
            self.advance();
            if self.at(CppToken::Less) && !self.skip_angles() {
                return false;
            }
            let continues = self.at(CppToken::ColonColon)
                && match self.peek_kind(1) {
                    CppToken::Template => true,
                    // `Point::norm(` is a declarator, not part of the type.
                    CppToken::Identifier => self.peek_kind(2) != CppToken::LeftParen,
                    _ => false,
                };
            if !continues {
                return true;
            }
            self.advance();
        }
    }

    fn parse_pointer_ops(&mut self) {
        loop {
            match self.current() {
                CppToken::Star => {
                    self.advance();
                    while self.current().is_cv() {
                        self.advance();
                    }
                }
                CppToken::Amp | CppToken::AmpAmp => self.advance(),
                _ => return,
            }
        }
    }

    /// Parses a possibly qualified declarator name. Returns the qualifier,
    /// the unqualified name and explicit template arguments on the name.
    fn parse_declarator_name(&mut self) -> Option<(Option<String>, String, Option<String>)> {
        let mut segments: Vec<String> = Vec::new();
        let mut template_args: Option<String>;
        loop {
            let is_operator = self.at(CppToken::Operator);
            let segment = match self.current() {
                CppToken::Identifier => {
                    let text = self.current_text().to_string();
                    self.advance();
                    text
                }
                CppToken::Tilde if self.peek_kind(1) == CppToken::Identifier => {
                    let text = format!("~{}", self.text_at(self.pos + 1));
                    self.pos += 2;
                    text
                }
                CppToken::Operator => self.parse_operator_name()?,
                _ => return None,
            };
            segments.push(segment);
            template_args = None;
            if is_operator {
                break;
            }
            if let Some(close) = self.find_closing_angle(self.pos) {
                if matches!(
                    self.kind_at(close + 1),
                    CppToken::ColonColon | CppToken::LeftParen
                ) {
                    template_args = Some(self.slice(self.pos + 1, close).trim().to_string());
                    self.pos = close + 1;
                }
            }
            if !self.eat(CppToken::ColonColon) {
                break;
            }
        }
        let name = segments.pop()?;
        let qualifier = (!segments.is_empty()).then(|| segments.join("::"));
        Some((qualifier, name, template_args))
    }

    /// Parses `operator` and its symbol: `operator+=`, `operator()`,
    /// `operator new[]`, `operator bool`.
    fn parse_operator_name(&mut self) -> Option<String> {
        self.advance();
        let start = self.pos;
        match self.current() {
            CppToken::LeftParen if self.peek_kind(1) == CppToken::RightParen => self.pos += 2,
            CppToken::LeftBracket if self.peek_kind(1) == CppToken::RightBracket => self.pos += 2,
            CppToken::New | CppToken::Delete => {
                self.advance();
                if self.at(CppToken::LeftBracket) && self.peek_kind(1) == CppToken::RightBracket {
                    self.pos += 2;
                }
            }
            CppToken::Eof | CppToken::Semicolon => return None,
            _ => {
                while !matches!(
                    self.current(),
                    CppToken::LeftParen | CppToken::Semicolon | CppToken::Eof
                ) {
                    self.advance();
                }
            }
        }
        let first = self.text_at(start);
        let is_word = first.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_');
        if is_word {
            Some(format!("operator {}", normalize(self.slice(start, self.pos))))
        } else {
            let symbol: String = (start..self.pos).map(|i| self.text_at(i)).collect();
            Some(format!("operator{symbol}"))
        }
    }

    /// At `(` after a namespace-scope declarator: true if the parentheses
    /// hold constructor arguments (`Point origin(0, 0);`) rather than
    /// parameters.
    fn looks_like_value_arguments(&self) -> bool {
        match self.peek_kind(1) {
            CppToken::IntLiteral
            | CppToken::FloatLiteral
            | CppToken::StringLiteral
            | CppToken::CharLiteral
            | CppToken::True
            | CppToken::False
            | CppToken::Nullptr
            | CppToken::This
            | CppToken::New
            | CppToken::Minus
            | CppToken::Amp
            | CppToken::Star
            | CppToken::LeftBrace => true,
            CppToken::Identifier => {
                let text = self.text_at(self.pos + 1);
                !self.resolver.is_known_type_name(text)
                    && matches!(
                        self.peek_kind(2),
                        CppToken::Comma
                            | CppToken::RightParen
                            | CppToken::Dot
                            | CppToken::Arrow
                            | CppToken::LeftParen
                            | CppToken::LeftBracket
                            | CppToken::Plus
                            | CppToken::Minus
                            | CppToken::Slash
                    )
            }
            _ => false,
        }
    }

    fn finish_function(
        &mut self,
        mut function: Function,
        qualifier: Option<String>,
        start: usize,
        specs: Specifiers,
        header: Option<String>,
        access: AccessLevel,
    ) -> Option<Declaration> {
        function.access = access;
        function.is_static = specs.is_static;
        function.is_virtual = specs.is_virtual;
        function.template_header = header;

        let open = self.pos;
        let Some(close) = self.skip_balanced() else {
            self.warn(
                W102,
                format!("unbalanced parentheses in the declaration of `{}`", function.name),
                self.span_at(open),
            );
            return None;
        };
        function.params = self
            .resolver
            .parse_parameters(self.slice_between(open, close));

        loop {
            match self.current() {
                CppToken::Const => {
                    function.is_const = true;
                    self.advance();
                }
                CppToken::Volatile | CppToken::Amp | CppToken::AmpAmp => self.advance(),
                CppToken::Noexcept => {
                    self.advance();
                    function.exceptions.spec = if self.at(CppToken::LeftParen) {
                        let open = self.pos;
                        let close = self.skip_balanced().unwrap_or(self.pos);
                        match self.slice_between(open, close).trim() {
                            "true" => ExceptionSpec::Noexcept,
                            "false" => ExceptionSpec::Unspecified,
                            condition => ExceptionSpec::NoexceptIf(condition.to_string()),
                        }
                    } else {
                        ExceptionSpec::Noexcept
                    };
                }
                CppToken::Throw if self.peek_kind(1) == CppToken::LeftParen => {
                    self.advance();
                    let open = self.pos;
                    let close = self.skip_balanced().unwrap_or(self.pos);
                    let types = split_top_level(self.slice_between(open, close), ',')
                        .into_iter()
                        .map(normalize)
                        .collect();
                    function.exceptions.spec = ExceptionSpec::Dynamic(types);
                }
                CppToken::Identifier if self.current_text() == "override" => {
                    function.is_override = true;
                    function.is_virtual = true;
                    self.advance();
                }
                CppToken::Identifier if self.current_text() == "final" => {
                    function.is_virtual = true;
                    self.advance();
                }
                CppToken::Arrow => {
                    self.advance();
                    let type_start = self.pos;
                    if !self.parse_type_specifier() {
                        return self.unrecognized(start);
                    }
                    self.parse_pointer_ops();
                    function.return_type = Some(self.resolver.resolve(self.slice(type_start, self.pos)));
                }
                CppToken::Requires => {
                    self.advance();
                    let clause_start = self.pos;
                    self.skip_constraint_expression();
                    function.template.requires = Some(self.slice(clause_start, self.pos).to_string());
                }
                CppToken::LeftBracket if self.peek_kind(1) == CppToken::LeftBracket => {
                    self.skip_balanced();
                }
                _ => break,
            }
        }

        match self.current() {
            CppToken::Assign => {
                self.advance();
                match self.current() {
                    CppToken::IntLiteral if self.current_text() == "0" => function.mark_pure_virtual(),
                    CppToken::Default => function.body = Some(String::new()),
                    CppToken::Delete => {
                        trace!(function = %function.name, "skipping deleted function");
                        self.recover_declaration();
                        return Some(Declaration::Ignored);
                    }
                    _ => return self.unrecognized(start),
                }
                self.advance();
                if !self.eat(CppToken::Semicolon) {
                    return self.unrecognized(start);
                }
            }
            CppToken::Colon => {
                self.advance();
                function.initializers = self.parse_member_initializers();
                if !self.at(CppToken::LeftBrace) {
                    return self.unrecognized(start);
                }
                self.parse_function_body(&mut function);
            }
            CppToken::Try => {
                let try_index = self.pos;
                self.advance();
                if self.eat(CppToken::Colon) {
                    function.initializers = self.parse_member_initializers();
                }
                if !self.at(CppToken::LeftBrace) {
                    return self.unrecognized(start);
                }
                self.skip_balanced();
                while self.eat(CppToken::Catch) {
                    if self.at(CppToken::LeftParen) {
                        self.skip_balanced();
                    }
                    if self.at(CppToken::LeftBrace) {
                        self.skip_balanced();
                    }
                }
                function.body = Some(self.slice(try_index, self.pos).to_string());
                function.body_span = self.span_from(try_index);
            }
            CppToken::LeftBrace => self.parse_function_body(&mut function),
            CppToken::Semicolon => self.advance(),
            _ => return self.unrecognized(start),
        }

        function.span = self.span_from(start);
        trace!(function = %function.name, params = function.params.len(), "parsed function");
        Some(Declaration::Function(Box::new(function), qualifier))
    }

    fn parse_function_body(&mut self, function: &mut Function) {
        let open = self.pos;
        match self.skip_balanced() {
            Some(close) => {
                function.body = Some(self.slice_between(open, close).trim().to_string());
                function.body_span = self.span_at(open).to(self.span_at(close));
            }
            None => {
                self.warn(
                    W102,
                    format!("unbalanced braces: body of `{}` is never closed", function.name),
                    self.span_at(open),
                );
                let from = self.span_at(open).end as usize;
                function.body = Some(self.source[from..].trim().to_string());
                function.body_span = self.span_from(open);
            }
        }
    }

    fn parse_member_initializers(&mut self) -> Vec<MemberInit> {
        let mut inits = Vec::new();
        loop {
            let name_start = self.pos;
            while matches!(
                self.current(),
                CppToken::Identifier | CppToken::ColonColon | CppToken::Template
            ) {
                self.advance();
            }
            if self.at(CppToken::Less) {
                self.skip_angles();
            }
            let member = self.slice(name_start, self.pos).to_string();
            if member.is_empty() || !matches!(self.current(), CppToken::LeftParen | CppToken::LeftBrace) {
                return inits;
            }
            let open = self.pos;
            let Some(close) = self.skip_balanced() else {
                return inits;
            };
            inits.push(MemberInit {
                member,
                value: self.slice_between(open, close).trim().to_string(),
            });
            self.eat(CppToken::Ellipsis);
            if !self.eat(CppToken::Comma) {
                return inits;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_variables(
        &mut self,
        base: &str,
        first_ptr: &str,
        first_name: String,
        qualifier: Option<String>,
        start: usize,
        specs: Specifiers,
        access: AccessLevel,
    ) -> Option<Declaration> {
        let mut vars = Vec::new();
        let mut ptr = first_ptr.to_string();
        let mut name = first_name;
        let mut name_span = self.span_at(self.pos.saturating_sub(1));
        loop {
            let mut dims = String::new();
            while self.at(CppToken::LeftBracket) {
                let open = self.pos;
                self.skip_balanced();
                dims.push_str(self.slice(open, self.pos));
            }
            // Bit-field width.
            if self.eat(CppToken::Colon) {
                while !matches!(
                    self.current(),
                    CppToken::Assign
                        | CppToken::LeftBrace
                        | CppToken::Comma
                        | CppToken::Semicolon
                        | CppToken::Eof
                ) {
                    self.advance();
                }
            }
            let initializer = self.parse_initializer();
            let ty = self.resolver.resolve(&format!("{base} {ptr}{dims}"));
            let mut var = Variable::new(name, ty);
            apply_specifiers(&mut var, specs, access);
            var.initializer = initializer;
            var.span = name_span;
            vars.push(var);

            match self.current() {
                CppToken::Semicolon => {
                    self.advance();
                    break;
                }
                CppToken::Comma => {
                    self.advance();
                    let ptr_start = self.pos;
                    self.parse_pointer_ops();
                    ptr = self.slice(ptr_start, self.pos).to_string();
                    if !self.at(CppToken::Identifier) {
                        return self.unrecognized(start);
                    }
                    name = self.current_text().to_string();
                    name_span = self.current_span();
                    self.advance();
                }
                _ => return self.unrecognized(start),
            }
        }
        Some(Declaration::Variables(vars, qualifier))
    }

    /// Parses `= expr`, `{...}` or `(...)` after a declarator.
    fn parse_initializer(&mut self) -> Option<String> {
        match self.current() {
            CppToken::Assign => {
                self.advance();
                let start = self.pos;
                loop {
                    match self.current() {
                        CppToken::Comma | CppToken::Semicolon | CppToken::RightBrace | CppToken::Eof => {
                            break
                        }
                        CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => {
                            self.skip_balanced();
                        }
                        CppToken::Less => match self.find_closing_angle(self.pos) {
                            Some(close)
                                if matches!(
                                    self.kind_at(close + 1),
                                    CppToken::LeftParen | CppToken::LeftBrace | CppToken::ColonColon
                                ) =>
                            {
                                self.pos = close + 1
                            }
                            _ => self.advance(),
                        },
                        _ => self.advance(),
                    }
                }
                Some(self.slice(start, self.pos).trim().to_string())
            }
            CppToken::LeftBrace | CppToken::LeftParen => {
                let open = self.pos;
                self.skip_balanced()?;
                Some(self.slice(open, self.pos).to_string())
            }
            _ => None,
        }
    }
}

fn apply_specifiers(var: &mut Variable, specs: Specifiers, access: AccessLevel) {
    var.is_static = specs.is_static;
    var.is_mutable = specs.is_mutable;
    var.is_const |= specs.is_constexpr;
    var.access = access;
}

fn is_attribute_macro(text: &str) -> bool {
    matches!(text, "alignas" | "__attribute__" | "__declspec")
}

/// The class named by the last segment of `A::B<T>`.
fn qualifier_class(qualifier: &str) -> String {
    let last = qualifier.rsplit("::").next().unwrap_or(qualifier);
    last.split('<').next().unwrap_or(last).trim().to_string()
}

fn is_synthesized_name(name: &str) -> bool {
    name.strip_prefix("arg")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Copies an out-of-line definition into the in-class declaration.
fn merge_definition(decl: &mut Function, def: Function) {
    decl.body = def.body;
    decl.body_span = def.body_span;
    decl.initializers = def.initializers;
    for (param, defined) in decl.params.iter_mut().zip(def.params) {
        if is_synthesized_name(&param.name) && !is_synthesized_name(&defined.name) {
            param.name = defined.name;
        }
    }
    if decl.template_header.is_none() {
        decl.template_header = def.template_header;
    }
    if decl.exceptions.spec == ExceptionSpec::Unspecified {
        decl.exceptions.spec = def.exceptions.spec;
    }
}

/// Names bound by a `template<...>` header.
pub(crate) fn template_param_names(header: &str) -> Vec<String> {
    let Some(open) = header.find('<') else {
        return Vec::new();
    };
    let Some(close) = find_matching(header, open) else {
        return Vec::new();
    };
    split_top_level(&header[open + 1..close], ',')
        .into_iter()
        .filter_map(|param| {
            let decl = match find_top_level(param, '=') {
                Some(eq) => &param[..eq],
                None => param,
            };
            let decl = decl.trim().trim_end_matches("...").trim_end();
            let name_start = decl
                .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .map_or(0, |i| i + 1);
            let name = &decl[name_start..];
            let unnamed = name.is_empty()
                || name_start == 0
                || matches!(name, "typename" | "class" | "auto");
            (!unnamed).then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use hybrid_ir::{Ownership, TypeKind};

    fn parse(source: &str) -> (Ir, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let ir = CppParser::new(lex(source, FileId::DUMMY), source, FileId::DUMMY, &sink)
            .parse_translation_unit();
        (ir, sink)
    }

    #[test]
    fn point_class() {
        let (ir, sink) = parse(
            "class Point {\n\
             private:\n    int x, y;\n\
             public:\n    Point(int x, int y) : x(x), y(y) {}\n    \
             double distance() const { return std::sqrt(x*x + y*y); }\n};",
        );
        assert_eq!(sink.warning_count(), 0);
        let point = ir.find_class("Point").unwrap();
        assert!(!point.is_struct);
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.fields[0].name, "x");
        assert_eq!(point.fields[1].name, "y");
        assert!(point.fields.iter().all(|f| f.access == AccessLevel::Private));
        assert_eq!(point.methods.len(), 2);

        let ctor = &point.methods[0];
        assert!(ctor.is_constructor);
        assert!(ctor.return_type.is_none());
        assert_eq!(ctor.params.len(), 2);
        assert_eq!(ctor.initializers.len(), 2);
        assert_eq!(ctor.initializers[0].member, "x");
        assert_eq!(ctor.body.as_deref(), Some(""));

        let distance = &point.methods[1];
        assert!(distance.is_const);
        assert_eq!(distance.return_type.as_ref().map(|t| t.name.as_str()), Some("double"));
        assert_eq!(
            distance.body.as_deref(),
            Some("return std::sqrt(x*x + y*y);")
        );
        assert_eq!(point.access_sections.len(), 2);
        assert_eq!(point.access_sections[1].members, vec!["Point", "distance"]);
    }

    #[test]
    fn empty_struct_and_default_access() {
        let (ir, _) = parse("struct Empty {};\nclass Hidden { int secret; };");
        let empty = ir.find_class("Empty").unwrap();
        assert!(empty.is_struct);
        assert!(empty.fields.is_empty() && empty.methods.is_empty());
        let hidden = ir.find_class("Hidden").unwrap();
        assert_eq!(hidden.fields[0].access, AccessLevel::Private);
    }

    #[test]
    fn nested_braces_in_bodies() {
        let (ir, sink) = parse(
            "struct Walker {\n\
               int steps;\n\
               void walk() {\n\
                 for (int i = 0; i < 3; ++i) { if (i) { steps += i; } }\n\
                 auto f = [&]() { return \"}\"; };\n\
               }\n\
               int count() const { return steps; }\n\
             };",
        );
        assert_eq!(sink.warning_count(), 0);
        let walker = ir.find_class("Walker").unwrap();
        assert_eq!(walker.fields.len(), 1);
        assert_eq!(walker.methods.len(), 2);
        let walk = walker.method("walk").unwrap();
        assert!(walk.body.as_deref().unwrap().contains("return \"}\";"));
        assert!(walker.method("count").is_some());
    }

    #[test]
    fn virtual_and_pure_virtual() {
        let (ir, _) = parse(
            "class Shape {\npublic:\n  virtual ~Shape() = default;\n  virtual double area() const = 0;\n  \
             virtual std::string name() const { return \"shape\"; }\n};\n\
             class Circle : public Shape {\npublic:\n  double area() const override { return 3.14 * r * r; }\nprivate:\n  double r;\n};",
        );
        let shape = ir.find_class("Shape").unwrap();
        let dtor = &shape.methods[0];
        assert!(dtor.is_destructor && dtor.is_virtual);
        assert_eq!(dtor.name, "~Shape");
        let area = shape.method("area").unwrap();
        assert!(area.is_pure_virtual && area.is_virtual);
        assert!(area.body.is_none());
        assert!(shape.methods.iter().all(Function::is_well_formed));

        let circle = ir.find_class("Circle").unwrap();
        assert_eq!(circle.bases.len(), 1);
        assert_eq!(circle.bases[0].name, "Shape");
        assert_eq!(circle.bases[0].access, AccessLevel::Public);
        let area = circle.method("area").unwrap();
        assert!(area.is_override && area.is_virtual);
    }

    #[test]
    fn base_list_variants() {
        let (ir, _) = parse(
            "class A {}; class B {};\n\
             class C : A, protected virtual B, public std::enable_shared_from_this<C> {};\n\
             struct D : A {};",
        );
        let c = ir.find_class("C").unwrap();
        assert_eq!(c.bases.len(), 3);
        assert_eq!(c.bases[0].access, AccessLevel::Private);
        assert_eq!(c.bases[1].access, AccessLevel::Protected);
        assert!(c.bases[1].is_virtual);
        assert_eq!(c.bases[2].name, "std::enable_shared_from_this<C>");
        let d = ir.find_class("D").unwrap();
        assert_eq!(d.bases[0].access, AccessLevel::Public);
    }

    #[test]
    fn free_functions_and_globals() {
        let (ir, sink) = parse(
            "#include <vector>\n\
             static int counter = 0;\n\
             const double PI = 3.14159;\n\
             int add(int a, int b) { return a + b; }\n\
             void log(const std::string& msg);\n\
             std::vector<int> make(std::size_t n, int fill = 0) { return std::vector<int>(n, fill); }",
        );
        assert_eq!(sink.warning_count(), 0);
        assert_eq!(ir.globals.len(), 2);
        assert!(ir.globals[0].is_static);
        assert!(ir.globals[1].is_const);
        assert_eq!(ir.globals[1].initializer.as_deref(), Some("3.14159"));
        assert_eq!(ir.functions.len(), 3);
        assert!(ir.find_function("log").unwrap().is_declaration_only());
        let make = ir.find_function("make").unwrap();
        assert_eq!(make.params[1].default_value.as_deref(), Some("0"));
        assert_eq!(make.params[0].ty.name, "size_t");
    }

    #[test]
    fn direct_initialized_global_is_a_variable() {
        let (ir, _) = parse("struct Point { int x; int y; };\nPoint origin(0, 0);\nPoint make(int x);");
        assert_eq!(ir.globals.len(), 1);
        assert_eq!(ir.globals[0].initializer.as_deref(), Some("(0, 0)"));
        assert_eq!(ir.globals[0].ty.kind, TypeKind::Struct);
        assert_eq!(ir.functions.len(), 1);
    }

    #[test]
    fn field_groups_and_pointers() {
        let (ir, _) = parse(
            "struct Node {\n  int *left, right;\n  Node* next = nullptr;\n  int values[4];\n  \
             unsigned flags : 3;\n  std::unique_ptr<Node> child;\n  static constexpr int kMax = 8;\n};",
        );
        let node = ir.find_class("Node").unwrap();
        let names: Vec<_> = node.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["left", "right", "next", "values", "flags", "child", "kMax"]);
        assert!(matches!(node.fields[0].ty.kind, TypeKind::Pointer { .. }));
        assert_eq!(node.fields[1].ty.kind, TypeKind::Integer);
        assert_eq!(node.fields[2].initializer.as_deref(), Some("nullptr"));
        assert!(matches!(node.fields[3].ty.kind, TypeKind::Array { .. }));
        assert!(matches!(
            node.fields[5].ty.kind,
            TypeKind::Pointer {
                ownership: Ownership::Unique,
                ..
            }
        ));
        let max = &node.fields[6];
        assert!(max.is_static && max.is_const);
    }

    #[test]
    fn brace_initialized_fields() {
        let (ir, _) = parse("struct Config { int retries{3}; std::vector<int> ports{80, 443}; };");
        let config = ir.find_class("Config").unwrap();
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.fields[0].initializer.as_deref(), Some("{3}"));
        assert_eq!(config.fields[1].initializer.as_deref(), Some("{80, 443}"));
    }

    #[test]
    fn out_of_line_definitions_attach() {
        let (ir, sink) = parse(
            "class Counter {\npublic:\n  Counter();\n  void add(int);\n  int get() const;\nprivate:\n  int n;\n  static int total;\n};\n\
             Counter::Counter() : n(0) {}\n\
             void Counter::add(int amount) { n += amount; }\n\
             int Counter::get() const { return n; }\n\
             int Counter::total = 0;",
        );
        assert_eq!(sink.warning_count(), 0);
        let counter = ir.find_class("Counter").unwrap();
        assert_eq!(counter.methods.len(), 3);
        let ctor = &counter.methods[0];
        assert!(ctor.is_constructor);
        assert_eq!(ctor.initializers.len(), 1);
        assert_eq!(ctor.body.as_deref(), Some(""));
        let add = counter.method("add").unwrap();
        assert_eq!(add.params[0].name, "amount");
        assert_eq!(add.body.as_deref(), Some("n += amount;"));
        assert_eq!(counter.field("total").unwrap().initializer.as_deref(), Some("0"));
        assert!(ir.functions.is_empty());
        assert!(ir.globals.is_empty());
    }

    #[test]
    fn unmatched_out_of_line_definition_warns() {
        let (ir, sink) = parse("class Foo { public: void a(); };\nvoid Foo::b() {}");
        assert!(sink.has_code(W103));
        assert!(ir.find_class("Foo").unwrap().method("b").is_some());
    }

    #[test]
    fn namespaces_and_extern_c_are_transparent() {
        let (ir, sink) = parse(
            "namespace geo { namespace detail {\n struct V { double x; };\n} \n double len(const detail::V& v); }\n\
             extern \"C\" {\n int c_add(int a, int b);\n}\n\
             extern \"C\" void c_free(void* p);\n\
             using namespace std;\n",
        );
        assert_eq!(sink.warning_count(), 0);
        assert!(ir.find_class("V").is_some());
        assert!(ir.find_function("len").is_some());
        assert!(ir.find_function("c_add").is_some());
        assert!(ir.find_function("c_free").is_some());
    }

    #[test]
    fn templates_attach_headers() {
        let (ir, _) = parse(
            "template <typename T, int N = 4>\nclass Buffer {\npublic:\n  T get(int i) const { return data[i]; }\nprivate:\n  T data[N];\n};\n\
             template<typename T> T max_of(T a, T b) { return a > b ? a : b; }\n\
             template<> class Buffer<bool, 1> {};",
        );
        let buffer = &ir.classes[0];
        assert_eq!(buffer.template_header.as_deref(), Some("template <typename T, int N = 4>"));
        assert_eq!(buffer.methods[0].return_type.as_ref().unwrap().kind, TypeKind::TemplateParam);
        let max_of = ir.find_function("max_of").unwrap();
        assert_eq!(max_of.template_header.as_deref(), Some("template<typename T>"));
        assert_eq!(max_of.params[0].ty.kind, TypeKind::TemplateParam);
        let special = &ir.classes[1];
        assert_eq!(special.template_header.as_deref(), Some("template<>"));
        assert_eq!(special.template_args.as_deref(), Some("bool, 1"));
    }

    #[test]
    fn requires_clause_kept_in_header() {
        let (ir, _) = parse(
            "template<typename T> requires std::integral<T>\nT twice(T v) { return v * 2; }",
        );
        let twice = ir.find_function("twice").unwrap();
        assert_eq!(
            twice.template_header.as_deref(),
            Some("template<typename T> requires std::integral<T>")
        );
    }

    #[test]
    fn exception_specifications() {
        let (ir, _) = parse(
            "void a() noexcept;\nvoid b() noexcept(false);\nvoid c() throw();\n\
             void d() throw(std::runtime_error, Bad);\nvoid e() noexcept(sizeof(int) == 4);",
        );
        let spec = |name: &str| ir.find_function(name).unwrap().exceptions.spec.clone();
        assert_eq!(spec("a"), ExceptionSpec::Noexcept);
        assert_eq!(spec("b"), ExceptionSpec::Unspecified);
        assert_eq!(spec("c"), ExceptionSpec::Dynamic(vec![]));
        assert_eq!(
            spec("d"),
            ExceptionSpec::Dynamic(vec!["std::runtime_error".into(), "Bad".into()])
        );
        assert!(matches!(spec("e"), ExceptionSpec::NoexceptIf(_)));
    }

    #[test]
    fn operators_and_deleted_members() {
        let (ir, _) = parse(
            "struct V {\n  V(const V&) = delete;\n  V& operator=(const V&) = default;\n  \
             bool operator==(const V& o) const { return true; }\n  int operator()(int x) { return x; }\n  \
             explicit operator bool() const { return true; }\n  friend V operator+(V a, V b);\n};",
        );
        let v = ir.find_class("V").unwrap();
        let names: Vec<_> = v.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["operator=", "operator==", "operator()", "operator bool"]);
        assert_eq!(v.methods[3].return_type.as_ref().unwrap().kind, TypeKind::Bool);
    }

    #[test]
    fn enums_register_types() {
        let (ir, _) = parse(
            "enum class Color : uint8_t { Red, Green = 2, Blue };\nenum Legacy { A, B };\n\
             enum { kAnon = 7 };\nstruct Pixel { Color c; };",
        );
        assert_eq!(ir.enums.len(), 2);
        let color = &ir.enums[0];
        assert!(color.is_scoped);
        assert_eq!(color.underlying.as_deref(), Some("uint8_t"));
        assert_eq!(color.variants[1], ("Green".to_string(), Some("2".to_string())));
        assert_eq!(ir.globals[0].name, "kAnon");
        let pixel = ir.find_class("Pixel").unwrap();
        assert_eq!(pixel.fields[0].ty.kind, TypeKind::Enum);
    }

    #[test]
    fn typedefs_and_aliases() {
        let (ir, _) = parse(
            "typedef unsigned long Id;\nusing Callback = void(*)(int);\n\
             typedef struct { int w; int h; } Size;\n\
             struct Item { Id id; Callback cb; Size size; };",
        );
        assert!(ir.find_class("Size").is_some());
        let item = ir.find_class("Item").unwrap();
        assert_eq!(item.fields[0].ty.name, "unsigned long");
        assert!(matches!(item.fields[1].ty.kind, TypeKind::Function { erased: false, .. }));
        assert_eq!(item.fields[2].ty.kind, TypeKind::Struct);
    }

    #[test]
    fn unrecognized_declarations_are_reported() {
        let (ir, sink) = parse("struct A { int x; };\n+++ garbage;\nint ok();");
        assert!(sink.has_code(W101));
        assert!(ir.find_class("A").is_some());
        assert!(ir.find_function("ok").is_some());
    }

    #[test]
    fn unbalanced_braces_are_reported() {
        let (ir, sink) = parse("class Open { void f() { if (x) { }\n");
        assert!(sink.has_code(W102));
        assert!(ir.find_class("Open").is_some());

        let (_, sink) = parse("int x; }");
        assert!(sink.has_code(W102));
    }

    #[test]
    fn comments_do_not_confuse_structure() {
        let (ir, sink) = parse(
            "// class Fake { };\n/* struct Other { int y; }; */\nstruct Real {\n  int a; // trailing {\n};",
        );
        assert_eq!(sink.warning_count(), 0);
        assert_eq!(ir.classes.len(), 1);
        assert_eq!(ir.classes[0].name, "Real");
    }

    #[test]
    fn nested_classes_are_collected() {
        let (ir, _) = parse("class List {\n  struct Node { int v; Node* next; };\n  Node* head;\n};");
        assert!(ir.find_class("Node").is_some());
        let list = ir.find_class("List").unwrap();
        assert_eq!(list.fields.len(), 1);
        assert_eq!(list.fields[0].ty.element().unwrap().kind, TypeKind::Struct);
    }

    #[test]
    fn trailing_return_type() {
        let (ir, _) = parse("auto add(int a, int b) -> long { return a + b; }");
        let add = ir.find_function("add").unwrap();
        assert_eq!(add.return_type.as_ref().unwrap().name, "long");
    }

    #[test]
    fn function_try_block_keeps_handlers() {
        let (ir, _) = parse("int risky() try { return f(); } catch (...) { return -1; }");
        let risky = ir.find_function("risky").unwrap();
        let body = risky.body.as_deref().unwrap();
        assert!(body.starts_with("try"));
        assert!(body.contains("catch (...)"));
    }

    #[test]
    fn template_param_names_from_headers() {
        assert_eq!(
            template_param_names("template<typename T, std::size_t N = 3, typename... Ts>"),
            vec!["T", "N", "Ts"]
        );
        assert_eq!(
            template_param_names("template<template<typename> class C, typename>"),
            vec!["C"]
        );
        assert!(template_param_names("template<>").is_empty());
    }
}
