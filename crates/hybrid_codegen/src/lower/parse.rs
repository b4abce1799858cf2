//! Recursive-descent reader for function bodies.
//!
//! Expressions use precedence climbing over the C++ operator table.
//! Template argument lists are only taken when the closing `>` is followed
//! by `(`, `{` or `::`, which keeps `a < b` a comparison. The lexer emits
//! `>>` as two `>` tokens; two touching `>` in operator position are a
//! shift.

use hybrid_common::split_top_level;
use hybrid_cpp_parser::types::split_declarator;
use hybrid_cpp_parser::{resolve_type, CppToken, TypeResolver};
use hybrid_ir::type_map::normalize;
use hybrid_ir::Type;

use super::ast::{
    BinOp, Case, Decl, Expr, Handler, IncDec, Init, Lambda, Stmt, UnaryOp,
};
use super::cursor::Cursor;

const CASTS: &[&str] = &["static_cast", "dynamic_cast", "reinterpret_cast", "const_cast"];
const STREAMS: &[(&str, bool)] = &[
    ("std::cout", false),
    ("cout", false),
    ("std::cerr", true),
    ("cerr", true),
    ("std::clog", true),
];

/// Parses a function body (without its outer braces) into statements.
pub fn parse_body(text: &str) -> Vec<Stmt> {
    let mut parser = Parser {
        c: Cursor::new(text),
    };
    parser.block_items(false)
}

/// Parses a standalone expression such as a default argument or a member
/// initializer. Trailing tokens make the parse fail.
pub fn parse_expression(text: &str) -> Option<Expr> {
    let mut parser = Parser {
        c: Cursor::new(text),
    };
    let expr = if parser.c.at(CppToken::LeftBrace) {
        Expr::List {
            ty: None,
            items: parser.brace_items()?,
        }
    } else {
        parser.expr()?
    };
    parser.c.at_end().then_some(expr)
}

enum DeclParse {
    NotDecl,
    Failed,
    Decl(Vec<Stmt>),
}

struct Parser<'a> {
    c: Cursor<'a>,
}

impl Parser<'_> {
    // ========================================================================
    // Statements
    // ========================================================================

    /// Statements up to the closing `}` (consumed) when `nested`, else to
    /// the end of input.
    fn block_items(&mut self, nested: bool) -> Vec<Stmt> {
        let mut out = Vec::new();
        while !self.c.at_end() {
            if self.c.at(CppToken::RightBrace) {
                self.c.bump();
                if nested {
                    break;
                }
                continue;
            }
            out.extend(self.statement());
        }
        out
    }

    fn statement(&mut self) -> Vec<Stmt> {
        let start = self.c.pos;
        if let Some(stmts) = self.statement_inner() {
            return stmts;
        }
        let end = self.c.statement_end(start).max(start);
        self.c.pos = end + 1;
        vec![Stmt::Unsupported(self.c.slice(start, end + 1).to_string())]
    }

    /// The body of a control statement, flattening a braced block.
    fn sub_statement(&mut self) -> Vec<Stmt> {
        if self.c.eat(CppToken::LeftBrace) {
            self.block_items(true)
        } else {
            self.statement()
        }
    }

    fn statement_inner(&mut self) -> Option<Vec<Stmt>> {
        let stmt = match self.c.peek() {
            CppToken::LeftBrace => {
                self.c.bump();
                Stmt::Block(self.block_items(true))
            }
            CppToken::Semicolon => {
                self.c.bump();
                return Some(Vec::new());
            }
            CppToken::If => self.if_statement()?,
            CppToken::While => {
                self.c.bump();
                let cond = self.paren_condition()?;
                Stmt::While {
                    cond,
                    body: self.sub_statement(),
                }
            }
            CppToken::Do => {
                self.c.bump();
                let body = self.sub_statement();
                self.c.expect(CppToken::While)?;
                let cond = self.paren_condition()?;
                self.end_statement()?;
                Stmt::DoWhile { body, cond }
            }
            CppToken::For => self.for_statement()?,
            CppToken::Switch => self.switch_statement()?,
            CppToken::Return => {
                self.c.bump();
                Stmt::Return(self.optional_operand()?)
            }
            CppToken::Throw => {
                self.c.bump();
                Stmt::Throw(self.optional_operand()?)
            }
            CppToken::CoReturn => {
                self.c.bump();
                Stmt::CoReturn(self.optional_operand()?)
            }
            CppToken::CoYield => {
                self.c.bump();
                let value = self.expr()?;
                self.end_statement()?;
                Stmt::CoYield(value)
            }
            CppToken::Break => {
                self.c.bump();
                self.end_statement()?;
                Stmt::Break
            }
            CppToken::Continue => {
                self.c.bump();
                self.end_statement()?;
                Stmt::Continue
            }
            CppToken::Try => self.try_statement()?,
            CppToken::Delete => {
                self.c.bump();
                if self.c.eat(CppToken::LeftBracket) {
                    self.c.expect(CppToken::RightBracket)?;
                }
                let target = self.expr()?;
                self.end_statement()?;
                Stmt::Delete(target)
            }
            CppToken::Case
            | CppToken::Default
            | CppToken::Using
            | CppToken::Typedef
            | CppToken::StaticAssert
            | CppToken::Class
            | CppToken::Struct
            | CppToken::Enum => return None,
            _ => return self.declaration_or_expression(),
        };
        Some(vec![stmt])
    }

    /// `;` or the end of the body.
    fn end_statement(&mut self) -> Option<()> {
        (self.c.eat(CppToken::Semicolon) || self.c.at_end() || self.c.at(CppToken::RightBrace))
            .then_some(())
    }

    fn optional_operand(&mut self) -> Option<Option<Expr>> {
        if self.end_statement().is_some() {
            return Some(None);
        }
        let value = if self.c.at(CppToken::LeftBrace) {
            Expr::List {
                ty: None,
                items: self.brace_items()?,
            }
        } else {
            self.expr()?
        };
        self.end_statement()?;
        Some(Some(value))
    }

    fn paren_condition(&mut self) -> Option<Expr> {
        self.c.expect(CppToken::LeftParen)?;
        let cond = self.expr()?;
        self.c.expect(CppToken::RightParen)?;
        Some(cond)
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        self.c.bump();
        self.c.eat(CppToken::Constexpr);
        let cond = self.paren_condition()?;
        let then = self.sub_statement();
        let otherwise = self.c.eat(CppToken::Else).then(|| self.sub_statement());
        Some(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn for_statement(&mut self) -> Option<Stmt> {
        self.c.bump();
        let open = self.c.pos;
        self.c.expect(CppToken::LeftParen)?;
        let close = self.c.closing(open)?;
        if let Some(colon) = self.range_colon(open, close) {
            let (name, ty) = split_declarator(self.c.slice(open + 1, colon));
            let name = name?;
            self.c.pos = colon + 1;
            let range = self.expr()?;
            self.c.expect(CppToken::RightParen)?;
            return Some(Stmt::ForRange {
                ty: resolve_type(&ty),
                name,
                range,
                body: self.sub_statement(),
            });
        }
        let init = if self.c.eat(CppToken::Semicolon) {
            Vec::new()
        } else {
            self.declaration_or_expression()?
        };
        let cond = if self.c.at(CppToken::Semicolon) {
            None
        } else {
            Some(self.expr()?)
        };
        self.c.expect(CppToken::Semicolon)?;
        let step = if self.c.at(CppToken::RightParen) {
            None
        } else {
            Some(self.expr()?)
        };
        self.c.expect(CppToken::RightParen)?;
        Some(Stmt::For {
            init,
            cond,
            step,
            body: self.sub_statement(),
        })
    }

    /// The `:` of a range-for header, if the header has one at depth zero.
    fn range_colon(&self, open: usize, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open + 1..close {
            match self.c.kind_at(i) {
                CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => depth += 1,
                CppToken::RightParen | CppToken::RightBracket | CppToken::RightBrace => {
                    depth = depth.saturating_sub(1)
                }
                CppToken::Semicolon | CppToken::Question if depth == 0 => return None,
                CppToken::Colon if depth == 0 => return Some(i),
                _ => {}
            }
        }
        None
    }

    fn switch_statement(&mut self) -> Option<Stmt> {
        self.c.bump();
        let scrutinee = self.paren_condition()?;
        self.c.expect(CppToken::LeftBrace)?;
        let mut cases = Vec::new();
        let mut labels = Vec::new();
        let mut is_default = false;
        while !self.c.at(CppToken::RightBrace) && !self.c.at_end() {
            if self.c.eat(CppToken::Case) {
                labels.push(self.expr()?);
                self.c.expect(CppToken::Colon)?;
                continue;
            }
            if self.c.at(CppToken::Default) && self.c.peek_n(1) == CppToken::Colon {
                self.c.pos += 2;
                is_default = true;
                continue;
            }
            let mut body = Vec::new();
            while !matches!(
                self.c.peek(),
                CppToken::Case | CppToken::RightBrace | CppToken::Eof
            ) && !(self.c.at(CppToken::Default) && self.c.peek_n(1) == CppToken::Colon)
            {
                body.extend(self.statement());
            }
            strip_trailing_break(&mut body);
            cases.push(Case {
                labels: std::mem::take(&mut labels),
                is_default: std::mem::take(&mut is_default),
                body,
            });
        }
        if !labels.is_empty() || is_default {
            cases.push(Case {
                labels,
                is_default,
                body: Vec::new(),
            });
        }
        self.c.expect(CppToken::RightBrace)?;
        Some(Stmt::Switch { scrutinee, cases })
    }

    fn try_statement(&mut self) -> Option<Stmt> {
        self.c.bump();
        self.c.expect(CppToken::LeftBrace)?;
        let body = self.block_items(true);
        let mut handlers = Vec::new();
        while self.c.eat(CppToken::Catch) {
            let open = self.c.pos;
            self.c.expect(CppToken::LeftParen)?;
            let close = self.c.closing(open)?;
            let decl = self.c.slice(open + 1, close).trim();
            self.c.pos = close + 1;
            self.c.expect(CppToken::LeftBrace)?;
            let (ty, var) = if decl == "..." {
                (None, None)
            } else {
                let (var, ty) = split_declarator(decl);
                (Some(bare_type(&ty)), var)
            };
            handlers.push(Handler {
                ty,
                var,
                body: self.block_items(true),
            });
        }
        (!handlers.is_empty()).then_some(Stmt::Try { body, handlers })
    }

    fn declaration_or_expression(&mut self) -> Option<Vec<Stmt>> {
        match self.declaration() {
            DeclParse::Decl(stmts) => return Some(stmts),
            DeclParse::Failed => return None,
            DeclParse::NotDecl => {}
        }
        let expr = self.expr()?;
        self.end_statement()?;
        Some(vec![print_statement(&expr).unwrap_or(Stmt::Expr(expr))])
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn declaration(&mut self) -> DeclParse {
        let start = self.c.pos;
        let mut is_static = false;
        let mut prefix = String::new();
        loop {
            match self.c.peek() {
                CppToken::Static | CppToken::ThreadLocal => is_static = true,
                CppToken::Const => prefix.push_str("const "),
                CppToken::Constexpr
                | CppToken::Constinit
                | CppToken::Volatile
                | CppToken::Inline
                | CppToken::Mutable
                | CppToken::Extern
                | CppToken::Typename => {}
                _ => break,
            }
            self.c.bump();
        }
        let type_start = self.c.pos;
        if !self.type_name() {
            self.c.pos = start;
            return DeclParse::NotDecl;
        }
        while self.c.peek().is_cv() {
            self.c.bump();
        }
        let base = format!("{prefix}{}", self.c.slice(type_start, self.c.pos));

        let mut stmts = Vec::new();
        loop {
            let mut suffix = String::new();
            while matches!(
                self.c.peek(),
                CppToken::Star | CppToken::Amp | CppToken::AmpAmp | CppToken::Const
            ) {
                if self.c.at(CppToken::Const) {
                    suffix.push_str(" const");
                } else {
                    suffix.push_str(self.c.current());
                }
                self.c.bump();
            }
            let follows = self.c.peek_n(1);
            if self.c.peek() != CppToken::Identifier
                || !matches!(
                    follows,
                    CppToken::Assign
                        | CppToken::Semicolon
                        | CppToken::LeftParen
                        | CppToken::LeftBrace
                        | CppToken::Comma
                        | CppToken::LeftBracket
                        | CppToken::Eof
                )
            {
                if stmts.is_empty() {
                    self.c.pos = start;
                    return DeclParse::NotDecl;
                }
                return DeclParse::Failed;
            }
            let name = self.c.bump().to_string();
            let mut ty = resolve_type(&format!("{base}{suffix}"));
            while self.c.at(CppToken::LeftBracket) {
                let open = self.c.pos;
                let Some(close) = self.c.closing(open) else {
                    return DeclParse::Failed;
                };
                let len = self.c.slice(open + 1, close).trim();
                ty = Type::array(ty, (!len.is_empty()).then(|| len.to_string()));
                self.c.pos = close + 1;
            }
            let Some(init) = self.initializer() else {
                return DeclParse::Failed;
            };
            stmts.push(Stmt::Decl(Decl {
                ty,
                name,
                init,
                is_static,
            }));
            if !self.c.eat(CppToken::Comma) {
                break;
            }
        }
        match self.end_statement() {
            Some(()) => DeclParse::Decl(stmts),
            None => DeclParse::Failed,
        }
    }

    /// Consumes a type name: a run of builtin keywords, or a qualified
    /// name with template arguments.
    fn type_name(&mut self) -> bool {
        if self.c.peek().is_builtin_type() {
            while self.c.peek().is_builtin_type() || self.c.peek().is_cv() {
                self.c.bump();
            }
            return true;
        }
        self.c.eat(CppToken::ColonColon);
        loop {
            if !self.c.at(CppToken::Identifier) {
                return false;
            }
            self.c.bump();
            if self.c.at(CppToken::Less) {
                match self.c.skip_angles(self.c.pos) {
                    Some(after) => self.c.pos = after,
                    None => return false,
                }
            }
            if self.c.at(CppToken::ColonColon) && self.c.peek_n(1) == CppToken::Identifier {
                self.c.bump();
                continue;
            }
            return true;
        }
    }

    fn initializer(&mut self) -> Option<Init> {
        match self.c.peek() {
            CppToken::Assign => {
                self.c.bump();
                if self.c.at(CppToken::LeftBrace) {
                    Some(Init::List(self.brace_items()?))
                } else {
                    Some(Init::Expr(self.expr()?))
                }
            }
            CppToken::LeftParen => Some(Init::Args(self.call_args()?)),
            CppToken::LeftBrace => Some(Init::List(self.brace_items()?)),
            _ => Some(Init::Default),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self) -> Option<Expr> {
        let target = self.ternary()?;
        let op = match self.c.peek() {
            CppToken::Assign => None,
            CppToken::CompoundAssign => Some(BinOp::from_compound(self.c.current())?),
            _ => return Some(target),
        };
        self.c.bump();
        let value = if self.c.at(CppToken::LeftBrace) {
            Expr::List {
                ty: None,
                items: self.brace_items()?,
            }
        } else {
            self.expr()?
        };
        Some(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn ternary(&mut self) -> Option<Expr> {
        let cond = self.binary(0)?;
        if !self.c.eat(CppToken::Question) {
            return Some(cond);
        }
        let then = self.expr()?;
        self.c.expect(CppToken::Colon)?;
        let otherwise = self.expr()?;
        Some(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// The binary operator at the cursor and how many tokens it spans.
    fn binary_op(&self) -> Option<(BinOp, usize)> {
        let op = match self.c.peek() {
            CppToken::Plus => BinOp::Add,
            CppToken::Minus => BinOp::Sub,
            CppToken::Star => BinOp::Mul,
            CppToken::Slash => BinOp::Div,
            CppToken::Percent => BinOp::Rem,
            CppToken::ShiftLeft => BinOp::Shl,
            CppToken::Greater
                if self.c.peek_n(1) == CppToken::Greater && self.c.adjacent(self.c.pos) =>
            {
                return Some((BinOp::Shr, 2));
            }
            CppToken::Greater => BinOp::Gt,
            CppToken::Less => BinOp::Lt,
            CppToken::LessEqual => BinOp::Le,
            CppToken::GreaterEqual => BinOp::Ge,
            CppToken::EqualEqual => BinOp::Eq,
            CppToken::BangEqual => BinOp::Ne,
            CppToken::Amp => BinOp::BitAnd,
            CppToken::Pipe => BinOp::BitOr,
            CppToken::Caret => BinOp::BitXor,
            CppToken::AmpAmp => BinOp::And,
            CppToken::PipePipe => BinOp::Or,
            _ => return None,
        };
        Some((op, 1))
    }

    fn binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, width)) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.c.pos += width;
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Expr> {
        let op = match self.c.peek() {
            CppToken::Minus => UnaryOp::Neg,
            CppToken::Plus => UnaryOp::Plus,
            CppToken::Bang => UnaryOp::Not,
            CppToken::Tilde => UnaryOp::BitNot,
            CppToken::Star => UnaryOp::Deref,
            CppToken::Amp => UnaryOp::AddrOf,
            CppToken::PlusPlus => UnaryOp::PreInc,
            CppToken::MinusMinus => UnaryOp::PreDec,
            CppToken::CoAwait => {
                self.c.bump();
                return Some(Expr::Await(Box::new(self.unary()?)));
            }
            CppToken::Sizeof => return self.size_of(),
            CppToken::New => return self.new_expression(),
            CppToken::LeftParen if self.at_c_cast() => {
                let open = self.c.pos;
                let close = self.c.closing(open)?;
                let ty = resolve_type(self.c.slice(open + 1, close));
                self.c.pos = close + 1;
                return Some(Expr::Cast {
                    ty,
                    operand: Box::new(self.unary()?),
                });
            }
            _ => return self.postfix(),
        };
        self.c.bump();
        Some(Expr::Unary {
            op,
            operand: Box::new(self.unary()?),
        })
    }

    fn size_of(&mut self) -> Option<Expr> {
        self.c.bump();
        if self.c.at(CppToken::LeftParen) {
            let open = self.c.pos;
            let close = self.c.closing(open)?;
            let text = self.c.slice(open + 1, close).to_string();
            self.c.pos = close + 1;
            return Some(Expr::SizeOf(text));
        }
        let start = self.c.pos;
        self.unary()?;
        Some(Expr::SizeOf(self.c.slice(start, self.c.pos).to_string()))
    }

    fn new_expression(&mut self) -> Option<Expr> {
        self.c.bump();
        let start = self.c.pos;
        if !self.type_name() {
            return None;
        }
        let ty = self.c.slice(start, self.c.pos).to_string();
        let (args, array) = match self.c.peek() {
            CppToken::LeftParen => (self.call_args()?, false),
            CppToken::LeftBrace => (self.brace_items()?, false),
            CppToken::LeftBracket => {
                self.c.bump();
                let len = self.expr()?;
                self.c.expect(CppToken::RightBracket)?;
                (vec![len], true)
            }
            _ => (Vec::new(), false),
        };
        Some(Expr::New { ty, args, array })
    }

    /// `(T)x` where `T` is a builtin type, a pointer type or a `_t` alias.
    fn at_c_cast(&self) -> bool {
        let open = self.c.pos;
        let Some(close) = self.c.closing(open) else {
            return false;
        };
        if close == open + 1 {
            return false;
        }
        let mut builtin = false;
        let mut idents = 0;
        let mut indirect = false;
        let mut last_ident = "";
        for i in open + 1..close {
            match self.c.kind_at(i) {
                k if k.is_builtin_type() || k.is_cv() => builtin = true,
                CppToken::Star | CppToken::Amp => indirect = true,
                CppToken::Identifier => {
                    idents += 1;
                    last_ident = self.c.text_at(i);
                }
                CppToken::ColonColon => {}
                _ => return false,
            }
        }
        let operand = matches!(
            self.c.kind_at(close + 1),
            CppToken::Identifier
                | CppToken::IntLiteral
                | CppToken::FloatLiteral
                | CppToken::CharLiteral
                | CppToken::StringLiteral
                | CppToken::LeftParen
                | CppToken::This
                | CppToken::True
                | CppToken::False
                | CppToken::Nullptr
        ) || (builtin
            && matches!(
                self.c.kind_at(close + 1),
                CppToken::Minus | CppToken::Bang | CppToken::Tilde | CppToken::Star | CppToken::Amp
            ));
        let is_type = (builtin && idents == 0)
            || (idents >= 1 && !builtin && (indirect || last_ident.ends_with("_t")));
        is_type && operand
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut expr = self.primary()?;
        loop {
            expr = match self.c.peek() {
                CppToken::LeftParen => Expr::Call {
                    callee: Box::new(expr),
                    args: self.call_args()?,
                },
                CppToken::LeftBracket => {
                    self.c.bump();
                    let index = self.expr()?;
                    self.c.expect(CppToken::RightBracket)?;
                    Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                CppToken::Dot | CppToken::Arrow => {
                    let arrow = self.c.at(CppToken::Arrow);
                    self.c.bump();
                    self.c.eat(CppToken::Template);
                    if !self.c.at(CppToken::Identifier) {
                        return None;
                    }
                    let name = self.c.bump().to_string();
                    Expr::Member {
                        base: Box::new(expr),
                        name,
                        arrow,
                    }
                }
                CppToken::PlusPlus | CppToken::MinusMinus => {
                    let op = if self.c.at(CppToken::PlusPlus) {
                        IncDec::Inc
                    } else {
                        IncDec::Dec
                    };
                    self.c.bump();
                    Expr::Postfix {
                        op,
                        operand: Box::new(expr),
                    }
                }
                _ => return Some(expr),
            };
        }
    }

    fn primary(&mut self) -> Option<Expr> {
        let kind = self.c.peek();
        let expr = match kind {
            CppToken::IntLiteral => Expr::Int(self.c.bump().to_string()),
            CppToken::FloatLiteral => Expr::Float(self.c.bump().to_string()),
            CppToken::CharLiteral => Expr::Char(self.c.bump().to_string()),
            CppToken::StringLiteral => {
                let mut content = String::new();
                while self.c.at(CppToken::StringLiteral) {
                    content.push_str(string_content(self.c.bump()));
                }
                Expr::Str(content)
            }
            CppToken::True | CppToken::False => {
                self.c.bump();
                Expr::Bool(kind == CppToken::True)
            }
            CppToken::Nullptr => {
                self.c.bump();
                Expr::Null
            }
            CppToken::This => {
                self.c.bump();
                Expr::This
            }
            CppToken::LeftParen => {
                self.c.bump();
                let inner = self.expr()?;
                self.c.expect(CppToken::RightParen)?;
                Expr::Paren(Box::new(inner))
            }
            CppToken::LeftBracket => self.lambda()?,
            CppToken::LeftBrace => Expr::List {
                ty: None,
                items: self.brace_items()?,
            },
            k if k.is_builtin_type() => {
                let start = self.c.pos;
                while self.c.peek().is_builtin_type() {
                    self.c.bump();
                }
                let ty = self.c.slice(start, self.c.pos).to_string();
                if self.c.at(CppToken::LeftBrace) {
                    Expr::List {
                        ty: Some(ty),
                        items: self.brace_items()?,
                    }
                } else {
                    let mut args = self.call_args()?;
                    if args.len() != 1 {
                        return None;
                    }
                    Expr::Cast {
                        ty: resolve_type(&ty),
                        operand: Box::new(args.remove(0)),
                    }
                }
            }
            CppToken::Identifier | CppToken::ColonColon => self.name_expression()?,
            _ => return None,
        };
        Some(expr)
    }

    fn name_expression(&mut self) -> Option<Expr> {
        let start = self.c.pos;
        self.c.eat(CppToken::ColonColon);
        loop {
            if !self.c.at(CppToken::Identifier) {
                return None;
            }
            self.c.bump();
            if self.c.at(CppToken::Less) {
                let lt = self.c.pos;
                if let Some(after) = self.c.skip_angles(lt) {
                    match self.c.kind_at(after) {
                        CppToken::ColonColon if self.c.kind_at(after + 1) == CppToken::Identifier => {
                            self.c.pos = after + 1;
                            continue;
                        }
                        CppToken::LeftParen | CppToken::LeftBrace => {
                            return self.template_use(start, lt, after);
                        }
                        _ => {}
                    }
                }
            }
            if self.c.at(CppToken::ColonColon) && self.c.peek_n(1) == CppToken::Identifier {
                self.c.bump();
                continue;
            }
            break;
        }
        let name: String = self
            .c
            .slice(start, self.c.pos)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if name == "NULL" {
            return Some(Expr::Null);
        }
        if self.c.at(CppToken::LeftBrace) {
            return Some(Expr::List {
                ty: Some(name),
                items: self.brace_items()?,
            });
        }
        Some(Expr::Name(name))
    }

    /// `name<args>(` or `name<args>{` with the cursor on `<`.
    fn template_use(&mut self, start: usize, lt: usize, after: usize) -> Option<Expr> {
        let name = self.c.slice(start, lt).trim().to_string();
        let args: Vec<String> = split_top_level(self.c.slice(lt + 1, after - 1), ',')
            .into_iter()
            .map(|a| a.trim().to_string())
            .collect();
        self.c.pos = after;
        if self.c.at(CppToken::LeftBrace) {
            return Some(Expr::List {
                ty: Some(self.c.slice(start, after).to_string()),
                items: self.brace_items()?,
            });
        }
        if CASTS.contains(&name.as_str()) && args.len() == 1 {
            self.c.expect(CppToken::LeftParen)?;
            let operand = self.expr()?;
            self.c.expect(CppToken::RightParen)?;
            return Some(Expr::Cast {
                ty: resolve_type(&args[0]),
                operand: Box::new(operand),
            });
        }
        Some(Expr::Template { name, args })
    }

    fn lambda(&mut self) -> Option<Expr> {
        let open = self.c.pos;
        let close = self.c.closing(open)?;
        let captures = self.c.slice(open + 1, close).trim().to_string();
        self.c.pos = close + 1;
        let params = if self.c.at(CppToken::LeftParen) {
            let open = self.c.pos;
            let close = self.c.closing(open)?;
            let text = self.c.slice(open + 1, close);
            self.c.pos = close + 1;
            TypeResolver::new().parse_parameters(text)
        } else {
            Vec::new()
        };
        while matches!(
            self.c.peek(),
            CppToken::Mutable | CppToken::Constexpr | CppToken::Noexcept
        ) {
            self.c.bump();
        }
        let ret = if self.c.eat(CppToken::Arrow) {
            let start = self.c.pos;
            while !self.c.at(CppToken::LeftBrace) && !self.c.at_end() {
                self.c.bump();
            }
            Some(resolve_type(self.c.slice(start, self.c.pos)))
        } else {
            None
        };
        self.c.expect(CppToken::LeftBrace)?;
        let body = self.block_items(true);
        Some(Expr::Lambda(Box::new(Lambda {
            captures,
            params,
            ret,
            body,
        })))
    }

    fn call_args(&mut self) -> Option<Vec<Expr>> {
        self.c.expect(CppToken::LeftParen)?;
        self.list_items(CppToken::RightParen)
    }

    fn brace_items(&mut self) -> Option<Vec<Expr>> {
        self.c.expect(CppToken::LeftBrace)?;
        self.list_items(CppToken::RightBrace)
    }

    fn list_items(&mut self, close: CppToken) -> Option<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.c.eat(close) {
            let item = if self.c.at(CppToken::LeftBrace) {
                Expr::List {
                    ty: None,
                    items: self.brace_items()?,
                }
            } else {
                self.expr()?
            };
            items.push(item);
            if !self.c.eat(CppToken::Comma) {
                self.c.expect(close)?;
                break;
            }
        }
        Some(items)
    }
}

/// Removes the `break` closing a case body, looking into a trailing block.
fn strip_trailing_break(body: &mut Vec<Stmt>) {
    if let Some(Stmt::Block(inner)) = body.last_mut() {
        if matches!(inner.last(), Some(Stmt::Break)) {
            inner.pop();
        }
        if let Some(Stmt::Block(inner)) = body.pop() {
            body.extend(inner);
        }
    }
    if matches!(body.last(), Some(Stmt::Break)) {
        body.pop();
    }
}

fn string_content(literal: &str) -> &str {
    let Some(open) = literal.find('"') else {
        return literal;
    };
    let inner = &literal[open + 1..];
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    if literal[..open].ends_with('R') {
        let inner = inner.strip_prefix('(').unwrap_or(inner);
        return inner.strip_suffix(')').unwrap_or(inner);
    }
    inner
}

/// Strips cv and reference qualifiers from a caught type.
fn bare_type(ty: &str) -> String {
    let ty = normalize(ty);
    let ty = ty.trim_end_matches('&').trim_end();
    let ty = ty.strip_prefix("const ").unwrap_or(ty);
    let ty = ty.strip_suffix(" const").unwrap_or(ty);
    ty.trim().to_string()
}

/// Recognizes `std::cout << a << b << std::endl`.
fn print_statement(expr: &Expr) -> Option<Stmt> {
    let mut operands = Vec::new();
    let mut head = expr;
    while let Expr::Binary {
        op: BinOp::Shl,
        lhs,
        rhs,
    } = head
    {
        operands.push(rhs.as_ref().clone());
        head = lhs;
    }
    let Expr::Name(stream) = head else {
        return None;
    };
    let to_stderr = STREAMS.iter().find(|(s, _)| s == stream)?.1;
    operands.reverse();

    let is_endl = |e: &Expr| matches!(e, Expr::Name(n) if n == "std::endl" || n == "endl");
    let mut newline = false;
    if operands.last().is_some_and(is_endl) {
        operands.pop();
        newline = true;
    } else if let Some(Expr::Str(s)) = operands.last_mut() {
        if let Some(stripped) = s.strip_suffix("\\n") {
            *s = stripped.to_string();
            newline = true;
            if s.is_empty() {
                operands.pop();
            }
        }
    }
    let items = operands
        .into_iter()
        .map(|e| if is_endl(&e) { Expr::Str("\\n".to_string()) } else { e })
        .collect();
    Some(Stmt::Print {
        to_stderr,
        items,
        newline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::TypeKind;

    fn one(text: &str) -> Stmt {
        let mut stmts = parse_body(text);
        assert_eq!(stmts.len(), 1, "{stmts:?}");
        stmts.remove(0)
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    #[test]
    fn precedence_climbing() {
        let e = parse_expression("x*x+y*y").unwrap();
        let Expr::Binary { op, lhs, rhs } = e else {
            panic!("not binary");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*lhs, Expr::Binary { op: BinOp::Mul, .. }));
        assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn shift_versus_comparison() {
        let e = parse_expression("a >> 2 > b").unwrap();
        let Expr::Binary { op, lhs, .. } = e else {
            panic!("not binary");
        };
        assert_eq!(op, BinOp::Gt);
        assert!(matches!(*lhs, Expr::Binary { op: BinOp::Shr, .. }));
    }

    #[test]
    fn less_than_is_not_a_template() {
        let e = parse_expression("i < n && j > 0").unwrap();
        assert!(matches!(e, Expr::Binary { op: BinOp::And, .. }));
    }

    #[test]
    fn template_calls_and_casts() {
        let e = parse_expression("std::make_unique<Node>(1, 2)").unwrap();
        let Expr::Call { callee, args } = e else {
            panic!("not a call");
        };
        assert_eq!(
            *callee,
            Expr::Template {
                name: "std::make_unique".into(),
                args: vec!["Node".into()]
            }
        );
        assert_eq!(args.len(), 2);

        let cast = parse_expression("static_cast<double>(total) / count").unwrap();
        let Expr::Binary { lhs, .. } = cast else {
            panic!("not binary");
        };
        assert!(matches!(*lhs, Expr::Cast { ref ty, .. } if ty.kind == TypeKind::Float));

        let c_cast = parse_expression("(int)x").unwrap();
        assert!(matches!(c_cast, Expr::Cast { .. }));
        let paren = parse_expression("(a) + b").unwrap();
        assert!(matches!(paren, Expr::Binary { .. }));
    }

    #[test]
    fn member_chains() {
        let e = parse_expression("this->items.size()").unwrap();
        let (base, method, args) = e.method_call().unwrap();
        assert_eq!(method, "size");
        assert!(args.is_empty());
        assert_eq!(
            *base,
            Expr::Member {
                base: Box::new(Expr::This),
                name: "items".into(),
                arrow: true
            }
        );
    }

    #[test]
    fn declarations() {
        let stmts = parse_body("int a = 1, *b, c[4];");
        assert_eq!(stmts.len(), 3);
        let Stmt::Decl(b) = &stmts[1] else {
            panic!("not a decl");
        };
        assert!(matches!(b.ty.kind, TypeKind::Pointer { .. }));
        let Stmt::Decl(c) = &stmts[2] else {
            panic!("not a decl");
        };
        assert!(matches!(c.ty.kind, TypeKind::Array { .. }));

        let Stmt::Decl(guard) = one("std::lock_guard<std::mutex> lock(mtx);") else {
            panic!("not a decl");
        };
        assert_eq!(guard.name, "lock");
        assert_eq!(guard.init, Init::Args(vec![Expr::Name("mtx".into())]));

        let Stmt::Decl(v) = one("std::vector<int> v{1, 2, 3};") else {
            panic!("not a decl");
        };
        assert!(matches!(v.init, Init::List(ref items) if items.len() == 3));

        let Stmt::Decl(auto) = one("const auto& item = items[0];") else {
            panic!("not a decl");
        };
        assert!(auto.is_auto());
    }

    #[test]
    fn expression_statements_are_not_declarations() {
        assert!(matches!(one("x = 5;"), Stmt::Expr(Expr::Assign { .. })));
        assert!(matches!(one("foo(bar);"), Stmt::Expr(Expr::Call { .. })));
        assert!(matches!(one("count += 2;"), Stmt::Expr(Expr::Assign { op: Some(BinOp::Add), .. })));
    }

    #[test]
    fn control_flow() {
        let Stmt::If { then, otherwise, .. } = one("if (x > 0) { y = 1; } else if (x < 0) y = -1; else y = 0;")
        else {
            panic!("not an if");
        };
        assert_eq!(then.len(), 1);
        let otherwise = otherwise.unwrap();
        assert!(matches!(otherwise[0], Stmt::If { .. }));

        let Stmt::For { init, cond, step, body } = one("for (int i = 0; i < n; ++i) total += i;") else {
            panic!("not a for");
        };
        assert_eq!(init.len(), 1);
        assert!(cond.is_some() && step.is_some());
        assert_eq!(body.len(), 1);

        let Stmt::ForRange { name, range, .. } = one("for (const auto& x : items) { sum += x; }") else {
            panic!("not a range for");
        };
        assert_eq!(name, "x");
        assert_eq!(range, Expr::Name("items".into()));
    }

    #[test]
    fn switch_cases_group_labels() {
        let Stmt::Switch { cases, .. } =
            one("switch (c) { case 1: case 2: a(); break; case 3: { b(); break; } default: d(); }")
        else {
            panic!("not a switch");
        };
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].labels.len(), 2);
        assert_eq!(cases[0].body.len(), 1);
        assert_eq!(cases[1].body.len(), 1);
        assert!(cases[2].is_default);
    }

    #[test]
    fn try_catch_handlers() {
        let Stmt::Try { body, handlers } =
            one("try { risky(); } catch (const std::exception& e) { log(e.what()); } catch (...) { }")
        else {
            panic!("not a try");
        };
        assert_eq!(body.len(), 1);
        assert_eq!(handlers[0].ty.as_deref(), Some("std::exception"));
        assert_eq!(handlers[0].var.as_deref(), Some("e"));
        assert_eq!(handlers[1].ty, None);
    }

    #[test]
    fn lambdas() {
        let Stmt::Decl(d) = one("auto f = [&](int x) { return x * 2; };") else {
            panic!("not a decl");
        };
        let Init::Expr(Expr::Lambda(lambda)) = d.init else {
            panic!("not a lambda");
        };
        assert_eq!(lambda.captures, "&");
        assert_eq!(lambda.params.len(), 1);
        assert!(lambda.single_return().is_some());
        assert!(!lambda.captures_by_value());
    }

    #[test]
    fn print_chains() {
        let Stmt::Print { to_stderr, items, newline } =
            one("std::cout << \"x = \" << x << std::endl;")
        else {
            panic!("not a print");
        };
        assert!(!to_stderr && newline);
        assert_eq!(items, vec![Expr::Str("x = ".into()), Expr::Name("x".into())]);

        let Stmt::Print { to_stderr, newline, .. } = one("std::cerr << \"oops\\n\";") else {
            panic!("not a print");
        };
        assert!(to_stderr && newline);
    }

    #[test]
    fn coroutine_keywords() {
        let stmts = parse_body("co_await foo(); co_return result;");
        assert!(matches!(&stmts[0], Stmt::Expr(Expr::Await(_))));
        assert_eq!(stmts[1], Stmt::CoReturn(Some(Expr::Name("result".into()))));
    }

    #[test]
    fn unreadable_statements_are_kept_verbatim() {
        let stmts = parse_body("auto [a, b] = pair; return a;");
        assert_eq!(stmts[0], Stmt::Unsupported("auto [a, b] = pair;".into()));
        assert_eq!(stmts[1], Stmt::Return(Some(Expr::Name("a".into()))));
    }

    #[test]
    fn throw_and_new() {
        let Stmt::Throw(Some(Expr::Call { callee, args })) =
            one("throw std::runtime_error(\"bad\");")
        else {
            panic!("not a throw");
        };
        assert_eq!(callee, name("std::runtime_error"));
        assert_eq!(args, vec![Expr::Str("bad".into())]);
        assert!(matches!(
            one("Node* n = new Node(1);"),
            Stmt::Decl(Decl { init: Init::Expr(Expr::New { .. }), .. })
        ));
    }
}
