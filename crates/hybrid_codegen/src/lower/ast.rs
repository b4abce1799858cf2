//! Statement and expression trees for lowered function bodies.

use hybrid_ir::{Parameter, Type};

/// Binary operators, in C++ spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl BinOp {
    /// The operator as written in C++, Rust and Go alike.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
        }
    }

    /// C++ binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 3,
            BinOp::And => 4,
            BinOp::BitOr => 5,
            BinOp::BitXor => 6,
            BinOp::BitAnd => 7,
            BinOp::Eq | BinOp::Ne => 8,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 9,
            BinOp::Shl | BinOp::Shr => 10,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 12,
        }
    }

    /// True for operators producing `bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::And | BinOp::Or
        )
    }

    /// Parses the operator part of a compound assignment (`+=` → `Add`).
    pub fn from_compound(text: &str) -> Option<Self> {
        Self::from_symbol(text.strip_suffix('=')?)
    }

    /// Parses an operator symbol.
    pub fn from_symbol(text: &str) -> Option<Self> {
        Some(match text {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            "&" => BinOp::BitAnd,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            _ => return None,
        })
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `*p`
    Deref,
    /// `&x`
    AddrOf,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
}

/// Postfix increment or decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDec {
    /// `x++`
    Inc,
    /// `x--`
    Dec,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A possibly qualified name: `x`, `std::endl`, `Color::Red`.
    Name(String),
    /// `this`
    This,
    /// Integer literal as written.
    Int(String),
    /// Floating literal as written.
    Float(String),
    /// String literal content without quotes, escapes kept as written.
    /// Adjacent literals are concatenated.
    Str(String),
    /// Character literal as written, quotes included.
    Char(String),
    /// `true` / `false`
    Bool(bool),
    /// `nullptr` / `NULL`
    Null,
    /// Prefix operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `x++` / `x--`.
    Postfix {
        /// Operator.
        op: IncDec,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `target = value` or compound `target op= value`.
    Assign {
        /// `None` for plain `=`.
        op: Option<BinOp>,
        /// Assigned place.
        target: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Ternary {
        /// Condition.
        cond: Box<Expr>,
        /// Value when true.
        then: Box<Expr>,
        /// Value when false.
        otherwise: Box<Expr>,
    },
    /// Function or method call.
    Call {
        /// Called expression.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `base.name` or `base->name`.
    Member {
        /// Object.
        base: Box<Expr>,
        /// Member name.
        name: String,
        /// `true` for `->`.
        arrow: bool,
    },
    /// `base[index]`
    Index {
        /// Indexed value.
        base: Box<Expr>,
        /// Index.
        index: Box<Expr>,
    },
    /// `static_cast<T>(x)`, `(T)x` or `T(x)` for builtin `T`.
    Cast {
        /// Target type.
        ty: Type,
        /// Converted value.
        operand: Box<Expr>,
    },
    /// A name with explicit template arguments: `std::make_unique<Node>`.
    Template {
        /// Qualified name.
        name: String,
        /// Argument spellings.
        args: Vec<String>,
    },
    /// A lambda expression.
    Lambda(Box<Lambda>),
    /// A braced list, optionally typed: `{1, 2}`, `Point{1, 2}`.
    List {
        /// Type spelling before the brace.
        ty: Option<String>,
        /// Elements.
        items: Vec<Expr>,
    },
    /// `new T(args)` or `new T[n]`.
    New {
        /// Allocated type spelling.
        ty: String,
        /// Constructor arguments or, for arrays, the length.
        args: Vec<Expr>,
        /// `new T[n]`.
        array: bool,
    },
    /// `sizeof(T)` or `sizeof x`.
    SizeOf(String),
    /// `co_await x`
    Await(Box<Expr>),
    /// `( x )`
    Paren(Box<Expr>),
}

impl Expr {
    /// The callee name of a call to a plain or qualified name.
    pub fn call_name(&self) -> Option<&str> {
        match self {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Name(name) | Expr::Template { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// `receiver.method(args)` parts.
    pub fn method_call(&self) -> Option<(&Expr, &str, &[Expr])> {
        match self {
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member { base, name, .. } => Some((base, name, args)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The expression without surrounding parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// Directly nested expressions, lambdas excluded.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Unary { operand, .. }
            | Expr::Postfix { operand, .. }
            | Expr::Cast { operand, .. }
            | Expr::Await(operand)
            | Expr::Paren(operand) => vec![operand.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Assign { target, value, .. } => vec![target.as_ref(), value.as_ref()],
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => vec![cond.as_ref(), then.as_ref(), otherwise.as_ref()],
            Expr::Call { callee, args } => std::iter::once(callee.as_ref()).chain(args).collect(),
            Expr::Member { base, .. } => vec![base.as_ref()],
            Expr::Index { base, index } => vec![base.as_ref(), index.as_ref()],
            Expr::List { items, .. } | Expr::New { args: items, .. } => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Visits this expression and every nested one, lambdas excluded.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// A lambda: `[captures](params) -> ret { body }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// Capture list text.
    pub captures: String,
    /// Parameters.
    pub params: Vec<Parameter>,
    /// Explicit trailing return type.
    pub ret: Option<Type>,
    /// Body statements.
    pub body: Vec<Stmt>,
}

impl Lambda {
    /// True for `[=]`, `[this]`-free value captures and explicit copies.
    pub fn captures_by_value(&self) -> bool {
        !self.captures.trim().is_empty() && !self.captures.contains('&')
    }

    /// The returned expression of a single-`return` body.
    pub fn single_return(&self) -> Option<&Expr> {
        match self.body.as_slice() {
            [Stmt::Return(Some(e))] => Some(e),
            _ => None,
        }
    }
}

/// How a declared variable is initialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    /// `T x;`
    Default,
    /// `T x = e;`
    Expr(Expr),
    /// `T x(a, b);`
    Args(Vec<Expr>),
    /// `T x{a, b};` or `T x = {a, b};`
    List(Vec<Expr>),
}

/// A local variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    /// Resolved type; `auto` resolves to a class named `auto`.
    pub ty: Type,
    /// Variable name.
    pub name: String,
    /// Initializer.
    pub init: Init,
    /// `static` or `thread_local` storage.
    pub is_static: bool,
}

impl Decl {
    /// True for `auto`, `auto&`, `const auto&`.
    pub fn is_auto(&self) -> bool {
        self.ty.without_reference().base_name() == "auto"
    }
}

/// One `case` group of a `switch`.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Labels sharing this body (empty cases fall into the next one).
    pub labels: Vec<Expr>,
    /// True if `default:` is among the labels.
    pub is_default: bool,
    /// Statements up to the next label, `break` removed.
    pub body: Vec<Stmt>,
}

/// One `catch` handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    /// Caught type without cv/reference; `None` for `catch (...)`.
    pub ty: Option<String>,
    /// Bound variable.
    pub var: Option<String>,
    /// Handler statements.
    pub body: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Local declaration.
    Decl(Decl),
    /// Expression statement.
    Expr(Expr),
    /// `return [e];`
    Return(Option<Expr>),
    /// `if`/`else`.
    If {
        /// Condition.
        cond: Expr,
        /// Then branch.
        then: Vec<Stmt>,
        /// Else branch.
        otherwise: Option<Vec<Stmt>>,
    },
    /// `while (cond) body`
    While {
        /// Condition.
        cond: Expr,
        /// Body.
        body: Vec<Stmt>,
    },
    /// `do body while (cond);`
    DoWhile {
        /// Body.
        body: Vec<Stmt>,
        /// Condition.
        cond: Expr,
    },
    /// Classic `for`.
    For {
        /// Init statements (declarations or expressions).
        init: Vec<Stmt>,
        /// Condition.
        cond: Option<Expr>,
        /// Step expression.
        step: Option<Expr>,
        /// Body.
        body: Vec<Stmt>,
    },
    /// Range `for (T x : range)`.
    ForRange {
        /// Loop variable type.
        ty: Type,
        /// Loop variable.
        name: String,
        /// Iterated expression.
        range: Expr,
        /// Body.
        body: Vec<Stmt>,
    },
    /// `switch`.
    Switch {
        /// Switched value.
        scrutinee: Expr,
        /// Case groups in order.
        cases: Vec<Case>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `try { } catch ...`
    Try {
        /// Protected statements.
        body: Vec<Stmt>,
        /// Handlers in order.
        handlers: Vec<Handler>,
    },
    /// `throw [e];`
    Throw(Option<Expr>),
    /// `co_return [e];`
    CoReturn(Option<Expr>),
    /// `co_yield e;`
    CoYield(Expr),
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `std::cout << ...;` / `std::cerr << ...;`
    Print {
        /// Writes to standard error.
        to_stderr: bool,
        /// Printed operands in order.
        items: Vec<Expr>,
        /// Ends with `std::endl` or `"\n"`.
        newline: bool,
    },
    /// `delete p;` / `delete[] p;`
    Delete(Expr),
    /// A statement the parser could not read, as written.
    Unsupported(String),
}

impl Stmt {
    /// Visits this statement and every nested one.
    pub fn walk(&self, f: &mut dyn FnMut(&Stmt)) {
        f(self);
        let mut each = |stmts: &[Stmt]| stmts.iter().for_each(|s| s.walk(f));
        match self {
            Stmt::If {
                then, otherwise, ..
            } => {
                each(then);
                if let Some(o) = otherwise {
                    each(o);
                }
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::ForRange { body, .. }
            | Stmt::Block(body) => each(body),
            Stmt::For { init, body, .. } => {
                each(init);
                each(body);
            }
            Stmt::Switch { cases, .. } => cases.iter().for_each(|c| each(&c.body)),
            Stmt::Try { body, handlers } => {
                each(body);
                handlers.iter().for_each(|h| each(&h.body));
            }
            _ => {}
        }
    }

    /// Expressions directly held by this statement (not nested statements).
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Stmt::Decl(d) => match &d.init {
                Init::Default => vec![],
                Init::Expr(e) => vec![e],
                Init::Args(items) | Init::List(items) => items.iter().collect(),
            },
            Stmt::Expr(e) | Stmt::CoYield(e) | Stmt::Delete(e) => vec![e],
            Stmt::Return(e) | Stmt::Throw(e) | Stmt::CoReturn(e) => e.iter().collect(),
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                vec![cond]
            }
            Stmt::For { cond, step, .. } => cond.iter().chain(step.iter()).collect(),
            Stmt::ForRange { range, .. } => vec![range],
            Stmt::Switch { scrutinee, .. } => vec![scrutinee],
            Stmt::Print { items, .. } => items.iter().collect(),
            _ => vec![],
        }
    }
}

/// True if any statement in `stmts`, at any depth, satisfies `pred`.
pub fn any_stmt(stmts: &[Stmt], pred: &mut dyn FnMut(&Stmt) -> bool) -> bool {
    let mut found = false;
    for s in stmts {
        s.walk(&mut |s| found = found || pred(s));
    }
    found
}

/// True if any expression in `stmts`, at any depth, satisfies `pred`.
pub fn any_expr(stmts: &[Stmt], pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
    let mut found = false;
    for s in stmts {
        s.walk(&mut |s| {
            for e in s.expressions() {
                e.walk(&mut |e| found = found || pred(e));
            }
        });
    }
    found
}
