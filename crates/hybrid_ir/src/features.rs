//! Records attached to functions and classes by the feature analyzers.
//!
//! Every record is plain data with no back-references. Expression and body
//! fragments are kept as source text; the generators lower them.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------------

/// The declared exception specification of a function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ExceptionSpec {
    /// No specification; the function may throw anything.
    #[default]
    Unspecified,
    /// `noexcept` or `noexcept(true)`.
    Noexcept,
    /// `noexcept(expr)` with a non-literal condition.
    NoexceptIf(String),
    /// `throw(A, B)`; an empty list is the legacy `throw()`.
    Dynamic(Vec<String>),
}

impl ExceptionSpec {
    /// True if the specification promises not to throw.
    pub fn is_nothrow(&self) -> bool {
        match self {
            ExceptionSpec::Noexcept => true,
            ExceptionSpec::Dynamic(types) => types.is_empty(),
            _ => false,
        }
    }
}

/// One `catch` handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// The caught type without cv/ref qualifiers; `None` for `catch (...)`.
    pub exception_type: Option<String>,
    /// The bound variable name, if any.
    pub variable: Option<String>,
    /// Handler body text without the outer braces.
    pub body: String,
}

impl CatchClause {
    /// True for `catch (...)`.
    pub fn is_catch_all(&self) -> bool {
        self.exception_type.is_none()
    }
}

/// A `try { ... } catch ...` region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryCatchBlock {
    /// The protected body text without the outer braces.
    pub try_body: String,
    /// Handlers in source order.
    pub catches: Vec<CatchClause>,
}

/// A `throw` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowSite {
    /// The thrown expression; `None` for a bare rethrow.
    pub expression: Option<String>,
    /// The constructed exception type when the expression is `T(...)` or `T{...}`.
    pub exception_type: Option<String>,
    /// True if the throw sits inside a `try` block of the same function.
    pub inside_try: bool,
}

/// Exception facts about one function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Declared specification.
    pub spec: ExceptionSpec,
    /// `try` regions in source order.
    pub try_blocks: Vec<TryCatchBlock>,
    /// `throw` expressions in source order.
    pub throw_sites: Vec<ThrowSite>,
    /// True iff the body contains at least one `throw`.
    pub may_throw: bool,
    /// True iff the function may let an exception escape: it throws and is
    /// not declared non-throwing.
    pub can_throw: bool,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// What a template parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateParamKind {
    /// `typename T`, `class T` or a concept-constrained `C T`.
    Type,
    /// `size_t N`, `int V`, `auto V`.
    NonType,
    /// `template <typename> class C`.
    Template,
}

/// One parameter of a `template<...>` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    /// Bound name; synthesized as `_N` when the header leaves it unnamed.
    pub name: String,
    /// Parameter kind.
    pub kind: TemplateParamKind,
    /// Value type of a non-type parameter.
    pub value_type: Option<String>,
    /// Default argument text.
    pub default: Option<String>,
    /// Concept names constraining a type parameter.
    pub constraints: Vec<String>,
    /// `typename... Ts`.
    pub is_pack: bool,
}

/// Whether a specialization is full or partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecializationKind {
    /// `template<>` followed by `Name<Args>`.
    Full,
    /// Parameters remain and the name carries `<Args>`.
    Partial,
}

/// Specialization arguments of a class or function template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpecialization {
    /// Full or partial.
    pub kind: SpecializationKind,
    /// Argument texts in order.
    pub args: Vec<String>,
}

/// Template facts about a function or class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Parameters in order.
    pub params: Vec<TemplateParameter>,
    /// Set for specializations.
    pub specialization: Option<TemplateSpecialization>,
    /// Trailing `requires` clause text.
    pub requires: Option<String>,
}

impl TemplateInfo {
    /// True if the declaration is a template or a specialization.
    pub fn is_template(&self) -> bool {
        !self.params.is_empty() || self.specialization.is_some()
    }

    /// Names of type parameters.
    pub fn type_param_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.kind == TemplateParamKind::Type)
            .map(|p| p.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Threading
// ---------------------------------------------------------------------------

/// A `std::thread` / `std::jthread` construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    /// Variable holding the thread, if bound.
    pub variable: Option<String>,
    /// The callable (function name or lambda text).
    pub callable: String,
    /// Arguments forwarded to the callable.
    pub args: Vec<String>,
    /// `std::jthread` joins on destruction.
    pub is_jthread: bool,
    /// `.join()` is called on the variable.
    pub joined: bool,
    /// `.detach()` is called on the variable.
    pub detached: bool,
}

/// How a mutex is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    /// `std::lock_guard`
    LockGuard,
    /// `std::unique_lock`
    UniqueLock,
    /// `std::shared_lock`
    SharedLock,
    /// `std::scoped_lock`
    ScopedLock,
    /// Explicit `m.lock()` ... `m.unlock()`.
    Manual,
}

/// A lock scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Lock flavor.
    pub kind: LockKind,
    /// Guard variable name for RAII locks.
    pub guard: Option<String>,
    /// Locked mutexes (several for `scoped_lock`).
    pub mutexes: Vec<String>,
    /// Statements covered by the lock, up to the end of the enclosing block
    /// (or up to `unlock()` for manual locking).
    pub scope: String,
}

/// A mutex declaration and the fields accessed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutexInfo {
    /// Variable or field name.
    pub name: String,
    /// `std::shared_mutex` (reader/writer).
    pub is_shared: bool,
    /// `std::recursive_mutex`.
    pub is_recursive: bool,
    /// Fields referenced while this mutex is held, in first-use order.
    pub guarded_fields: Vec<String>,
}

/// An operation on an atomic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomicOpKind {
    /// `load()`
    Load,
    /// `store(v)`
    Store,
    /// `fetch_add(v)`
    FetchAdd,
    /// `fetch_sub(v)`
    FetchSub,
    /// `fetch_and(v)`
    FetchAnd,
    /// `fetch_or(v)`
    FetchOr,
    /// `exchange(v)`
    Exchange,
    /// `compare_exchange_weak` / `compare_exchange_strong`
    CompareExchange,
    /// `++a` or `a++`
    Increment,
    /// `--a` or `a--`
    Decrement,
    /// `a += v`
    AddAssign,
    /// `a -= v`
    SubAssign,
}

/// One atomic operation site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicOperation {
    /// Operation.
    pub kind: AtomicOpKind,
    /// Argument text, if any.
    pub argument: Option<String>,
}

/// An atomic variable or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicInfo {
    /// Variable or field name.
    pub name: String,
    /// The `T` in `std::atomic<T>`.
    pub value_type: String,
    /// Initializer text.
    pub initial: Option<String>,
    /// Operations in source order.
    pub operations: Vec<AtomicOperation>,
}

/// Condition variable calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondVarOpKind {
    /// `wait(lock[, pred])`
    Wait,
    /// `wait_for(lock, dur[, pred])`
    WaitFor,
    /// `wait_until(lock, time[, pred])`
    WaitUntil,
    /// `notify_one()`
    NotifyOne,
    /// `notify_all()`
    NotifyAll,
}

/// One condition variable call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondVarOperation {
    /// Call kind.
    pub kind: CondVarOpKind,
    /// The lock argument of a wait.
    pub lock: Option<String>,
    /// The predicate argument of a wait.
    pub predicate: Option<String>,
}

/// A condition variable and its call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionVariableInfo {
    /// Variable or field name.
    pub name: String,
    /// Calls in source order.
    pub operations: Vec<CondVarOperation>,
}

/// Threading facts about one function body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadingInfo {
    /// Threads created.
    pub threads: Vec<ThreadInfo>,
    /// Lock scopes.
    pub locks: Vec<LockInfo>,
    /// Locally declared mutexes.
    pub mutexes: Vec<MutexInfo>,
    /// Local atomics, and operations on atomic fields.
    pub atomics: Vec<AtomicInfo>,
    /// Condition variable usage.
    pub condition_variables: Vec<ConditionVariableInfo>,
}

impl ThreadingInfo {
    /// True if anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
            && self.locks.is_empty()
            && self.mutexes.is_empty()
            && self.atomics.is_empty()
            && self.condition_variables.is_empty()
    }
}

/// Class-level threading facts gathered from fields and every method body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassThreading {
    /// Mutex fields with the fields they guard.
    pub mutexes: Vec<MutexInfo>,
    /// Atomic fields with their operations across all methods.
    pub atomics: Vec<AtomicInfo>,
    /// Condition variable fields.
    pub condition_variables: Vec<ConditionVariableInfo>,
}

impl ClassThreading {
    /// The mutex guarding `field`, if any.
    pub fn guard_of(&self, field: &str) -> Option<&MutexInfo> {
        self.mutexes
            .iter()
            .find(|m| m.guarded_fields.iter().any(|f| f == field))
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty() && self.atomics.is_empty() && self.condition_variables.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Coroutines and futures
// ---------------------------------------------------------------------------

/// Coroutine keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncOpKind {
    /// `co_await expr`
    Await,
    /// `co_return [expr]`
    Return,
    /// `co_yield expr`
    Yield,
}

/// One coroutine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncOperation {
    /// Keyword.
    pub kind: AsyncOpKind,
    /// Operand text; empty for a bare `co_return;`.
    pub expression: String,
}

/// Coroutine facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoroutineInfo {
    /// Operations in source order.
    pub operations: Vec<AsyncOperation>,
}

impl CoroutineInfo {
    /// True if any coroutine keyword occurs.
    pub fn is_coroutine(&self) -> bool {
        !self.operations.is_empty()
    }

    /// True if the coroutine yields values.
    pub fn is_generator(&self) -> bool {
        self.operations.iter().any(|op| op.kind == AsyncOpKind::Yield)
    }
}

/// A `std::future` / `std::shared_future` variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureInfo {
    /// Variable name.
    pub name: String,
    /// The `T` in `future<T>`.
    pub value_type: String,
    /// `shared_future`.
    pub is_shared: bool,
    /// Associated promise variable.
    pub promise: Option<String>,
    /// `.get()` is called on the future.
    pub get_called: bool,
}

/// Launch policy of `std::async`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchPolicy {
    /// No policy argument.
    #[default]
    Unspecified,
    /// `std::launch::async`
    Async,
    /// `std::launch::deferred`
    Deferred,
}

/// A `std::async` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncTaskInfo {
    /// Variable receiving the future.
    pub variable: Option<String>,
    /// Launch policy.
    pub policy: LaunchPolicy,
    /// Callable text.
    pub callable: String,
    /// Arguments after the callable.
    pub args: Vec<String>,
    /// True when the returned future is discarded.
    pub detached: bool,
}

/// Async facts about one function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncInfo {
    /// Coroutine keywords.
    pub coroutine: CoroutineInfo,
    /// Futures declared.
    pub futures: Vec<FutureInfo>,
    /// `std::promise` variables declared.
    pub promises: Vec<String>,
    /// `std::async` launches.
    pub tasks: Vec<AsyncTaskInfo>,
    /// Coroutine, or any future, or any task.
    pub is_async: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothrow_specs() {
        assert!(ExceptionSpec::Noexcept.is_nothrow());
        assert!(ExceptionSpec::Dynamic(vec![]).is_nothrow());
        assert!(!ExceptionSpec::Dynamic(vec!["std::bad_alloc".into()]).is_nothrow());
        assert!(!ExceptionSpec::Unspecified.is_nothrow());
        assert!(!ExceptionSpec::NoexceptIf("sizeof(T) > 4".into()).is_nothrow());
    }

    #[test]
    fn template_info_queries() {
        let mut info = TemplateInfo::default();
        assert!(!info.is_template());
        info.params.push(TemplateParameter {
            name: "T".into(),
            kind: TemplateParamKind::Type,
            value_type: None,
            default: None,
            constraints: vec![],
            is_pack: false,
        });
        info.params.push(TemplateParameter {
            name: "N".into(),
            kind: TemplateParamKind::NonType,
            value_type: Some("size_t".into()),
            default: None,
            constraints: vec![],
            is_pack: false,
        });
        assert!(info.is_template());
        assert_eq!(info.type_param_names().collect::<Vec<_>>(), vec!["T"]);
    }

    #[test]
    fn guard_lookup() {
        let threading = ClassThreading {
            mutexes: vec![MutexInfo {
                name: "mtx".into(),
                is_shared: false,
                is_recursive: false,
                guarded_fields: vec!["count".into()],
            }],
            ..Default::default()
        };
        assert_eq!(threading.guard_of("count").map(|m| m.name.as_str()), Some("mtx"));
        assert!(threading.guard_of("other").is_none());
        assert!(!threading.is_empty());
    }

    #[test]
    fn generator_detection() {
        let co = CoroutineInfo {
            operations: vec![AsyncOperation {
                kind: AsyncOpKind::Yield,
                expression: "i".into(),
            }],
        };
        assert!(co.is_coroutine());
        assert!(co.is_generator());
        assert!(!CoroutineInfo::default().is_coroutine());
    }

    #[test]
    fn serde_roundtrip() {
        let info = ExceptionInfo {
            spec: ExceptionSpec::Dynamic(vec!["std::runtime_error".into()]),
            try_blocks: vec![TryCatchBlock {
                try_body: "risky();".into(),
                catches: vec![CatchClause {
                    exception_type: None,
                    variable: None,
                    body: "".into(),
                }],
            }],
            throw_sites: vec![],
            may_throw: false,
            can_throw: false,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: ExceptionInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
        assert!(back.try_blocks[0].catches[0].is_catch_all());
    }
}
