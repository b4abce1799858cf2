//! Threading analysis: threads, lock scopes, atomics and condition variables.
//!
//! Free functions are scanned on their own. For classes, every method is
//! scanned with the class's synchronization fields in view, and the results
//! are folded into a [`ClassThreading`] record: which mutex guards which
//! fields, and every operation performed on atomic and condition variable
//! fields across all methods.

use hybrid_cpp_parser::CppToken;
use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::type_map::normalize;
use hybrid_ir::{
    AtomicInfo, AtomicOpKind, AtomicOperation, ClassDecl, ClassThreading, CondVarOpKind,
    CondVarOperation, ConditionVariableInfo, Function, LockInfo, LockKind, MutexInfo, ThreadInfo,
    ThreadingInfo, ThreadingKind, Type,
};
use tracing::debug;

use crate::body::Body;
use crate::FeatureAnalyzer;

const THREADS: &[&str] = &["thread", "jthread"];
const GUARDS: &[&str] = &["lock_guard", "unique_lock", "shared_lock", "scoped_lock"];
const MUTEXES: &[&str] = &["mutex", "shared_mutex", "recursive_mutex", "timed_mutex"];
const CONDVARS: &[&str] = &["condition_variable", "condition_variable_any"];
const LOCK_TAGS: &[&str] = &["defer_lock", "adopt_lock", "try_to_lock"];

/// Fills [`ThreadingInfo`] for functions and [`ClassThreading`] for classes.
pub struct ThreadingAnalyzer;

impl FeatureAnalyzer for ThreadingAnalyzer {
    fn name(&self) -> &str {
        "threading"
    }

    fn analyze_function(&self, function: &mut Function, _sink: &DiagnosticSink) {
        function.threading = scan(function, &Context::default());
    }

    fn analyze_class(&self, class: &mut ClassDecl, _sink: &DiagnosticSink) {
        let context = Context::of(class);
        for method in &mut class.methods {
            method.threading = scan(method, &context);
        }
        class.threading = summarize(class, &context);
        if !class.threading.is_empty() {
            debug!(
                class = %class.name,
                mutexes = class.threading.mutexes.len(),
                atomics = class.threading.atomics.len(),
                condvars = class.threading.condition_variables.len(),
                "class threading"
            );
        }
    }
}

/// Synchronization names visible to a body before it declares any of its own.
#[derive(Default)]
struct Context {
    mutexes: Vec<String>,
    atomics: Vec<(String, String)>,
    condvars: Vec<String>,
    /// Plain data fields that a lock may guard.
    fields: Vec<String>,
}

impl Context {
    fn of(class: &ClassDecl) -> Self {
        let mut context = Context::default();
        for field in &class.fields {
            context.add(&field.name, &field.ty);
        }
        context
    }

    fn add(&mut self, name: &str, ty: &Type) {
        match ty.without_reference().threading_kind() {
            Some(kind) if kind.is_mutex() => self.mutexes.push(name.to_string()),
            Some(ThreadingKind::Atomic) => self.atomics.push((name.to_string(), value_type(ty))),
            Some(ThreadingKind::ConditionVariable) => self.condvars.push(name.to_string()),
            Some(_) => {}
            None => self.fields.push(name.to_string()),
        }
    }
}

/// The `T` of `std::atomic<T>`.
fn value_type(ty: &Type) -> String {
    ty.without_reference()
        .args()
        .first()
        .map_or_else(|| "int".to_string(), |t| normalize(&t.spelling()))
}

fn scan(function: &Function, context: &Context) -> ThreadingInfo {
    let Some(text) = function.body.as_deref() else {
        return ThreadingInfo::default();
    };
    let mut names = Context {
        mutexes: context.mutexes.clone(),
        atomics: context.atomics.clone(),
        condvars: context.condvars.clone(),
        fields: Vec::new(),
    };
    for param in &function.params {
        names.add(&param.name, &param.ty);
    }
    let mut scanner = Scanner {
        body: Body::new(text),
        names,
        guards: Vec::new(),
        info: ThreadingInfo::default(),
    };
    scanner.run();
    scanner.info
}

struct Scanner<'a> {
    body: Body<'a>,
    names: Context,
    guards: Vec<String>,
    info: ThreadingInfo,
}

impl Scanner<'_> {
    fn run(&mut self) {
        for i in 0..self.body.len() {
            if let Some((name, next)) = self.body.std_name(i, THREADS) {
                self.thread(i, next, name == "jthread");
            } else if let Some((name, next)) = self.body.std_name(i, GUARDS) {
                self.guard(next, lock_kind(name));
            } else if let Some((name, next)) = self.body.std_name(i, MUTEXES) {
                self.local_mutex(next, name);
            } else if let Some((_, next)) = self.body.std_name(i, &["atomic"]) {
                self.local_atomic(next);
            } else if let Some((_, next)) = self.body.std_name(i, CONDVARS) {
                self.local_condvar(next);
            } else if self.body.kind(i) == CppToken::Identifier && self.body.is_unqualified_use(i) {
                self.use_site(i);
            }
        }
        self.mark_thread_calls();
    }

    /// `std::thread t(f, args)`, `std::thread t{...}` or `t = std::thread(...)`.
    fn thread(&mut self, at: usize, next: usize, is_jthread: bool) {
        let body = &self.body;
        let (variable, open) = match body.kind(next) {
            CppToken::Identifier => (Some(body.text(next).to_string()), next + 1),
            CppToken::LeftParen | CppToken::LeftBrace => (assigned_variable(body, at), next),
            _ => return,
        };
        let Some((mut args, _)) = body.call_args(open) else {
            return;
        };
        if args.is_empty() {
            return;
        }
        let callable = args.remove(0);
        self.info.threads.push(ThreadInfo {
            variable,
            callable,
            args,
            is_jthread,
            joined: false,
            detached: false,
        });
    }

    /// An RAII lock: `std::lock_guard<M> g(m);`. The scope runs to the end
    /// of the enclosing block.
    fn guard(&mut self, next: usize, kind: LockKind) {
        let body = &self.body;
        let at = body.skip_angles(next);
        if body.kind(at) != CppToken::Identifier {
            return;
        }
        let Some((args, close)) = body.call_args(at + 1) else {
            return;
        };
        let mutexes: Vec<String> = args
            .iter()
            .map(|arg| mutex_name(arg))
            .filter(|arg| !LOCK_TAGS.contains(&arg.trim_start_matches("std::")))
            .map(str::to_string)
            .collect();
        if mutexes.is_empty() {
            return;
        }
        let end = body.statement_end(close + 1);
        let scope_end = body.block_end(end + 1);
        let guard = body.text(at).to_string();
        self.info.locks.push(LockInfo {
            kind,
            guard: Some(guard.clone()),
            mutexes,
            scope: body.between(end, scope_end).to_string(),
        });
        self.guards.push(guard);
    }

    /// `m.lock(); ... m.unlock();` on a known mutex.
    fn manual_lock(&mut self, i: usize, open: usize) {
        let body = &self.body;
        let name = body.text(i);
        let Some(close) = body.closing(open) else {
            return;
        };
        let end = body.statement_end(close + 1);
        let scope_end = (end + 1..body.len())
            .find(|&j| body.is_ident(j, name) && body.member_call(j).is_some_and(|(m, _)| m == "unlock"))
            .unwrap_or_else(|| body.block_end(end + 1));
        self.info.locks.push(LockInfo {
            kind: LockKind::Manual,
            guard: None,
            mutexes: vec![name.to_string()],
            scope: body.between(end, scope_end).to_string(),
        });
    }

    fn local_mutex(&mut self, next: usize, kind: &str) {
        let body = &self.body;
        if body.kind(next) != CppToken::Identifier
            || !matches!(body.kind(next + 1), CppToken::Semicolon | CppToken::LeftBrace)
        {
            return;
        }
        let name = body.text(next).to_string();
        self.names.mutexes.push(name.clone());
        self.info.mutexes.push(MutexInfo {
            name,
            is_shared: kind == "shared_mutex",
            is_recursive: kind == "recursive_mutex",
            guarded_fields: Vec::new(),
        });
    }

    /// `std::atomic<T> name{init}`, `(init)` or `= init`.
    fn local_atomic(&mut self, next: usize) {
        let body = &self.body;
        if body.kind(next) != CppToken::Less {
            return;
        }
        let after = body.skip_angles(next);
        if after == next || body.kind(after) != CppToken::Identifier {
            return;
        }
        let value_type = normalize(body.between(next, after - 1));
        let name = body.text(after).to_string();
        let initial = match body.kind(after + 1) {
            CppToken::LeftBrace | CppToken::LeftParen => body
                .closing(after + 1)
                .map(|close| body.between(after + 1, close)),
            CppToken::Assign => Some(body.slice(after + 2, body.expression_end(after + 2))),
            _ => None,
        }
        .filter(|init| !init.is_empty())
        .map(str::to_string);
        self.names.atomics.push((name.clone(), value_type.clone()));
        self.info.atomics.push(AtomicInfo {
            name,
            value_type,
            initial,
            operations: Vec::new(),
        });
    }

    fn local_condvar(&mut self, next: usize) {
        let body = &self.body;
        if body.kind(next) != CppToken::Identifier || body.kind(next + 1) != CppToken::Semicolon {
            return;
        }
        let name = body.text(next).to_string();
        self.names.condvars.push(name.clone());
        self.info.condition_variables.push(ConditionVariableInfo {
            name,
            operations: Vec::new(),
        });
    }

    /// A use of an identifier that may name a mutex, atomic or condition
    /// variable.
    fn use_site(&mut self, i: usize) {
        let name = self.body.text(i);
        if self.names.mutexes.iter().any(|m| m == name) && !self.guards.iter().any(|g| g == name) {
            if let Some(("lock", open)) = self.body.member_call(i) {
                self.manual_lock(i, open);
            }
            return;
        }
        let atomic_type = self
            .names
            .atomics
            .iter()
            .find(|(a, _)| a == name)
            .map(|(_, ty)| ty.clone());
        if let Some(value_type) = atomic_type {
            if let Some(operation) = atomic_operation(&self.body, i) {
                self.record_atomic(name, value_type, operation);
            }
        } else if self.names.condvars.iter().any(|c| c == name) {
            if let Some(operation) = condvar_operation(&self.body, i) {
                self.record_condvar(name, operation);
            }
        }
    }

    fn record_atomic(&mut self, name: &str, value_type: String, operation: AtomicOperation) {
        match self.info.atomics.iter_mut().find(|a| a.name == name) {
            Some(atomic) => atomic.operations.push(operation),
            None => self.info.atomics.push(AtomicInfo {
                name: name.to_string(),
                value_type,
                initial: None,
                operations: vec![operation],
            }),
        }
    }

    fn record_condvar(&mut self, name: &str, operation: CondVarOperation) {
        match self.info.condition_variables.iter_mut().find(|c| c.name == name) {
            Some(condvar) => condvar.operations.push(operation),
            None => self.info.condition_variables.push(ConditionVariableInfo {
                name: name.to_string(),
                operations: vec![operation],
            }),
        }
    }

    fn mark_thread_calls(&mut self) {
        for i in 0..self.body.len() {
            let Some((method, _)) = self.body.member_call(i) else {
                continue;
            };
            let receiver = self.body.text(i);
            for thread in &mut self.info.threads {
                if thread.variable.as_deref() != Some(receiver) {
                    continue;
                }
                match method {
                    "join" => thread.joined = true,
                    "detach" => thread.detached = true,
                    _ => {}
                }
            }
        }
    }
}

fn lock_kind(name: &str) -> LockKind {
    match name {
        "unique_lock" => LockKind::UniqueLock,
        "shared_lock" => LockKind::SharedLock,
        "scoped_lock" => LockKind::ScopedLock,
        _ => LockKind::LockGuard,
    }
}

fn mutex_name(arg: &str) -> &str {
    arg.trim().trim_start_matches("this->")
}

/// `v = std::thread(...)`: the assigned variable.
fn assigned_variable(body: &Body<'_>, at: usize) -> Option<String> {
    (at >= 2 && body.kind(at - 1) == CppToken::Assign && body.kind(at - 2) == CppToken::Identifier)
        .then(|| body.text(at - 2).to_string())
}

fn atomic_operation(body: &Body<'_>, i: usize) -> Option<AtomicOperation> {
    if let Some((method, open)) = body.member_call(i) {
        let kind = match method {
            "load" => AtomicOpKind::Load,
            "store" => AtomicOpKind::Store,
            "fetch_add" => AtomicOpKind::FetchAdd,
            "fetch_sub" => AtomicOpKind::FetchSub,
            "fetch_and" => AtomicOpKind::FetchAnd,
            "fetch_or" => AtomicOpKind::FetchOr,
            "exchange" => AtomicOpKind::Exchange,
            "compare_exchange_weak" | "compare_exchange_strong" => AtomicOpKind::CompareExchange,
            _ => return None,
        };
        let argument = body
            .closing(open)
            .map(|close| body.between(open, close))
            .filter(|arg| !arg.is_empty())
            .map(str::to_string);
        return Some(AtomicOperation { kind, argument });
    }
    let bare = |kind| Some(AtomicOperation { kind, argument: None });
    match body.kind(i + 1) {
        CppToken::PlusPlus => return bare(AtomicOpKind::Increment),
        CppToken::MinusMinus => return bare(AtomicOpKind::Decrement),
        CppToken::CompoundAssign => {
            let kind = match body.text(i + 1) {
                "+=" => AtomicOpKind::AddAssign,
                "-=" => AtomicOpKind::SubAssign,
                _ => return None,
            };
            let argument = body.slice(i + 2, body.expression_end(i + 2));
            return Some(AtomicOperation {
                kind,
                argument: Some(argument.to_string()),
            });
        }
        _ => {}
    }
    let prefix = if i >= 2 && body.kind(i - 1) == CppToken::Arrow && body.kind(i - 2) == CppToken::This {
        i.checked_sub(3)
    } else {
        i.checked_sub(1)
    };
    match prefix.map(|p| body.kind(p)) {
        Some(CppToken::PlusPlus) => bare(AtomicOpKind::Increment),
        Some(CppToken::MinusMinus) => bare(AtomicOpKind::Decrement),
        _ => None,
    }
}

fn condvar_operation(body: &Body<'_>, i: usize) -> Option<CondVarOperation> {
    let (method, open) = body.member_call(i)?;
    let kind = match method {
        "wait" => CondVarOpKind::Wait,
        "wait_for" => CondVarOpKind::WaitFor,
        "wait_until" => CondVarOpKind::WaitUntil,
        "notify_one" => CondVarOpKind::NotifyOne,
        "notify_all" => CondVarOpKind::NotifyAll,
        _ => return None,
    };
    let (args, _) = body.call_args(open)?;
    let predicate_at = if kind == CondVarOpKind::Wait { 1 } else { 2 };
    Some(CondVarOperation {
        kind,
        lock: args.first().cloned(),
        predicate: (args.len() > predicate_at).then(|| args[args.len() - 1].clone()),
    })
}

// ============================================================================
// Class summary
// ============================================================================

fn summarize(class: &ClassDecl, context: &Context) -> ClassThreading {
    let mut threading = ClassThreading::default();
    for field in &class.fields {
        let name = &field.name;
        match field.ty.threading_kind() {
            Some(kind) if kind.is_mutex() => threading.mutexes.push(MutexInfo {
                name: name.clone(),
                is_shared: kind == ThreadingKind::SharedMutex,
                is_recursive: kind == ThreadingKind::RecursiveMutex,
                guarded_fields: guarded_fields(class, name, context),
            }),
            Some(ThreadingKind::Atomic) => threading.atomics.push(AtomicInfo {
                name: name.clone(),
                value_type: value_type(&field.ty),
                initial: field.initializer.clone(),
                operations: method_records(class, |t| &t.atomics)
                    .filter(|a| &a.name == name)
                    .flat_map(|a| a.operations.iter().cloned())
                    .collect(),
            }),
            Some(ThreadingKind::ConditionVariable) => {
                threading.condition_variables.push(ConditionVariableInfo {
                    name: name.clone(),
                    operations: method_records(class, |t| &t.condition_variables)
                        .filter(|c| &c.name == name)
                        .flat_map(|c| c.operations.iter().cloned())
                        .collect(),
                })
            }
            _ => {}
        }
    }
    threading
}

fn method_records<'c, T: 'c>(
    class: &'c ClassDecl,
    select: impl Fn(&'c ThreadingInfo) -> &'c Vec<T> + 'c,
) -> impl Iterator<Item = &'c T> + 'c {
    class.methods.iter().flat_map(move |m| select(&m.threading).iter())
}

/// Data fields referenced inside any lock scope of `mutex`, in first-use order.
fn guarded_fields(class: &ClassDecl, mutex: &str, context: &Context) -> Vec<String> {
    let mut guarded: Vec<String> = Vec::new();
    let scopes = method_records(class, |t| &t.locks).filter(|l| l.mutexes.iter().any(|m| m == mutex));
    for lock in scopes {
        let body = Body::new(&lock.scope);
        for i in 0..body.len() {
            if body.kind(i) != CppToken::Identifier || !body.is_unqualified_use(i) {
                continue;
            }
            let name = body.text(i);
            if context.fields.iter().any(|f| f == name) && !guarded.iter().any(|g| g == name) {
                guarded.push(name.to_string());
            }
        }
    }
    guarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_cpp_parser::{parse_str, resolve_type};
    use hybrid_ir::Parameter;

    fn scanned(body: &str) -> ThreadingInfo {
        scanned_with(body, Vec::new())
    }

    fn scanned_with(body: &str, params: Vec<Parameter>) -> ThreadingInfo {
        let mut f = Function::new("f", Type::void());
        f.body = Some(body.to_string());
        f.params = params;
        ThreadingAnalyzer.analyze_function(&mut f, &DiagnosticSink::new());
        f.threading
    }

    fn class(source: &str) -> ClassDecl {
        let sink = DiagnosticSink::new();
        let mut ir = parse_str(source, &sink);
        let mut class = ir.classes.remove(0);
        ThreadingAnalyzer.analyze_class(&mut class, &sink);
        class
    }

    #[test]
    fn thread_with_join() {
        let info = scanned("std::thread t(worker, 1, std::ref(x));\nt.join();");
        assert_eq!(info.threads.len(), 1);
        let t = &info.threads[0];
        assert_eq!(t.variable.as_deref(), Some("t"));
        assert_eq!(t.callable, "worker");
        assert_eq!(t.args, vec!["1", "std::ref(x)"]);
        assert!(t.joined && !t.detached && !t.is_jthread);
    }

    #[test]
    fn jthread_lambda_and_assigned_thread() {
        let info = scanned(
            "std::jthread j([&] { run(a, b); });\nauto h = std::thread(task);\nh.detach();",
        );
        assert_eq!(info.threads.len(), 2);
        assert!(info.threads[0].is_jthread);
        assert_eq!(info.threads[0].callable, "[&] { run(a, b); }");
        assert!(info.threads[0].args.is_empty());
        assert_eq!(info.threads[1].variable.as_deref(), Some("h"));
        assert!(info.threads[1].detached);
    }

    #[test]
    fn thread_type_mentions_are_not_threads() {
        let info = scanned(
            "std::vector<std::thread> pool; auto n = std::thread::hardware_concurrency();",
        );
        assert!(info.threads.is_empty());
    }

    #[test]
    fn guard_kinds_and_tags() {
        let info = scanned(
            "std::unique_lock<std::mutex> lk(m, std::defer_lock);\nlk.lock();\nwork();\n\
             { std::scoped_lock both(a, b); swap(x, y); }",
        );
        assert_eq!(info.locks.len(), 2);
        assert_eq!(info.locks[0].kind, LockKind::UniqueLock);
        assert_eq!(info.locks[0].guard.as_deref(), Some("lk"));
        assert_eq!(info.locks[0].mutexes, vec!["m"]);
        assert_eq!(info.locks[1].kind, LockKind::ScopedLock);
        assert_eq!(info.locks[1].mutexes, vec!["a", "b"]);
        assert_eq!(info.locks[1].scope, "swap(x, y);");
    }

    #[test]
    fn manual_lock_on_parameter() {
        let params = vec![Parameter::new("m", resolve_type("std::mutex&"))];
        let info = scanned_with("m.lock();\nshared++;\nm.unlock();\nother();", params);
        assert_eq!(info.locks.len(), 1);
        let lock = &info.locks[0];
        assert_eq!(lock.kind, LockKind::Manual);
        assert_eq!(lock.guard, None);
        assert_eq!(lock.mutexes, vec!["m"]);
        assert_eq!(lock.scope, "shared++;");
    }

    #[test]
    fn lock_on_unknown_receiver_is_ignored() {
        let info = scanned("auto sp = weak.lock();");
        assert!(info.locks.is_empty());
    }

    #[test]
    fn local_mutex_declarations() {
        let info = scanned("static std::shared_mutex rw; std::recursive_mutex r;");
        assert_eq!(info.mutexes.len(), 2);
        assert!(info.mutexes[0].is_shared);
        assert!(info.mutexes[1].is_recursive);
    }

    #[test]
    fn atomic_operations_in_order() {
        let info = scanned(
            "std::atomic<int> hits{0};\nhits.fetch_add(1, std::memory_order_relaxed);\n\
             hits++;\n--hits;\nhits += 5;\nint v = hits.load();",
        );
        assert_eq!(info.atomics.len(), 1);
        let atomic = &info.atomics[0];
        assert_eq!(atomic.name, "hits");
        assert_eq!(atomic.value_type, "int");
        assert_eq!(atomic.initial.as_deref(), Some("0"));
        let kinds: Vec<_> = atomic.operations.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AtomicOpKind::FetchAdd,
                AtomicOpKind::Increment,
                AtomicOpKind::Decrement,
                AtomicOpKind::AddAssign,
                AtomicOpKind::Load,
            ]
        );
        assert_eq!(
            atomic.operations[0].argument.as_deref(),
            Some("1, std::memory_order_relaxed")
        );
        assert_eq!(atomic.operations[3].argument.as_deref(), Some("5"));
        assert_eq!(atomic.operations[4].argument, None);
    }

    #[test]
    fn atomic_with_assignment_initializer() {
        let info = scanned("std::atomic<bool> done = false; done.store(true);");
        assert_eq!(info.atomics[0].value_type, "bool");
        assert_eq!(info.atomics[0].initial.as_deref(), Some("false"));
        assert_eq!(info.atomics[0].operations[0].kind, AtomicOpKind::Store);
    }

    #[test]
    fn counter_class_guards_count() {
        let class = class(
            "class Counter {\n\
               std::mutex mtx;\n\
               int count = 0;\n\
               std::string label;\n\
             public:\n\
               void inc() { std::lock_guard<std::mutex> lock(mtx); ++count; }\n\
               void rename(const std::string& s) { label = s; }\n\
             };",
        );
        let inc = class.method("inc").unwrap();
        assert_eq!(inc.threading.locks[0].kind, LockKind::LockGuard);
        assert_eq!(inc.threading.locks[0].scope, "++count;");
        assert_eq!(class.threading.mutexes.len(), 1);
        assert_eq!(class.threading.mutexes[0].guarded_fields, vec!["count"]);
        assert_eq!(
            class.threading.guard_of("count").map(|m| m.name.as_str()),
            Some("mtx")
        );
        assert!(class.threading.guard_of("label").is_none());
    }

    #[test]
    fn queue_class_condvar_and_guards() {
        let class = class(
            "class Queue {\n\
               std::mutex m;\n\
               std::condition_variable cv;\n\
               std::deque<int> items;\n\
             public:\n\
               void push(int v) {\n\
                 { std::lock_guard<std::mutex> g(m); items.push_back(v); }\n\
                 cv.notify_one();\n\
               }\n\
               int pop() {\n\
                 std::unique_lock<std::mutex> lk(m);\n\
                 cv.wait(lk, [this] { return !items.empty(); });\n\
                 int v = items.front();\n\
                 items.pop_front();\n\
                 return v;\n\
               }\n\
             };",
        );
        let push = class.method("push").unwrap();
        assert_eq!(push.threading.locks[0].scope, "items.push_back(v);");
        let threading = &class.threading;
        assert_eq!(threading.mutexes[0].guarded_fields, vec!["items"]);
        assert_eq!(threading.condition_variables.len(), 1);
        let ops = &threading.condition_variables[0].operations;
        assert_eq!(ops[0].kind, CondVarOpKind::NotifyOne);
        assert_eq!(ops[1].kind, CondVarOpKind::Wait);
        assert_eq!(ops[1].lock.as_deref(), Some("lk"));
        assert_eq!(
            ops[1].predicate.as_deref(),
            Some("[this] { return !items.empty(); }")
        );
    }

    #[test]
    fn wait_for_predicate_position() {
        let params = vec![Parameter::new("cv", resolve_type("std::condition_variable&"))];
        let info = scanned_with(
            "cv.wait_for(lk, std::chrono::milliseconds(10));\n\
             cv.wait_for(lk, std::chrono::milliseconds(10), [&] { return ready; });",
            params,
        );
        let ops = &info.condition_variables[0].operations;
        assert_eq!(ops[0].predicate, None);
        assert_eq!(ops[1].predicate.as_deref(), Some("[&] { return ready; }"));
    }

    #[test]
    fn atomic_fields_aggregate_across_methods() {
        let class = class(
            "struct Stats {\n\
               std::atomic<long> total{0};\n\
               void add(long n) { total.fetch_add(n); }\n\
               long get() const { return this->total.load(); }\n\
               void bump() { ++this->total; }\n\
             };",
        );
        let atomic = &class.threading.atomics[0];
        assert_eq!(atomic.name, "total");
        assert_eq!(atomic.value_type, "long");
        let kinds: Vec<_> = atomic.operations.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![AtomicOpKind::FetchAdd, AtomicOpKind::Load, AtomicOpKind::Increment]
        );
    }

    #[test]
    fn plain_function_has_no_threading() {
        let info = scanned("int x = a + b; return x;");
        assert!(info.is_empty());
    }
}
