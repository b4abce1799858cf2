//! Async analysis: coroutine keywords, futures, promises and `std::async`.

use hybrid_cpp_parser::CppToken;
use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::type_map::normalize;
use hybrid_ir::{
    AsyncInfo, AsyncOpKind, AsyncOperation, AsyncTaskInfo, Function, FutureInfo, LaunchPolicy,
};
use tracing::trace;

use crate::body::Body;
use crate::FeatureAnalyzer;

/// Fills [`AsyncInfo`] from function bodies.
pub struct AsyncAnalyzer;

impl FeatureAnalyzer for AsyncAnalyzer {
    fn name(&self) -> &str {
        "async"
    }

    fn analyze_function(&self, function: &mut Function, _sink: &DiagnosticSink) {
        let mut info = AsyncInfo::default();
        if let Some(text) = function.body.as_deref() {
            let body = Body::new(text);
            let mut promise_types: Vec<(String, String)> = Vec::new();
            for i in 0..body.len() {
                if let Some(kind) = coroutine_keyword(body.kind(i)) {
                    let expression = body.slice(i + 1, body.expression_end(i + 1));
                    info.coroutine.operations.push(AsyncOperation {
                        kind,
                        expression: expression.to_string(),
                    });
                } else if let Some((name, next)) = body.std_name(i, &["future", "shared_future"]) {
                    if let Some(future) = future_declaration(&body, next, name == "shared_future") {
                        info.futures.push(future);
                    }
                } else if let Some((_, next)) = body.std_name(i, &["promise"]) {
                    if let Some((name, value_type)) = typed_declaration(&body, next) {
                        info.promises.push(name.to_string());
                        promise_types.push((name.to_string(), value_type));
                    }
                } else if let Some((_, next)) = body.std_name(i, &["async"]) {
                    if let Some(task) = async_task(&body, i, next) {
                        info.tasks.push(task);
                    }
                } else if let Some((method, _)) = body.member_call(i) {
                    member_call(&body, i, method, &promise_types, &mut info.futures);
                }
            }
            associate_promises(&info.promises, &mut info.futures);
        }
        info.is_async =
            info.coroutine.is_coroutine() || !info.futures.is_empty() || !info.tasks.is_empty();
        if info.is_async {
            trace!(
                function = %function.name,
                coroutine_ops = info.coroutine.operations.len(),
                futures = info.futures.len(),
                tasks = info.tasks.len(),
                "async facts"
            );
        }
        function.async_info = info;
    }
}

fn coroutine_keyword(kind: CppToken) -> Option<AsyncOpKind> {
    match kind {
        CppToken::CoAwait => Some(AsyncOpKind::Await),
        CppToken::CoReturn => Some(AsyncOpKind::Return),
        CppToken::CoYield => Some(AsyncOpKind::Yield),
        _ => None,
    }
}

/// `<T> name` after a template name. Returns the name and normalized `T`.
fn typed_declaration<'a>(body: &Body<'a>, next: usize) -> Option<(&'a str, String)> {
    if body.kind(next) != CppToken::Less {
        return None;
    }
    let after = body.skip_angles(next);
    if after == next || body.kind(after) != CppToken::Identifier {
        return None;
    }
    Some((body.text(after), normalize(body.between(next, after - 1))))
}

/// `std::future<T> f;` or `std::future<T> f = p.get_future();`.
fn future_declaration(body: &Body<'_>, next: usize, is_shared: bool) -> Option<FutureInfo> {
    let (name, value_type) = typed_declaration(body, next)?;
    let after = body.skip_angles(next) + 1;
    let promise = (body.kind(after) == CppToken::Assign)
        .then(|| body.member_call(after + 1))
        .flatten()
        .filter(|(method, _)| *method == "get_future")
        .map(|_| body.text(after + 1).to_string());
    Some(FutureInfo {
        name: name.to_string(),
        value_type,
        is_shared,
        promise,
        get_called: false,
    })
}

/// `receiver.method(...)` calls that matter for futures: `get_future` binds
/// a promise, `get` consumes a future.
fn member_call(
    body: &Body<'_>,
    i: usize,
    method: &str,
    promise_types: &[(String, String)],
    futures: &mut Vec<FutureInfo>,
) {
    let receiver = body.text(i);
    match method {
        "get" => {
            if let Some(future) = futures.iter_mut().find(|f| f.name == receiver) {
                future.get_called = true;
            }
        }
        "get_future" => {
            let Some(promise) = promise_types.iter().find(|(p, _)| p == receiver) else {
                return;
            };
            if i < 2 || body.kind(i - 1) != CppToken::Assign || body.kind(i - 2) != CppToken::Identifier {
                return;
            }
            let target = body.text(i - 2);
            if let Some(future) = futures.iter_mut().find(|f| f.name == target) {
                future.promise = Some(promise.0.clone());
            } else if i >= 3 && body.kind(i - 3) == CppToken::Auto {
                futures.push(FutureInfo {
                    name: target.to_string(),
                    value_type: promise.1.clone(),
                    is_shared: false,
                    promise: Some(promise.0.clone()),
                    get_called: false,
                });
            }
        }
        _ => {}
    }
}

/// Each promise not yet bound by `get_future()` goes to the first future
/// without a promise.
fn associate_promises(promises: &[String], futures: &mut [FutureInfo]) {
    for promise in promises {
        if futures.iter().any(|f| f.promise.as_ref() == Some(promise)) {
            continue;
        }
        if let Some(future) = futures.iter_mut().find(|f| f.promise.is_none()) {
            future.promise = Some(promise.clone());
        }
    }
}

/// `std::async([policy,] callable, args...)`.
fn async_task(body: &Body<'_>, at: usize, next: usize) -> Option<AsyncTaskInfo> {
    let (mut args, close) = body.call_args(next)?;
    if body.kind(next) != CppToken::LeftParen || args.is_empty() {
        return None;
    }
    let policy = launch_policy(&args[0]);
    if policy.is_some() {
        args.remove(0);
    }
    if args.is_empty() {
        return None;
    }
    let callable = args.remove(0);
    let ends_statement = matches!(body.kind(close + 1), CppToken::Semicolon | CppToken::Eof);
    let variable = (ends_statement
        && at >= 2
        && body.kind(at - 1) == CppToken::Assign
        && body.kind(at - 2) == CppToken::Identifier)
        .then(|| body.text(at - 2).to_string());
    let detached = variable.is_none() && ends_statement && body.at_statement_start(at);
    Some(AsyncTaskInfo {
        variable,
        policy: policy.unwrap_or_default(),
        callable,
        args,
        detached,
    })
}

/// `std::launch::async`, `launch::deferred`; a combined policy is
/// unspecified.
fn launch_policy(arg: &str) -> Option<LaunchPolicy> {
    let flags = arg.strip_prefix("std::").unwrap_or(arg).strip_prefix("launch::")?;
    Some(if flags.contains('|') {
        LaunchPolicy::Unspecified
    } else if flags.trim() == "deferred" {
        LaunchPolicy::Deferred
    } else {
        LaunchPolicy::Async
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::Type;

    fn analyzed(body: &str) -> AsyncInfo {
        let mut f = Function::new("f", Type::void());
        f.body = Some(body.to_string());
        AsyncAnalyzer.analyze_function(&mut f, &DiagnosticSink::new());
        f.async_info
    }

    #[test]
    fn coroutine_operations_in_order() {
        let info = analyzed("co_await foo(); co_return result;");
        let ops = &info.coroutine.operations;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind, AsyncOpKind::Await);
        assert_eq!(ops[0].expression, "foo()");
        assert_eq!(ops[1].kind, AsyncOpKind::Return);
        assert_eq!(ops[1].expression, "result");
        assert!(info.is_async);
        assert!(!info.coroutine.is_generator());
    }

    #[test]
    fn generator_and_bare_return() {
        let info = analyzed("for (int i = 0; i < n; ++i) { co_yield i * 2; }\nco_return;");
        let ops = &info.coroutine.operations;
        assert_eq!(ops[0].kind, AsyncOpKind::Yield);
        assert_eq!(ops[0].expression, "i * 2");
        assert_eq!(ops[1].expression, "");
        assert!(info.coroutine.is_generator());
    }

    #[test]
    fn detached_async_launch() {
        let info = analyzed("std::async(std::launch::async, lambda, a);");
        assert_eq!(info.tasks.len(), 1);
        let task = &info.tasks[0];
        assert_eq!(task.policy, LaunchPolicy::Async);
        assert_eq!(task.callable, "lambda");
        assert_eq!(task.args, vec!["a"]);
        assert_eq!(task.variable, None);
        assert!(task.detached);
        assert!(info.is_async);
    }

    #[test]
    fn bound_async_launch() {
        let info = analyzed(
            "auto f = std::async(std::launch::deferred, compute, 1, 2);\n\
             auto g = std::async([] { return 3; });\n\
             auto h = std::async(std::launch::async | std::launch::deferred, work);",
        );
        assert_eq!(info.tasks.len(), 3);
        assert_eq!(info.tasks[0].variable.as_deref(), Some("f"));
        assert_eq!(info.tasks[0].policy, LaunchPolicy::Deferred);
        assert_eq!(info.tasks[0].args, vec!["1", "2"]);
        assert!(!info.tasks[0].detached);
        assert_eq!(info.tasks[1].policy, LaunchPolicy::Unspecified);
        assert_eq!(info.tasks[1].callable, "[] { return 3; }");
        assert_eq!(info.tasks[2].policy, LaunchPolicy::Unspecified);
        assert_eq!(info.tasks[2].callable, "work");
    }

    #[test]
    fn async_result_used_in_expression_is_not_detached() {
        let info = analyzed("int v = std::async(work).get();");
        assert!(!info.tasks[0].detached);
    }

    #[test]
    fn promise_bound_by_get_future() {
        let info = analyzed(
            "std::promise<int> p;\nstd::future<int> f = p.get_future();\n\
             p.set_value(42);\nreturn f.get();",
        );
        assert_eq!(info.promises, vec!["p"]);
        assert_eq!(info.futures.len(), 1);
        let future = &info.futures[0];
        assert_eq!(future.value_type, "int");
        assert_eq!(future.promise.as_deref(), Some("p"));
        assert!(future.get_called);
    }

    #[test]
    fn auto_future_from_promise() {
        let info = analyzed("std::promise<std::string> done;\nauto result = done.get_future();");
        assert_eq!(info.futures.len(), 1);
        assert_eq!(info.futures[0].name, "result");
        assert_eq!(info.futures[0].value_type, "std::string");
        assert_eq!(info.futures[0].promise.as_deref(), Some("done"));
    }

    #[test]
    fn promise_goes_to_first_unbound_future() {
        let info = analyzed(
            "std::shared_future<void> ready;\nstd::future<int> value;\nstd::promise<void> go;",
        );
        assert!(info.futures[0].is_shared);
        assert_eq!(info.futures[0].promise.as_deref(), Some("go"));
        assert_eq!(info.futures[1].promise, None);
        assert!(!info.futures[1].get_called);
    }

    #[test]
    fn synchronous_function_is_not_async() {
        let info = analyzed("int total = 0; for (auto x : xs) total += x; return total;");
        assert!(!info.is_async);
        assert!(info.promises.is_empty());
    }
}
