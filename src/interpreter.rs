use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ast::{AwaitTarget, Callee, Case, Expr, Pattern, Stmt};
use crate::builtins::BUILTINS;
use crate::errors::{EvalError, Result};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::value::{self, Callable, Value};

pub type Scope = BTreeMap<String, Value>;

/// Outcome of evaluating a node: a concrete value, a suspended computation
/// enrolled with the scheduler, or the `Return` sentinel that unwinds the
/// enclosing routine or async block. The sentinel carries the unevaluated
/// expression; the enclosing body evaluates it in its own environment.
#[derive(Debug)]
pub enum Flow {
    Value(Value),
    Pending(TaskHandle),
    Return(Expr),
}

/// A named routine registered in the sync or async table.
#[derive(Debug, Clone)]
pub struct RoutineDef {
    pub name: String,
    pub params: Vec<Pattern>,
    pub body: Arc<Vec<Stmt>>,
}

enum ConsoleSink {
    Stdout,
    Gather(Vec<String>),
}

/// Line-oriented program output. Shared across task threads so prints and
/// task diagnostics land in one place, and swappable to a gathering buffer
/// for tests.
#[derive(Clone)]
pub(crate) struct Console(Arc<Mutex<ConsoleSink>>);

impl Console {
    fn stdout() -> Self {
        Console(Arc::new(Mutex::new(ConsoleSink::Stdout)))
    }

    pub(crate) fn line(&self, msg: String) {
        match &mut *self.0.lock() {
            ConsoleSink::Stdout => println!("{msg}"),
            ConsoleSink::Gather(lines) => lines.push(msg),
        }
    }

    fn set_gather(&self, enable: bool) {
        let mut sink = self.0.lock();
        *sink = if enable {
            ConsoleSink::Gather(Vec::new())
        } else {
            ConsoleSink::Stdout
        };
    }

    fn take(&self) -> Vec<String> {
        match &mut *self.0.lock() {
            ConsoleSink::Gather(lines) => core::mem::take(lines),
            ConsoleSink::Stdout => Vec::new(),
        }
    }
}

/// Tree-walking evaluator for the task language.
///
/// Owns the lexical environment, the sync/async routine tables and a handle
/// to the shared scheduler. Lifecycle: create, run a program root, drain
/// outstanding tasks, drop.
pub struct Interpreter {
    pub(crate) env: Scope,
    pub(crate) routines: BTreeMap<String, Arc<RoutineDef>>,
    pub(crate) async_routines: BTreeMap<String, Arc<RoutineDef>>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) console: Console,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(Scheduler::new()))
    }

    pub fn with_scheduler(scheduler: Arc<Scheduler>) -> Self {
        let mut env = Scope::new();
        for (name, fcn) in BUILTINS.iter() {
            env.insert(
                (*name).to_string(),
                Value::Callable(Arc::new(Callable::Builtin(*name, *fcn))),
            );
        }
        Interpreter {
            env,
            routines: BTreeMap::new(),
            async_routines: BTreeMap::new(),
            scheduler,
            console: Console::stdout(),
        }
    }

    /// Clone of this interpreter for a task body: environment and routine
    /// tables as they exist at the moment of enrolment, scheduler and output
    /// sink shared.
    pub(crate) fn fork(&self) -> Interpreter {
        Interpreter {
            env: self.env.clone(),
            routines: self.routines.clone(),
            async_routines: self.async_routines.clone(),
            scheduler: self.scheduler.clone(),
            console: self.console.clone(),
        }
    }

    /// Run a program root to completion and return once the scheduler is
    /// idle.
    pub fn run(&mut self, program: &Stmt) -> Result<()> {
        match self.eval_stmt(program)? {
            Flow::Pending(handle) => {
                handle.join()?;
            }
            Flow::Value(_) | Flow::Return(_) => {}
        }
        self.scheduler.drain();
        Ok(())
    }

    /// Capture `Print` output and diagnostics instead of writing to stdout.
    pub fn set_gather_prints(&mut self, enable: bool) {
        self.console.set_gather(enable);
    }

    pub fn take_prints(&mut self) -> Vec<String> {
        self.console.take()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.env.get(name)
    }

    /// Offload a synchronous callable to the worker pool and wait for it.
    pub fn run_fiber(&mut self, callable: Value, args: Vec<Value>) -> Result<Value> {
        let callable = callable.as_callable()?.clone();
        let mut runner = self.fork();
        let handle = self.scheduler.offload(move || {
            match runner.call_callable(&callable, args)? {
                Flow::Value(v) => Ok(v),
                Flow::Pending(h) => h.join(),
                Flow::Return(_) => Ok(Value::Null),
            }
        });
        handle.join()
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Program { body } | Stmt::Main { body } | Stmt::Prog { body, .. } => {
                self.run_block(body)?;
                Ok(Flow::Value(Value::Null))
            }

            Stmt::Task {
                intention,
                tool,
                logic,
            } => {
                self.console
                    .line(format!("[Task: {}] Tool={}", intention.name, tool.name));
                self.run_block(&logic.body)?;
                Ok(Flow::Value(Value::Null))
            }

            Stmt::Declaration { target, expr } => {
                let value = self.eval_value(expr)?;
                self.bind_declare(target, &value)?;
                Ok(Flow::Value(value))
            }

            Stmt::Assignment { target, expr } => {
                let value = self.eval_value(expr)?;
                self.bind_assign(target, &value)?;
                Ok(Flow::Value(value))
            }

            Stmt::Print { expr } => {
                let value = self.eval_value(expr)?;
                let line = match &value {
                    // Top-level strings print bare, everything else as JSON.
                    Value::String(s) => s.to_string(),
                    other => other.to_string(),
                };
                self.console.line(line);
                Ok(Flow::Value(Value::Null))
            }

            Stmt::Return { expr } => Ok(Flow::Return(expr.clone())),

            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval_value(condition)?.truthy() {
                    self.exec_nested(then_body)
                } else if let Some(body) = else_body {
                    self.exec_nested(body)
                } else {
                    Ok(Flow::Value(Value::Null))
                }
            }

            Stmt::Loop {
                var,
                start,
                end,
                body,
            } => {
                let start = self.eval_value(start)?.as_int()?;
                let end = self.eval_value(end)?.as_int()?;
                for i in start..end {
                    self.env.insert(var.clone(), Value::Int(i));
                    if let Flow::Return(expr) = self.exec_nested(body)? {
                        return Ok(Flow::Return(expr));
                    }
                }
                Ok(Flow::Value(Value::Null))
            }

            Stmt::TryCatch {
                try_body,
                catch_body,
            } => match self.exec_nested(try_body) {
                Ok(flow) => Ok(flow),
                Err(err) => {
                    self.console.line(format!("[Caught Exception: {err}]"));
                    self.exec_nested(catch_body)
                }
            },

            Stmt::Async { name, body } => {
                let handle = self.spawn_block(name.clone(), body.clone());
                Ok(Flow::Pending(handle))
            }

            Stmt::Await(target) => Ok(Flow::Value(self.await_target(target)?)),

            Stmt::Routine { name, params, body } => {
                self.routines.insert(
                    name.clone(),
                    Arc::new(RoutineDef {
                        name: name.clone(),
                        params: params.clone(),
                        body: body.clone(),
                    }),
                );
                Ok(Flow::Value(Value::Null))
            }

            Stmt::AsyncRoutine { name, params, body } => {
                self.async_routines.insert(
                    name.clone(),
                    Arc::new(RoutineDef {
                        name: name.clone(),
                        params: params.clone(),
                        body: body.clone(),
                    }),
                );
                Ok(Flow::Value(Value::Null))
            }

            Stmt::Call { callee, args } => self.eval_call(callee, args),

            Stmt::Match { expr, cases } => self.eval_match(expr, cases),
        }
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Flow> {
        match expr {
            Expr::Literal(value) => Ok(Flow::Value(value.clone())),

            Expr::Identifier(name) => match self.env.get(name) {
                Some(value) => Ok(Flow::Value(value.clone())),
                None => Err(EvalError::UndefinedVariable(name.clone())),
            },

            Expr::BinaryOp { op, left, right } => {
                let left = self.eval_value(left)?;
                let right = self.eval_value(right)?;
                Ok(Flow::Value(value::binary(*op, &left, &right)?))
            }

            Expr::UnaryOp { op, operand } => {
                let operand = self.eval_value(operand)?;
                Ok(Flow::Value(value::unary(*op, &operand)?))
            }

            Expr::AsyncLambda { params, body } => {
                // Closures capture the environment at definition site.
                Ok(Flow::Value(Value::Callable(Arc::new(Callable::Closure {
                    params: params.clone(),
                    body: body.clone(),
                    env: self.env.clone(),
                    is_async: true,
                }))))
            }

            Expr::Call { callee, args } => self.eval_call(callee, args),

            Expr::Await(target) => Ok(Flow::Value(self.await_target(target)?)),
        }
    }

    /// Evaluate an expression to a concrete value, awaiting any suspension
    /// inline.
    pub(crate) fn eval_value(&mut self, expr: &Expr) -> Result<Value> {
        match self.eval_expr(expr)? {
            Flow::Value(value) => Ok(value),
            Flow::Pending(handle) => handle.join(),
            Flow::Return(_) => unreachable!("expressions cannot produce a Return sentinel"),
        }
    }

    /// Run a root block: statements in source order, suspensions enrolled as
    /// encountered and joined before the block returns.
    fn run_block(&mut self, body: &[Stmt]) -> Result<()> {
        let mut pending: Vec<TaskHandle> = Vec::new();
        for stmt in body {
            if let Flow::Pending(handle) = self.eval_stmt(stmt)? {
                pending.push(handle);
            }
        }
        // Completion barrier only: a failure in an un-awaited task surfaces
        // at its await site, not here.
        for handle in pending {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Run a nested body (if arm, loop body, try/catch arm, match case).
    /// Suspensions are joined at their source position and `Return` unwinds
    /// to the enclosing routine or async block.
    pub(crate) fn exec_nested(&mut self, body: &[Stmt]) -> Result<Flow> {
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Flow::Return(expr) => return Ok(Flow::Return(expr)),
                Flow::Pending(handle) => {
                    let _ = handle.join();
                }
                Flow::Value(_) => {}
            }
        }
        Ok(Flow::Value(Value::Null))
    }

    fn spawn_block(&mut self, name: Option<String>, body: Arc<Vec<Stmt>>) -> TaskHandle {
        let name = name.unwrap_or_else(|| self.scheduler.synthesize_name());
        let mut task = self.fork();
        let task_name = name.clone();
        self.scheduler
            .enroll(name, move || task.run_async_block(&task_name, &body))
    }

    /// Body of an enrolled async block. The result is the first `Return`'s
    /// expression if one is reached, otherwise the value of the last
    /// statement.
    fn run_async_block(&mut self, name: &str, body: &[Stmt]) -> Result<Value> {
        self.console.line(format!("[Async {name} Start]"));
        let mut result = Value::Null;
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Flow::Return(expr) => {
                    result = self.eval_value(&expr)?;
                    break;
                }
                Flow::Pending(handle) => result = handle.join().unwrap_or(Value::Null),
                Flow::Value(value) => result = value,
            }
        }
        self.console.line(format!("[Async {name} End]"));
        Ok(result)
    }

    fn await_target(&mut self, target: &AwaitTarget) -> Result<Value> {
        match target {
            AwaitTarget::Task(name) => match self.scheduler.lookup(name) {
                None => {
                    self.console.line(format!("[Await {name}] (no such task)"));
                    Ok(Value::Null)
                }
                Some(handle) => {
                    self.console.line(format!("[Await {name}] waiting..."));
                    let result = handle.join()?;
                    self.console
                        .line(format!("[Await {name}] complete with value: {result}"));
                    Ok(result)
                }
            },
            AwaitTarget::Join(items) => {
                // Results mirror the nesting and keep the given order
                // regardless of completion order.
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(self.await_target(item)?);
                }
                Ok(Value::from_seq(results))
            }
        }
    }

    fn eval_call(&mut self, callee: &Callee, args: &[Expr]) -> Result<Flow> {
        enum Resolved {
            Async(Arc<RoutineDef>),
            Sync(Arc<RoutineDef>),
            Value(Arc<Callable>),
        }

        // Resolution order: async routines, sync routines, then the
        // environment for first-class callables and builtins.
        let resolved = match callee {
            Callee::Name(name) => {
                if let Some(routine) = self.async_routines.get(name) {
                    Resolved::Async(routine.clone())
                } else if let Some(routine) = self.routines.get(name) {
                    Resolved::Sync(routine.clone())
                } else if let Some(value) = self.env.get(name) {
                    Resolved::Value(value.as_callable()?.clone())
                } else {
                    return Err(EvalError::UndefinedFunction(name.clone()));
                }
            }
            Callee::Expr(expr) => {
                let value = self.eval_value(expr)?;
                Resolved::Value(value.as_callable()?.clone())
            }
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_value(arg)?);
        }

        match resolved {
            Resolved::Async(routine) => Ok(Flow::Pending(self.spawn_routine(routine, values))),
            Resolved::Sync(routine) => Ok(Flow::Value(self.call_routine(&routine, values)?)),
            Resolved::Value(callable) => self.call_callable(&callable, values),
        }
    }

    fn call_routine(&mut self, routine: &RoutineDef, args: Vec<Value>) -> Result<Value> {
        let snapshot = self.env.clone();
        let outcome = match self.bind_params(&routine.params, args) {
            Ok(()) => self.routine_body_result(&routine.body),
            Err(err) => Err(err),
        };
        self.env = snapshot;
        outcome
    }

    fn spawn_routine(&mut self, routine: Arc<RoutineDef>, args: Vec<Value>) -> TaskHandle {
        let name = self.scheduler.synthesize_name();
        let mut task = self.fork();
        self.scheduler.enroll(name, move || {
            task.bind_params(&routine.params, args)?;
            task.routine_body_result(&routine.body)
        })
    }

    /// A call's result is the first `Return` sentinel's expression evaluated
    /// in the call environment; a body without `Return` yields `null`.
    pub(crate) fn routine_body_result(&mut self, body: &[Stmt]) -> Result<Value> {
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Flow::Return(expr) => return self.eval_value(&expr),
                Flow::Pending(handle) => {
                    let _ = handle.join();
                }
                Flow::Value(_) => {}
            }
        }
        Ok(Value::Null)
    }

    pub(crate) fn call_callable(
        &mut self,
        callable: &Arc<Callable>,
        args: Vec<Value>,
    ) -> Result<Flow> {
        match callable.as_ref() {
            Callable::Builtin(_, fcn) => Ok(Flow::Value(fcn(self, args)?)),

            Callable::Closure {
                params,
                body,
                env,
                is_async,
            } => {
                if *is_async {
                    let name = self.scheduler.synthesize_name();
                    let mut task = self.fork();
                    task.env = env.clone();
                    let params = params.clone();
                    let body = body.clone();
                    Ok(Flow::Pending(self.scheduler.enroll(name, move || {
                        task.bind_params(&params, args)?;
                        task.routine_body_result(&body)
                    })))
                } else {
                    let snapshot = core::mem::replace(&mut self.env, env.clone());
                    let outcome = match self.bind_params(params, args) {
                        Ok(()) => self.routine_body_result(body),
                        Err(err) => Err(err),
                    };
                    self.env = snapshot;
                    Ok(Flow::Value(outcome?))
                }
            }
        }
    }

    fn eval_match(&mut self, expr: &Expr, cases: &[Case]) -> Result<Flow> {
        let value = self.eval_value(expr)?;

        for case in cases {
            let mut staged = Scope::new();
            if self
                .bind_pattern(&case.pattern, Some(&value), &mut staged)
                .is_err()
            {
                // Nothing was committed; try the next case.
                continue;
            }

            let snapshot = self.env.clone();
            let names: Vec<String> = staged.keys().cloned().collect();
            self.env.extend(staged);

            // The guard runs in the environment as extended by the pattern.
            let guard_ok = match &case.guard {
                Some(guard) => match self.eval_value(guard) {
                    Ok(v) => v.truthy(),
                    Err(err) => {
                        self.env = snapshot;
                        return Err(err);
                    }
                },
                None => true,
            };
            if !guard_ok {
                self.env = snapshot;
                continue;
            }

            let flow = self.exec_nested(&case.body);

            // Pattern bindings are scoped to the case body: restore shadowed
            // values and drop fresh ones, keeping other body effects.
            for name in names {
                match snapshot.get(&name) {
                    Some(old) => self.env.insert(name, old.clone()),
                    None => self.env.remove(&name),
                };
            }
            return flow;
        }

        // No case matched.
        Ok(Flow::Value(Value::Null))
    }
}
