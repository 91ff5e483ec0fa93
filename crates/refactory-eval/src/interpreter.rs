//! Tree-walking interpreter for one [`FunctionDef`].
//!
//! Every run gets a fresh [`Machine`] (step meter, captured output), so runs
//! share no state and nothing escapes to the host process.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use refactory_ast::walk::{Visitor, target_names, walk_stmt};
use refactory_ast::*;

use crate::budget::{ExecutionBudget, MAX_NESTING, Meter};
use crate::builtins::{self, Method};
use crate::error::ExecutionError;
use crate::exception::{Exception, ExceptionKind};
use crate::ops;
use crate::value::{Value, ValueIter};

/// Why evaluation stopped early: a Python exception, or the sandbox halting
/// the run.
#[derive(Debug)]
pub enum Unwind {
    Raise(Exception),
    Halt(ExecutionError),
}

impl From<Exception> for Unwind {
    fn from(exception: Exception) -> Self {
        Unwind::Raise(exception)
    }
}

impl From<ExecutionError> for Unwind {
    fn from(error: ExecutionError) -> Self {
        Unwind::Halt(error)
    }
}

pub type Eval<T> = Result<T, Unwind>;

pub(crate) fn raise<T>(kind: ExceptionKind, message: impl Into<String>) -> Eval<T> {
    Err(Unwind::Raise(Exception::new(kind, message)))
}

/// Per-run resources shared by the evaluator and the builtins.
pub struct Machine {
    budget: ExecutionBudget,
    meter: Meter,
    output: String,
}

impl Machine {
    pub fn new(budget: ExecutionBudget) -> Self {
        Self::until(budget, None)
    }

    /// A machine that also halts at `deadline`.
    pub fn until(budget: ExecutionBudget, deadline: Option<Instant>) -> Self {
        Self {
            meter: Meter::start_until(&budget, deadline),
            budget,
            output: String::new(),
        }
    }

    pub fn tick(&mut self, cost: u64) -> Eval<()> {
        Ok(self.meter.tick(cost)?)
    }

    /// Fails when a sequence of `len` items would exceed the budget.
    pub fn check_len(&self, len: usize) -> Eval<()> {
        let limit = self.budget.max_sequence_len;
        if len > limit {
            return Err(Unwind::Halt(ExecutionError::ResourceExhausted {
                resource: "sequence length",
                limit,
            }));
        }
        Ok(())
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn write_output(&mut self, text: &str) -> Eval<()> {
        let limit = self.budget.max_output_bytes;
        if self.output.len() + text.len() > limit {
            return Err(Unwind::Halt(ExecutionError::ResourceExhausted {
                resource: "output bytes",
                limit,
            }));
        }
        self.output.push_str(text);
        Ok(())
    }

    /// Drains an iterable into a vector, charging one step per item.
    pub fn collect(&mut self, iterable: &Value) -> Eval<Vec<Value>> {
        let iter = ValueIter::new(iterable)?;
        self.check_len(iter.size_hint())?;
        let mut items = Vec::with_capacity(iter.size_hint());
        for item in iter {
            self.tick(1)?;
            items.push(item);
            self.check_len(items.len())?;
        }
        Ok(items)
    }
}

/// What a finished call produced.
#[derive(Clone, Debug)]
pub enum Outcome {
    Returned(Value),
    Raised(Exception),
}

impl Outcome {
    /// Short human-readable form, e.g. `returned 6` or `raised IndexError`.
    pub fn summary(&self) -> String {
        match self {
            Outcome::Returned(value) => format!("returned {}", value.repr()),
            Outcome::Raised(exception) => format!("raised {exception}"),
        }
    }
}

/// A completed run.
#[derive(Debug)]
pub struct Execution {
    pub outcome: Outcome,
    pub stdout: String,
    pub steps: u64,
    pub elapsed: Duration,
}

/// Calls `function` with `args` inside a fresh sandbox.
///
/// Python exceptions are part of the [`Outcome`]; only exhausting the budget
/// is an error.
pub fn run(
    function: &FunctionDef,
    args: Vec<Value>,
    budget: &ExecutionBudget,
) -> Result<Execution, ExecutionError> {
    run_until(function, args, budget, None)
}

/// [`run`] with an extra deadline shared by several runs. The run halts at
/// whichever comes first, `deadline` or its own `timeout_ms`.
pub fn run_until(
    function: &FunctionDef,
    args: Vec<Value>,
    budget: &ExecutionBudget,
    deadline: Option<Instant>,
) -> Result<Execution, ExecutionError> {
    let mut interpreter = Interpreter::new(function, Machine::until(budget.clone(), deadline));
    let outcome = match interpreter.call(args) {
        Ok(value) => Outcome::Returned(value),
        Err(Unwind::Raise(exception)) => Outcome::Raised(exception),
        Err(Unwind::Halt(error)) => {
            tracing::debug!(function = %function.name, %error, "run halted");
            return Err(error);
        }
    };
    let machine = interpreter.machine;
    tracing::trace!(
        function = %function.name,
        steps = machine.meter.steps(),
        outcome = %outcome.summary(),
        "run finished"
    );
    Ok(Execution {
        outcome,
        steps: machine.meter.steps(),
        elapsed: machine.meter.elapsed(),
        stdout: machine.output,
    })
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame<'f> {
    vars: HashMap<&'f str, Value>,
    /// Comprehension scopes, innermost last.
    scopes: Vec<HashMap<&'f str, Value>>,
}

/// Names a function binds through statements; comprehension targets are
/// scoped to their comprehension and excluded.
fn local_names(function: &FunctionDef) -> HashSet<&str> {
    struct Locals<'f>(HashSet<&'f str>);

    impl<'f> Visitor<'f> for Locals<'f> {
        fn visit_stmt(&mut self, stmt: &'f Stmt) {
            let mut names = Vec::new();
            match &stmt.kind {
                StmtKind::Assign { target, .. }
                | StmtKind::AugAssign { target, .. }
                | StmtKind::For { target, .. } => target_names(target, &mut names),
                _ => {}
            }
            self.0.extend(names);
            walk_stmt(self, stmt);
        }

        fn visit_expr(&mut self, _: &'f Expr) {}
    }

    let mut locals = Locals(function.params.iter().map(|p| p.name.as_str()).collect());
    for stmt in &function.body {
        locals.visit_stmt(stmt);
    }
    locals.0
}

pub struct Interpreter<'f> {
    function: &'f FunctionDef,
    locals: HashSet<&'f str>,
    self_ref: Rc<str>,
    machine: Machine,
    depth: usize,
    nesting: usize,
}

impl<'f> Interpreter<'f> {
    pub fn new(function: &'f FunctionDef, machine: Machine) -> Self {
        Self {
            function,
            locals: local_names(function),
            self_ref: Rc::from(function.name.as_str()),
            machine,
            depth: 0,
            nesting: 0,
        }
    }

    pub fn call(&mut self, args: Vec<Value>) -> Eval<Value> {
        let function = self.function;
        if args.len() != function.params.len() {
            let expected = function.params.len();
            return raise(
                ExceptionKind::TypeError,
                format!(
                    "{}() takes {expected} positional argument{} but {} were given",
                    function.name,
                    if expected == 1 { "" } else { "s" },
                    args.len()
                ),
            );
        }
        if self.depth >= self.machine.budget.call_depth_limit() {
            return raise(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            );
        }

        let mut frame = Frame {
            vars: function
                .params
                .iter()
                .map(|param| param.name.as_str())
                .zip(args)
                .collect(),
            scopes: Vec::new(),
        };
        self.depth += 1;
        let flow = self.exec_block(&mut frame, &function.body);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    fn exec_block(&mut self, frame: &mut Frame<'f>, body: &'f [Stmt]) -> Eval<Flow> {
        for stmt in body {
            match self.exec_stmt(frame, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `step` one level deeper, raising `RecursionError` past
    /// [`MAX_NESTING`].
    fn nested<T>(&mut self, step: impl FnOnce(&mut Self) -> Eval<T>) -> Eval<T> {
        if self.nesting >= MAX_NESTING {
            return raise(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            );
        }
        self.nesting += 1;
        let result = step(self);
        self.nesting -= 1;
        result
    }

    fn exec_stmt(&mut self, frame: &mut Frame<'f>, stmt: &'f Stmt) -> Eval<Flow> {
        self.nested(|this| this.exec_stmt_kind(frame, stmt))
    }

    fn exec_stmt_kind(&mut self, frame: &mut Frame<'f>, stmt: &'f Stmt) -> Eval<Flow> {
        self.machine.tick(1)?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, target, value)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(frame, target, *op, value)?;
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(frame, iter)?;
                for item in ValueIter::new(&iterable)? {
                    self.machine.tick(1)?;
                    self.assign(frame, target, item)?;
                    match self.exec_block(frame, body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval(frame, condition)?.truthy() {
                    match self.exec_block(frame, body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::If {
                condition,
                body,
                orelse,
            } => {
                let branch = if self.eval(frame, condition)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(frame, branch);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(frame, value)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Raise(Some(value)) => {
                let exception = match self.eval(frame, value)? {
                    Value::ExceptionClass(kind) => Exception::new(kind, ""),
                    Value::Exception(exception) => (*exception).clone(),
                    _ => {
                        return raise(
                            ExceptionKind::TypeError,
                            "exceptions must derive from BaseException",
                        );
                    }
                };
                return Err(Unwind::Raise(exception));
            }
            StmtKind::Raise(None) => {
                return raise(ExceptionKind::RuntimeError, "No active exception to reraise");
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn bind(&mut self, frame: &mut Frame<'f>, name: &'f str, value: Value) {
        match frame.scopes.last_mut() {
            Some(scope) => scope.insert(name, value),
            None => frame.vars.insert(name, value),
        };
    }

    fn assign(&mut self, frame: &mut Frame<'f>, target: &'f Expr, value: Value) -> Eval<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.bind(frame, name, value);
                Ok(())
            }
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                let items = self.machine.collect(&value)?;
                if items.len() != targets.len() {
                    let message = if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    };
                    return raise(ExceptionKind::ValueError, message);
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(frame, target, item)?;
                }
                Ok(())
            }
            ExprKind::Subscript { value: container, index } => {
                let container = self.eval(frame, container)?;
                let index = self.eval(frame, index)?;
                ops::set_item(&container, &index, value)
            }
            ExprKind::Attribute { value: owner, attr } => {
                let owner = self.eval(frame, owner)?;
                raise(
                    ExceptionKind::AttributeError,
                    format!(
                        "'{}' object attribute '{attr}' is read-only",
                        owner.type_name()
                    ),
                )
            }
            _ => raise(ExceptionKind::TypeError, "cannot assign to expression"),
        }
    }

    fn aug_assign(
        &mut self,
        frame: &mut Frame<'f>,
        target: &'f Expr,
        op: BinaryOperator,
        value: &'f Expr,
    ) -> Eval<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                let current = self.lookup(frame, name)?;
                let operand = self.eval(frame, value)?;
                let result = self.in_place(op, current, &operand)?;
                self.bind(frame, name, result);
                Ok(())
            }
            ExprKind::Subscript {
                value: container,
                index,
            } => {
                let container = self.eval(frame, container)?;
                let index = self.eval(frame, index)?;
                let current = ops::get_item(&container, &index)?;
                let operand = self.eval(frame, value)?;
                let result = self.in_place(op, current, &operand)?;
                ops::set_item(&container, &index, result)
            }
            _ => self.assign(frame, target, Value::None),
        }
    }

    /// `x op= y`: lists extend in place, everything else rebinds.
    fn in_place(&mut self, op: BinaryOperator, current: Value, operand: &Value) -> Eval<Value> {
        if let (BinaryOperator::Add, Value::List(items)) = (op, &current) {
            let extra = self.machine.collect(operand)?;
            let len = items.borrow().len() + extra.len();
            self.machine.check_len(len)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        ops::binary(&mut self.machine, op, &current, operand)
    }

    fn lookup(&self, frame: &Frame<'f>, name: &str) -> Eval<Value> {
        for scope in frame.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = frame.vars.get(name) {
            return Ok(value.clone());
        }
        if self.locals.contains(name) {
            return raise(
                ExceptionKind::UnboundLocalError,
                format!("cannot access local variable '{name}' where it is not associated with a value"),
            );
        }
        if name == &*self.self_ref {
            return Ok(Value::Function(Rc::clone(&self.self_ref)));
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Ok(builtin);
        }
        if let Some(kind) = ExceptionKind::from_name(name) {
            return Ok(Value::ExceptionClass(kind));
        }
        raise(ExceptionKind::NameError, format!("name '{name}' is not defined"))
    }

    fn eval(&mut self, frame: &mut Frame<'f>, expr: &'f Expr) -> Eval<Value> {
        self.nested(|this| this.eval_kind(frame, expr))
    }

    fn eval_kind(&mut self, frame: &mut Frame<'f>, expr: &'f Expr) -> Eval<Value> {
        self.machine.tick(1)?;
        Ok(match &expr.kind {
            ExprKind::Name(name) => self.lookup(frame, name)?,
            ExprKind::Constant(constant) => match constant {
                Constant::None => Value::None,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(n) => Value::Int(*n),
                Constant::Float(x) => Value::Float(*x),
                Constant::Str(s) => Value::str(s),
            },
            ExprKind::List(items) => Value::list(self.eval_all(frame, items)?),
            ExprKind::Tuple(items) => Value::tuple(self.eval_all(frame, items)?),
            ExprKind::BinaryOp { left, op, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                ops::binary(&mut self.machine, *op, &left, &right)?
            }
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.eval(frame, operand)?;
                ops::unary(*op, &operand)?
            }
            ExprKind::BoolOp { left, op, right } => {
                let left = self.eval(frame, left)?;
                match (op, left.truthy()) {
                    (BoolOperator::And, false) | (BoolOperator::Or, true) => left,
                    _ => self.eval(frame, right)?,
                }
            }
            ExprKind::Compare { left, comparisons } => {
                let mut left = self.eval(frame, left)?;
                for (op, right) in comparisons {
                    let right = self.eval(frame, right)?;
                    if !ops::compare(&mut self.machine, *op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Value::Bool(true)
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(frame, func)?;
                let args = self.eval_all(frame, args)?;
                self.call_value(callee, args)?
            }
            ExprKind::Attribute { value, attr } => {
                let receiver = self.eval(frame, value)?;
                match Method::lookup(&receiver, attr) {
                    Some(method) => Value::Method(Box::new(receiver), method),
                    None => {
                        return raise(
                            ExceptionKind::AttributeError,
                            format!(
                                "'{}' object has no attribute '{attr}'",
                                receiver.type_name()
                            ),
                        );
                    }
                }
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(frame, value)?;
                if let ExprKind::Slice { lower, upper, step } = &index.kind {
                    let mut bound = |part: &'f Option<Box<Expr>>| -> Eval<Option<Value>> {
                        part.as_deref().map(|e| self.eval(frame, e)).transpose()
                    };
                    let (lower, upper, step) = (bound(lower)?, bound(upper)?, bound(step)?);
                    ops::slice(&mut self.machine, &container, lower, upper, step)?
                } else {
                    let index = self.eval(frame, index)?;
                    ops::get_item(&container, &index)?
                }
            }
            ExprKind::Slice { .. } => {
                return raise(ExceptionKind::TypeError, "slice outside a subscript");
            }
            ExprKind::ListComp {
                element,
                target,
                iter,
                conditions,
            } => {
                let iterable = self.eval(frame, iter)?;
                frame.scopes.push(HashMap::new());
                let items = self.comprehension(frame, element, target, &iterable, conditions);
                frame.scopes.pop();
                Value::list(items?)
            }
            ExprKind::IfExp {
                body,
                condition,
                orelse,
            } => {
                if self.eval(frame, condition)?.truthy() {
                    self.eval(frame, body)?
                } else {
                    self.eval(frame, orelse)?
                }
            }
        })
    }

    fn eval_all(&mut self, frame: &mut Frame<'f>, exprs: &'f [Expr]) -> Eval<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(frame, expr)).collect()
    }

    fn comprehension(
        &mut self,
        frame: &mut Frame<'f>,
        element: &'f Expr,
        target: &'f Expr,
        iterable: &Value,
        conditions: &'f [Expr],
    ) -> Eval<Vec<Value>> {
        let mut items = Vec::new();
        'items: for item in ValueIter::new(iterable)? {
            self.machine.tick(1)?;
            self.assign(frame, target, item)?;
            for condition in conditions {
                if !self.eval(frame, condition)?.truthy() {
                    continue 'items;
                }
            }
            items.push(self.eval(frame, element)?);
            self.machine.check_len(items.len())?;
        }
        Ok(items)
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Eval<Value> {
        match callee {
            Value::BuiltinFn(_, f) => f(&mut self.machine, args),
            Value::Method(receiver, method) => {
                builtins::call_method(&mut self.machine, &receiver, method, args)
            }
            Value::Function(_) => self.call(args),
            Value::ExceptionClass(kind) => {
                let message = match args.as_slice() {
                    [] => String::new(),
                    [arg] => arg.to_str(),
                    _ => Value::tuple(args).repr(),
                };
                Ok(Value::Exception(Rc::new(Exception::new(kind, message))))
            }
            other => raise(
                ExceptionKind::TypeError,
                format!("'{}' object is not callable", other.type_name()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use refactory_ast::parse_function;

    use super::*;

    fn run_source(source: &str, args: Vec<Value>) -> Result<Execution, ExecutionError> {
        let tree = parse_function(source).unwrap();
        run(&tree.function, args, &ExecutionBudget::default())
    }

    fn returned(source: &str, args: Vec<Value>) -> Value {
        match run_source(source, args).unwrap().outcome {
            Outcome::Returned(value) => value,
            Outcome::Raised(exception) => panic!("unexpected {exception}"),
        }
    }

    fn raised(source: &str, args: Vec<Value>) -> ExceptionKind {
        match run_source(source, args).unwrap().outcome {
            Outcome::Raised(exception) => exception.kind,
            Outcome::Returned(value) => panic!("unexpected return of {}", value.repr()),
        }
    }

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|&n| Value::Int(n)).collect())
    }

    const SUM_LIST: &str = "def sum_list(lst):\n    total = 0\n    for x in lst:\n        total += x\n    return total\n";
    const MAX_LIST: &str = "def max_list(lst):\n    current_max = lst[0]\n    for x in lst:\n        if x > current_max:\n            current_max = x\n    return current_max\n";

    #[test]
    fn test_accumulator_loop() {
        assert_eq!(returned(SUM_LIST, vec![ints(&[1, 2, 3])]).repr(), "6");
        assert_eq!(returned(SUM_LIST, vec![ints(&[])]).repr(), "0");
    }

    #[test]
    fn test_max_loop_and_empty_input() {
        assert_eq!(returned(MAX_LIST, vec![ints(&[3, 1, 2])]).repr(), "3");
        assert_eq!(raised(MAX_LIST, vec![ints(&[])]), ExceptionKind::IndexError);
    }

    #[test]
    fn test_print_is_captured_per_run() {
        let source = "def greet(name):\n    message = 'Hello ' + name\n    print(message)\n    return message\n";
        let execution = run_source(source, vec![Value::str("Bob")]).unwrap();
        assert_eq!(execution.stdout, "Hello Bob\n");
        let Outcome::Returned(value) = execution.outcome else {
            panic!("expected a return");
        };
        assert_eq!(value.to_str(), "Hello Bob");
    }

    #[test]
    fn test_comprehension_and_method_calls() {
        let source = "def f(lst):\n    res = []\n    for x in lst:\n        res.append(x * 2)\n    return res == [y * 2 for y in lst if y or not y]\n";
        assert!(matches!(returned(source, vec![ints(&[1, 2, 3])]), Value::Bool(true)));
    }

    #[test]
    fn test_comprehension_target_does_not_leak() {
        let source = "def f(lst):\n    ys = [x for x in lst]\n    return x\n";
        assert_eq!(raised(source, vec![ints(&[1])]), ExceptionKind::NameError);
    }

    #[test]
    fn test_unbound_local() {
        let source = "def f(flag):\n    if flag:\n        y = 1\n    return y\n";
        assert_eq!(raised(source, vec![Value::Bool(false)]), ExceptionKind::UnboundLocalError);
        assert_eq!(returned(source, vec![Value::Bool(true)]).repr(), "1");
    }

    #[test]
    fn test_raise_and_exception_classes() {
        let source = "def f(x):\n    if x < 0:\n        raise ValueError('negative')\n    return x\n";
        assert_eq!(raised(source, vec![Value::Int(-1)]), ExceptionKind::ValueError);
        let source = "def f(x):\n    raise KeyError\n";
        assert_eq!(raised(source, vec![Value::Int(0)]), ExceptionKind::KeyError);
    }

    #[test]
    fn test_recursion() {
        let source = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n";
        assert_eq!(returned(source, vec![Value::Int(10)]).repr(), "3628800");
        let source = "def down(n):\n    return down(n + 1)\n";
        assert_eq!(raised(source, vec![Value::Int(0)]), ExceptionKind::RecursionError);
    }

    #[test]
    fn test_configured_call_depth_is_clamped() {
        let tree = parse_function("def down(n):\n    return down(n + 1)\n").unwrap();
        let budget = ExecutionBudget {
            max_call_depth: 1_000_000,
            ..ExecutionBudget::default()
        };
        let execution = run(&tree.function, vec![Value::Int(0)], &budget).unwrap();
        let Outcome::Raised(exception) = execution.outcome else {
            panic!("expected RecursionError");
        };
        assert_eq!(exception.kind, ExceptionKind::RecursionError);
    }

    #[test]
    fn test_deep_evaluation_raises_recursion_error() {
        let mut expr = String::from("down(n + 1)");
        for _ in 0..30 {
            expr = format!("1 + ({expr})");
        }
        let source = format!("def down(n):\n    return {expr}\n");
        assert_eq!(raised(&source, vec![Value::Int(0)]), ExceptionKind::RecursionError);
    }

    #[test]
    fn test_shared_deadline_halts_the_run() {
        let tree = parse_function("def spin(x):\n    while True:\n        pass\n").unwrap();
        let err = run_until(
            &tree.function,
            vec![Value::Int(0)],
            &ExecutionBudget::default(),
            Some(Instant::now()),
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { .. }), "{err}");
    }

    #[test]
    fn test_arity_mismatch_raises_type_error() {
        assert_eq!(raised(SUM_LIST, vec![]), ExceptionKind::TypeError);
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let tree = parse_function("def spin(x):\n    while True:\n        pass\n").unwrap();
        let budget = ExecutionBudget {
            max_steps: 10_000,
            ..ExecutionBudget::default()
        };
        let err = run(&tree.function, vec![Value::Int(0)], &budget).unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { .. }), "{err}");
    }

    #[test]
    fn test_sequence_limit_halts() {
        let tree = parse_function("def grow(x):\n    items = [0]\n    while True:\n        items = items + items\n").unwrap();
        let budget = ExecutionBudget {
            max_sequence_len: 1_000,
            ..ExecutionBudget::default()
        };
        let err = run(&tree.function, vec![Value::Int(0)], &budget).unwrap_err();
        assert!(matches!(err, ExecutionError::ResourceExhausted { .. }), "{err}");
    }

    #[test]
    fn test_loop_control_and_tuple_unpacking() {
        let source = "def f(n):\n    a, b = 0, 1\n    i = 0\n    while True:\n        i += 1\n        if i > n:\n            break\n        if i % 2 == 0:\n            continue\n        a, b = b, a + b\n    return a\n";
        assert_eq!(returned(source, vec![Value::Int(6)]).repr(), "2");
    }
}
