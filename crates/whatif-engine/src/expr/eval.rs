//! Tree-walking evaluator with a step budget.
//!
//! Every AST node visited costs one step. Integer arithmetic is checked; `/`
//! always produces a float; mixed int/float operands promote to float.
//! Equality across kinds is `false` rather than an error, except that ints and
//! floats compare numerically.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use whatif_core::Value;

use super::ast::{BinaryOp, Expr, LogicOp, UnaryOp};
use super::error::ExprError;
use super::functions;

/// Variable name to bound value.
pub type Bindings = BTreeMap<String, Value>;

/// Evaluates `expr` against `bindings`, failing once more than `max_steps`
/// nodes have been visited.
pub fn evaluate(expr: &Expr, bindings: &Bindings, max_steps: usize) -> Result<Value, ExprError> {
    let mut eval = Evaluator {
        bindings,
        steps: 0,
        max_steps,
    };
    eval.eval(expr)
}

struct Evaluator<'a> {
    bindings: &'a Bindings,
    steps: usize,
    max_steps: usize,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ExprError::BudgetExceeded {
                limit: self.max_steps,
            });
        }

        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::UnknownVariable { name: name.clone() }),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                eval_unary(*op, v)
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                eval_binary(*op, &l, &r)
            }
            Expr::Logic { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                match (op, l.is_truthy()) {
                    (LogicOp::And, false) | (LogicOp::Or, true) => Ok(l),
                    _ => self.eval(rhs),
                }
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                functions::call(function, values)
            }
        }
    }
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Neg => match v {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ExprError::overflow("negation")),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(ExprError::mismatch(
                "negation",
                format!("cannot negate {}", other.type_name()),
            )),
        },
    }
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Rem => arith(op, l, r),
        BinaryOp::Div => divide(l, r),
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(l, r))),
        BinaryOp::Neq => Ok(Value::Bool(!loosely_equal(l, r))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ord = compare(op, l, r)?;
            let result = match (op, ord) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Lte, Some(o)) => o != Ordering::Greater,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
    }
}

fn arith(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                _ => {
                    if b == 0 {
                        return Err(ExprError::DivideByZero);
                    }
                    a.checked_rem(b)
                }
            };
            result
                .map(Value::Int)
                .ok_or_else(|| ExprError::overflow(format!("'{op}'")))
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(format!("{a}{b}"))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => {
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    _ => {
                        if b == 0.0 {
                            return Err(ExprError::DivideByZero);
                        }
                        a % b
                    }
                };
                Ok(Value::Float(result))
            }
            _ => Err(ExprError::mismatch(
                format!("'{op}'"),
                format!("unsupported operands {} and {}", l.type_name(), r.type_name()),
            )),
        },
    }
}

fn divide(l: &Value, r: &Value) -> Result<Value, ExprError> {
    match (l.as_f64(), r.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Err(ExprError::DivideByZero),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(ExprError::mismatch(
            "'/'",
            format!("unsupported operands {} and {}", l.type_name(), r.type_name()),
        )),
    }
}

/// Structural equality, except ints and floats compare numerically.
pub(crate) fn loosely_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            l.as_f64() == r.as_f64()
        }
        _ => l == r,
    }
}

/// Ordering for `<`-style operators. `None` means unordered (NaN).
fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Option<Ordering>, ExprError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(ExprError::mismatch(
                format!("'{op}'"),
                format!("cannot compare {} with {}", l.type_name(), r.type_name()),
            )),
        },
    }
}
