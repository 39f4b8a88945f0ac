//! Stack-machine evaluation of compiled matcher programs.

use std::collections::HashMap;

use crate::compiler::{Instr, Program};
use crate::value::Value;
use crate::{EvalError, EvalResult};

/// Variable bindings visible to a program: plain values, records (request
/// and policy attribute lists), and callable functions.
pub type Environment = HashMap<String, Value>;

impl Program {
    /// Runs the program against `env` and returns the final stack value.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] on unknown variables or attributes, type
    /// mismatches, bad calls, or a program that does not reduce to exactly
    /// one value.
    pub fn eval(&self, env: &Environment) -> EvalResult<Value> {
        let mut stack: Vec<Value> = Vec::new();

        for instr in self.instrs() {
            match instr {
                Instr::PushNum { value } => stack.push(Value::Num(*value)),
                Instr::PushStr { value } => stack.push(Value::Str(value.clone())),
                Instr::PushVar { name } => {
                    let value = env
                        .get(name)
                        .ok_or_else(|| EvalError::UnknownVariable(name.clone()))?;
                    stack.push(value.clone());
                }
                Instr::FetchAttr => {
                    let attr = pop(&mut stack)?;
                    let container = pop(&mut stack)?;
                    let Value::Str(name) = attr else {
                        return Err(EvalError::TypeMismatch {
                            op: ".",
                            operand: attr.type_name(),
                        });
                    };
                    let Value::Record(_) = container else {
                        return Err(EvalError::TypeMismatch {
                            op: ".",
                            operand: container.type_name(),
                        });
                    };
                    let value = container
                        .attr(&name)
                        .cloned()
                        .ok_or(EvalError::UnknownAttribute(name))?;
                    stack.push(value);
                }
                Instr::Call { name, arity } => {
                    let mut args = Vec::with_capacity(*arity);
                    for _ in 0..*arity {
                        args.push(pop(&mut stack)?);
                    }
                    args.reverse();
                    let callee = env
                        .get(name)
                        .ok_or_else(|| EvalError::UnknownVariable(name.clone()))?;
                    let Value::Function(f) = callee else {
                        return Err(EvalError::NotAFunction(name.clone()));
                    };
                    stack.push(f(&args)?);
                }
                Instr::Not => {
                    let value = pop(&mut stack)?;
                    stack.push(Value::Bool(!value.is_truthy()));
                }
                Instr::Pos => {
                    let value = num_operand(pop(&mut stack)?, "+")?;
                    stack.push(Value::Num(value));
                }
                Instr::Neg => {
                    let value = num_operand(pop(&mut stack)?, "-")?;
                    stack.push(Value::Num(-value));
                }
                Instr::Mul => arith(&mut stack, "*", |a, b| a * b)?,
                Instr::Div => arith(&mut stack, "/", |a, b| a / b)?,
                Instr::Add => arith(&mut stack, "+", |a, b| a + b)?,
                Instr::Sub => arith(&mut stack, "-", |a, b| a - b)?,
                Instr::Lt => ordered(&mut stack, "<", |o| o == std::cmp::Ordering::Less)?,
                Instr::Le => ordered(&mut stack, "<=", |o| o != std::cmp::Ordering::Greater)?,
                Instr::Gt => ordered(&mut stack, ">", |o| o == std::cmp::Ordering::Greater)?,
                Instr::Ge => ordered(&mut stack, ">=", |o| o != std::cmp::Ordering::Less)?,
                Instr::Eq => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    stack.push(Value::Bool(lhs == rhs));
                }
                Instr::Ne => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    stack.push(Value::Bool(lhs != rhs));
                }
                Instr::And => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    stack.push(if lhs.is_truthy() { rhs } else { lhs });
                }
                Instr::Or => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    stack.push(if lhs.is_truthy() { lhs } else { rhs });
                }
            }
        }

        let result = pop(&mut stack)?;
        if stack.is_empty() {
            Ok(result)
        } else {
            Err(EvalError::Malformed)
        }
    }

    /// Runs the program and coerces the result to a boolean by truthiness.
    ///
    /// # Errors
    ///
    /// Propagates every error of [`Program::eval`].
    pub fn eval_bool(&self, env: &Environment) -> EvalResult<bool> {
        Ok(self.eval(env)?.is_truthy())
    }
}

fn pop(stack: &mut Vec<Value>) -> EvalResult<Value> {
    stack.pop().ok_or(EvalError::Malformed)
}

fn num_operand(value: Value, op: &'static str) -> EvalResult<f64> {
    match value {
        Value::Num(n) => Ok(n),
        other => Err(EvalError::TypeMismatch {
            op,
            operand: other.type_name(),
        }),
    }
}

fn arith(stack: &mut Vec<Value>, op: &'static str, f: impl Fn(f64, f64) -> f64) -> EvalResult<()> {
    let rhs = num_operand(pop(stack)?, op)?;
    let lhs = num_operand(pop(stack)?, op)?;
    stack.push(Value::Num(f(lhs, rhs)));
    Ok(())
}

/// Ordered comparison over two numbers or two strings.
fn ordered(
    stack: &mut Vec<Value>,
    op: &'static str,
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> EvalResult<()> {
    let rhs = pop(stack)?;
    let lhs = pop(stack)?;
    let ordering = match (&lhs, &rhs) {
        (Value::Num(a), Value::Num(b)) => {
            a.partial_cmp(b).ok_or(EvalError::TypeMismatch {
                op,
                operand: "number",
            })?
        }
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Num(_), other) | (other, _) => {
            return Err(EvalError::TypeMismatch {
                op,
                operand: other.type_name(),
            });
        }
    };
    stack.push(Value::Bool(f(ordering)));
    Ok(())
}
