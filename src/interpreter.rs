//! The recursive, procedure-structured evaluator: one activation per
//! `call`, each walking its procedure's instructions against a fresh
//! operand stack and the single shared global stack.

use crate::arena::Arena;
use crate::diagnostics;
use crate::error::RuntimeError;
use crate::program::{Opcode, ProgramModel};
use crate::stack::{
    Stack, CALL_ACTIVATION_STACK_SIZE, DEFAULT_GLOBAL_STACK_SIZE, DEFAULT_OPERAND_STACK_SIZE,
};
use crate::value::Value;

#[cfg(test)]
mod tests;

/// The two tunable capacities a run needs: operand and global stack size.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub operand_stack_size: usize,
    pub global_stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            operand_stack_size: DEFAULT_OPERAND_STACK_SIZE,
            global_stack_size: DEFAULT_GLOBAL_STACK_SIZE,
        }
    }
}

/// Run `program` to completion starting at its entry procedure (index 0),
/// returning the value procedure 0 returns. The arena backing per-call
/// activation stacks is swept in one bulk release once the entry
/// procedure returns.
pub fn run(program: &ProgramModel, config: &Config) -> Result<Value, RuntimeError> {
    let mut global = Stack::alloc(config.global_stack_size);
    let mut arena: Arena<Stack> = Arena::new();
    let mut entry_stack = Stack::alloc(config.operand_stack_size);

    let result = eval_procedure(
        program,
        program.entry_index(),
        &mut entry_stack,
        &mut global,
        &mut arena,
        0,
    );

    arena.release_all();
    result
}

/// One activation: walk `procedure_index`'s instructions starting at
/// `start_offset` against `operand`, with `global` and `arena` threaded
/// through (by reference) to every nested `call`.
fn eval_procedure(
    program: &ProgramModel,
    procedure_index: usize,
    operand: &mut Stack,
    global: &mut Stack,
    arena: &mut Arena<Stack>,
    start_offset: usize,
) -> Result<Value, RuntimeError> {
    let procedure = program
        .procedure(procedure_index)
        .ok_or(RuntimeError::InvalidProcedureIndex {
            index: procedure_index,
            count: program.procedure_count(),
        })?;

    let mut pc = start_offset;

    loop {
        // Walking off the end of the body behaves exactly like `ret`.
        if pc >= procedure.len() {
            return Ok(operand.pop());
        }

        match &procedure.body[pc] {
            Opcode::Halt => diagnostics::halt(),
            Opcode::Return => return Ok(operand.pop()),

            Opcode::Goto(target) => {
                #[cfg(feature = "runtime_checks")]
                if *target >= procedure.len() {
                    return Err(RuntimeError::InvalidControlTransfer {
                        target: *target,
                        procedure_len: procedure.len(),
                    });
                }
                pc = *target;
                continue;
            }
            Opcode::IfIcmple(target) => {
                let taken = !pop_bool(operand, "if_icmple")?;
                if taken {
                    #[cfg(feature = "runtime_checks")]
                    if *target >= procedure.len() {
                        return Err(RuntimeError::InvalidControlTransfer {
                            target: *target,
                            procedure_len: procedure.len(),
                        });
                    }
                    pc = *target;
                    continue;
                }
            }
            Opcode::Call(callee_index) => {
                if *callee_index >= program.procedure_count() {
                    return Err(RuntimeError::InvalidProcedureIndex {
                        index: *callee_index,
                        count: program.procedure_count(),
                    });
                }
                let mut callee_stack = Stack::alloc(CALL_ACTIVATION_STACK_SIZE);
                let result =
                    eval_procedure(program, *callee_index, &mut callee_stack, global, arena, 0)?;
                // The activation is over the moment its call returns; hand
                // its stack to the arena and release it immediately rather
                // than waiting for the bulk sweep at shutdown.
                let handle = arena.alloc(callee_stack);
                arena.rfree(handle);
                operand.push(result)?;
            }

            Opcode::IAdd => {
                binop_int(operand, "iadd", |a, b| checked_i32("iadd", a as i64 + b as i64))?
            }
            Opcode::IMul => {
                binop_int(operand, "imul", |a, b| checked_i32("imul", a as i64 * b as i64))?
            }
            Opcode::IDiv => binop_int(operand, "idiv", |a, b| {
                if b == 0 {
                    Err(RuntimeError::DivisionByZero { op: "idiv" })
                } else {
                    checked_i32("idiv", a as i64 / b as i64)
                }
            })?,

            Opcode::FAdd => {
                binop_float(operand, "fadd", |a, b| checked_f32("fadd", a as f64 + b as f64))?
            }
            Opcode::FMul => {
                binop_float(operand, "fmul", |a, b| checked_f32("fmul", a as f64 * b as f64))?
            }
            Opcode::FDiv => binop_float(operand, "fdiv", |a, b| {
                if b == 0.0 {
                    Err(RuntimeError::DivisionByZero { op: "fdiv" })
                } else {
                    checked_f32("fdiv", a as f64 / b as f64)
                }
            })?,

            Opcode::ILt => compare_int(operand, |a, b| a < b)?,
            Opcode::IEq => compare_int(operand, |a, b| a == b)?,
            Opcode::IGt => compare_int(operand, |a, b| a > b)?,
            Opcode::FLt => compare_float(operand, |a, b| a < b)?,
            Opcode::FEq => compare_float(operand, |a, b| a == b)?,
            Opcode::FGt => compare_float(operand, |a, b| a > b)?,

            Opcode::And => bool_binop(operand, |a, b| a && b)?,
            Opcode::Or => bool_binop(operand, |a, b| a || b)?,
            Opcode::Xor => bool_binop(operand, |a, b| a ^ b)?,
            Opcode::Ne => {
                let a = pop_bool(operand, "ne")?;
                operand.push(Value::Bool(!a))?;
            }
            Opcode::If => {
                // Material implication: `p; q; if` computes p -> q. `p` was
                // pushed first so it's the second pop.
                let q = pop_bool(operand, "if")?;
                let p = pop_bool(operand, "if")?;
                operand.push(Value::Bool(!p || q))?;
            }

            Opcode::CConst(c) => operand.push(Value::Char(*c))?,
            Opcode::IConst(v) => operand.push(Value::Int32(*v))?,
            Opcode::SConst(s) => operand.push(Value::String(s.clone()))?,
            Opcode::FConst(v) => operand.push(Value::Float32(*v))?,
            Opcode::BConst(b) => operand.push(Value::Bool(*b))?,
            Opcode::VConst => operand.push(Value::Void)?,

            Opcode::Print => {
                // Reads, does not pop; a no-op on an empty stack, which is
                // why this doesn't go through `Stack::pop`.
                if let Some(v) = operand.peek() {
                    print!("{}", v);
                }
            }
            Opcode::Pop => {
                operand.pop();
            }
            Opcode::GStore => {
                let v = operand.pop();
                global.push(v)?;
            }
            Opcode::GLoad => {
                let v = global.pop();
                operand.push(v)?;
            }
            Opcode::Dup => {
                let v = operand.pop();
                operand.push(v.clone())?;
                operand.push(v)?;
            }
            Opcode::Swap => {
                // Inherited from the original: this pushes the *sum* of the
                // two popped operands rather than swapping them. Preserved
                // on purpose, not fixed.
                let a = pop_int(operand, "swap")?;
                let b = pop_int(operand, "swap")?;
                let sum = checked_i32("swap", a as i64 + b as i64)?;
                operand.push(Value::Int32(sum))?;
            }
            Opcode::Inc => {
                let v = pop_int(operand, "inc")?;
                operand.push(Value::Int32(checked_i32("inc", v as i64 + 1)?))?;
            }
            Opcode::Dec => {
                let v = pop_int(operand, "dec")?;
                operand.push(Value::Int32(checked_i32("dec", v as i64 - 1)?))?;
            }
        }

        pc += 1;
    }
}

fn checked_i32(op: &'static str, widened: i64) -> Result<i32, RuntimeError> {
    i32::try_from(widened).map_err(|_| RuntimeError::NumericOverflow { op })
}

fn checked_f32(op: &'static str, widened: f64) -> Result<f32, RuntimeError> {
    if !widened.is_finite() || widened.abs() > f32::MAX as f64 {
        return Err(RuntimeError::NumericOverflow { op });
    }
    Ok(widened as f32)
}

fn pop_int(stack: &mut Stack, op: &'static str) -> Result<i32, RuntimeError> {
    stack
        .pop()
        .as_int32()
        .ok_or(RuntimeError::TypeMismatch { op, got: "non-int" })
}

fn pop_float(stack: &mut Stack, op: &'static str) -> Result<f32, RuntimeError> {
    stack
        .pop()
        .as_float32()
        .ok_or(RuntimeError::TypeMismatch { op, got: "non-float" })
}

fn pop_bool(stack: &mut Stack, op: &'static str) -> Result<bool, RuntimeError> {
    stack
        .pop()
        .as_bool()
        .ok_or(RuntimeError::TypeMismatch { op, got: "non-bool" })
}

/// Every binary arithmetic/comparison primitive pops exactly two operands:
/// first pop = A, second pop = B, pushes `f(A, B)`.
fn binop_int(
    stack: &mut Stack,
    op: &'static str,
    f: impl Fn(i32, i32) -> Result<i32, RuntimeError>,
) -> Result<(), RuntimeError> {
    let a = pop_int(stack, op)?;
    let b = pop_int(stack, op)?;
    stack.push(Value::Int32(f(a, b)?))
}

fn binop_float(
    stack: &mut Stack,
    op: &'static str,
    f: impl Fn(f32, f32) -> Result<f32, RuntimeError>,
) -> Result<(), RuntimeError> {
    let a = pop_float(stack, op)?;
    let b = pop_float(stack, op)?;
    stack.push(Value::Float32(f(a, b)?))
}

fn compare_int(stack: &mut Stack, f: impl Fn(i32, i32) -> bool) -> Result<(), RuntimeError> {
    let a = pop_int(stack, "icmp")?;
    let b = pop_int(stack, "icmp")?;
    stack.push(Value::Bool(f(a, b)))
}

fn compare_float(stack: &mut Stack, f: impl Fn(f32, f32) -> bool) -> Result<(), RuntimeError> {
    let a = pop_float(stack, "fcmp")?;
    let b = pop_float(stack, "fcmp")?;
    stack.push(Value::Bool(f(a, b)))
}

fn bool_binop(stack: &mut Stack, f: impl Fn(bool, bool) -> bool) -> Result<(), RuntimeError> {
    let a = pop_bool(stack, "boolop")?;
    let b = pop_bool(stack, "boolop")?;
    stack.push(Value::Bool(f(a, b)))
}
