//! Closed error-kind sets for assembly and evaluation, and the exit code
//! each one maps to on the way out of `main`.

use std::fmt::{self, Display, Formatter};

pub mod exit_code {
    pub const USAGE: i32 = 0;
    pub const OOM_INITIAL_ALLOC: i32 = 1;
    pub const SOURCE_OPEN_FAILED: i32 = 2;
    pub const OOM_GROW_3: i32 = 3;
    pub const OOM_GROW_4: i32 = 4;
    pub const CONCEPT_ABORT: i32 = 97;
    pub const MALFORMED: i32 = 130;
}

/// Errors raised while turning source lines into a `ProgramModel`.
#[derive(Debug, Clone, PartialEq)]
pub enum AssembleError {
    /// `<line>`: a mnemonic outside the recognized set.
    UnknownMnemonic { line: usize, mnemonic: String },
    /// `<line>`: a mnemonic that requires an argument did not get one.
    MissingArgument { line: usize, mnemonic: String },
    /// `<line>`: an argument failed to parse as the type the mnemonic needs.
    InvalidArgument {
        line: usize,
        mnemonic: String,
        argument: String,
    },
    /// `bconst` argument was not 0 or 1.
    BadBoolConst { line: usize, value: i32 },
    /// `call` named a procedure with no matching `procedure` header.
    UnresolvedCall { line: usize, name: String },
    /// A blank line appeared inside a procedure body.
    BlankLineInBody { line: usize },
    /// `goto`/`if_icmple` target fell outside the containing procedure.
    InvalidJumpTarget {
        line: usize,
        target: i64,
        procedure_len: usize,
    },
}

impl Display for AssembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::UnknownMnemonic { line, mnemonic } => {
                write!(f, "line {}: unknown mnemonic `{}`", line, mnemonic)
            }
            AssembleError::MissingArgument { line, mnemonic } => {
                write!(f, "line {}: `{}` requires an argument", line, mnemonic)
            }
            AssembleError::InvalidArgument {
                line,
                mnemonic,
                argument,
            } => write!(
                f,
                "line {}: `{}` cannot parse argument `{}`",
                line, mnemonic, argument
            ),
            AssembleError::BadBoolConst { line, value } => write!(
                f,
                "line {}: `bconst` value {} is not 0 or 1",
                line, value
            ),
            AssembleError::UnresolvedCall { line, name } => write!(
                f,
                "line {}: `call` target `{}` has no matching procedure",
                line, name
            ),
            AssembleError::BlankLineInBody { line } => {
                write!(f, "line {}: blank line inside procedure body", line)
            }
            AssembleError::InvalidJumpTarget {
                line,
                target,
                procedure_len,
            } => write!(
                f,
                "line {}: jump target {} out of range for procedure of length {}",
                line, target, procedure_len
            ),
        }
    }
}

impl std::error::Error for AssembleError {}

impl AssembleError {
    pub fn exit_code(&self) -> i32 {
        exit_code::MALFORMED
    }
}

/// Errors raised while evaluating an assembled `ProgramModel`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    StackOverflow,
    NumericOverflow { op: &'static str },
    DivisionByZero { op: &'static str },
    TypeMismatch { op: &'static str, got: &'static str },
    InvalidControlTransfer { target: usize, procedure_len: usize },
    InvalidProcedureIndex { index: usize, count: usize },
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::NumericOverflow { op } => {
                write!(f, "numeric overflow in `{}`", op)
            }
            RuntimeError::DivisionByZero { op } => {
                write!(f, "division by zero in `{}`", op)
            }
            RuntimeError::TypeMismatch { op, got } => write!(
                f,
                "`{}` received a value of the wrong type ({})",
                op, got
            ),
            RuntimeError::InvalidControlTransfer {
                target,
                procedure_len,
            } => write!(
                f,
                "control transfer to {} out of range for procedure of length {}",
                target, procedure_len
            ),
            RuntimeError::InvalidProcedureIndex { index, count } => write!(
                f,
                "call to procedure {} out of range ({} procedures loaded)",
                index, count
            ),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::StackOverflow
            | RuntimeError::NumericOverflow { .. }
            | RuntimeError::DivisionByZero { .. }
            | RuntimeError::TypeMismatch { .. } => exit_code::CONCEPT_ABORT,
            RuntimeError::InvalidControlTransfer { .. }
            | RuntimeError::InvalidProcedureIndex { .. } => exit_code::MALFORMED,
        }
    }
}
