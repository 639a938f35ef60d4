//! Lexer/Assembler and Call Resolver: turns an ordered sequence of textual
//! lines into a call-resolved, range-checked `ProgramModel`.
//!
//! Two passes: Pass A discovers every `procedure` header and its name (so
//! forward `call` references can resolve); Pass B compiles each procedure's
//! body into instructions. A third pass - the Call Resolver - rewrites
//! symbolic `call <name>` targets into numeric procedure indices and
//! validates every `goto`/`if_icmple` target falls inside its containing
//! procedure.

use crate::error::AssembleError;
use crate::program::{Opcode, Procedure, ProgramModel};

/// A literal `procedure ` header prefix is 10 characters including the
/// trailing separator space.
const PROCEDURE_PREFIX_LEN: usize = 10;

enum JumpKind {
    Goto,
    IfIcmple,
}

/// An instruction whose payload still needs a second pass to resolve:
/// either a symbolic call target or a jump whose range can only be
/// checked once the whole procedure body is known.
enum RawInstr {
    Final(Opcode),
    PendingCall(String),
    PendingJump(JumpKind, i64),
}

struct CallPatch {
    procedure: usize,
    instruction: usize,
    line: usize,
    name: String,
}

struct JumpPatch {
    procedure: usize,
    instruction: usize,
    line: usize,
    kind: JumpKind,
    target: i64,
}

/// Assemble a full source file (as the sequence of its physical lines)
/// into an immutable, call-resolved `ProgramModel`.
pub fn assemble(source: &str) -> Result<ProgramModel, AssembleError> {
    let lines: Vec<&str> = source.lines().collect();

    // Pass A: discover every procedure header and its name, in order of
    // textual appearance. Index 0 is the entry procedure.
    let mut names: Vec<String> = Vec::new();
    let mut header_lines: Vec<usize> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if line.contains("procedure") {
            let header_idx = line.find("procedure").unwrap();
            let name = line[header_idx + PROCEDURE_PREFIX_LEN..].trim().to_string();
            names.push(name);
            header_lines.push(idx);
        }
    }

    // Pass B: compile each procedure's body - the lines between its header
    // and the next procedure's header (or end of file). A body ordinarily
    // ends with its own `ret`/`ter`, but a body may legitimately contain
    // more than one (a conditional branch can jump past a first `ret` to a
    // second one further down), so the next header/EOF - not the first
    // `ret` token - is what bounds it here.
    let mut procedures: Vec<Procedure> = Vec::with_capacity(names.len());
    let mut call_patches: Vec<CallPatch> = Vec::new();
    let mut jump_patches: Vec<JumpPatch> = Vec::new();

    for (proc_idx, name) in names.iter().enumerate() {
        let mut body: Vec<Opcode> = Vec::new();
        let body_end = header_lines
            .get(proc_idx + 1)
            .copied()
            .unwrap_or(lines.len());

        for cursor in (header_lines[proc_idx] + 1)..body_end {
            let line = lines[cursor];
            let line_no = cursor + 1;

            if line.trim().is_empty() {
                return Err(AssembleError::BlankLineInBody { line: line_no });
            }

            let raw = compile_line(line_no, line)?;
            let instr_idx = body.len();
            match raw {
                RawInstr::Final(op) => body.push(op),
                RawInstr::PendingCall(target_name) => {
                    call_patches.push(CallPatch {
                        procedure: proc_idx,
                        instruction: instr_idx,
                        line: line_no,
                        name: target_name,
                    });
                    body.push(Opcode::Call(usize::MAX));
                }
                RawInstr::PendingJump(kind, target) => {
                    let placeholder = match kind {
                        JumpKind::Goto => Opcode::Goto(0),
                        JumpKind::IfIcmple => Opcode::IfIcmple(0),
                    };
                    jump_patches.push(JumpPatch {
                        procedure: proc_idx,
                        instruction: instr_idx,
                        line: line_no,
                        kind,
                        target,
                    });
                    body.push(placeholder);
                }
            }
        }

        procedures.push(Procedure {
            name: name.clone(),
            body,
        });
    }

    // Call Resolver: rewrite symbolic targets into procedure indices.
    for patch in call_patches {
        let target = names
            .iter()
            .position(|n| n == &patch.name)
            .ok_or_else(|| AssembleError::UnresolvedCall {
                line: patch.line,
                name: patch.name.clone(),
            })?;
        procedures[patch.procedure].body[patch.instruction] = Opcode::Call(target);
    }

    // Validate and fill in jump targets now that every body's final length
    // is known: a target must land inside its own procedure's body.
    for patch in jump_patches {
        let procedure_len = procedures[patch.procedure].len();
        if patch.target < 0 || patch.target as usize >= procedure_len {
            return Err(AssembleError::InvalidJumpTarget {
                line: patch.line,
                target: patch.target,
                procedure_len,
            });
        }
        let target = patch.target as usize;
        procedures[patch.procedure].body[patch.instruction] = match patch.kind {
            JumpKind::Goto => Opcode::Goto(target),
            JumpKind::IfIcmple => Opcode::IfIcmple(target),
        };
    }

    Ok(ProgramModel::new(procedures))
}

fn split_mnemonic_arg(line: &str) -> (&str, Option<&str>) {
    match line.find(char::is_whitespace) {
        Some(idx) => {
            let mnemonic = &line[..idx];
            let rest = line[idx..].trim_start();
            if rest.is_empty() {
                (mnemonic, None)
            } else {
                (mnemonic, Some(rest))
            }
        }
        None => (line, None),
    }
}

fn require_arg<'a>(
    line_no: usize,
    mnemonic: &str,
    arg: Option<&'a str>,
) -> Result<&'a str, AssembleError> {
    arg.ok_or_else(|| AssembleError::MissingArgument {
        line: line_no,
        mnemonic: mnemonic.to_string(),
    })
}

fn parse_i32(line_no: usize, mnemonic: &str, arg: &str) -> Result<i32, AssembleError> {
    arg.trim()
        .parse::<i32>()
        .map_err(|_| AssembleError::InvalidArgument {
            line: line_no,
            mnemonic: mnemonic.to_string(),
            argument: arg.to_string(),
        })
}

fn parse_f32(line_no: usize, mnemonic: &str, arg: &str) -> Result<f32, AssembleError> {
    arg.trim()
        .parse::<f32>()
        .map_err(|_| AssembleError::InvalidArgument {
            line: line_no,
            mnemonic: mnemonic.to_string(),
            argument: arg.to_string(),
        })
}

fn parse_jump_target(line_no: usize, mnemonic: &str, arg: &str) -> Result<i64, AssembleError> {
    arg.trim()
        .parse::<i64>()
        .map_err(|_| AssembleError::InvalidArgument {
            line: line_no,
            mnemonic: mnemonic.to_string(),
            argument: arg.to_string(),
        })
}

/// Compile a single body line into an instruction, parsing its operand
/// according to which mnemonic it is. Mnemonic lookup is exhaustive and
/// case-sensitive.
fn compile_line(line_no: usize, line: &str) -> Result<RawInstr, AssembleError> {
    let (mnemonic, arg) = split_mnemonic_arg(line);

    let instr = match mnemonic {
        "iadd" => RawInstr::Final(Opcode::IAdd),
        "idiv" => RawInstr::Final(Opcode::IDiv),
        "imul" => RawInstr::Final(Opcode::IMul),
        "fadd" => RawInstr::Final(Opcode::FAdd),
        "fdiv" => RawInstr::Final(Opcode::FDiv),
        "fmul" => RawInstr::Final(Opcode::FMul),
        "ilt" => RawInstr::Final(Opcode::ILt),
        "ieq" => RawInstr::Final(Opcode::IEq),
        "igt" => RawInstr::Final(Opcode::IGt),
        "flt" => RawInstr::Final(Opcode::FLt),
        "feq" => RawInstr::Final(Opcode::FEq),
        "fgt" => RawInstr::Final(Opcode::FGt),
        "and" => RawInstr::Final(Opcode::And),
        "or" => RawInstr::Final(Opcode::Or),
        "xor" => RawInstr::Final(Opcode::Xor),
        "ne" => RawInstr::Final(Opcode::Ne),
        "if" => RawInstr::Final(Opcode::If),
        "cconst" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            let ch = arg.chars().next().ok_or_else(|| AssembleError::InvalidArgument {
                line: line_no,
                mnemonic: mnemonic.to_string(),
                argument: arg.to_string(),
            })?;
            RawInstr::Final(Opcode::CConst(ch))
        }
        "iconst" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            RawInstr::Final(Opcode::IConst(parse_i32(line_no, mnemonic, arg)?))
        }
        "sconst" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            RawInstr::Final(Opcode::SConst(arg.to_string()))
        }
        "fconst" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            RawInstr::Final(Opcode::FConst(parse_f32(line_no, mnemonic, arg)?))
        }
        "bconst" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            let value = parse_i32(line_no, mnemonic, arg)?;
            match value {
                0 => RawInstr::Final(Opcode::BConst(false)),
                1 => RawInstr::Final(Opcode::BConst(true)),
                _ => return Err(AssembleError::BadBoolConst { line: line_no, value }),
            }
        }
        "vconst" => RawInstr::Final(Opcode::VConst),
        "print" => RawInstr::Final(Opcode::Print),
        "pop" => RawInstr::Final(Opcode::Pop),
        "goto" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            let target = parse_jump_target(line_no, mnemonic, arg)?;
            RawInstr::PendingJump(JumpKind::Goto, target)
        }
        "if_icmple" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            let target = parse_jump_target(line_no, mnemonic, arg)?;
            RawInstr::PendingJump(JumpKind::IfIcmple, target)
        }
        "call" => {
            let arg = require_arg(line_no, mnemonic, arg)?;
            RawInstr::PendingCall(arg.trim().to_string())
        }
        "gstore" => RawInstr::Final(Opcode::GStore),
        "gload" => RawInstr::Final(Opcode::GLoad),
        "ret" | "ter" => RawInstr::Final(Opcode::Return),
        "inc" => RawInstr::Final(Opcode::Inc),
        "dec" => RawInstr::Final(Opcode::Dec),
        "dup" => RawInstr::Final(Opcode::Dup),
        "swap" => RawInstr::Final(Opcode::Swap),
        "halt" => RawInstr::Final(Opcode::Halt),
        other => {
            return Err(AssembleError::UnknownMnemonic {
                line: line_no,
                mnemonic: other.to_string(),
            });
        }
    };

    Ok(instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_program_assembles() {
        let src = "procedure main\niconst 3\niconst 4\niadd\nret\n";
        let program = assemble(src).unwrap();
        assert_eq!(program.procedure_count(), 1);
        let main = program.procedure(0).unwrap();
        assert_eq!(main.body.len(), 4);
        assert_eq!(main.body[3], Opcode::Return);
    }

    #[test]
    fn forward_call_reference_resolves() {
        let src = "procedure main\ncall add2\nret\nprocedure add2\niconst 10\niconst 20\niadd\nret\n";
        let program = assemble(src).unwrap();
        assert_eq!(program.procedure(0).unwrap().body[0], Opcode::Call(1));
    }

    #[test]
    fn unresolved_call_is_fatal() {
        let src = "procedure main\ncall missing\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::UnresolvedCall { .. }));
    }

    #[test]
    fn unknown_mnemonic_is_fatal() {
        let src = "procedure main\nbogus 1\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::UnknownMnemonic { .. }));
    }

    #[test]
    fn bconst_out_of_range_is_fatal() {
        let src = "procedure main\nbconst 2\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::BadBoolConst { value: 2, .. }));
    }

    #[test]
    fn blank_line_in_body_is_fatal() {
        let src = "procedure main\niconst 1\n\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::BlankLineInBody { .. }));
    }

    #[test]
    fn goto_out_of_range_is_fatal() {
        let src = "procedure main\ngoto 5\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::InvalidJumpTarget { .. }));
    }

    #[test]
    fn goto_to_final_instruction_is_allowed() {
        // A target equal to the last valid index (length - 1) is in range.
        let src = "procedure main\ngoto 2\niconst 1\nret\n";
        let program = assemble(src).unwrap();
        assert_eq!(program.procedure(0).unwrap().body.len(), 3);
        assert_eq!(program.procedure(0).unwrap().body[0], Opcode::Goto(2));
    }

    #[test]
    fn sconst_preserves_whole_remainder_as_argument() {
        let src = "procedure main\nsconst hello world\nprint\nret\n";
        let program = assemble(src).unwrap();
        assert_eq!(
            program.procedure(0).unwrap().body[0],
            Opcode::SConst("hello world".to_string())
        );
    }

    #[test]
    fn missing_argument_is_fatal() {
        let src = "procedure main\niconst\nret\n";
        let err = assemble(src).unwrap_err();
        assert!(matches!(err, AssembleError::MissingArgument { .. }));
    }
}
