use clap::Parser;
use conceptum::assembler::assemble;
use conceptum::diagnostics;
use conceptum::error::exit_code;
use conceptum::interpreter::{self, Config};
use std::fs;
use std::process::ExitCode;

/// Conceptum VM: assemble and run a stack-based bytecode program.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Program source file.
    source: String,

    /// Per-activation operand stack capacity.
    #[arg(long, default_value_t = conceptum::stack::DEFAULT_OPERAND_STACK_SIZE)]
    operand_stack_size: usize,

    /// Global stack capacity.
    #[arg(long, default_value_t = conceptum::stack::DEFAULT_GLOBAL_STACK_SIZE)]
    global_stack_size: usize,

    /// Disassemble the loaded program to stdout and exit without running it.
    #[arg(long, default_value_t = false)]
    dump_program: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == clap::error::ErrorKind::MissingRequiredArgument => {
            print!("{}", err);
            return ExitCode::from(exit_code::USAGE as u8);
        }
        Err(err) => err.exit(),
    };

    let source = match fs::read_to_string(&args.source) {
        Ok(source) => source,
        Err(err) => diagnostics::fatal(
            &format!("cannot open `{}`: {}", args.source, err),
            exit_code::SOURCE_OPEN_FAILED,
        ),
    };

    let program = match assemble(&source) {
        Ok(program) => program,
        Err(err) => diagnostics::fatal(&err.to_string(), err.exit_code()),
    };

    if args.dump_program {
        print!("{}", program);
        return ExitCode::SUCCESS;
    }

    let config = Config {
        operand_stack_size: args.operand_stack_size,
        global_stack_size: args.global_stack_size,
    };

    match interpreter::run(&program, &config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => diagnostics::fatal(&err.to_string(), err.exit_code()),
    }
}
