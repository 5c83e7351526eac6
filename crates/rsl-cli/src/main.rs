use std::{env, process::ExitCode};

use rsl::{CollectingErrorPolicy, Shader, disassemble};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: rsl <shader.sl>");
        return ExitCode::FAILURE;
    };

    let mut errors = CollectingErrorPolicy::default();
    match Shader::load_file(path, &mut errors) {
        Ok(shader) => {
            print!("{}", disassemble(&shader));
            ExitCode::SUCCESS
        }
        Err(failure) => {
            for diagnostic in errors.diagnostics() {
                eprintln!("{diagnostic}");
            }
            eprintln!("error: {failure}");
            ExitCode::FAILURE
        }
    }
}
