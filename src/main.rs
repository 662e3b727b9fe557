use std::{
    env,
    io::{self, BufWriter, Write},
    process::ExitCode,
};

use tarlogs::{archive::TarEmitter, cli, config::Config, log, Error};

fn run(ops: &[cli::Op]) -> tarlogs::Result<()> {
    let config = Config::from_env()?;
    tarlogs::set_verbose(config.verbose);
    cli::validate(ops)?;

    let stdout = io::stdout();
    let mut emitter = TarEmitter::new(BufWriter::new(stdout.lock()), config.dereference);
    cli::run(ops, &mut emitter)?;

    let mut out = emitter.finish().map_err(Error::Output)?;
    out.flush().map_err(Error::Output)?;
    log!("Archive complete");
    Ok(())
}

fn main() -> ExitCode {
    if env::args_os().len() < 2 {
        return match cli::print_help() {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }

    let ops = match cli::parse_ops(env::args_os()) {
        Ok(ops) => ops,
        Err(e) => e.exit(),
    };

    match run(&ops) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tarlogs: {e}");
            if e.is_usage() {
                eprintln!("{}", cli::usage());
            }
            ExitCode::from(e.exit_code())
        }
    }
}
