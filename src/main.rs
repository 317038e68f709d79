//! Punto de entrada ("driver").
//!
//! Este módulo expone una CLI sobre [`portugol::compile`] y se
//! encarga de la E/S de archivos.

use anyhow::{self, Context};
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use portugol::DumpOptions;
use tracing::{info, Level};

use std::{
    fs::File,
    io::{self, BufReader, Write},
    process::ExitCode,
};

fn main() -> anyhow::Result<ExitCode> {
    let args = cli().get_matches();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(log_level(&args))
        .init();

    let mut dumps = DumpOptions::empty();
    for stage in args.get_many::<String>("dump").into_iter().flatten() {
        match stage.as_str() {
            "tokens" => dumps |= DumpOptions::TOKENS,
            "ast" => dumps |= DumpOptions::AST,
            _ => unreachable!("clap allowed a bad dump stage"),
        }
    }

    // Ambos argumentos son obligatorios o tienen valor por omisión
    let input = args.get_one::<String>("input").context("Missing input")?;
    let output = args.get_one::<String>("output").context("Missing output")?;

    let file = File::open(input).with_context(|| format!("Failed to open: {}", input))?;

    info!("compiling {}", input);
    let assembly = match portugol::compile(BufReader::new(file), input.as_str(), dumps) {
        Ok(assembly) => assembly,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            return Ok(ExitCode::FAILURE);
        }
    };

    match output.as_str() {
        "-" => {
            let mut stdout = io::stdout();
            write!(stdout, "{}", assembly).context("Failed to emit to stdout")?;
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write!(file, "{}", assembly)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn cli() -> Command<'static> {
    Command::new("portugolc")
        .version(crate_version!())
        .about("Compiles Portugol programs to MIPS assembly for MARS")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Source file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .takes_value(true)
                .value_name("STAGE")
                .value_parser(["tokens", "ast"])
                .action(ArgAction::Append)
                .help("Print an intermediate representation to stderr"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity"),
        )
}

/// Cada `-v` habilita un nivel más de logging, a partir de advertencias.
fn log_level(args: &ArgMatches) -> Level {
    match args.get_one::<u8>("verbose").copied().unwrap_or(0) {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_for(args: &[&str]) -> Level {
        let args = cli().try_get_matches_from(args.iter().copied()).unwrap();
        log_level(&args)
    }

    #[test]
    fn verbosity_selects_log_level() {
        assert_eq!(level_for(&["portugolc", "prog.por"]), Level::WARN);
        assert_eq!(level_for(&["portugolc", "-v", "prog.por"]), Level::INFO);
        assert_eq!(level_for(&["portugolc", "-vv", "prog.por"]), Level::DEBUG);
        assert_eq!(level_for(&["portugolc", "-vvvv", "prog.por"]), Level::TRACE);
    }

    #[test]
    fn output_defaults_to_stdout() {
        let args = cli()
            .try_get_matches_from(["portugolc", "--dump", "ast", "--dump", "tokens", "prog.por"])
            .unwrap();

        assert_eq!(args.get_one::<String>("output").unwrap(), "-");

        let dumps: Vec<_> = args.get_many::<String>("dump").unwrap().collect();
        assert_eq!(dumps, ["ast", "tokens"]);
    }

    #[test]
    fn bad_dump_stage_is_rejected() {
        let result = cli().try_get_matches_from(["portugolc", "--dump", "ir", "prog.por"]);
        assert!(result.is_err());
    }
}
