//! `icsel`: the reference command-line driver for `icsel-core` (§6 "CLI
//! surface"). Not part of the core: this binary owns all file I/O, human-
//! facing error reporting, and the `make`/`transform`/`plot`/`check`
//! subcommands, each of which dispatches to a sub-action selector.

mod commands;

use clap::{App, AppSettings, Arg, SubCommand};
use std::process;

fn build_cli() -> App<'static, 'static> {
    App::new("icsel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Constraint-programming instruction selector: reference driver")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .global(true)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .subcommand(commands::make::cli())
        .subcommand(commands::transform::cli())
        .subcommand(commands::plot::cli())
        .subcommand(commands::check::cli())
}

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() {
    let matches = build_cli().get_matches();
    init_logger(matches.occurrences_of("verbose"));

    let result = match matches.subcommand() {
        ("make", Some(m)) => commands::make::run(m),
        ("transform", Some(m)) => commands::transform::run(m),
        ("plot", Some(m)) => commands::plot::run(m),
        ("check", Some(m)) => commands::check::run(m),
        _ => unreachable!("clap requires a subcommand"),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        for cause in e.causes().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        process::exit(1);
    }
}
