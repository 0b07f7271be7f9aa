//! `icsel make`: runs the matcher, the model builder (C5), and index
//! lowering (C6) over a function and a target machine, producing the
//! low-level model (and its index maps) a solver consumes — or, with
//! `--action hlmodel`, just the high-level model, for inspection.

use super::{output_path, read_json, write_json};
use clap::{App, Arg, ArgMatches, SubCommand};
use failure::{format_err, Error};
use icsel_core::function::Function;
use icsel_core::lowering::{lower_model, ArrayIndexMaplists};
use icsel_core::matcher::find_all_matches;
use icsel_core::model::build_high_level_model;
use icsel_core::target::TargetMachine;
use std::path::Path;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("make")
        .about("Build the high- or low-level constraint model for a function against a target")
        .arg(
            Arg::with_name("function")
                .long("function")
                .takes_value(true)
                .required(true)
                .help("Path to a Function JSON file"),
        )
        .arg(
            Arg::with_name("target")
                .long("target")
                .takes_value(true)
                .required(true)
                .help("Path to a TargetMachine JSON file"),
        )
        .arg(
            Arg::with_name("action")
                .long("action")
                .takes_value(true)
                .possible_values(&["hlmodel", "llmodel"])
                .default_value("llmodel")
                .help("hlmodel: high-level model only. llmodel: lowered model plus index maps"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("Base output path; per §6, each emitted file is suffixed with its output ID"),
        )
}

pub fn run(args: &ArgMatches) -> Result<(), Error> {
    let function_path = Path::new(args.value_of("function").unwrap());
    let target_path = Path::new(args.value_of("target").unwrap());
    let out_base = Path::new(args.value_of("output").unwrap());

    let function: Function = read_json(function_path)?;
    let target: TargetMachine = read_json(target_path)?;

    // Runs serially unless icsel-core's `parallel` feature is enabled.
    let matches = find_all_matches(&function.op_structure.graph, &target)?;
    log::info!("found {} match(es)", matches.len());
    let model = build_high_level_model(&function, &target, &matches)?;

    match args.value_of("action").unwrap() {
        "hlmodel" => write_json(&output_path(out_base, 0), &model)?,
        "llmodel" => {
            let maps = ArrayIndexMaplists::build(&model);
            let lowered = lower_model(&model, &maps)?;
            write_json(&output_path(out_base, 0), &lowered)?;
            write_json(&output_path(out_base, 1), &maps)?;
        }
        other => return Err(format_err!("unknown make action `{}`", other)),
    }
    Ok(())
}
