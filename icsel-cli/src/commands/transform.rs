//! `icsel transform`: applies one (or, with `--action all`, the whole
//! pipeline of) op-structure transformations of C8/§4.8 to a function's
//! op-structure.

use super::{output_path, read_json, write_json};
use clap::{App, Arg, ArgMatches, SubCommand};
use failure::{format_err, Error};
use icsel_core::function::Function;
use icsel_core::transform::{
    canonicalize_copies, dead_code_elimination, enforce_phi_node_invariants, lower_pointers,
    remove_redundant_conversions, remove_redundant_phi_nodes,
};

const ACTIONS: &[&str] = &[
    "canonicalize-copies",
    "lower-pointers",
    "enforce-phi-invariants",
    "remove-redundant-phis",
    "dce",
    "remove-redundant-conversions",
    "all",
];

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("transform")
        .about("Apply an op-structure transformation (C8) to a function")
        .arg(
            Arg::with_name("action")
                .required(true)
                .possible_values(ACTIONS)
                .help("Which transformation to apply; `all` runs the canonical pipeline in order"),
        )
        .arg(
            Arg::with_name("function")
                .long("function")
                .takes_value(true)
                .required(true)
                .help("Path to a Function JSON file"),
        )
        .arg(
            Arg::with_name("pointer-size")
                .long("pointer-size")
                .takes_value(true)
                .default_value("64")
                .help("Target pointer width in bits, used by `lower-pointers`/`all`"),
        )
        .arg(
            Arg::with_name("null-pointer-value")
                .long("null-pointer-value")
                .takes_value(true)
                .default_value("0")
                .help("Target's null pointer bit pattern, used by `lower-pointers`/`all`"),
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

fn apply_one(function: &mut Function, action: &str, pointer_size: u16, null_pointer_value: i64) {
    let op = &function.op_structure;
    function.op_structure = match action {
        "canonicalize-copies" => canonicalize_copies(op),
        "lower-pointers" => lower_pointers(op, pointer_size, null_pointer_value),
        "enforce-phi-invariants" => enforce_phi_node_invariants(op),
        "remove-redundant-phis" => remove_redundant_phi_nodes(op),
        "dce" => dead_code_elimination(op),
        "remove-redundant-conversions" => remove_redundant_conversions(op),
        other => unreachable!("clap validated `{}` against ACTIONS", other),
    };
}

pub fn run(args: &ArgMatches) -> Result<(), Error> {
    let function_path = std::path::Path::new(args.value_of("function").unwrap());
    let out_base = std::path::Path::new(args.value_of("output").unwrap());
    let action = args.value_of("action").unwrap();
    let pointer_size: u16 = args
        .value_of("pointer-size")
        .unwrap()
        .parse()
        .map_err(|_| format_err!("--pointer-size must be an integer"))?;
    let null_pointer_value: i64 = args
        .value_of("null-pointer-value")
        .unwrap()
        .parse()
        .map_err(|_| format_err!("--null-pointer-value must be an integer"))?;

    let mut function: Function = read_json(function_path)?;

    if action == "all" {
        // Canonical order: fold trivial computations into copies first (so
        // DCE and phi clean-up see the simplified shape), lower pointers,
        // then enforce structural phi invariants before removing the phis
        // that become redundant as a result, then sweep dead code and
        // finally collapse masked extends into copies.
        for step in [
            "canonicalize-copies",
            "lower-pointers",
            "enforce-phi-invariants",
            "remove-redundant-phis",
            "dce",
            "remove-redundant-conversions",
        ] {
            apply_one(&mut function, step, pointer_size, null_pointer_value);
        }
    } else {
        apply_one(&mut function, action, pointer_size, null_pointer_value);
    }

    write_json(&output_path(out_base, 0), &function)?;
    Ok(())
}
