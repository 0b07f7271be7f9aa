//! `icsel check`: validates the §8 universal invariants and the §4.2
//! op-structure precondition against a function on disk, one check at a
//! time, stopping at the first failure (§6: "non-zero indicates the first
//! failing action").

use super::read_json;
use clap::{App, Arg, ArgMatches, SubCommand};
use failure::{format_err, Error};
use icsel_core::function::Function;
use icsel_core::graph::{Direction, EdgeKind, Graph};
use std::path::Path;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("check")
        .about("Validate structural invariants of a function's op-structure")
        .arg(
            Arg::with_name("function")
                .long("function")
                .takes_value(true)
                .required(true)
                .help("Path to a Function JSON file"),
        )
}

/// §8's universal invariant: for every node and edge kind, the sorted list
/// of in-/out-edge numbers is contiguous starting at 0.
fn check_edge_numbers_contiguous(g: &Graph) -> Result<(), Error> {
    for n in g.nodes() {
        for kind in EdgeKind::ALL {
            for dir in [Direction::Out, Direction::In] {
                let nums = g.edge_numbers_of(n, kind, dir);
                let expected: Vec<u32> = (0..nums.len() as u32).collect();
                if nums != expected {
                    return Err(format_err!(
                        "node {:?}, kind {:?}, direction {:?}: edge numbers {:?} are not contiguous from 0",
                        n,
                        kind,
                        dir,
                        nums
                    ));
                }
            }
        }
    }
    Ok(())
}

/// §4.2's op-structure invariant: every ID named inside the constraint list
/// refers to a node present in the graph.
fn check_constraint_ids_resolve(function: &Function) -> Result<(), Error> {
    if !function.op_structure.validate_ids_in_graph() {
        return Err(format_err!(
            "a constraint names a node ID that is not present in the graph"
        ));
    }
    Ok(())
}

/// The CFG projection must have exactly one rootless block (`root_of_cfg`'s
/// documented precondition); a function with zero or multiple roots can
/// never have its dominator sets computed.
fn check_cfg_has_unique_root(g: &Graph) -> Result<(), Error> {
    if g.nodes().all(|n| !g.node_kind(n).is_block()) {
        // No blocks at all (e.g. a bare pattern graph fragment): nothing to
        // root, and nothing to complain about either.
        return Ok(());
    }
    g.root_of_cfg().map(|_| ()).map_err(|e| format_err!("{}", e))
}

pub fn run(args: &ArgMatches) -> Result<(), Error> {
    let function_path = Path::new(args.value_of("function").unwrap());
    let function: Function = read_json(function_path)?;
    let g = &function.op_structure.graph;

    check_edge_numbers_contiguous(g)?;
    log::info!("edge-number contiguity: ok");
    check_constraint_ids_resolve(&function)?;
    log::info!("constraint ID resolution: ok");
    check_cfg_has_unique_root(g)?;
    log::info!("CFG root uniqueness: ok");

    println!("ok: {}", function_path.display());
    Ok(())
}
