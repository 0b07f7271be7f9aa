//! `icsel plot`: renders a [`Graph`](icsel_core::graph::Graph) as Graphviz
//! DOT, one node per graph node (labeled with its kind and public ID) and
//! one edge per graph edge (labeled with its kind and edge-number pair).
//! Named in §6's CLI surface but given no body there; this is the
//! text-art convenience the spec leaves to the reference driver.

use super::{output_path, read_json, write_text};
use clap::{App, Arg, ArgMatches, SubCommand};
use failure::Error;
use icsel_core::function::Function;
use icsel_core::graph::Graph;
use icsel_core::opstructure::OpStructure;
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use std::path::Path;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("plot")
        .about("Render a graph as Graphviz DOT")
        .arg(
            Arg::with_name("kind")
                .long("kind")
                .takes_value(true)
                .possible_values(&["function", "opstructure"])
                .default_value("function")
                .help("Whether --input is a Function or a bare OpStructure"),
        )
        .arg(
            Arg::with_name("input")
                .long("input")
                .takes_value(true)
                .required(true)
                .help("Path to the JSON file to plot"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("Base output path; the rendered DOT is written with output ID 0"),
        )
}

fn node_label(g: &Graph, n: icsel_core::graph::NodeRef) -> String {
    format!("#{}: {}", g.pub_id(n), g.node_kind(n).tag())
}

fn edge_label(g: &Graph, e: icsel_core::graph::EdgeRef) -> String {
    let (out_num, in_num) = g.edge_numbers(e);
    format!("{}[{}/{}]", g.edge_kind(e), out_num, in_num)
}

/// Builds a `petgraph` graph mirroring `g`'s nodes and edges, purely for DOT
/// rendering; `icsel-core`'s own graph representation never depends on
/// `petgraph`.
fn to_petgraph(g: &Graph) -> DiGraph<String, String> {
    let mut pg = DiGraph::new();
    let mut index_of = HashMap::new();
    for n in g.nodes() {
        index_of.insert(n, pg.add_node(node_label(g, n)));
    }
    for e in g.edges() {
        let (src, dst) = g.edge_endpoints(e);
        pg.add_edge(index_of[&src], index_of[&dst], edge_label(g, e));
    }
    pg
}

pub fn run(args: &ArgMatches) -> Result<(), Error> {
    let input_path = Path::new(args.value_of("input").unwrap());
    let out_base = Path::new(args.value_of("output").unwrap());

    let graph = match args.value_of("kind").unwrap() {
        "function" => {
            let function: Function = read_json(input_path)?;
            function.op_structure.graph
        }
        "opstructure" => {
            let op_structure: OpStructure = read_json(input_path)?;
            op_structure.graph
        }
        other => unreachable!("clap validated `{}` against possible kinds", other),
    };

    let pg = to_petgraph(&graph);
    let rendered = format!("{:?}", Dot::new(&pg));
    write_text(&output_path(out_base, 0), &rendered)?;
    Ok(())
}
