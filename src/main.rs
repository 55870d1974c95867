//! Runs an adjacency search over binary observations read from standard input.
//!
//! Each line of input is one group of observations: an optional leading count, then the names of
//! the variables that were on, separated by tabs. The surviving adjacencies and the sepset of every
//! removed edge are printed to standard output; progress is logged to standard error (set
//! `RUST_LOG` to adjust).
//!
//! ```bash
//! printf '30\train\twet\n5\train\n20\n' | stable-adjacency --alpha 0.01
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use csv_core::{ReadFieldResult, ReaderBuilder};
use lasso::{Key, Rodeo, RodeoResolver};
use stable_adjacency::*;
use std::io;
use std::str;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stable-adjacency")]
#[command(about = "Find the adjacencies of a causal graph from binary observations")]
struct Args {
    /// Largest conditioning set to try, or -1 for no limit.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    depth: i32,

    /// Significance level of the G² test.
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Number of worker threads (default: one per hardware thread).
    #[arg(long)]
    threads: Option<usize>,

    /// Most first variables one worker handles before splitting its share.
    #[arg(long, default_value_t = 100)]
    chunk_size: usize,

    /// Don't record separating sets.
    #[arg(long)]
    no_sepsets: bool,
}

fn load_data<I: io::Read, V: VariableId + Key + Default>(
    mut input: I,
) -> io::Result<(RodeoResolver<V>, Table<V>)> {
    let mut inputbuf = [0; 16384];
    let mut fieldbuf = [0; 1024];
    let mut fieldlen = 0;
    let mut record = Vec::new();
    let mut count = None;
    let mut table = Table::new();
    let mut rodeo = Rodeo::new();
    let mut tsv = ReaderBuilder::new().delimiter(b'\t').build();

    loop {
        let read = input.read(&mut inputbuf)?;
        let mut bytes = &inputbuf[..read];
        loop {
            let (result, nin, nout) = tsv.read_field(bytes, &mut fieldbuf[fieldlen..]);
            bytes = &bytes[nin..];
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => break,
                ReadFieldResult::OutputFull => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("variable name too long on line {}", tsv.line()),
                    ));
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&fieldbuf[..fieldlen])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    fieldlen = 0;

                    // Only the first field of a line may be a count.
                    let is_count = count.is_none() && {
                        let parsed = field.parse::<f64>().ok();
                        count = Some(parsed.unwrap_or(1.0));
                        parsed.is_some()
                    };
                    if !is_count && !field.is_empty() {
                        record.push(rodeo.get_or_intern(field));
                    }

                    if record_end {
                        let c = count.take().unwrap_or(1.0);
                        if c > 0.0 {
                            table.add_cell(VariableSet::new(&record), c);
                        }
                        record.clear();
                    }
                }
                ReadFieldResult::End => {
                    table.shrink_to_fit();
                    return Ok((rodeo.into_resolver(), table));
                }
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let (names, table) = load_data::<_, lasso::MiniSpur>(io::stdin().lock())
        .context("could not read observations")?;

    let variables = table.variables();
    let summary = table.summary();
    println!("variables: {}", variables.len());
    println!("  sample size: {}", summary.sample_size);
    println!("  uncertainty: {:.5} bits", summary.uncertainty);

    let config = SearchConfig {
        max_depth: args.depth,
        record_sepsets: !args.no_sepsets,
        chunk_size: args.chunk_size,
        threads: args.threads,
        ..SearchConfig::default()
    };
    let test = GSquareTest::new(table, args.alpha)?;
    let search = AdjacencySearch::new(variables.as_slice(), test, NoKnowledge, config)?;
    let outcome = search.search()?;

    println!();
    println!("adjacencies ({}):", outcome.graph.num_edges());
    for edge in outcome.graph.edges() {
        let (a, b) = edge.endpoints();
        println!("  {} -- {}", names.resolve(&a), names.resolve(&b));
    }

    if !args.no_sepsets {
        println!();
        println!("sepsets ({}):", outcome.sepsets.len());
        for ((x, y), sepset) in outcome.sepsets.pairs() {
            let given: Vec<&str> = sepset.iter().map(|v| names.resolve(&v)).collect();
            println!(
                "  {} _||_ {} | {{{}}}",
                names.resolve(&x),
                names.resolve(&y),
                given.join(", ")
            );
        }
    }

    println!();
    println!("depth reached: {}", outcome.depth);
    println!("  edges after each depth: {:?}", outcome.edges_by_depth);
    println!("  independence tests: {}", outcome.independence_tests);
    if outcome.failed_tests > 0 {
        println!("  failed tests: {}", outcome.failed_tests);
    }

    Ok(())
}
