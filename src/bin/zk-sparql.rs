//! zk-SPARQL - CLI
//!
//! Loads credential datasets into an in-memory store, runs one query and
//! prints the JSON result to stdout. Logs go to stderr.

use std::fs;
use std::path::Path;

use clap::{Arg, ArgAction, Command, value_parser};
use oxigraph::io::RdfFormat;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use zk_sparql::{OxigraphStore, Processor, ProcessorConfig, SAMPLE_DATASET};

fn read_query(arg: &str) -> std::io::Result<String> {
    let path = Path::new(arg);
    if path.exists() {
        fs::read_to_string(path)
    } else {
        Ok(arg.to_string())
    }
}

fn load_dataset(store: &OxigraphStore, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(RdfFormat::from_extension)
        .ok_or_else(|| format!("Cannot tell RDF format of {}", path))?;
    store.load(format, fs::File::open(path)?)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zk_sparql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("zk-sparql")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Selective-disclosure SPARQL over signed RDF credentials")
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("QUERY")
                .help("SPARQL query string or path to .rq file")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .value_name("FILE")
                .help("RDF dataset to load (TriG, N-Quads...); defaults to the bundled sample credentials")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON processor configuration")
                .num_args(1),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .help("Seed for placeholders and proof graph ids")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("plain")
                .long("plain")
                .help("Run as a plain SPARQL query without selective disclosure")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let query = match matches.get_one::<String>("query") {
        Some(q) => read_query(q)?,
        None => return Err("No query specified. Use -q <query> or -q <path/to/query.rq>".into()),
    };

    let store = OxigraphStore::new()?;
    match matches.get_many::<String>("data") {
        Some(paths) => {
            for path in paths {
                load_dataset(&store, path)?;
            }
        }
        None => {
            store.load(RdfFormat::TriG, SAMPLE_DATASET.as_bytes())?;
        }
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => ProcessorConfig::from_json(&fs::read_to_string(path)?)?,
        None => ProcessorConfig::default(),
    };
    let processor = Processor::with_oxigraph(store).with_config(config);

    let output = if matches.get_flag("plain") {
        processor.process_sparql_query(&query).await?
    } else {
        let mut rng = match matches.get_one::<u64>("seed") {
            Some(seed) => StdRng::seed_from_u64(*seed),
            None => StdRng::from_os_rng(),
        };
        processor.process_query(&query, &mut rng).await?.to_json()?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
