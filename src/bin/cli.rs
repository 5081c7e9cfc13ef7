use launchpad_store::{collection, doc, filter, order_by, query, sdk, Clause, Direction, Document, Fields, FilterOp, Timestamp};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::env;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// List the registered collections.
    Collections,
    /// Query a collection.
    Query {
        collection: String,
        /// Sort key as `field` or `field:desc`. May be repeated.
        #[arg(long = "order-by")]
        order_by: Vec<String>,
        /// Filter as `"field op value"`, op one of == < <= > >=. May be repeated.
        #[arg(long = "where")]
        filters: Vec<String>,
    },
    Add {
        collection: String,
        data: String,
        /// Set this field to the current time.
        #[arg(long)]
        timestamp: Option<String>,
    },
    Update { collection: String, id: String, data: String },
    Del { collection: String, id: String },
    /// Forget local changes to a collection and return to its defaults.
    Reset { collection: String },
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_fields(raw: &str) -> anyhow::Result<Fields> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("document data must be a JSON object"),
    }
}

fn parse_order(raw: &str) -> anyhow::Result<Clause> {
    let (field, direction) = match raw.rsplit_once(':') {
        Some((field, dir)) => (field, dir.parse::<Direction>()?),
        None => (raw, Direction::Asc),
    };
    Ok(order_by(field, direction))
}

fn parse_filter(raw: &str) -> anyhow::Result<Clause> {
    let mut parts = raw.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(field), Some(op), Some(value)) => {
            Ok(filter(field, op.parse::<FilterOp>()?, parse_value(value)))
        }
        _ => anyhow::bail!("filter must look like \"field op value\": {}", raw),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let data_dir = cli.data_dir
        .or_else(|| env::var("LAUNCHPAD_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string());
    let store = sdk::new(&data_dir)?;

    match cli.command {
        Commands::Collections => {
            println!("{}", serde_json::to_string_pretty(&store.local().collections())?);
        }
        Commands::Query { collection: name, order_by, filters } => {
            let mut clauses = Vec::new();
            for raw in &filters {
                clauses.push(parse_filter(raw)?);
            }
            for raw in &order_by {
                clauses.push(parse_order(raw)?);
            }
            let snapshots = store.get_docs(&query(&collection(name), clauses)).await?;
            let docs: Vec<Document> = snapshots
                .into_iter()
                .map(|s| Document::new(s.id().to_string(), s.into_data()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        Commands::Add { collection: name, data, timestamp } => {
            let mut fields = parse_fields(&data)?;
            if let Some(field) = timestamp {
                fields.insert(field, Timestamp::now().into());
            }
            let r = store.add_doc(&collection(name), fields).await?;
            println!("{}", r.id());
        }
        Commands::Update { collection, id, data } => {
            store.update_doc(&doc(collection, id), parse_fields(&data)?).await?;
            println!("OK");
        }
        Commands::Del { collection, id } => {
            store.delete_doc(&doc(collection, id)).await?;
            println!("OK");
        }
        Commands::Reset { collection } => {
            store.local().reset(&collection)?;
            println!("OK");
        }
    }

    Ok(())
}
