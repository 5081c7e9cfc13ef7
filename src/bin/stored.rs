use std::sync::Arc;
use launchpad_store::engine::{LocalStore, Persistence, Registry};
use launchpad_store::server::Router;
use clap::Parser;
use std::env;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    data_dir: Option<String>,

    #[arg(short, long)]
    port: Option<String>,

    /// Keep documents in memory only; nothing is written to disk.
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data_dir = args.data_dir
        .or_else(|| env::var("LAUNCHPAD_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string());

    let port = args.port
        .or_else(|| env::var("LAUNCHPAD_PORT").ok())
        .unwrap_or_else(|| "7070".to_string());

    let persistence = if args.ephemeral {
        None
    } else {
        Some(Arc::new(Persistence::new(&data_dir)?))
    };
    let store = Arc::new(LocalStore::new(Registry::builtin(), persistence));

    let router = Router::new(store.clone());

    println!("Starting Launchpad document daemon...");
    println!("Serving {} collections.", store.collections().len());
    println!("Launchpad daemon listening on :{} (TCP)", port);

    tokio::select! {
        res = router.listen(&port) => {
            if let Err(e) = res {
                eprintln!("TCP Server failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            println!("\nShutdown signal received. Exiting.");
        }
    }

    Ok(())
}
