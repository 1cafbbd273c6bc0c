use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyrag::{
    api, config, logging,
    processing::{IngestOutcome, RagPipeline, load_documents},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "rusty-rag",
    about = "Chunk documents into Qdrant and answer questions from retrieved context"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Ingest a markdown/text file or every such file below a directory.
    Ingest { path: PathBuf },
    /// Print the passages retrieved for a query.
    Retrieve {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer a query from retrieved context.
    Ask {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the number of stored chunks.
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("failed to load configuration")?;
    let pipeline = RagPipeline::from_config(config).context("failed to build pipeline")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            pipeline
                .ensure_ready()
                .await
                .context("failed to prepare collection")?;
            let app = api::create_router(Arc::new(pipeline));
            let (listener, port) = bind_listener(config.server_port)
                .await
                .context("failed to bind listener")?;
            tracing::info!("Listening on http://0.0.0.0:{}", port);
            axum::serve(listener, app).await.context("server error")?;
        }
        Command::Ingest { path } => {
            let documents = load_documents(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            match pipeline.ingest_all(&documents).await? {
                IngestOutcome::Indexed { chunks, upserted } => println!(
                    "Indexed {} document(s): {chunks} chunk(s), {upserted} upserted",
                    documents.len()
                ),
                IngestOutcome::Skipped { existing } => println!(
                    "Collection already holds {existing} point(s); ingestion skipped"
                ),
            }
        }
        Command::Retrieve { query, top_k } => {
            let bundle = pipeline.retrieve(&query, top_k).await?;
            if bundle.is_empty() {
                println!("No passages found.");
            }
            for (rank, context) in bundle.contexts.iter().enumerate() {
                println!("--- Result {} ---\n{context}\n", rank + 1);
            }
            print_sources(&bundle.sources);
        }
        Command::Ask { query, top_k } => {
            let answer = pipeline.answer(&query, top_k).await?;
            println!("{}", answer.text);
            print_sources(&answer.context.sources);
        }
        Command::Count => println!("{}", pipeline.count().await?),
    }
    Ok(())
}

fn print_sources(sources: &std::collections::BTreeSet<String>) {
    if !sources.is_empty() {
        let joined: Vec<_> = sources.iter().map(String::as_str).collect();
        println!("Sources: {}", joined.join(", "));
    }
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
