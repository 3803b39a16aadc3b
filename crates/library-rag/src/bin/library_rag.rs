//! Interactive question loop over a folder of text documents
//!
//! Run with: cargo run -p library-rag -- --contexts ./contexts

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_rag::config::{IndexBackendKind, RagConfig};
use library_rag::ingestion::{DocumentLoader, TextChunker};
use library_rag::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use library_rag::{Indexer, Pipeline, VectorIndexClient};

const PROMPT: &str = "Query > ";
const EXIT_COMMANDS: [&str; 3] = [":quit", ":q", "exit"];

#[derive(Parser, Debug)]
#[command(
    name = "library-rag",
    version,
    about = "Index a folder of text files and answer questions about them"
)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "LIBRARY_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of documents to index
    #[arg(long)]
    contexts: Option<PathBuf>,

    /// Glob selecting which files under the directory are documents
    #[arg(long)]
    glob: Option<String>,

    /// Name of the index to rebuild
    #[arg(long)]
    index_name: Option<String>,

    /// Index service (pinecone or memory)
    #[arg(long)]
    backend: Option<IndexBackendKind>,

    /// Number of chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Maximum chunk size in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by neighboring chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut RagConfig) {
        if let Some(dir) = &self.contexts {
            config.ingest.contexts_dir = dir.clone();
        }
        if let Some(glob) = &self.glob {
            config.ingest.glob = glob.clone();
        }
        if let Some(name) = &self.index_name {
            config.index.name = name.clone();
        }
        if let Some(backend) = self.backend {
            config.index.backend = backend;
        }
        if let Some(k) = self.top_k {
            config.retrieval.top_k = k;
        }
        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.chunk_overlap = overlap;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = RagConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Documents: {}", config.ingest.contexts_dir.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!("  - Index: {} ({:?})", config.index.name, config.index.backend);
    tracing::info!(
        "  - Chunk size: {}, overlap: {}, top k: {}",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.retrieval.top_k
    );

    let (embedder, llm) = OllamaProvider::new(&config.llm, &config.embeddings)?.split();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(embedder);
    let llm: Arc<dyn LlmProvider> = Arc::new(llm);

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    match llm.health_check().await {
        Ok(true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!(
                "  Pull models: ollama pull {} && ollama pull {}",
                config.embeddings.model,
                config.llm.chat_model
            );
        }
    }

    let documents = DocumentLoader::from_config(&config.ingest)?.load()?;
    let index = Arc::new(VectorIndexClient::from_config(&config.index)?);
    let indexer = Indexer::new(
        TextChunker::from_config(&config.chunking)?,
        Arc::clone(&embedder),
        Arc::clone(&index),
        &config.index,
    );

    let report = indexer.build(&documents).await.context("Index build failed")?;
    tracing::info!(
        "Indexed {} documents as {} chunks into '{}'",
        report.documents,
        report.chunks,
        report.handle.name
    );

    let pipeline = Pipeline::for_index(embedder, llm, index, report.handle, config.retrieval.top_k);

    run_loop(&pipeline).await?;
    Ok(())
}

/// Writes output as it arrives; the first failed write closes it for good
struct FragmentPrinter<W: Write> {
    out: W,
    closed: bool,
}

impl<W: Write> FragmentPrinter<W> {
    fn new(out: W) -> Self {
        Self { out, closed: false }
    }

    fn print(&mut self, text: &str) {
        if self.closed {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::debug!(error = %e, "Stdout closed, dropping output");
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Read questions line by line until EOF, an exit command, Ctrl-C or stdout closing
async fn run_loop(pipeline: &Pipeline) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = FragmentPrinter::new(std::io::stdout());

    loop {
        printer.print(PROMPT);
        if printer.is_closed() {
            break;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(line) = line else {
            printer.print("\n");
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&question) {
            break;
        }

        let mut on_fragment = |fragment: &str| printer.print(fragment);
        let outcome = tokio::select! {
            result = pipeline.run(question, &mut on_fragment) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        printer.print("\n");
        match outcome {
            Some(Ok(_)) => {}
            Some(Err(e)) => eprintln!("Error: {}", e),
            None => break,
        }
        if printer.is_closed() {
            break;
        }
    }

    tracing::info!("Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `remaining` writes, then fails like a closed pipe
    struct ClosingWriter {
        remaining: usize,
        attempts: usize,
        written: Vec<u8>,
    }

    impl Write for ClosingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            if self.remaining == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            self.remaining -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_printer_writes_fragments_in_order() {
        let mut printer = FragmentPrinter::new(Vec::new());
        printer.print("The sky");
        printer.print(" is blue.");

        assert!(!printer.is_closed());
        assert_eq!(printer.out, b"The sky is blue.");
    }

    #[test]
    fn test_printer_stops_after_broken_pipe() {
        let mut printer = FragmentPrinter::new(ClosingWriter {
            remaining: 1,
            attempts: 0,
            written: Vec::new(),
        });

        printer.print("The sky");
        printer.print(" is");
        printer.print(" blue.");

        assert!(printer.is_closed());
        assert_eq!(printer.out.written, b"The sky");
        assert_eq!(printer.out.attempts, 2);
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(["library-rag", "--backend", "memory", "--top-k", "2", "--chunk-overlap", "50"]);
        let mut config = RagConfig::default();
        args.apply(&mut config);

        assert_eq!(config.index.backend, IndexBackendKind::Memory);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.chunking.chunk_overlap, 50);
    }
}
