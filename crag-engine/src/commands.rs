use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use crag_pipeline::filter::DEFAULT_PRODUCTS;
use crag_pipeline::{ChunkerConfig, SampleOptions};
use crag_vector::{IndexConfig, SearchHit, VectorStore};

use crate::config::{BuildIndexArgs, Command, EmbeddingArgs, EmbeddingBackend, QueryArgs};
use crate::download::download_dataset;
use crate::models::bert::BertEmbedder;
use crate::models::openai::{OpenAiChat, OpenAiConfig, OpenAiEmbedder, DEFAULT_BASE_URL};
use crate::models::tei::{TeiConfig, TeiEmbedder};
use crate::models::{Embedder, GenerationParams, DEFAULT_EMBEDDING_MODEL};
use crate::pipeline::{build_index, preprocess, BuildOptions};
use crate::rag::{product_category, Answer, RagAgent, Retriever};

const RULE: &str = "================================================================================";

/// Execute one CLI command, writing user-facing output to `out`.
pub fn run(command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Download { url, output } => {
            let report = download_dataset(&url, &output)?;
            writeln!(
                out,
                "Saved {} ({} bytes downloaded)",
                output.display(),
                report.bytes_downloaded
            )?;
        }
        Command::Preprocess { input, output, products } => {
            let allowed: Vec<String> = if products.is_empty() {
                DEFAULT_PRODUCTS.iter().map(|s| s.to_string()).collect()
            } else {
                products
            };
            let report = preprocess(&input, &output, &allowed)?;
            writeln!(
                out,
                "Kept {} of {} complaints -> {}",
                report.kept,
                report.input,
                output.display()
            )?;
        }
        Command::BuildIndex(args) => run_build_index(args, out)?,
        Command::Ask { question, product, top_k, query } => {
            let agent = open_agent(&query, top_k)?;
            let answer = agent.ask(&question, product.as_deref(), Some(top_k))?;
            print_answer(out, &answer)?;
        }
        Command::Compare { question, products, k_per_product, query } => {
            let agent = open_agent(&query, k_per_product)?;
            let result = agent.compare(&question, &products, k_per_product)?;
            writeln!(out, "{RULE}\nCOMPARATIVE ANALYSIS:\n{RULE}")?;
            writeln!(out, "Products: {}\n", result.products_compared.join(", "))?;
            writeln!(out, "{}", result.answer)?;
            print_sources(out, &result.sources, 150)?;
        }
        Command::Search { query, product, top_k, index_dir, embedding } => {
            let (store, embedder) = open_store(&index_dir, &embedding)?;
            let retriever = Retriever::new(store, embedder);
            let hits = retriever.retrieve(&query, top_k, product.as_deref())?;
            print_search(out, &query, product.as_deref(), &hits)?;
        }
        Command::ListProducts { index_dir } => list_products(&index_dir, out)?,
        Command::Interactive { top_k, query } => {
            let agent = open_agent(&query, top_k)?;
            let stdin = std::io::stdin();
            interactive(&agent, &mut stdin.lock(), out)?;
        }
    }
    Ok(())
}

fn run_build_index(args: BuildIndexArgs, out: &mut dyn Write) -> Result<()> {
    let model = args
        .embedding
        .embedding_model
        .clone()
        .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
    let embedder = load_embedder(&args.embedding, &model)?;

    let options = BuildOptions {
        sample: SampleOptions {
            target: args.sample_size,
            seed: args.seed,
            ensure_each_category: !args.no_ensure_each_category,
            shuffle: true,
        },
        chunker: ChunkerConfig {
            max_chunk_length: args.chunk_size,
            overlap_length: args.chunk_overlap,
            ..ChunkerConfig::default()
        },
        batch_size: args.batch_size,
    };
    let report = build_index(&args.input, &args.output_dir, &options, embedder.as_ref())?;

    writeln!(
        out,
        "Indexed {} chunks from {} sampled complaints (dimension {}) -> {}",
        report.chunks,
        report.sampled,
        report.dimension,
        args.output_dir.display()
    )?;
    for a in &report.allocations {
        writeln!(out, "  {:<20} {:>6} of {:>7}", a.category, a.take, a.available)?;
    }
    Ok(())
}

fn select_device(args: &EmbeddingArgs) -> Result<candle_core::Device> {
    let device = match args.device.as_str() {
        #[cfg(feature = "cuda")]
        "cuda" => candle_core::Device::new_cuda(args.device_id)?,
        #[cfg(feature = "metal")]
        "metal" => candle_core::Device::new_metal(0)?,
        "cpu" => candle_core::Device::Cpu,
        other => {
            tracing::warn!("Unknown device '{}', falling back to CPU", other);
            candle_core::Device::Cpu
        }
    };
    tracing::info!(device = ?device, device_id = args.device_id, "Compute device selected");
    Ok(device)
}

fn openai_config(args: &EmbeddingArgs) -> OpenAiConfig {
    OpenAiConfig {
        base_url: args
            .openai
            .openai_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_key: args.openai.openai_api_key.clone(),
        timeout_secs: args.openai.http_timeout,
    }
}

/// Build the embedding backend selected on the command line.
pub fn load_embedder(args: &EmbeddingArgs, model: &str) -> Result<Box<dyn Embedder>> {
    let backend = args.embedding_backend.unwrap_or(EmbeddingBackend::Bert);
    tracing::info!(backend = ?backend, model, "Loading embedding backend");
    let embedder: Box<dyn Embedder> = match backend {
        EmbeddingBackend::Bert => {
            let device = select_device(args)?;
            Box::new(BertEmbedder::load(model, args.revision.as_deref(), &device)?)
        }
        EmbeddingBackend::Tei => {
            let base_url = args
                .tei_url
                .clone()
                .context("--tei-url (or CRAG_TEI_URL) is required for the tei backend")?;
            Box::new(TeiEmbedder::new(TeiConfig {
                base_url,
                model: model.to_string(),
                timeout_secs: args.openai.http_timeout,
                ..TeiConfig::default()
            }))
        }
        EmbeddingBackend::Openai => Box::new(OpenAiEmbedder::new(model, openai_config(args))?),
    };
    Ok(embedder)
}

/// Embedding settings for querying an index. Command-line values win, then
/// what the index recorded at build time, then the defaults. The recorded
/// server is only reused when the backend is the recorded one.
pub fn query_embedding(args: &EmbeddingArgs, config: &IndexConfig) -> Result<(EmbeddingArgs, String)> {
    let recorded = config
        .embedding_backend
        .as_deref()
        .map(|name| {
            EmbeddingBackend::from_str(name, true)
                .map_err(|e| anyhow!("index was built with unknown embedding backend '{name}': {e}"))
        })
        .transpose()?;
    let backend = args.embedding_backend.or(recorded).unwrap_or(EmbeddingBackend::Bert);

    let mut resolved = args.clone();
    resolved.embedding_backend = Some(backend);
    if recorded == Some(backend) {
        if let Some(endpoint) = &config.embedding_endpoint {
            match backend {
                EmbeddingBackend::Tei => {
                    resolved.tei_url.get_or_insert_with(|| endpoint.clone());
                }
                EmbeddingBackend::Openai => {
                    resolved.openai.openai_base_url.get_or_insert_with(|| endpoint.clone());
                }
                EmbeddingBackend::Bert => {}
            }
        }
    }
    let model = args
        .embedding_model
        .clone()
        .unwrap_or_else(|| config.embedding_model.clone());
    Ok((resolved, model))
}

fn open_store(index_dir: &Path, args: &EmbeddingArgs) -> Result<(VectorStore, Box<dyn Embedder>)> {
    let store = VectorStore::load(index_dir)
        .with_context(|| format!("Failed to open vector store at {}", index_dir.display()))?;
    let (embedding, model) = query_embedding(args, store.config())?;
    let embedder = load_embedder(&embedding, &model)?;
    Ok((store, embedder))
}

fn open_agent(query: &QueryArgs, default_k: usize) -> Result<RagAgent> {
    let (store, embedder) = open_store(&query.index_dir, &query.embedding)?;
    let generator = OpenAiChat::new(
        GenerationParams {
            model: query.llm.llm_model.clone(),
            temperature: query.llm.temperature,
            max_tokens: query.llm.max_tokens,
        },
        openai_config(&query.embedding),
    )?;
    Ok(RagAgent::new(store, embedder, Box::new(generator), default_k))
}

/// Print product categories with their chunk counts.
pub fn list_products(index_dir: &Path, out: &mut dyn Write) -> Result<()> {
    let store = VectorStore::load(index_dir)
        .with_context(|| format!("Failed to open vector store at {}", index_dir.display()))?;
    let config = store.config();
    let counts = store.product_counts();
    writeln!(
        out,
        "Available products ({}), {} chunks, model {}:",
        counts.len(),
        config.total_chunks,
        config.embedding_model
    )?;
    for (product, chunks) in counts {
        writeln!(out, "  - {product} ({chunks} chunks)")?;
    }
    Ok(())
}

fn print_sources(out: &mut dyn Write, sources: &[SearchHit], preview_chars: usize) -> Result<()> {
    writeln!(out, "\n{RULE}\nSOURCES ({} relevant complaint chunks):\n{RULE}", sources.len())?;
    for (i, hit) in sources.iter().enumerate() {
        let m = &hit.metadata;
        writeln!(out, "\n{}. Product: {}", i + 1, m.product_category)?;
        writeln!(out, "   Issue: {}", m.issue.as_deref().unwrap_or("Unknown"))?;
        writeln!(
            out,
            "   Complaint: {} (chunk {}/{}), score {:.3}",
            m.source_id,
            m.chunk_index + 1,
            m.total_chunks,
            hit.score
        )?;
        writeln!(out, "   Preview: {}...", crate::rag::prompt::preview(&m.text, preview_chars))?;
    }
    Ok(())
}

fn print_search(out: &mut dyn Write, query: &str, product: Option<&str>, hits: &[SearchHit]) -> Result<()> {
    writeln!(out, "Query: {query}")?;
    if let Some(product) = product {
        writeln!(out, "(filtered to {})", product_category(product))?;
    }
    print_sources(out, hits, 200)
}

fn print_answer(out: &mut dyn Write, answer: &Answer) -> Result<()> {
    writeln!(out, "{RULE}\nANSWER:\n{RULE}")?;
    if let Some(product) = &answer.product_filter {
        writeln!(out, "(filtered to {product})")?;
    }
    writeln!(out, "{}", answer.answer)?;
    print_sources(out, &answer.sources, 200)
}

/// Question loop. `help` and `products` are built in; `exit` or `quit` ends it.
/// Errors from a single question are reported and the loop continues.
pub fn interactive(agent: &RagAgent, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let products = agent.products();
    writeln!(out, "Type 'exit' or 'quit' to exit, 'help' for commands")?;
    writeln!(out, "Available products: {}", products.join(", "))?;

    let mut line = String::new();
    loop {
        write!(out, "\n> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        match question.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "help" => {
                writeln!(out, "Commands:")?;
                writeln!(out, "  - Ask any question about complaints")?;
                writeln!(out, "  - Type 'products' to see available products")?;
                writeln!(out, "  - Type 'exit' or 'quit' to exit")?;
            }
            "products" => writeln!(out, "Available products: {}", products.join(", "))?,
            _ => match agent.ask(question, None, None) {
                Ok(answer) => {
                    writeln!(out, "\n{}", answer.answer)?;
                    writeln!(out, "\n(Based on {} relevant complaint chunks)", answer.sources.len())?;
                }
                Err(e) => {
                    tracing::error!(code = e.code(), "Query failed: {}", e);
                    writeln!(out, "Error: {e}")?;
                }
            },
        }
    }
    writeln!(out, "Goodbye!")?;
    Ok(())
}
