use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blendrag_core::config::Config;
use blendrag_core::data_processor::DataProcessor;
use blendrag_core::types::FusedResult;
use blendrag_hybrid::Engine;

const USAGE: &str = "Usage: blendrag <command> [args...]

Commands:
  ingest <file|dir> [--id <document_id>]
  query <document_id> <query...> [--top-k N] [--no-refine] [--iterative] [--json]
  ask <document_id> <question...> [--top-k N] [--json]
  delete <document_id>";

#[derive(Default)]
struct Flags {
    positional: Vec<String>,
    top_k: Option<usize>,
    id: Option<String>,
    no_refine: bool,
    iterative: bool,
    json: bool,
}

fn parse_flags(args: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => {
                let value = args.get(i + 1).context("--top-k requires a number")?;
                flags.top_k = Some(value.parse().with_context(|| format!("invalid --top-k '{value}'"))?);
                i += 1;
            }
            "--id" => {
                flags.id = Some(args.get(i + 1).context("--id requires a value")?.clone());
                i += 1;
            }
            "--no-refine" => flags.no_refine = true,
            "--iterative" => flags.iterative = true,
            "--json" => flags.json = true,
            other if other.starts_with("--") => bail!("unknown flag {other}\n\n{USAGE}"),
            other => flags.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(flags)
}

fn print_result(result: &FusedResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if result.is_empty() {
        println!("No matching chunks.");
    }
    for (i, chunk) in result.chunks.iter().enumerate() {
        println!("\n  {}. score={:.4}  id={}", i + 1, chunk.fused_score, chunk.chunk_id);
        println!("     {}", chunk.text);
    }
    Ok(())
}

async fn ingest(engine: &Engine, flags: &Flags) -> Result<()> {
    let path = flags.positional.first().map(PathBuf::from).context(USAGE)?;
    let processor = DataProcessor::with_config(engine.settings.chunking.clone());
    let documents = if path.is_dir() {
        processor.process_directory(&path)?
    } else {
        let document_id = flags.id.clone().unwrap_or_else(|| DataProcessor::document_id_for(&path));
        vec![(document_id.clone(), processor.process_file(&document_id, &path)?)]
    };

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?);
    let mut total = 0;
    for (document_id, chunks) in &documents {
        pb.set_message(document_id.clone());
        total += engine.ingestor.ingest(document_id, chunks).await?.chunks;
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("Ingested {} documents ({} chunks)", documents.len(), total);
    Ok(())
}

async fn query(engine: &Engine, flags: &Flags) -> Result<()> {
    let (document_id, text) = document_and_text(flags)?;
    let top_k = flags.top_k.unwrap_or(engine.settings.retrieval.top_k);
    let result = if flags.iterative {
        let trace = engine.iterative.run(&document_id, &text, top_k).await?;
        info!(rounds = trace.rounds, accepted = trace.accepted, "iterative query");
        trace.result
    } else {
        engine.blended.retrieve(&document_id, &text, top_k, !flags.no_refine).await?
    };
    print_result(&result, flags.json)
}

async fn ask(engine: &Engine, flags: &Flags) -> Result<()> {
    let (document_id, text) = document_and_text(flags)?;
    let top_k = flags.top_k.unwrap_or(engine.settings.retrieval.top_k);
    let answer = engine.answers.ask(&document_id, &text, top_k).await?;
    if flags.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }
    println!("{}", answer.answer);
    println!("\nSources:");
    for chunk in &answer.chunks {
        println!("  - {} (score {:.4})", chunk.chunk_id, chunk.fused_score);
    }
    Ok(())
}

fn document_and_text(flags: &Flags) -> Result<(String, String)> {
    match flags.positional.split_first() {
        Some((doc, rest)) if !rest.is_empty() => Ok((doc.clone(), rest.join(" "))),
        _ => bail!("{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    let flags = parse_flags(&args)?;

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let engine = Engine::open(config.settings()?).await?;

    match cmd.as_str() {
        "ingest" => ingest(&engine, &flags).await,
        "query" => query(&engine, &flags).await,
        "ask" => ask(&engine, &flags).await,
        "delete" => {
            let document_id = flags.positional.first().context(USAGE)?;
            engine.ingestor.delete(document_id).await?;
            println!("Deleted {document_id}");
            Ok(())
        }
        _ => bail!("unknown command '{cmd}'\n\n{USAGE}"),
    }
}
