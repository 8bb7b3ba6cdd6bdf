//! 命令行入口
//!
//! `preview` 子命令解析本地页面，执行提取、分组和批次编码，
//! 把计划发出的请求以 JSON 输出，不连接任何翻译服务。

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use page_translator::env::{core::LogLevel, EnvVar};
use page_translator::parsers::html_to_dom;
use page_translator::translation::config::{BlocksPerRequest, ConfigManager};
use page_translator::translation::pipeline::{group, BatchRequest, Block, Extractor};
use page_translator::translation::{TranslationError, TranslationResult};

#[derive(Parser, Debug)]
#[command(
    name = "page-translator",
    version,
    about = "Progressive in-place webpage translation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the translation requests a page would produce
    Preview {
        /// Path to an HTML file
        input: PathBuf,

        /// Blocks per request (3, 5 or 8)
        #[arg(short = 'b', long)]
        blocks_per_request: Option<usize>,

        /// Character encoding of the input document
        #[arg(short = 'e', long, default_value = "utf-8")]
        encoding: String,

        /// Configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewItem {
    tag: String,
    depth: usize,
    has_links: bool,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewBlock {
    id: usize,
    items: Vec<PreviewItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewBatch {
    index: usize,
    blocks: Vec<PreviewBlock>,
    request: BatchRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewReport {
    total_items: usize,
    total_blocks: usize,
    blocks_per_request: usize,
    batches: Vec<PreviewBatch>,
}

fn init_logging() {
    let level = LogLevel::get_or_default("warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn preview_block(block: &Block) -> PreviewBlock {
    PreviewBlock {
        id: block.id,
        items: block
            .items
            .iter()
            .map(|item| PreviewItem {
                tag: item.tag_name.clone(),
                depth: item.depth,
                has_links: item.has_links,
                text: item.original_text.clone(),
            })
            .collect(),
    }
}

fn preview(
    input: PathBuf,
    blocks_per_request: Option<usize>,
    encoding: String,
    config: Option<PathBuf>,
) -> TranslationResult<PreviewReport> {
    let manager = match config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    let config = manager.into_config();

    let per_request = match blocks_per_request {
        Some(value) => BlocksPerRequest::try_from(value)?,
        None => config.request.blocks_per_request,
    };

    let data = fs::read(&input).map_err(|e| {
        TranslationError::InvalidInput(format!(
            "无法读取 {}: {}",
            input.display(),
            e
        ))
    })?;
    let dom = html_to_dom(&data, &encoding).map_err(|e| {
        TranslationError::InvalidInput(format!(
            "无法解析 {}: {}",
            input.display(),
            e
        ))
    })?;

    let mut extractor = Extractor::new(config.extraction.clone());
    let items = extractor.extract(&dom.document);
    let total_items = items.len();
    tracing::info!("提取到 {} 个单元: {:?}", total_items, extractor.stats());

    let blocks = group(items, &config.grouping);
    let total_blocks = blocks.len();

    let batches = blocks
        .chunks(per_request.get())
        .enumerate()
        .map(|(index, chunk)| PreviewBatch {
            index,
            blocks: chunk.iter().map(preview_block).collect(),
            request: BatchRequest::from_blocks(chunk),
        })
        .collect();

    Ok(PreviewReport {
        total_items,
        total_blocks,
        blocks_per_request: per_request.get(),
        batches,
    })
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Preview {
            input,
            blocks_per_request,
            encoding,
            config,
        } => preview(input, blocks_per_request, encoding, config).and_then(|report| {
            serde_json::to_string_pretty(&report).map_err(Into::into)
        }),
    };

    match result {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
