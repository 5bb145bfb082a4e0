use crate::generator::workflow::launch;
use anyhow::{Context, Result};
use clap::Parser;

mod cache;
mod cli;
mod config;
mod error;
mod generator;
mod i18n;
mod llm;
mod quota;
mod types;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = args.to_config()?;
    config.resolve_providers();
    let request = args.to_request()?;

    println!(
        "📖 主题：{}，共{}章，目标{}字",
        request.theme, request.chapter_count, request.target_word_count
    );

    let novel = launch(&config, &request).await?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("无法创建输出目录 {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(&novel)?;
    tokio::fs::write(&args.output, content)
        .await
        .with_context(|| format!("无法写入结果文件 {:?}", args.output))?;

    println!("\n🎉 《{}》创作完成", novel.title);
    println!(
        "   章节：{}，总字数：{}，耗时：{:.1}秒",
        novel.chapters.len(),
        novel.generation_stats.total_words,
        novel.generation_stats.total_time
    );
    println!("   结果已保存到 {}", args.output.display());

    Ok(())
}
