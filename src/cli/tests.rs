use crate::cli::Args;
use crate::config::LLMProvider;
use crate::i18n::TargetLanguage;
use crate::types::request::{Genre, WritingStyle};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const THEME: &str = "一个关于时间旅行的故事";

#[test]
fn test_args_default_values() {
    let args = Args::try_parse_from(["novel-forge", "--theme", THEME]).unwrap();

    assert_eq!(args.theme, THEME);
    assert_eq!(args.style, "zhihu");
    assert_eq!(args.words, 10000);
    assert_eq!(args.chapters, 5);
    assert_eq!(args.output, PathBuf::from("./novel.json"));
    assert!(args.genre.is_none());
    assert!(!args.verbose);
    assert!(!args.no_cache);
    assert!(!args.review_outline);
}

#[test]
fn test_theme_is_required() {
    assert!(Args::try_parse_from(["novel-forge"]).is_err());
}

#[test]
fn test_args_short_options() {
    let args = Args::try_parse_from([
        "novel-forge",
        "-t",
        THEME,
        "-g",
        "scifi",
        "-s",
        "literary",
        "-w",
        "30000",
        "-n",
        "10",
        "-o",
        "/tmp/out.json",
        "-v",
    ])
    .unwrap();

    assert_eq!(args.genre.as_deref(), Some("scifi"));
    assert_eq!(args.words, 30000);
    assert_eq!(args.chapters, 10);
    assert_eq!(args.output, PathBuf::from("/tmp/out.json"));
    assert!(args.verbose);
}

#[test]
fn test_request_from_args() {
    let args = Args::try_parse_from([
        "novel-forge",
        "--theme",
        THEME,
        "--genre",
        "mystery",
        "--style",
        "suspenseful",
        "--audience",
        "推理爱好者",
        "--user-id",
        "u-42",
    ])
    .unwrap();

    let request = args.to_request().unwrap();
    assert_eq!(request.genre, Some(Genre::Mystery));
    assert_eq!(request.style, WritingStyle::Suspenseful);
    assert_eq!(request.target_audience, "推理爱好者");
    assert_eq!(request.user_id.as_deref(), Some("u-42"));
    assert_eq!(request.words_per_chapter(), 2000);
}

#[test]
fn test_invalid_request_is_rejected() {
    let args =
        Args::try_parse_from(["novel-forge", "--theme", THEME, "--words", "1000"]).unwrap();
    assert!(args.to_request().is_err());

    let args = Args::try_parse_from(["novel-forge", "--theme", THEME, "--genre", "western"])
        .unwrap();
    assert!(args.to_request().is_err());
}

#[test]
fn test_overrides_apply_to_config() {
    let args = Args::try_parse_from([
        "novel-forge",
        "--theme",
        THEME,
        "--max-iterations",
        "0",
        "--review-threshold",
        "0.9",
        "--max-parallels",
        "5",
        "--target-language",
        "en",
        "--review-outline",
        "--no-cache",
    ])
    .unwrap();

    let config = args.to_config().unwrap();
    assert_eq!(config.agent.max_iterations, 1);
    assert_eq!(config.agent.review_threshold, 0.9);
    assert_eq!(config.agent.max_parallels, 5);
    assert!(config.agent.review_outline);
    assert_eq!(config.target_language, TargetLanguage::English);
    assert!(!config.cache.enabled);
}

#[test]
fn test_single_provider_override() {
    let args = Args::try_parse_from([
        "novel-forge",
        "--theme",
        THEME,
        "--llm-provider",
        "deepseek",
        "--model",
        "deepseek-chat",
        "--llm-api-key",
        "sk-test",
    ])
    .unwrap();

    let config = args.to_config().unwrap();
    assert_eq!(config.providers.len(), 1);
    let provider = &config.providers[0];
    assert_eq!(provider.name, "deepseek");
    assert_eq!(provider.provider, LLMProvider::DeepSeek);
    assert_eq!(provider.model, "deepseek-chat");
    assert_eq!(provider.api_key, "sk-test");
    assert!(provider.is_default);
}

#[test]
fn test_provider_override_requires_model() {
    let args = Args::try_parse_from([
        "novel-forge",
        "--theme",
        THEME,
        "--llm-provider",
        "openai",
    ])
    .unwrap();
    assert!(args.to_config().is_err());
}

#[test]
fn test_config_file_is_loaded() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[agent]\nmax_iterations = 2\n\n[[providers]]\nname = \"claude\"\nprovider = \"anthropic\"\nmodel = \"claude-3-sonnet-20240229\"\nlong_context = true"
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();

    let args = Args::try_parse_from(["novel-forge", "--theme", THEME, "--config", &path]).unwrap();
    let config = args.to_config().unwrap();
    assert_eq!(config.agent.max_iterations, 2);
    assert_eq!(config.providers[0].name, "claude");
    assert!(config.providers[0].long_context);

    let missing = Args::try_parse_from([
        "novel-forge",
        "--theme",
        THEME,
        "--config",
        "/definitely/not/here.toml",
    ])
    .unwrap();
    assert!(missing.to_config().is_err());
}
