// ABOUTME: Command-line client for the LLM gateway
// ABOUTME: Sends one-off prompts and prints platform/model info using environment configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Glimmer Contributors
//!
//! Usage:
//! ```bash
//! # Ask the configured platform (LLM_PLATFORM, default ollama)
//! glimmer-llm chat "Why is the sky blue?"
//!
//! # With a system prompt and explicit model, bypassing the cache
//! glimmer-llm chat "Summarize Rust ownership" --system "Be brief." --model gpt-4o-mini --no-cache
//!
//! # Refresh a cached answer
//! glimmer-llm chat "Why is the sky blue?" --refresh
//!
//! # Show the platform and its models
//! glimmer-llm info
//!
//! # Delete expired rows from the persistent cache (LLM_CACHE_BACKEND=persistent)
//! glimmer-llm clean-cache
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use glimmer::config::{DatabaseConfig, LlmConfig};
use glimmer::database::Database;
use glimmer::llm::{ChatOptions, LlmService};
use glimmer::logging::LoggingConfig;

#[derive(Parser)]
#[command(
    name = "glimmer-llm",
    about = "Glimmer LLM gateway CLI",
    long_about = "Send prompts to the configured language-model platform and inspect its models."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database URL override (used by the persistent cache backend)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Send a single prompt
    Chat {
        /// Prompt text
        prompt: String,

        /// System prompt
        #[arg(long, short = 's', default_value = "")]
        system: String,

        /// Model override
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// Bypass the cache entirely
        #[arg(long)]
        no_cache: bool,

        /// Skip the cache read but store the fresh answer
        #[arg(long)]
        refresh: bool,
    },
    /// Show the configured platform and its models
    Info,
    /// Delete expired entries from the persistent cache
    ///
    /// The in-memory cache lives only as long as one process, so this
    /// requires the persistent backend.
    CleanCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        logging.level = "debug".to_owned();
    }
    logging.init()?;

    let config = LlmConfig::from_env();
    let database = if config.cache.is_persistent() {
        let mut db_config = DatabaseConfig::from_env();
        if let Some(url) = cli.database_url {
            db_config.url = url;
        }
        Some(Database::new(&db_config).await?)
    } else {
        None
    };

    let service = LlmService::with_database(&config, database.as_ref())?;

    match cli.command {
        Command::Chat {
            prompt,
            system,
            model,
            no_cache,
            refresh,
        } => {
            let mut options = ChatOptions::default().with_cache(refresh, no_cache);
            if let Some(model) = model {
                options = options.with_model(model);
            }

            let response = service.chat(&prompt, &system, options).await?;
            debug!(usage = ?response.usage, "Chat finished");

            println!("{}", response.text);
            eprintln!(
                "\n[{}] {} prompt + {} completion = {} tokens, ${:.6}{}",
                response.usage.model_name,
                response.usage.prompt_tokens,
                response.usage.completion_tokens,
                response.usage.total_tokens,
                response.usage.cost,
                if response.usage.cache_hit { " (cached)" } else { "" }
            );
        }
        Command::Info => {
            let info = service.info().await;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::CleanCache => {
            if database.is_none() {
                bail!(
                    "clean-cache needs the persistent cache: set LLM_CACHE_ENABLED=true and LLM_CACHE_BACKEND=persistent"
                );
            }
            let removed = service.clean_expired().await?;
            println!("Removed {removed} expired cache entries");
        }
    }

    Ok(())
}
