use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod ai;
mod app;
mod config;
mod credentials;
mod db;
mod error;
mod models;
mod services;
mod tui;

use ai::{AiGateway, GatewayConfig, GeminiClient};
use app::App;
use config::Config;
use credentials::{validate_api_key, CredentialStore, MIN_API_KEY_LEN};
use db::Repository;
use models::{derive_title, validate_article_text, NewArticleHistory, SummaryRequest};
use services::ContentFetcher;
use tui::{draw, handle_key_event, AppAction};

/// One-shot commands that run without the terminal UI
enum Command {
    SetKey(String),
    ClearKey,
    Summarize { path: PathBuf, length: Option<u8> },
    SummarizeUrl { url: String, length: Option<u8> },
    History,
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Command>> {
    let Some(flag) = args.get(1) else {
        return Ok(None);
    };

    let length = match args.iter().position(|a| a == "--length") {
        Some(i) => {
            let value = args.get(i + 1).context("--length needs a value")?;
            Some(value.parse::<u8>().with_context(|| format!("invalid length: {value}"))?)
        }
        None => None,
    };

    let command = match flag.as_str() {
        "--set-key" => Command::SetKey(args.get(2).context("--set-key needs a key")?.clone()),
        "--clear-key" => Command::ClearKey,
        "--summarize" => Command::Summarize {
            path: PathBuf::from(args.get(2).context("--summarize needs a file path")?),
            length,
        },
        "--url" => Command::SummarizeUrl {
            url: args.get(2).context("--url needs a URL")?.clone(),
            length,
        },
        "--history" => Command::History,
        other => bail!(
            "unknown argument: {other}\n\nUsage: article-whisperer [--set-key KEY | --clear-key | --summarize PATH [--length N] | --url URL [--length N] | --history]"
        ),
    };
    Ok(Some(command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    if let Some(command) = command {
        return run_command(&config, command).await;
    }

    // Initialize app
    let mut app = App::new(&config)
        .await
        .context("failed to start application")?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Advance spinner animation and expire notifications
        app.tick();

        // Apply finished background requests
        app.poll_tasks().await;

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    handle_key_event(key, app.key_context())
                }
                Event::Paste(text) => Some(AppAction::Paste(text)),
                _ => None,
            };

            if let Some(action) = action {
                let should_quit = app.handle_action(action).await;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

async fn run_command(config: &Config, command: Command) -> anyhow::Result<()> {
    let mut credentials = CredentialStore::open(&config.credentials_path);

    match command {
        Command::SetKey(key) => {
            let Some(key) = validate_api_key(&key) else {
                bail!("API key must be at least {MIN_API_KEY_LEN} characters");
            };
            credentials
                .set(key)
                .with_context(|| format!("failed to write {}", credentials.path().display()))?;
            println!("API key saved");
        }

        Command::ClearKey => {
            credentials
                .clear()
                .with_context(|| format!("failed to write {}", credentials.path().display()))?;
            println!("API key removed");
        }

        Command::History => {
            let repository = Repository::new(&config.db_path).await?;
            let profile = repository.ensure_profile(config.profile_name.clone()).await?;
            let history = repository.get_history(profile.id).await?;
            if history.is_empty() {
                println!("No summaries yet");
            }
            for entry in history {
                let score = entry
                    .quiz
                    .map(|q| format!("  quiz {}/100", q.score))
                    .unwrap_or_default();
                println!(
                    "{}  {}{}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.title,
                    score
                );
            }
        }

        Command::Summarize { path, length } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let text = validate_article_text(&text)?.to_string();
            let title = derive_title(None, &text);
            summarize_and_print(config, &mut credentials, title, text, length).await?;
        }

        Command::SummarizeUrl { url, length } => {
            let fetcher = ContentFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
            let article = fetcher
                .fetch_article(&url)
                .await
                .with_context(|| format!("failed to fetch {url}"))?;
            let title = derive_title(article.title.as_deref(), &article.text);
            println!("Source: {}", article.url);
            summarize_and_print(config, &mut credentials, title, article.text, length).await?;
        }
    }

    Ok(())
}

async fn summarize_and_print(
    config: &Config,
    credentials: &mut CredentialStore,
    title: String,
    text: String,
    length: Option<u8>,
) -> anyhow::Result<()> {
    let api_key = credentials
        .get()?
        .context("API key not set; run with --set-key KEY first")?;
    let gateway_config = GatewayConfig::from(config);
    let gateway = AiGateway::new(Arc::new(GeminiClient::new(&gateway_config)?), Some(api_key));

    let request = SummaryRequest::new(text, length.unwrap_or(config.default_length_percent))?;
    let summary = gateway.summarize(&request).await?;

    println!("{title}\n\n{summary}");

    if config.save_history {
        let repository = Repository::new(&config.db_path).await?;
        let profile = repository.ensure_profile(config.profile_name.clone()).await?;
        repository
            .save_article(NewArticleHistory {
                user_id: profile.id,
                title,
                original_text: request.source_text,
                summary,
            })
            .await?;
    }

    Ok(())
}
