use anyhow::Context;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use wellness_companion::{AppState, Config, GROUNDING_TECHNIQUES, HELPLINES};

const LOCAL_USER: &str = "local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("failed to load config")?;
    let diagnostics = wellness_companion::init_logging(&config).context("failed to initialize logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "wellness companion starting"
    );
    match Config::source(config_path.as_deref()) {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file; using defaults"),
    }
    if config.has_long_timeout() {
        warn!(
            secs = config.request_timeout_secs,
            "long model timeout; callers wait this long before fallback"
        );
    }

    let state = AppState::build(&config, diagnostics).context("failed to open storage")?;
    let orchestrator = state.orchestrator.clone();
    let guard_state = orchestrator.initialize().await;
    info!(state = ?guard_state, "model probe finished");

    println!("Type a message, or /meals, /practices, /insight, /summary, /help-now, /status, /reprobe. Ctrl-D exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/meals" => {
                let meals = orchestrator.meal_suggestions(LOCAL_USER, None, None).await?;
                println!("{}", serde_json::to_string_pretty(&meals)?);
            }
            "/practices" => {
                let practices = orchestrator.mindful_practices(LOCAL_USER, None).await;
                println!("{}", serde_json::to_string_pretty(&practices)?);
            }
            "/insight" => println!("{}", orchestrator.daily_insight(LOCAL_USER).await),
            "/summary" => println!("{}", orchestrator.weekly_summary(LOCAL_USER).await),
            "/help-now" => {
                for h in HELPLINES {
                    println!("{}: {} ({})", h.name, h.number, h.available);
                }
                for t in GROUNDING_TECHNIQUES {
                    println!("- {}", t);
                }
            }
            "/status" => println!("{}", serde_json::to_string_pretty(&orchestrator.status())?),
            "/reprobe" => println!("{:?}", orchestrator.initialize().await),
            message => match orchestrator.chat(LOCAL_USER, message).await {
                Ok(reply) => println!("{}", reply),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }
    info!("shutting down");
    Ok(())
}
