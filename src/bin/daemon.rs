//! Daemon binary: runs the reminder scheduler against the configured store.
//!
//! The chat front end is a separate process concern; this binary logs fired
//! reminders instead of delivering them, which makes it a useful operational
//! smoke runner (and an example of wiring [`QuizCore`]).

use std::path::PathBuf;
use std::sync::Arc;

use quizstreak::{QuestionDelivery, QuizConfig, QuizCore};

/// Delivery stub that records fires in the log.
struct LogDelivery;

impl QuestionDelivery for LogDelivery {
    fn send_question(&self, chat_id: i64, user_id: i64) {
        tracing::info!(chat = chat_id, user = user_id, "reminder due: would deliver a question");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => QuizConfig::load(&PathBuf::from(path))?,
        None => QuizConfig::default(),
    };

    tracing::info!(db = %config.db_path.display(), "quizstreak-daemon starting");

    // A locked corrupt database is fatal: better to stop with an actionable
    // message than to run with no persistence.
    let core = QuizCore::start(config, Arc::new(LogDelivery)).map_err(|e| {
        tracing::error!(error = %e, "startup failed");
        anyhow::anyhow!("startup failed: {e}")
    })?;

    let handle = core.run();
    tokio::signal::ctrl_c().await?;
    handle.abort();

    tracing::info!("quizstreak-daemon shut down cleanly");
    Ok(())
}
