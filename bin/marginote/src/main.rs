//! # Marginote Binary
//!
//! The entry point that assembles the application: configuration,
//! tracing, the SQLite store, the purge sweeper, and the HTTP server.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use chrono::Duration;
use mn_api::{router, AppState, Policy};
use mn_config::Config;
use mn_core::{CommentRepo, IdentityHasher, Signer};
use mn_db_sqlite::SqliteCommentRepo;
use secrecy::ExposeSecret;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load().context("loading configuration")?;

    init_tracing(&cfg.log_format);
    if cfg.using_default_secret() {
        tracing::warn!("running with the built-in token secret; set MARGINOTE_SECRET");
    }

    let repo = Arc::new(
        SqliteCommentRepo::connect(&cfg.dbpath)
            .await
            .context("opening database")?,
    );

    // Periodic sweep of pending comments that were never activated
    {
        let repo = Arc::clone(&repo);
        let min_age = Duration::seconds(cfg.purge_after_secs as i64);
        let every = StdDuration::from_secs(cfg.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(err) = repo.purge(min_age).await {
                    tracing::warn!(%err, "purge sweep failed");
                }
            }
        });
    }

    let state = Arc::new(AppState {
        repo,
        signer: Signer::new(cfg.secret.expose_secret().as_bytes()),
        hasher: IdentityHasher::new(&cfg.hash_salt),
        policy: Policy {
            moderation_enabled: cfg.moderation_enabled,
            ownership_window: Duration::seconds(cfg.ownership_window_secs as i64),
            latest_enabled: cfg.latest_enabled,
        },
    });

    tracing::info!(listen = %cfg.listen, db = %cfg.dbpath, "marginote starting");
    let listener = tokio::net::TcpListener::bind(&cfg.listen)
        .await
        .context("binding listener")?;
    axum::serve(listener, router(state)).await.context("serving")?;
    Ok(())
}

fn init_tracing(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marginote=info,mn_api=info,mn_db_sqlite=info,tower_http=warn".into());

    match format {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}
