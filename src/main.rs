use std::sync::Arc;

use anyhow::Context;

use youmatch_bot::bot::{BotDeps, TurnOrchestrator};
use youmatch_bot::channels::{Channel, TelegramChannel};
use youmatch_bot::config::BotConfig;
use youmatch_bot::engine::ContextChatEngine;
use youmatch_bot::knowledge::KnowledgeBase;
use youmatch_bot::llm::create_provider;
use youmatch_bot::memory::ConversationMemoryStore;
use youmatch_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("Failed to load configuration")?;

    eprintln!("💞 YouMatch bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   Database: {}", config.database_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}",
                    config.database_path.display()
                )
            })?,
    );
    match db.count_memory_records().await {
        Ok(count) => eprintln!("   Memory records: {count}"),
        Err(e) => tracing::warn!(error = %e, "Could not count memory records"),
    }
    let memory = Arc::new(ConversationMemoryStore::new(db, config.memory.clone()));

    // ── LLM + knowledge ─────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let knowledge = match KnowledgeBase::load(&config.knowledge_dir).await {
        Ok(kb) => kb,
        Err(e) => {
            tracing::warn!(error = %e, "Knowledge base unavailable, answering without context");
            KnowledgeBase::empty()
        }
    };
    eprintln!(
        "   Knowledge: {} passages from {}",
        knowledge.len(),
        config.knowledge_dir.display()
    );
    let engine = Arc::new(ContextChatEngine::new(llm, Arc::new(knowledge)));

    // ── Telegram ────────────────────────────────────────────────────────
    let allowed = &config.telegram.allowed_users;
    eprintln!(
        "   Telegram allowed: {}\n",
        if allowed.iter().any(|u| u == "*") {
            "everyone".to_string()
        } else {
            allowed.join(", ")
        }
    );
    let telegram = Arc::new(TelegramChannel::new(
        config.telegram.bot_token.clone(),
        config.telegram.allowed_users.clone(),
    ));
    if let Err(e) = telegram.health_check().await {
        tracing::warn!(error = %e, "Telegram health check failed");
    }

    let bot = Arc::new(TurnOrchestrator::new(BotDeps {
        memory,
        engine,
        messenger: telegram.clone(),
        links: config.links.clone(),
        guide_path: config.guide_path.clone(),
        followup: config.followup.clone(),
    }));

    if let Err(e) = bot.register_commands().await {
        tracing::error!(error = %e, "Failed to register command menu");
    }

    let events = telegram.start().await?;
    bot.run(events).await;

    Ok(())
}
