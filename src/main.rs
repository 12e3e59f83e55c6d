use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::RwLock;

use minutes_reminder::cli::Cli;
use minutes_reminder::config::{self, Config, ConfigError};
use minutes_reminder::error::AppError;
use minutes_reminder::logging::init_logging;
use minutes_reminder::platform::{ChatPlatform, DiscordClient};
use minutes_reminder::rules::RuleSet;
use minutes_reminder::scheduler::run_notice_scheduler;
use minutes_reminder::tracker::PendingPostTracker;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run().await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = Config::from_env().map_err(AppError::Config)?;

    // CLI flags override the environment.
    let rules_path = cli.rules_file.unwrap_or(config.rules_path);
    let api_base_url = cli.api_url.unwrap_or(config.api_base_url);
    let grace_period =
        Duration::from_secs(cli.grace_period.unwrap_or(config.grace_period_seconds));

    let rule_file = config::load_rule_file(Path::new(&rules_path))?;
    let rules = Arc::new(RuleSet::new(rule_file.rules).map_err(ConfigError::Rule)?);
    tracing::info!("Loaded {} rule(s) from {}", rules.len(), rules_path);

    if !rule_file.reply_messages.is_empty() {
        // The reply pool feeds `reply::ReactionReplier`; reaction events
        // arrive through the embedding gateway, not through this binary.
        tracing::info!(
            "Rule file carries {} acknowledgement reply message(s)",
            rule_file.reply_messages.len(),
        );
    }

    let platform: Arc<dyn ChatPlatform + Send + Sync> = Arc::new(DiscordClient::new(
        api_base_url,
        config.bot_token,
        config.guild_id,
    ));
    let tracker = Arc::new(RwLock::new(PendingPostTracker::new()));

    run_notice_scheduler(platform, rules, tracker, grace_period).await;
    Ok(())
}
