use clap::Parser;

/// Minutes reminder CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "minutes-reminder",
    version,
    about = "Posts weekly meeting-minutes notices and reminds non-responders"
)]
pub struct Cli {
    /// Path to the JSON rule file
    #[arg(long)]
    pub rules_file: Option<String>,

    /// Grace period before the compliance check, in seconds
    #[arg(long)]
    pub grace_period: Option<u64>,

    /// Discord REST API base URL
    #[arg(long)]
    pub api_url: Option<String>,
}
