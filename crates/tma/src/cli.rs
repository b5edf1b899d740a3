use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Telegram Mini App test helper: sign and check initData, validate config.
#[derive(Debug, Parser)]
#[command(name = "tma", version)]
pub struct Cli {
    /// YAML config file; `TMA_*` environment variables override it.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a signed initData query string for a synthetic user.
    Generate(GenerateArgs),
    /// Check an initData string; exits non-zero when it is not authentic.
    Verify(VerifyArgs),
    /// Validate the configuration and print it with secrets redacted.
    Config,
}

#[derive(Debug, Args)]
pub struct SecretArgs {
    /// Bot token used as the signing secret (defaults to the configured bot_token).
    #[arg(long)]
    pub secret: Option<String>,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub user_id: i64,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long, default_value = "en")]
    pub language_code: String,
    #[arg(long)]
    pub premium: bool,
    #[arg(long)]
    pub start_param: Option<String>,
    /// Unix timestamp to use instead of the current time.
    #[arg(long)]
    pub auth_date: Option<i64>,
    #[command(flatten)]
    pub secret: SecretArgs,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    pub init_data: String,
    /// Also reject payloads whose auth_date is older than this many seconds.
    #[arg(long)]
    pub max_age: Option<u64>,
    #[command(flatten)]
    pub secret: SecretArgs,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate() {
        let cli = Cli::try_parse_from([
            "tma",
            "generate",
            "--user-id",
            "42",
            "--first-name",
            "Ann",
            "--premium",
            "--secret",
            "1:abc",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.user_id, 42);
                assert!(args.premium);
                assert_eq!(args.language_code, "en");
                assert_eq!(args.secret.secret.as_deref(), Some("1:abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_verify_with_global_config() {
        let cli = Cli::try_parse_from(["tma", "verify", "a=1&hash=ff", "--max-age", "60", "-c", "tma.yaml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tma.yaml")));
        match cli.command {
            Command::Verify(args) => {
                assert_eq!(args.init_data, "a=1&hash=ff");
                assert_eq!(args.max_age, Some(60));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
