mod cli;

use std::{process::ExitCode, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::warn;

use tma_core::{
    config::{Config, LogLevel},
    init_data::{self, InitDataFixture},
};

use cli::{Cli, Command, GenerateArgs, SecretArgs, VerifyArgs};

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = Config::load(cli.config.as_deref());
    let level = cfg.as_ref().map(Config::log_level).unwrap_or(LogLevel::Info);
    tma_core::logging::init("tma", level)?;

    match cli.command {
        Command::Generate(args) => generate(args, &cfg),
        Command::Verify(args) => verify(args, &cfg),
        Command::Config => {
            let cfg = cfg.context("configuration is invalid")?;
            println!("{cfg:#?}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn generate(args: GenerateArgs, cfg: &tma_core::Result<Config>) -> anyhow::Result<ExitCode> {
    let secret = resolve_secret(&args.secret, cfg)?;

    let mut fixture = InitDataFixture::new(args.user_id, args.first_name)
        .language_code(args.language_code)
        .premium(args.premium);
    if let Some(v) = args.last_name {
        fixture = fixture.last_name(v);
    }
    if let Some(v) = args.username {
        fixture = fixture.username(v);
    }
    let start_param = args
        .start_param
        .or_else(|| cfg.as_ref().ok().and_then(|c| c.start_param().map(str::to_string)));
    if let Some(v) = start_param {
        fixture = fixture.start_param(v);
    }
    if let Some(ts) = args.auth_date {
        let at = DateTime::<Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| anyhow!("auth_date {ts} is out of range"))?;
        fixture = fixture.auth_date(at);
    }

    println!("{}", fixture.generate(&secret)?);
    Ok(ExitCode::SUCCESS)
}

fn verify(args: VerifyArgs, cfg: &tma_core::Result<Config>) -> anyhow::Result<ExitCode> {
    let secret = resolve_secret(&args.secret, cfg)?;

    if !init_data::verify(&args.init_data, &secret) {
        println!("invalid");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(max_age) = args.max_age {
        if let Err(e) = init_data::validate(&args.init_data, &secret, Some(Duration::from_secs(max_age))) {
            warn!(error = %e, "init data rejected");
            println!("invalid: {e}");
            return Ok(ExitCode::FAILURE);
        }
    }

    let fields = init_data::InitDataFields::parse(&args.init_data);
    match fields.user() {
        Ok(Some(user)) => println!("valid: {}", serde_json::to_string(&user)?),
        _ => println!("valid"),
    }
    Ok(ExitCode::SUCCESS)
}

/// `--secret` wins; otherwise the configured bot token.
fn resolve_secret(args: &SecretArgs, cfg: &tma_core::Result<Config>) -> anyhow::Result<String> {
    if let Some(secret) = &args.secret {
        return Ok(secret.clone());
    }
    match cfg {
        Ok(cfg) => cfg
            .bot_token()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no --secret given and bot_token is not configured")),
        Err(e) => Err(anyhow!("no --secret given and configuration is invalid: {e}")),
    }
}
