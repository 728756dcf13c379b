//! redeem-runner: headless front end for the redemption engine.
//!
//! Usage:
//!   redeem-runner --db promo.db [--config promo.json]
//!
//! Reads one JSON command per line on stdin and answers with one JSON line:
//!   {"type":"redeem","player_id":1,"reward_id":2}
//!   {"type":"quit"}

use anyhow::Result;
use promo_core::{
    clock::SystemClock,
    config::PromoConfig,
    coordinator::RedemptionCoordinator,
    error::PromoError,
    store::SqliteStore,
    types::{Coupon, PlayerId, RewardId},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Redeem {
        player_id: PlayerId,
        reward_id: RewardId,
    },
    Quit,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum IpcReply<'a> {
    Redeemed {
        ok:     bool,
        coupon: &'a Coupon,
    },
    Failed {
        ok:        bool,
        error:     &'static str,
        message:   String,
        retryable: bool,
    },
}

impl<'a> IpcReply<'a> {
    fn from_result(result: &'a Result<Coupon, PromoError>) -> Self {
        match result {
            Ok(coupon) => IpcReply::Redeemed { ok: true, coupon },
            Err(e) => IpcReply::Failed {
                ok:        false,
                error:     e.kind(),
                message:   e.to_string(),
                retryable: e.is_retryable(),
            },
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or("promo.db");
    let config = match arg_value(&args, "--config") {
        Some(path) => PromoConfig::load(path)?,
        None => PromoConfig::default(),
    };
    log::info!(
        "redeem-runner on {db} (daily limits in {}, {} conflict retries)",
        config.daily_limit_timezone,
        config.max_conflict_retries
    );

    let store = SqliteStore::open_configured(db, &config)?;
    store.migrate()?;

    let engine = RedemptionCoordinator::new(store, Arc::new(SystemClock), &config)?;
    serve(&engine, io::stdin().lock(), io::stdout().lock())
}

fn serve(
    engine: &RedemptionCoordinator<SqliteStore>,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "ok": false, "error": "bad_request", "message": e.to_string() });
                writeln!(output, "{err_json}")?;
                output.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Redeem { player_id, reward_id } => {
                let result = engine.redeem_coupon(player_id, reward_id);
                let reply = serde_json::to_string(&IpcReply::from_result(&result))?;
                writeln!(output, "{reply}")?;
                output.flush()?;
            }
        }
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
