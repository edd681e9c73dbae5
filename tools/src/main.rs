//! splitora-admin: operator commands against a Splitora ledger database.
//!
//! Usage:
//!   splitora-admin --db splitora.db migrate
//!   splitora-admin --db splitora.db backfill-codes
//!   splitora-admin --db splitora.db stats --user <user-id>
//!   splitora-admin --db splitora.db complete --referral <referral-id>
//!   splitora-admin next-tier --count 4
//!   splitora-admin --data-dir ./data catalog
//!
//! Every command prints one JSON document on stdout.

use anyhow::{bail, Result};
use serde::Serialize;
use splitora_core::{
    catalog::PlanSavings, config::EngineConfig, engine::SplitoraEngine, store::LedgerStore,
    tier_rewards,
};
use std::env;

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--db", "--data-dir", "--user", "--referral", "--count"];

#[derive(Serialize)]
struct PlanListing<'a> {
    provider_id: &'a str,
    provider:    &'a str,
    plan_id:     &'a str,
    plan:        &'a str,
    price:       f64,
    max_members: u32,
    #[serde(flatten)]
    savings:     PlanSavings,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or("splitora.db");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let Some(command) = command_name(&args) else {
        bail!("missing command (migrate | backfill-codes | stats | complete | next-tier | catalog)");
    };
    log::debug!("splitora-admin {command} (db: {db}, data_dir: {data_dir})");

    match command {
        "migrate" => {
            let store = LedgerStore::open(db)?;
            store.migrate()?;
            log::info!("Migrations applied to {db}");
            print_json(&serde_json::json!({ "migrated": true, "db": db }))
        }
        "backfill-codes" => {
            let engine = open_engine(db, data_dir)?;
            let updated = engine.codes().backfill_referral_codes()?;
            print_json(&serde_json::json!({ "updated": updated }))
        }
        "stats" => {
            let Some(user) = flag_value(&args, "--user") else {
                bail!("stats requires --user <id>");
            };
            let engine = open_engine(db, data_dir)?;
            print_json(&engine.referrals().get_referral_stats(user)?)
        }
        "complete" => {
            let Some(referral) = flag_value(&args, "--referral") else {
                bail!("complete requires --referral <id>");
            };
            let engine = open_engine(db, data_dir)?;
            print_json(&engine.referrals().complete_referral(referral)?)
        }
        "next-tier" => {
            let count: u32 = parse_arg(&args, "--count", 0)?;
            let config = EngineConfig::load(data_dir)?;
            print_json(&tier_rewards::next_tier(count, &config.referral.tiers))
        }
        "catalog" => {
            let config = EngineConfig::load(data_dir)?;
            let listings: Vec<PlanListing<'_>> = config
                .catalog
                .iter()
                .flat_map(|provider| {
                    provider.plans.iter().map(move |plan| PlanListing {
                        provider_id: &provider.id,
                        provider:    &provider.name,
                        plan_id:     &plan.id,
                        plan:        &plan.name,
                        price:       plan.price,
                        max_members: plan.max_members,
                        savings:     plan.savings(),
                    })
                })
                .collect();
            print_json(&listings)
        }
        other => bail!("unknown command '{other}'"),
    }
}

fn open_engine(db: &str, data_dir: &str) -> Result<SplitoraEngine> {
    let store = LedgerStore::open(db)?;
    SplitoraEngine::build(store, data_dir)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First argument that is neither a flag nor a flag's value.
fn command_name(args: &[String]) -> Option<&str> {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with("--") {
            return Some(arg.as_str());
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

/// Value of `flag` parsed as `T`, or `default` when the flag is absent.
fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T> {
    match flag_value(args, flag) {
        Some(raw) => match raw.parse() {
            Ok(value) => Ok(value),
            Err(_) => bail!("invalid value '{raw}' for {flag}"),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn count_defaults_when_absent() {
        assert_eq!(parse_arg::<u32>(&args("splitora-admin next-tier"), "--count", 0).unwrap(), 0);
        assert_eq!(parse_arg::<u32>(&args("splitora-admin next-tier --count 4"), "--count", 0).unwrap(), 4);
    }

    #[test]
    fn unparsable_count_is_rejected() {
        let err = parse_arg::<u32>(&args("splitora-admin next-tier --count abc"), "--count", 0).unwrap_err();
        assert!(err.to_string().contains("abc"), "got {err}");
        assert!(parse_arg::<u32>(&args("splitora-admin next-tier --count -1"), "--count", 0).is_err());
    }

    #[test]
    fn command_skips_flag_values() {
        let line = args("splitora-admin --db ledger.db stats --user alice");
        assert_eq!(command_name(&line), Some("stats"));
        assert_eq!(flag_value(&line, "--user"), Some("alice"));
    }
}
