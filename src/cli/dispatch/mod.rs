//! Command-line argument dispatch.
//!
//! Clap does not mark anything required; this module checks every required key
//! at once so a misconfigured deployment learns all missing keys in one run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{
    ARG_DSN, ARG_PORT, ENV_DSN, ENV_PORT,
    auth::{
        ARG_JWT_EXPIRATION, ARG_JWT_LEEWAY_SECONDS, ARG_JWT_SECRET, ARG_PERMISSIONS,
        ARG_SEED_USERS, ENV_JWT_EXPIRATION, ENV_JWT_SECRET,
    },
    logging::{ARG_VERBOSITY, ENV_LOG_LEVEL},
};
use anyhow::{Result, anyhow};
use clap::{ArgMatches, parser::ValueSource};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// Format `ENV (--flag)` for a missing key.
fn missing(env: &str, flag: &str) -> String {
    format!("{env} (--{flag})")
}

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error naming every missing required key.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let mut absent = Vec::new();

    let port = matches.get_one::<u16>(ARG_PORT).copied();
    if port.is_none() {
        absent.push(missing(ENV_PORT, ARG_PORT));
    }

    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .filter(|dsn| !dsn.is_empty())
        .cloned();
    if dsn.is_none() {
        absent.push(missing(ENV_DSN, ARG_DSN));
    }

    let jwt_secret = matches
        .get_one::<String>(ARG_JWT_SECRET)
        .filter(|secret| !secret.is_empty())
        .map(|secret| SecretString::from(secret.clone()));
    if jwt_secret.is_none() {
        absent.push(missing(ENV_JWT_SECRET, ARG_JWT_SECRET));
    }

    let jwt_ttl = matches.get_one::<Duration>(ARG_JWT_EXPIRATION).copied();
    if jwt_ttl.is_none() {
        absent.push(missing(ENV_JWT_EXPIRATION, ARG_JWT_EXPIRATION));
    }

    // the verbosity count always has a default of 0, so only an explicit source counts
    if !matches!(
        matches.value_source(ARG_VERBOSITY),
        Some(ValueSource::EnvVariable | ValueSource::CommandLine)
    ) {
        absent.push(missing(ENV_LOG_LEVEL, "verbose"));
    }

    let missing_error = || anyhow!("missing required configuration: {}", absent.join(", "));

    if !absent.is_empty() {
        return Err(missing_error());
    }

    let (Some(port), Some(dsn), Some(jwt_secret), Some(jwt_ttl)) = (port, dsn, jwt_secret, jwt_ttl)
    else {
        return Err(missing_error());
    };

    let jwt_leeway_seconds = matches
        .get_one::<u64>(ARG_JWT_LEEWAY_SECONDS)
        .copied()
        .unwrap_or(0);

    let permissions = matches
        .get_one::<String>(ARG_PERMISSIONS)
        .map_or_else(|| PathBuf::from("config/permissions.json"), PathBuf::from);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        jwt_ttl,
        jwt_leeway_seconds,
        permissions,
        seed_users: matches.get_flag(ARG_SEED_USERS),
    }))
}
