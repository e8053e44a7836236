use clap::{Arg, ArgAction, Command, builder::ValueParser};
use std::time::Duration;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRATION: &str = "jwt-expiration";
pub const ARG_JWT_LEEWAY_SECONDS: &str = "jwt-leeway-seconds";
pub const ARG_PERMISSIONS: &str = "permissions";
pub const ARG_SEED_USERS: &str = "seed-users";

pub const ENV_JWT_SECRET: &str = "ROLEGATE_JWT_SECRET";
pub const ENV_JWT_EXPIRATION: &str = "ROLEGATE_JWT_EXPIRATION";

/// Parse a token lifetime: plain seconds (`"3600"`) or a number with one of
/// the `s`, `m`, `h`, `d` suffixes (`"2h"`, `"1d"`).
///
/// # Errors
/// Returns an error for empty, zero, negative or unsuffixed-garbage input.
pub fn parse_ttl(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last() {
        Some((index, suffix)) if suffix.is_ascii_alphabetic() => (&value[..index], Some(suffix)),
        Some(_) => (value, None),
        None => return Err("token expiration must not be empty".to_string()),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid token expiration: {value}"))?;

    let multiplier = match unit.map(|u| u.to_ascii_lowercase()) {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 60 * 60 * 24,
        Some(other) => return Err(format!("invalid token expiration unit: {other}")),
    };

    let seconds = amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("token expiration too large: {value}"))?;

    if seconds == 0 {
        return Err("token expiration must be greater than zero".to_string());
    }

    Ok(Duration::from_secs(seconds))
}

#[must_use]
pub fn validator_ttl() -> ValueParser {
    ValueParser::from(parse_ttl)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Shared secret used to sign and verify tokens")
                .env(ENV_JWT_SECRET)
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRATION)
                .long(ARG_JWT_EXPIRATION)
                .help("Token lifetime, e.g. 3600, 90m, 2h, 1d")
                .env(ENV_JWT_EXPIRATION)
                .value_parser(validator_ttl()),
        )
        .arg(
            Arg::new(ARG_JWT_LEEWAY_SECONDS)
                .long(ARG_JWT_LEEWAY_SECONDS)
                .help("Clock skew tolerated when checking token expiry")
                .env("ROLEGATE_JWT_LEEWAY_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PERMISSIONS)
                .long(ARG_PERMISSIONS)
                .help("Path to the role permission table (JSON)")
                .env("ROLEGATE_PERMISSIONS")
                .default_value("config/permissions.json"),
        )
        .arg(
            Arg::new(ARG_SEED_USERS)
                .long(ARG_SEED_USERS)
                .help("Create the admin and user accounts when the users table is empty")
                .env("ROLEGATE_SEED_USERS")
                .action(ArgAction::SetTrue),
        )
}
