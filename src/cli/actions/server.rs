use crate::{
    api::{self, ServerConfig},
    auth::{PermissionTable, TokenCodec},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub jwt_ttl: Duration,
    pub jwt_leeway_seconds: u64,
    pub permissions: PathBuf,
    pub seed_users: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let codec =
        TokenCodec::new(&args.jwt_secret, args.jwt_ttl).with_leeway_seconds(args.jwt_leeway_seconds);

    debug!("Token codec: {:?}", codec);

    // loaded once before serving; a bad file denies every role instead of aborting
    let permissions = PermissionTable::load(&args.permissions);

    api::new(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        codec,
        permissions,
        seed_users: args.seed_users,
    })
    .await
}
