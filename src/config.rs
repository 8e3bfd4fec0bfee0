use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
    /// Admin account created when the user table is empty.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://stock.db".into());
        let port = match lookup("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT is not a valid port: {p}"))?,
            None => 5000,
        };
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let token_ttl_days = match lookup("TOKEN_TTL_DAYS") {
            Some(d) => d
                .parse()
                .with_context(|| format!("TOKEN_TTL_DAYS is not a number: {d}"))?,
            None => 30,
        };
        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(c) => c
                .parse()
                .with_context(|| format!("BCRYPT_COST is not a number: {c}"))?,
            None => bcrypt::DEFAULT_COST,
        };
        let bootstrap_admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        };

        Ok(Config {
            database_url,
            port,
            jwt_secret,
            token_ttl_days,
            bcrypt_cost,
            bootstrap_admin,
        })
    }
}
