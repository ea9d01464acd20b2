use anyhow::{anyhow, Context, Result};
use clap::Parser;
use recipe_service::credentials::hash_password;
use sqlx::PgPool;

#[derive(Parser, Debug)]
#[command(about = "Create or re-hash API user credentials", long_about = None)]
struct Options {
    /// Credential to provision as `username:password` (repeatable)
    #[arg(long = "user", value_name = "USERNAME:PASSWORD", value_parser = parse_credential)]
    users: Vec<(String, String)>,

    /// Replace the stored hash when the user already exists
    #[arg(long)]
    rotate: bool,
}

fn parse_credential(raw: &str) -> Result<(String, String), String> {
    let (username, password) = raw
        .split_once(':')
        .ok_or_else(|| "expected USERNAME:PASSWORD".to_string())?;
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err("username and password must both be non-empty".to_string());
    }
    Ok((username.to_string(), password.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Options::parse();
    if opts.users.is_empty() {
        return Err(anyhow!("Provide at least one --user <USERNAME:PASSWORD>"));
    }

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set for provisioning users")?;
    let pool = PgPool::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    for (username, password) in &opts.users {
        provision(&pool, username, password, opts.rotate).await?;
    }

    Ok(())
}

async fn provision(pool: &PgPool, username: &str, password: &str, rotate: bool) -> Result<()> {
    let hash = hash_password(password)?;
    let statement = if rotate {
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
         ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash"
    } else {
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
         ON CONFLICT (username) DO NOTHING"
    };

    let result = sqlx::query(statement)
        .bind(username)
        .bind(&hash)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to provision user {username}"))?;

    if result.rows_affected() == 0 {
        println!("user {username}: already present, skipping (use --rotate to replace)");
    } else {
        println!("user {username}: provisioned");
    }
    Ok(())
}
