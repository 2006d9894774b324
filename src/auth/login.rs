//! One-time-code sign-in, sign-out and status

use std::future::Future;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use super::session::{KeyValueStorage, SessionStore};
use super::handle_auth_failure;
use crate::api::otp::{request_otp, verify_otp, OtpChallenge};
use crate::api::stats::fetch_stats;
use crate::api::AdminClient;
use crate::config::Config;
use crate::models::AdminStats;

/// Run the OTP exchange and persist the resulting token.
///
/// `read_code` is handed the challenge and resolves to what the operator typed.
/// The token is only stored once it has been proven against the stats
/// endpoint.
pub async fn sign_in<S, F, Fut>(
    client: &AdminClient,
    store: &mut SessionStore<S>,
    email: &str,
    read_code: F,
) -> Result<AdminStats>
where
    S: KeyValueStorage,
    F: FnOnce(OtpChallenge) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    tracing::info!("Requesting login code...");
    let challenge = request_otp(client, email)
        .await
        .context("Failed to request login code")?;

    let code = read_code(challenge.clone()).await?;

    let grant = verify_otp(client, &challenge.email, &code, &challenge.challenge_token)
        .await
        .context("Failed to verify login code")?;
    let token = grant.bearer()?;

    let stats = fetch_stats(client, &token)
        .await
        .context("Token was issued but could not be used")?;

    store.set(&token);
    Ok(stats)
}

/// Read one trimmed line from stdin on the blocking pool.
async fn prompt(label: &str) -> Result<String> {
    let label = label.to_string();
    tokio::task::spawn_blocking(move || -> Result<String> {
        print!("{}", label);
        io::stdout().flush().context("Failed to flush stdout")?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        Ok(line.trim().to_string())
    })
    .await
    .context("Prompt task failed")?
}

async fn prompt_code(challenge: OtpChallenge) -> Result<String> {
    println!();
    println!(
        "A login code was sent to {} (via {}).",
        challenge.email,
        if challenge.delivery.is_empty() {
            "email"
        } else {
            &challenge.delivery
        }
    );
    println!(
        "It expires in {} minute(s).",
        challenge.expires_in_minutes().max(1)
    );
    if let Some(code) = &challenge.dev_otp_code {
        println!("Development code: {}", code);
    }
    println!();
    prompt("Enter code: ").await
}

/// Interactive login.
pub async fn login(config: &Config, email: Option<String>, force: bool) -> Result<()> {
    let mut store = SessionStore::open()?;
    if store.is_authenticated() && !force {
        println!("Already logged in. Use --force to sign in again.");
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt("Admin email: ").await?,
    };

    let client = AdminClient::new(config)?;
    let stats = sign_in(&client, &mut store, &email, prompt_code).await?;

    println!("Login successful.");
    println!("  Conversations: {}", stats.total_sessions);
    println!("  Online now:    {}", stats.online_users_current);
    Ok(())
}

/// Forget the stored token.
pub async fn logout() -> Result<()> {
    let mut store = SessionStore::open()?;
    store.clear();
    println!("Logged out.");
    Ok(())
}

/// Show where we point and whether the stored token still works.
pub async fn status(config: &Config) -> Result<()> {
    let mut store = SessionStore::open()?;
    println!("API base:    {}", config.api_base_url);
    println!("Timeout:     {} ms", config.timeout_ms);

    let token = store.get();
    if token.is_empty() {
        println!("Auth token:  none");
        println!("\nRun 'support-console login' to authenticate.");
        return Ok(());
    }

    let client = AdminClient::new(config)?;
    match fetch_stats(&client, &token).await {
        Ok(_) => println!("Auth token:  valid"),
        Err(e) => {
            let err = anyhow::Error::from(e);
            if !handle_auth_failure(&err, &mut store) {
                println!("Auth token:  present (unverified: {})", err);
            }
        }
    }
    Ok(())
}
