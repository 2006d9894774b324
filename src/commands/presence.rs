//! `presence`: stream connectivity and online counts until interrupted

use anyhow::{bail, Result};

use super::AdminSession;
use crate::config::Config;
use crate::presence::{PresenceFeed, PresenceState};

fn summary(state: &PresenceState) -> String {
    format!(
        "[{}] {} online / {} known",
        if state.is_connected() {
            "connected"
        } else {
            "disconnected"
        },
        state.online_users_count(),
        state.len()
    )
}

/// What the watcher does after printing a state.
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Keep { connected: bool },
    Lost,
    Failed,
}

fn next_step(state: &PresenceState, was_connected: bool) -> Next {
    let connected = state.is_connected();
    if state.has_ended() || (was_connected && !connected) {
        if was_connected || connected {
            Next::Lost
        } else {
            Next::Failed
        }
    } else {
        Next::Keep { connected }
    }
}

pub async fn watch(config: &Config) -> Result<()> {
    let session = AdminSession::open(config)?;
    let mut feed = PresenceFeed::new(&config.api_base_url);
    feed.set_token(session.token());
    let mut view = feed.view();

    println!("Watching presence at {} (Ctrl-C to stop)...", config.api_base_url);

    let mut was_connected = false;
    let mut printed: Option<u64> = None;
    let failed = loop {
        let (line, revision, next) = {
            let state = view.state();
            (summary(&state), state.revision(), next_step(&state, was_connected))
        };
        if printed != Some(revision) {
            println!("{}", line);
            printed = Some(revision);
        }
        match next {
            Next::Keep { connected } => was_connected = connected,
            Next::Lost => {
                println!("Presence connection lost.");
                break false;
            }
            Next::Failed => break true,
        }

        tokio::select! {
            changed = view.changed() => {
                if !changed {
                    break false;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break false;
            }
        }
    };

    feed.teardown();
    if failed {
        bail!("Presence connection failed before it was established (see log for details).");
    }
    Ok(())
}
