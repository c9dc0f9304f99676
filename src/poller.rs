use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

use crate::codes::expiry::parse_expiration;
use crate::games::Game;
use crate::state::{AppState, PollerHandle};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to persist sent codes: {0}")]
    Store(#[from] StoreError),
}

pub type PollResult<T> = core::result::Result<T, PollError>;

/// Outcome of one check cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub games_checked: usize,
    pub new_codes: usize,
    pub notified: usize,
}

/// Runs one check over every game that has at least one enabled webhook.
///
/// Only one cycle runs at a time; a manual trigger arriving mid-cycle waits for the running one
/// and then sees its history updates. A failure while checking one game is logged and the next
/// game is still checked.
#[instrument(skip(state))]
pub async fn check_and_notify(state: &AppState) -> CheckSummary {
    let _cycle = state.check_guard.lock().await;
    tracing::info!("checking for new codes");

    let mut summary = CheckSummary::default();
    for game in Game::ALL {
        if !state.config.read().await.has_enabled_webhook(game) {
            continue;
        }

        summary.games_checked += 1;
        match check_game(state, game).await {
            Ok((found, notified)) => {
                summary.new_codes += found;
                summary.notified += notified;
            }
            Err(e) => tracing::error!(error = %e, %game, "game check failed"),
        }
    }

    *state.last_check.write().await = Some(Utc::now());
    tracing::info!(
        games = summary.games_checked,
        new = summary.new_codes,
        notified = summary.notified,
        "check complete"
    );

    summary
}

/// Returns `(new codes seen, codes notified)` for `game`
async fn check_game(state: &AppState, game: Game) -> PollResult<(usize, usize)> {
    let records = state.source.fetch_codes(game).await;

    let mut found = 0;
    let mut notified = 0;
    for record in records {
        let code = record.normalized_code();
        if code.is_empty() || state.history.lock().await.contains(game, &code) {
            continue;
        }

        found += 1;
        tracing::info!(%game, code = %code, "new code found");

        // read per code so edits made through the api apply mid-cycle
        let config = state.config_snapshot().await;
        if state.notifier.send_notification(game, &record, &config).await {
            let mut history = state.history.lock().await;
            if history.record(game, &code, parse_expiration(&record)) {
                state.store.save_history(&history).await?;
            }
            notified += 1;
        }

        if !state.code_delay.is_zero() {
            tokio::time::sleep(state.code_delay).await;
        }
    }

    Ok((found, notified))
}

/// Checks, then sleeps for the configured interval, until `cancel` fires.
///
/// Each cycle runs in its own task so a panic inside a cycle is logged and the loop carries on.
pub async fn run(state: Arc<AppState>, cancel: CancellationToken) {
    tracing::info!("code checker started");

    while !cancel.is_cancelled() {
        let cycle_state = state.clone();
        let cycle = tokio::task::spawn(
            async move {
                check_and_notify(&cycle_state).await;
            }
            .in_current_span(),
        );

        if let Err(e) = cycle.await {
            tracing::error!(error = ?e, "check cycle aborted");
        }

        let interval = state.config.read().await.interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("code checker stopped");
}

/// Starts `run` in the background and records its handle on `state`
pub fn spawn(state: Arc<AppState>, cancel: CancellationToken) {
    let handle = tokio::task::spawn(run(state.clone(), cancel.clone()));

    match state.poller.lock() {
        Ok(mut guard) => {
            *guard = Some(PollerHandle {
                handle,
                cancellation_token: cancel,
            })
        }
        Err(e) => tracing::error!(error = %e, "poller handle lock poisoned"),
    }
}

/// Fires a one-off check without waiting for it
pub fn trigger(state: Arc<AppState>) {
    tokio::task::spawn(async move {
        check_and_notify(&state).await;
    });
}
