// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot operator commands.

use std::sync::Arc;

use chrono::Utc;

use nudge_config::model::NudgeConfig;
use nudge_core::NudgeError;
use nudge_core::types::TierUpdate;
use nudge_engagement::{TransitionOutcome, spawn_tier_completion};

use crate::app::{App, JobKind};

/// `nudge run <job>`.
pub async fn run_job(config: NudgeConfig, job: JobKind, json: bool) -> Result<(), NudgeError> {
    let app = App::open(&config).await?;
    let result = app.run_job(job, Utc::now()).await;
    app.shutdown().await;
    let result = result?;

    if json {
        let out = serde_json::to_string_pretty(&result)
            .map_err(|e| NudgeError::Internal(format!("failed to serialize result: {e}")))?;
        println!("{out}");
    } else {
        println!(
            "{}: processed {}, succeeded {}, failed {}, skipped {}, no-ops {} ({} ms)",
            result.job,
            result.processed,
            result.succeeded,
            result.failed,
            result.skipped,
            result.noops,
            result.duration_ms
        );
        for error in &result.errors {
            println!("  error: {error}");
        }
    }
    Ok(())
}

/// `nudge activity <user> [--reply N]`.
pub async fn record_activity(
    config: NudgeConfig,
    user_id: &str,
    reply: Option<&str>,
) -> Result<(), NudgeError> {
    let app = App::open(&config).await?;
    let now = Utc::now();
    let machine = &app.engine.state_machine;

    let outcome = match reply {
        Some(reply) => {
            let outcome = machine.handle_goodbye_response(user_id, reply, now).await;
            if matches!(outcome, Ok(None)) {
                println!("{user_id}: reply {reply:?} is not a goodbye option");
            }
            outcome
        }
        None => machine.record_activity(user_id, now).await,
    };
    app.shutdown().await;

    match outcome? {
        Some(outcome) => println!("{user_id}: {}", describe(&outcome)),
        None if reply.is_none() => println!("{user_id}: activity recorded"),
        None => {}
    }
    Ok(())
}

/// `nudge tier <user> <tier>`.
pub async fn complete_tier(config: NudgeConfig, user_id: &str, tier: u8) -> Result<(), NudgeError> {
    let app = App::open(&config).await?;
    let update = TierUpdate {
        action: "cli".to_string(),
        tier_completed: Some(tier),
        should_send_unlock: true,
    };
    let handle = spawn_tier_completion(
        Arc::new(app.engine.tier_handler()),
        user_id.to_string(),
        update,
        Utc::now(),
    );
    let outcome = handle.await;
    app.shutdown().await;

    let outcome =
        outcome.map_err(|e| NudgeError::Internal(format!("tier completion task failed: {e}")))?;
    println!("{user_id}: {outcome:?}");
    Ok(())
}

fn describe(outcome: &TransitionOutcome) -> String {
    match outcome {
        TransitionOutcome::Applied(result) => {
            format!("{} -> {} ({})", result.previous_state, result.new_state, result.trigger)
        }
        TransitionOutcome::Rejected(invalid) => format!("ignored: {invalid}"),
        TransitionOutcome::Superseded => "ignored: state changed concurrently".to_string(),
    }
}
