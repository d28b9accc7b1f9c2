//! Subcommand handlers

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Duration;
use nomos_lifecycle::{NomosConfig, NomosService};
use nomos_types::{duration_from_secs, Commitment, CommitmentId, StakeKind};
use tokio::sync::broadcast::error::RecvError;

async fn service(config: &NomosConfig) -> anyhow::Result<NomosService> {
    NomosService::from_config(config)
        .await
        .context("failed to open commitment storage")
}

fn parse_id(raw: &str) -> anyhow::Result<CommitmentId> {
    raw.parse()
        .with_context(|| format!("not a commitment id: {raw}"))
}

/// `3d 4h`, `2h 15m`, `45s`
fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds();
    let (days, hours, minutes) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {}s", secs % 60)
    } else {
        format!("{secs}s")
    }
}

fn print_commitment(commitment: &Commitment) {
    println!("{}", commitment.id);
    println!("  Rule:     {}", commitment.rule);
    println!("  Stake:    {}", commitment.stake_kind);
    println!("  Expires:  {}", commitment.expires_at.to_rfc3339());
    if commitment.is_resolved() {
        println!("  Status:   {}", commitment.resolution);
    } else if commitment.has_expired() {
        println!("  Status:   verdict required");
    } else {
        println!(
            "  Status:   {} remaining",
            format_remaining(commitment.time_remaining())
        );
    }
}

pub async fn commit(
    config: &NomosConfig,
    rule: &str,
    text: Option<String>,
    image: Option<PathBuf>,
    duration_secs: Option<i64>,
) -> anyhow::Result<()> {
    let (kind, stake) = match (text, image) {
        (Some(text), None) => (StakeKind::TextVow, text.into_bytes()),
        (None, Some(path)) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            (StakeKind::ImageSymbol, bytes)
        }
        _ => bail!("provide exactly one of --text or --image"),
    };

    let duration = duration_secs
        .map(duration_from_secs)
        .transpose()
        .context("invalid --duration-secs")?;

    let service = service(config).await?;
    let commitment = service
        .create_commitment(rule, kind, &stake, duration)
        .await?;

    println!("✓ Stake sealed");
    print_commitment(&commitment);
    Ok(())
}

pub async fn status(config: &NomosConfig, id: Option<&str>) -> anyhow::Result<()> {
    let service = service(config).await?;

    if let Some(raw) = id {
        let id = parse_id(raw)?;
        match service.commitment(&id).await? {
            Some(commitment) => print_commitment(&commitment),
            None => bail!("no open commitment {id}"),
        }
        return Ok(());
    }

    let commitments = service.active_commitments().await?;
    if commitments.is_empty() {
        println!("No open commitments");
    }
    for commitment in &commitments {
        print_commitment(commitment);
    }
    Ok(())
}

pub async fn uphold(config: &NomosConfig, raw: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let id = parse_id(raw)?;
    let service = service(config).await?;

    let Some(commitment) = service.commitment(&id).await? else {
        bail!("no open commitment {id}");
    };
    if !service.check_expiry(&commitment) {
        bail!(
            "verdict not due until {} ({} remaining)",
            commitment.expires_at.to_rfc3339(),
            format_remaining(commitment.time_remaining())
        );
    }
    if commitment.stake_kind == StakeKind::ImageSymbol && out.is_none() {
        bail!("image stakes need --out <path> to be revealed");
    }

    let plaintext = service.resolve_success(&id).await?;

    // Only finalize once the stake has actually been shown.
    match out {
        Some(path) => {
            tokio::fs::write(&path, plaintext.as_slice())
                .await
                .with_context(|| format!("failed to write stake to {}", path.display()))?;
            println!("✓ Rule upheld. Stake written to {}", path.display());
        }
        None => {
            println!("✓ Rule upheld. Your stake:");
            println!();
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
    }

    let report = service.finalize_after_reveal(&id).await?;
    if !report.blob_removed {
        tracing::warn!(commitment_id = %id, "Key destroyed but sealed blob could not be removed");
    }
    Ok(())
}

pub async fn forfeit(config: &NomosConfig, raw: &str) -> anyhow::Result<()> {
    let id = parse_id(raw)?;
    let service = service(config).await?;

    let report = service.resolve_failure(&id).await?;
    println!("✗ Rule broken. Stake destroyed unseen.");
    if !report.blob_removed {
        tracing::warn!(commitment_id = %id, "Key destroyed but sealed blob could not be removed");
    }
    Ok(())
}

pub async fn watch(config: &NomosConfig) -> anyhow::Result<()> {
    let service = service(config).await?;
    let (monitor, check_rx) = service.deadline_monitor(config.monitor.clone());
    let mut verdicts = monitor.subscribe();

    let runner = tokio::spawn(Arc::clone(&monitor).start(check_rx));
    println!("Watching for expired commitments (Ctrl-C to stop)");

    loop {
        tokio::select! {
            verdict = verdicts.recv() => match verdict {
                Ok(verdict) => {
                    println!(
                        "⏰ Verdict required for {} (\"{}\"), expired {}",
                        verdict.commitment_id,
                        verdict.rule,
                        verdict.expired_at.to_rfc3339()
                    );
                    println!("   nomos uphold {0}   |   nomos forfeit {0}", verdict.commitment_id);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped verdict notifications");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    monitor.stop().await;
    runner.await.context("deadline monitor task failed")?;
    Ok(())
}
