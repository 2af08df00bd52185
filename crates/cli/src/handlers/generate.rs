//! Generate command handler.
//!
//! Builds one request per hook from a theme, queues them as a new pack,
//! and streams progress until every sound of the pack is finalized.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;

use ccbell_core::catalog::{plan_batch, HookType};
use ccbell_core::sound::SoundStatus;
use ccbell_core::types::SoundId;
use ccbell_orchestrator::OrchestratorEvent;

use crate::commands::GenerateArgs;
use crate::context::CliContext;

pub async fn execute(ctx: &CliContext, args: GenerateArgs) -> Result<()> {
    let theme = ctx
        .api()
        .themes()
        .await
        .context("Failed to fetch themes")?
        .into_iter()
        .find(|t| t.id == args.theme)
        .ok_or_else(|| anyhow!("Unknown theme '{}'. Run `ccbell themes` to list them.", args.theme))?;

    let hooks = select_hooks(ctx.api().hooks().await.context("Failed to fetch hooks")?, &args.hooks)?;
    let model = args.model.unwrap_or_else(|| ctx.default_model());
    let requests = plan_batch(&theme, &hooks, model, args.duration);

    let library = ctx.load_library().await?;
    let orchestrator = ctx.orchestrator(library, model);
    let pack_name = args.pack_name.unwrap_or_else(|| theme.name.clone());
    let pack_id = orchestrator.create_pack(pack_name.as_str(), Some(theme.id.clone()), model);
    let sound_ids = orchestrator.enqueue_batch(pack_id, requests)?;

    let labels: HashMap<SoundId, String> = sound_ids
        .iter()
        .copied()
        .zip(hooks.iter().map(|h| h.id.clone()))
        .collect();

    println!(
        "Generating {} sound(s) for pack '{}' ({}) with model {}",
        sound_ids.len(),
        pack_name,
        pack_id,
        model
    );

    let mut events = orchestrator.subscribe_events();
    let mut library_rx = orchestrator.subscribe_library();
    orchestrator.start();

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => print_event(&event, &labels),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Progress output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            done = library_rx.wait_for(|lib| {
                sound_ids
                    .iter()
                    .all(|id| lib.sound(*id).map_or(true, |s| s.status.is_terminal()))
            }) => {
                if done.is_err() {
                    bail!("Library closed while generating");
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted; unfinished sounds stay marked as generating until the next run.");
                break;
            }
        }
    }

    orchestrator.shutdown().await;
    ctx.save_library(orchestrator.library()).await?;

    let library = orchestrator.library().snapshot();
    let completed = sound_ids
        .iter()
        .filter(|id| library.sound(**id).is_some_and(|s| s.status == SoundStatus::Completed))
        .count();
    println!(
        "\nDone: {completed}/{} completed. Export with `ccbell export {pack_id} --out <dir>`.",
        sound_ids.len()
    );
    Ok(())
}

/// Pick the requested hooks from the catalog, preserving request order.
fn select_hooks(catalog: Vec<HookType>, wanted: &[String]) -> Result<Vec<HookType>> {
    if wanted.is_empty() {
        return Ok(catalog);
    }
    wanted
        .iter()
        .map(|id| {
            catalog
                .iter()
                .find(|h| h.id.eq_ignore_ascii_case(id))
                .cloned()
                .ok_or_else(|| anyhow!("Unknown hook '{id}'. Run `ccbell hooks` to list them."))
        })
        .collect()
}

fn print_event(event: &OrchestratorEvent, labels: &HashMap<SoundId, String>) {
    let label = |id: &SoundId| labels.get(id).map(String::as_str).unwrap_or("?");
    match event {
        OrchestratorEvent::JobSubmitted { sound_id, job_id, .. } => {
            println!("  {:<18} submitted ({job_id})", label(sound_id));
        }
        OrchestratorEvent::JobProgress {
            sound_id,
            progress,
            stage,
            ..
        } => {
            println!("  {:<18} {:>3.0}% {stage}", label(sound_id), progress * 100.0);
        }
        OrchestratorEvent::JobCompleted { sound_id, .. } => {
            println!("  {:<18} completed", label(sound_id));
        }
        OrchestratorEvent::JobFailed { sound_id, error, .. } => {
            println!("  {:<18} failed: {error}", label(sound_id));
        }
        OrchestratorEvent::JobCancelled { sound_id, .. } => {
            println!("  {:<18} cancelled", label(sound_id));
        }
        OrchestratorEvent::TransportFallback { .. } => {}
        OrchestratorEvent::ReadinessChanged { readiness } => {
            println!("Model: {}", readiness.label());
        }
    }
}
