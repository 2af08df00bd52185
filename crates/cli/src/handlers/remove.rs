//! Remove command handler.
//!
//! Deletes the library entry, then asks the backend to delete the audio.
//! The backend deletion is best-effort: failures are reported as a
//! warning because the job may already be gone server-side.

use anyhow::{anyhow, Result};

use ccbell_core::types::SoundId;

use crate::context::CliContext;

pub async fn execute(ctx: &CliContext, sound_id: SoundId) -> Result<()> {
    let library = ctx.load_library().await?;
    let sound = library
        .remove_sound(sound_id)
        .ok_or_else(|| anyhow!("No sound with id {sound_id}"))?;
    ctx.save_library(&library).await?;

    if let Some(job_id) = &sound.job_id {
        if let Err(e) = ctx.api().delete_job(job_id.as_str()).await {
            tracing::warn!(job_id = %job_id, error = %e, "Best-effort job deletion failed");
        }
    }

    println!("Removed {} ({})", sound.hook_type, sound_id);
    Ok(())
}
