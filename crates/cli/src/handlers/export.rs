//! Export command handler.
//!
//! Downloads every completed sound of a pack into `<out>/<hook>.wav`.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use ccbell_core::sound::SoundStatus;
use ccbell_core::types::PackId;

use crate::context::CliContext;

pub async fn execute(ctx: &CliContext, pack_id: PackId, out: &Path) -> Result<()> {
    let library = ctx.load_library().await?.snapshot();
    let pack = library
        .pack(pack_id)
        .ok_or_else(|| anyhow!("No pack with id {pack_id}"))?;

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let mut written = 0usize;
    for sound in library.sounds_in_pack(pack_id) {
        let (SoundStatus::Completed, Some(audio_url)) = (sound.status, sound.audio_url.as_deref())
        else {
            println!("  skipping {} ({})", sound.hook_type, sound.status.as_str());
            continue;
        };

        let bytes = ctx
            .api()
            .fetch_audio(audio_url)
            .await
            .with_context(|| format!("Failed to download {}", sound.hook_type))?;
        let path = out.join(file_name(&sound.hook_type));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {} -> {}", sound.hook_type, path.display());
        written += 1;
    }

    println!("Exported {written} sound(s) from '{}'", pack.name);
    Ok(())
}

/// File name for a hook's sound, keeping only path-safe characters.
fn file_name(hook_type: &str) -> String {
    let stem: String = hook_type
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.wav")
}
