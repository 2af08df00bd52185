//! Library command handler.

use anyhow::Result;

use ccbell_orchestrator::Library;

use crate::context::CliContext;

pub async fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    let library = ctx.load_library().await?.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&library)?);
        return Ok(());
    }

    if library.sounds.is_empty() {
        println!("The library is empty.");
        println!("Use 'ccbell generate --theme <id>' to create your first pack.");
        return Ok(());
    }

    print_table(&library);
    Ok(())
}

fn print_table(library: &Library) {
    for pack in &library.packs {
        println!(
            "\n{} [{}] model {} ({})",
            pack.name,
            pack.theme.as_deref().unwrap_or("custom"),
            pack.model,
            pack.id
        );
        println!("  {:<36} {:<18} {:<10} {:>5}  Detail", "ID", "Hook", "Status", "Prog");
        for sound in library.sounds_in_pack(pack.id) {
            let detail = sound
                .error
                .as_deref()
                .or(sound.audio_url.as_deref())
                .unwrap_or(sound.stage.as_str());
            println!(
                "  {:<36} {:<18} {:<10} {:>4.0}%  {}",
                sound.id,
                sound.hook_type,
                sound.status.as_str(),
                sound.progress * 100.0,
                detail
            );
        }
    }

    let orphans = library
        .sounds
        .iter()
        .filter(|s| library.pack(s.pack_id).is_none())
        .count();
    if orphans > 0 {
        println!("\n{orphans} sound(s) belong to packs that no longer exist.");
    }
}
