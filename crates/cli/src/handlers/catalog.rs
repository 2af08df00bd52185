//! Themes and hooks listings.

use anyhow::{Context, Result};

use crate::context::CliContext;

pub async fn themes(ctx: &CliContext) -> Result<()> {
    let themes = ctx.api().themes().await.context("Failed to fetch themes")?;
    println!("{:<16} {:<20} Description", "ID", "Name");
    for theme in themes {
        println!("{:<16} {:<20} {}", theme.id, theme.name, theme.description);
    }
    Ok(())
}

pub async fn hooks(ctx: &CliContext) -> Result<()> {
    let hooks = ctx.api().hooks().await.context("Failed to fetch hooks")?;
    println!("{:<18} {:>6}  Character", "ID", "Secs");
    for hook in hooks {
        println!(
            "{:<18} {:>6.1}  {}",
            hook.id, hook.suggested_duration, hook.sound_character
        );
    }
    Ok(())
}
