//! Models command handler.

use anyhow::{Context, Result};

use ccbell_core::readiness::ModelReadiness;
use ccbell_core::request::ModelId;

use crate::context::CliContext;

pub async fn execute(ctx: &CliContext, model: Option<ModelId>, load: bool) -> Result<()> {
    let model = model.unwrap_or_else(|| ctx.default_model());
    let report = ctx
        .api()
        .model_status(model)
        .await
        .with_context(|| format!("Failed to query model {model}"))?;
    let readiness = report.readiness();

    print!("Model {model}: {}", readiness.label());
    if let Some(stage) = &report.stage {
        print!(" ({stage}, {:.0}%)", report.progress * 100.0);
    }
    println!();
    if let ModelReadiness::Error { message } = &readiness {
        println!("  {message}");
    }

    if load && !readiness.is_ready() {
        let response = ctx
            .api()
            .load_model(model)
            .await
            .with_context(|| format!("Failed to load model {model}"))?;
        println!("Load requested: {:?}", response.status);
    }

    Ok(())
}
