//! Subcommand definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use ccbell_core::request::ModelId;
use ccbell_core::types::{PackId, SoundId};

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a pack of sounds from a theme, one per hook
    Generate(GenerateArgs),

    /// List sounds in the local library
    Library {
        /// Print the library as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a sound and delete its server-side audio
    Remove {
        /// Sound identifier (see `ccbell library`)
        sound_id: SoundId,
    },

    /// Download the completed sounds of a pack as WAV files
    Export {
        /// Pack identifier
        pack_id: PackId,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Show model readiness
    Models {
        /// Model to query (default: CCBELL_MODEL or small)
        #[arg(long)]
        model: Option<ModelId>,

        /// Request a load if the model is idle
        #[arg(long)]
        load: bool,
    },

    /// List theme presets
    Themes,

    /// List hook types
    Hooks,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Theme preset id (see `ccbell themes`)
    #[arg(long)]
    pub theme: String,

    /// Hook type id; repeat for several. Defaults to every hook.
    #[arg(long = "hook")]
    pub hooks: Vec<String>,

    /// Model to generate with
    #[arg(long)]
    pub model: Option<ModelId>,

    /// Clip duration in seconds, overriding each hook's suggestion
    #[arg(long)]
    pub duration: Option<f32>,

    /// Pack name (default: the theme name)
    #[arg(long = "pack-name")]
    pub pack_name: Option<String>,
}
