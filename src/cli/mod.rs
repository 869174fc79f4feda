// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the attention decoder on a caption corpus
//   2. `caption` — loads a checkpoint and describes one image
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CaptionArgs, Commands, TrainArgs};
use std::path::Path;

use crate::domain::traits::ImageCaptioner;

#[derive(Parser, Debug)]
#[command(
    name = "image-captioner",
    version = "0.1.0",
    about = "Train a CNN encoder + attention LSTM decoder, then caption images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Caption(args) => run_caption(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on captions in: {}", args.captions_file);
    let checkpoint_dir = args.checkpoint_dir.clone();

    let summary = TrainUseCase::new(args.into()).execute()?;

    if summary.skipped > 0 {
        println!("{} iterations skipped (unreadable images).", summary.skipped);
    }
    if let Some(val_loss) = summary.val_loss {
        println!("Validation loss: {:.4}", val_loss);
    }
    println!(
        "Training complete. Checkpoint and loss curve saved to '{}'.",
        checkpoint_dir
    );
    Ok(())
}

fn run_caption(args: CaptionArgs) -> Result<()> {
    use crate::application::caption_use_case::{validate_path, CaptionUseCase};

    // Fail on a bad path before loading any weights
    let image = validate_path(Path::new(&args.image))?;

    let use_case = CaptionUseCase::new(&args.checkpoint_dir)?;
    if !args.show_attention {
        println!("{}", use_case.caption(&image)?);
        return Ok(());
    }

    let words = use_case.attended_words(&image)?;
    let text: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
    println!("{}", text.join(" "));
    for attended in &words {
        match attended.region {
            Some(region) => println!("  {:<12} region {:>3}  ({:.3})", attended.word, region, attended.weight),
            None         => println!("  {:<12} -", attended.word),
        }
    }
    Ok(())
}
