// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `caption`, and all
// their configurable flags. Defaults reproduce the classic
// Flickr8k attention-captioning recipe.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{attention::AttentionMethod, encoder::VggArch};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the attention decoder on an image/caption corpus
    Train(TrainArgs),

    /// Caption an image using a trained checkpoint
    Caption(CaptionArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Caption index: Flickr8k token file or `image,caption` CSV
    #[arg(long, default_value = "data/captions.txt")]
    pub captions_file: String,

    /// Directory the image names in the caption index refer to
    #[arg(long, default_value = "data/images")]
    pub images_dir: String,

    /// Directory for decoder weights, vocabulary, config and loss curve
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of training iterations, one caption each
    #[arg(long, visible_alias = "epochs", default_value_t = 50_000)]
    pub iterations: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// Maximum gradient norm
    #[arg(long, default_value_t = 0.5)]
    pub grad_clip: f64,

    /// Probability that a caption is trained with teacher forcing
    #[arg(long, default_value_t = 0.5)]
    pub teacher_forcing_ratio: f64,

    /// Dropout between stacked LSTM layers
    #[arg(long, default_value_t = 0.05)]
    pub dropout: f64,

    #[arg(long, default_value_t = 2)]
    pub n_layers: usize,

    #[arg(long, default_value_t = 128)]
    pub hidden_size: usize,

    /// Attention scoring: dot, general or concat
    #[arg(long, default_value_t = AttentionMethod::General)]
    pub attention: AttentionMethod,

    /// Iterations between progress lines
    #[arg(long, default_value_t = 100)]
    pub print_every: usize,

    /// Iterations between loss-curve points
    #[arg(long, default_value_t = 200)]
    pub plot_every: usize,

    /// Iterations between intermediate checkpoints (0 = only at the end)
    #[arg(long, default_value_t = 0)]
    pub save_every: usize,

    /// Images are resized to image_size x image_size
    #[arg(long, default_value_t = 224)]
    pub image_size: usize,

    /// Encoder architecture: vgg11, vgg13, vgg16 or vgg19
    #[arg(long, default_value_t = VggArch::Vgg16)]
    pub encoder: VggArch,

    /// Pretrained encoder weights (burn record file)
    #[arg(long)]
    pub encoder_weights: Option<String>,

    /// Captions with this many words or more are skipped
    #[arg(long, default_value_t = 20)]
    pub max_caption_len: usize,

    /// Words seen fewer times than this map to <unk>
    #[arg(long, default_value_t = 1)]
    pub min_word_count: usize,

    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            captions_file:         a.captions_file,
            images_dir:            a.images_dir,
            checkpoint_dir:        a.checkpoint_dir,
            iterations:            a.iterations,
            learning_rate:         a.learning_rate,
            grad_clip:             a.grad_clip,
            teacher_forcing_ratio: a.teacher_forcing_ratio,
            dropout:               a.dropout,
            n_layers:              a.n_layers,
            hidden_size:           a.hidden_size,
            attention:             a.attention,
            print_every:           a.print_every,
            plot_every:            a.plot_every,
            save_every:            a.save_every,
            image_size:            a.image_size,
            encoder:               a.encoder,
            encoder_weights:       a.encoder_weights,
            max_caption_len:       a.max_caption_len,
            min_word_count:        a.min_word_count,
            train_fraction:        a.train_fraction,
            seed:                  a.seed,
        }
    }
}

/// All arguments for the `caption` command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image to describe
    #[arg(long)]
    pub image: String,

    /// Directory where the training run saved its checkpoint
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Also print the most attended feature-grid cell for every word
    #[arg(long)]
    pub show_attention: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_args(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["image-captioner", "train"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Train(args) => args,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cfg: TrainConfig = train_args(&[]).into();
        let def = TrainConfig::default();
        assert_eq!(cfg.iterations, def.iterations);
        assert_eq!(cfg.learning_rate, def.learning_rate);
        assert_eq!(cfg.grad_clip, def.grad_clip);
        assert_eq!(cfg.teacher_forcing_ratio, def.teacher_forcing_ratio);
        assert_eq!(cfg.dropout, def.dropout);
        assert_eq!(cfg.n_layers, def.n_layers);
        assert_eq!(cfg.hidden_size, def.hidden_size);
        assert_eq!(cfg.attention, def.attention);
        assert_eq!(cfg.print_every, def.print_every);
        assert_eq!(cfg.plot_every, def.plot_every);
        assert_eq!(cfg.encoder, def.encoder);
    }

    #[test]
    fn test_epochs_alias_and_enums() {
        let args = train_args(&["--epochs", "10", "--attention", "concat", "--encoder", "vgg11"]);
        assert_eq!(args.iterations, 10);
        assert_eq!(args.attention, AttentionMethod::Concat);
        assert_eq!(args.encoder, VggArch::Vgg11);
    }

    #[test]
    fn test_unknown_attention_is_rejected() {
        let argv = ["image-captioner", "train", "--attention", "bahdanau"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_caption_args() {
        let argv = ["image-captioner", "caption", "--image", "dog.jpg", "--show-attention"];
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Caption(args) => {
                assert_eq!(args.image, "dog.jpg");
                assert_eq!(args.checkpoint_dir, "checkpoints");
                assert!(args.show_attention);
            }
            other => panic!("expected caption, got {other:?}"),
        }
    }
}
