// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One caption per optimiser step, as in the classic
// attention-decoder recipe:
//
//   1. encode the image with the frozen encoder
//   2. decide once per caption whether to use teacher forcing
//      (probability = teacher_forcing_ratio, "scheduled sampling")
//   3. step the decoder over the target words, summing the NLL
//      of every target word
//        - teacher forcing: the next input is the target word
//        - free running:    the next input is the decoder's own
//                           argmax, and decoding stops at EOS
//   4. backward, clip the global gradient norm, Adam step
//
// Key Burn insight:
//   - The decoder trains on MyBackend (Autodiff<Wgpu>)
//   - The encoder and image tensors live on MyInnerBackend (Wgpu);
//     Tensor::from_inner turns features into constants of the graph
//   - decoder.valid() gives the inner-backend copy for validation
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam,
//            Bengio et al. (2015) Scheduled Sampling

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{path::Path, time::Instant};

use crate::application::train_use_case::TrainConfig;
use crate::data::{dataset::CaptionDataset, image_loader::load_image};
use crate::domain::vocabulary::{EOS_TOKEN, SOS_TOKEN};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{LossTracker, MetricsLogger},
    timing::time_since,
};
use crate::ml::clipping::clip_grad_norm;
use crate::ml::decoder::DecoderRnn;
use crate::ml::encoder::{build_encoder, frozen_features, Encoder, EncoderConfig};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

/// Hyperparameters of a single optimisation step.
#[derive(Debug, Clone, Copy)]
pub struct StepConfig {
    pub learning_rate:         f64,
    pub teacher_forcing_ratio: f64,
    /// Maximum global gradient norm, 0 disables clipping
    pub grad_clip:             f64,
}

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub iterations: usize,
    /// Iterations skipped because the image could not be loaded
    pub skipped:    usize,
    pub val_loss:   Option<f64>,
    pub curve:      Vec<f64>,
}

/// `[1, 1]` tensor holding one word index.
pub fn token_input<B: Backend>(token: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    Tensor::<B, 1, Int>::from_ints([token as i32].as_slice(), device).reshape([1, 1])
}

/// Summed negative log-likelihood of `targets` for one caption.
///
/// With `teacher_forcing` every step is fed the previous target;
/// otherwise every step is fed the previous argmax and the loop ends
/// as soon as EOS is predicted. Returns None for an empty target.
pub fn sequence_nll<B: Backend>(
    decoder:         &DecoderRnn<B>,
    features:        Tensor<B, 3>,
    targets:         &[usize],
    teacher_forcing: bool,
) -> Option<Tensor<B, 1>> {
    let device = features.device();
    let maps   = decoder.project_features(features);

    let mut state = decoder.init_state(1, &device);
    let mut input = token_input::<B>(SOS_TOKEN, &device);
    let mut loss: Option<Tensor<B, 1>> = None;

    for &target in targets {
        let step   = decoder.step(input, state, maps.clone());
        state      = step.state;
        let target = token_input::<B>(target, &device);

        let nll = step.log_probs.clone().gather(1, target.clone()).neg().reshape([1]);
        loss = Some(match loss {
            Some(total) => total + nll,
            None        => nll,
        });

        if teacher_forcing {
            input = target;
        } else {
            let predicted = step.log_probs.argmax(1);
            let word = predicted.clone().into_scalar().elem::<i64>() as usize;
            input = predicted;
            if word == EOS_TOKEN {
                break;
            }
        }
    }

    loss
}

/// Train on one caption. Returns the updated decoder and the summed
/// loss divided by the target length.
pub fn train_sequence<B, O, R>(
    decoder:  DecoderRnn<B>,
    optim:    &mut O,
    features: Tensor<B, 3>,
    targets:  &[usize],
    cfg:      StepConfig,
    rng:      &mut R,
) -> (DecoderRnn<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<DecoderRnn<B>, B>,
    R: Rng,
{
    let use_teacher_forcing = rng.gen::<f64>() < cfg.teacher_forcing_ratio;

    let Some(loss) = sequence_nll(&decoder, features, targets, use_teacher_forcing) else {
        return (decoder, 0.0);
    };
    let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

    // Backward pass + clipped Adam update
    let grads     = loss.backward();
    let mut grads = GradientsParams::from_grads(grads, &decoder);
    clip_grad_norm::<B, _>(&decoder, &mut grads, cfg.grad_clip);
    let decoder   = optim.step(cfg.learning_rate, decoder, grads);

    (decoder, loss_val / targets.len() as f64)
}

/// `"<elapsed> (- <remaining>) (<iter> <pct>%) <avg>"`
pub fn progress_line(elapsed_secs: f64, iteration: usize, iterations: usize, avg_loss: f64) -> String {
    let percent = iteration as f64 / iterations.max(1) as f64;
    format!(
        "{} ({} {}%) {:.4}",
        time_since(elapsed_secs, percent),
        iteration,
        (percent * 100.0) as u32,
        avg_loss,
    )
}

/// Mean teacher-forced per-word NLL over a dataset, no gradients.
pub fn evaluate<B: Backend>(
    decoder:    &DecoderRnn<B>,
    encoder:    &Encoder<B>,
    dataset:    &CaptionDataset,
    image_size: usize,
    device:     &B::Device,
) -> Option<f64> {
    use burn::data::dataset::Dataset;

    let mut total = 0.0f64;
    let mut count = 0usize;

    for sample in dataset.iter() {
        let images = match load_image::<B>(&sample.image, image_size, device) {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!("Skipping validation image: {e:#}");
                continue;
            }
        };
        let features = encoder.forward(images);
        if let Some(loss) = sequence_nll(decoder, features, &sample.target_ids, true) {
            total += loss.into_scalar().elem::<f64>() / sample.target_len() as f64;
            count += 1;
        }
    }

    (count > 0).then(|| total / count as f64)
}

pub fn run_training(
    cfg:          &TrainConfig,
    vocab_size:   usize,
    train_set:    CaptionDataset,
    val_set:      CaptionDataset,
    ckpt_manager: CheckpointManager,
) -> Result<TrainingSummary> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let encoder = build_encoder::<MyInnerBackend>(
        cfg.encoder,
        cfg.encoder_weights.as_deref().map(Path::new),
        &device,
    )?;
    let encoder_cfg = EncoderConfig::vgg(cfg.encoder);

    train_loop::<MyBackend>(
        cfg, vocab_size, &encoder, &encoder_cfg, &train_set, &val_set, &ckpt_manager, device,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn train_loop<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    vocab_size:   usize,
    encoder:      &Encoder<B::InnerBackend>,
    encoder_cfg:  &EncoderConfig,
    train_set:    &CaptionDataset,
    val_set:      &CaptionDataset,
    ckpt_manager: &CheckpointManager,
    device:       B::Device,
) -> Result<TrainingSummary> {
    if train_set.sample_count() == 0 {
        bail!("No training samples: check the caption file and images directory");
    }
    if encoder_cfg.grid_positions(cfg.image_size) == 0 {
        bail!(
            "Image size {} is too small for the encoder's {} pooling stages",
            cfg.image_size,
            encoder_cfg.blocks.len()
        );
    }

    // ── Build decoder ─────────────────────────────────────────────────────────
    let decoder_cfg = cfg.decoder_config(vocab_size, encoder_cfg.feature_dim());
    let mut decoder: DecoderRnn<B> = decoder_cfg.init(&device);
    tracing::info!(
        "Decoder ready: {} LSTM layers, hidden={}, vocab={}, attention={}",
        decoder_cfg.n_layers, decoder_cfg.hidden_size, vocab_size, decoder_cfg.attention
    );

    // ── Adam (gradients are clipped by global norm in train_sequence) ──────────
    let mut optim = AdamConfig::new().init::<B, DecoderRnn<B>>();

    let step_cfg = StepConfig {
        learning_rate:         cfg.learning_rate,
        teacher_forcing_ratio: cfg.teacher_forcing_ratio,
        grad_clip:             cfg.grad_clip,
    };
    let mut rng     = StdRng::seed_from_u64(cfg.seed);
    let mut tracker = LossTracker::new(cfg.print_every, cfg.plot_every);
    let logger      = MetricsLogger::create(ckpt_manager.dir())?;
    let start       = Instant::now();
    let mut skipped = 0usize;

    // ── Iteration loop ────────────────────────────────────────────────────────
    for iteration in 1..=cfg.iterations {
        let Some(sample) = train_set.cyclic(iteration) else { break };

        let report = match load_image::<B::InnerBackend>(&sample.image, cfg.image_size, &device) {
            Ok(images) => {
                let features = frozen_features::<B>(encoder, images);
                let (updated, loss) = train_sequence(
                    decoder, &mut optim, features, &sample.target_ids, step_cfg, &mut rng,
                );
                decoder = updated;
                tracker.record(iteration, loss)
            }
            Err(e) => {
                tracing::warn!("Skipping iteration {iteration}: {e:#}");
                skipped += 1;
                tracker.skip(iteration)
            }
        };

        if let Some(avg) = report.print {
            let elapsed = start.elapsed().as_secs_f64();
            println!("{}", progress_line(elapsed, iteration, cfg.iterations, avg));
        }
        if let Some(point) = report.plot {
            logger.log(&point)?;
        }
        if cfg.save_every > 0 && iteration % cfg.save_every == 0 {
            ckpt_manager.save_decoder(&decoder)?;
            tracing::info!("Checkpoint saved at iteration {}", iteration);
        }
    }

    ckpt_manager.save_decoder(&decoder)?;
    tracing::info!("Decoder and attention parameters saved to '{}'", ckpt_manager.dir().display());
    tracing::info!("Loss curve written to '{}'", logger.csv_path().display());

    // ── Validation (InnerBackend, dropout off) ────────────────────────────────
    let val_loss = evaluate(&decoder.valid(), encoder, val_set, cfg.image_size, &device);
    match val_loss {
        Some(loss) => tracing::info!("Validation loss: {:.4} over {} captions", loss, val_set.sample_count()),
        None       => tracing::info!("No validation captions, skipping validation"),
    }

    Ok(TrainingSummary {
        iterations: cfg.iterations,
        skipped,
        val_loss,
        curve: tracker.points().iter().map(|p| p.avg_loss).collect(),
    })
}
