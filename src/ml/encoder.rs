// ============================================================
// Layer 5 — VGG Feature Encoder
// ============================================================
// The convolutional half of a VGG network with the classifier
// head removed. Each block is a run of 3x3 convolutions
// (padding 1, ReLU) closed by a 2x2 / stride 2 max-pool, so every
// block halves the spatial resolution.
//
// For a 224x224 input VGG16 ends at [512, 7, 7], which we read as
// a grid of 49 feature vectors of width 512: one per image region,
// which is what the decoder attends over.
//
// The encoder is never trained. It lives on the inner (non-autodiff)
// backend and its output enters the decoder's graph as a constant,
// see `frozen_features`.

use anyhow::{Context, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::{activation::relu, backend::AutodiffBackend},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

/// Standard VGG layouts (channel widths per block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VggArch {
    Vgg11,
    Vgg13,
    #[default]
    Vgg16,
    Vgg19,
}

impl VggArch {
    pub fn blocks(&self) -> Vec<Vec<usize>> {
        let repeat = |n: usize, c: usize| vec![c; n];
        let counts: [usize; 5] = match self {
            Self::Vgg11 => [1, 1, 2, 2, 2],
            Self::Vgg13 => [2, 2, 2, 2, 2],
            Self::Vgg16 => [2, 2, 3, 3, 3],
            Self::Vgg19 => [2, 2, 4, 4, 4],
        };
        counts
            .iter()
            .zip([64, 128, 256, 512, 512])
            .map(|(&n, c)| repeat(n, c))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vgg11 => "vgg11",
            Self::Vgg13 => "vgg13",
            Self::Vgg16 => "vgg16",
            Self::Vgg19 => "vgg19",
        }
    }
}

impl fmt::Display for VggArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VggArch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vgg11" => Ok(Self::Vgg11),
            "vgg13" => Ok(Self::Vgg13),
            "vgg16" => Ok(Self::Vgg16),
            "vgg19" => Ok(Self::Vgg19),
            other => Err(format!("unknown encoder '{other}' (expected vgg11, vgg13, vgg16 or vgg19)")),
        }
    }
}

#[derive(Config, Debug)]
pub struct EncoderConfig {
    /// Output channels of every conv layer, grouped by pooling block
    pub blocks: Vec<Vec<usize>>,
    #[config(default = 3)]
    pub in_channels: usize,
}

impl EncoderConfig {
    pub fn vgg(arch: VggArch) -> Self {
        Self::new(arch.blocks())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let mut in_ch  = self.in_channels;
        let mut blocks = Vec::with_capacity(self.blocks.len());

        for widths in &self.blocks {
            let convs = widths
                .iter()
                .map(|&out_ch| {
                    let conv = Conv2dConfig::new([in_ch, out_ch], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .init(device);
                    in_ch = out_ch;
                    conv
                })
                .collect();
            let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
            blocks.push(ConvBlock { convs, pool });
        }

        Encoder { blocks }
    }

    /// Width of each output feature vector.
    pub fn feature_dim(&self) -> usize {
        self.blocks
            .iter()
            .rev()
            .find_map(|b| b.last().copied())
            .unwrap_or(self.in_channels)
    }

    /// Number of feature vectors produced for a square input of side `image_size`.
    pub fn grid_positions(&self, image_size: usize) -> usize {
        let side = self.blocks.iter().fold(image_size, |s, _| s / 2);
        side * side
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool:  MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| relu(conv.forward(x)));
        self.pool.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
}

impl<B: Backend> Encoder<B> {
    /// images: [batch, 3, H, W] → features: [batch, positions, channels]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.blocks.iter().fold(images, |x, block| block.forward(x));
        let [batch, channels, h, w] = x.dims();
        x.reshape([batch, channels, h * w]).swap_dims(1, 2)
    }

    /// Replace the random initialisation with pretrained weights stored
    /// as a Burn record (e.g. torchvision VGG weights converted offline).
    pub fn load_weights(self, path: &Path, device: &B::Device) -> Result<Self> {
        let record = CompactRecorder::new()
            .load(path.to_path_buf(), device)
            .with_context(|| format!("Cannot load encoder weights '{}'", path.display()))?;
        tracing::info!("Loaded pretrained encoder weights from '{}'", path.display());
        Ok(self.load_record(record))
    }
}

/// Build the encoder on the inner backend, pretrained if a weights
/// file is given.
pub fn build_encoder<B: Backend>(
    arch:    VggArch,
    weights: Option<&Path>,
    device:  &B::Device,
) -> Result<Encoder<B>> {
    let encoder = EncoderConfig::vgg(arch).init(device);
    match weights {
        Some(path) => encoder.load_weights(path, device),
        None => {
            tracing::warn!(
                "No encoder weights given, {} features come from a random initialisation",
                arch
            );
            Ok(encoder)
        }
    }
}

/// Run the frozen encoder and lift its output into the autodiff
/// backend as a constant: gradients stop here.
pub fn frozen_features<B: AutodiffBackend>(
    encoder: &Encoder<B::InnerBackend>,
    images:  Tensor<B::InnerBackend, 4>,
) -> Tensor<B, 3> {
    Tensor::from_inner(encoder.forward(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;

    fn tiny() -> EncoderConfig {
        EncoderConfig::new(vec![vec![4], vec![6, 8]])
    }

    #[test]
    fn test_vgg16_layout() {
        let cfg = EncoderConfig::vgg(VggArch::Vgg16);
        let convs: usize = cfg.blocks.iter().map(Vec::len).sum();
        assert_eq!(convs, 13);
        assert_eq!(cfg.feature_dim(), 512);
        assert_eq!(cfg.grid_positions(224), 49);
    }

    #[test]
    fn test_vgg19_has_sixteen_convs() {
        let convs: usize = VggArch::Vgg19.blocks().iter().map(Vec::len).sum();
        assert_eq!(convs, 16);
    }

    #[test]
    fn test_arch_from_str() {
        assert_eq!("VGG11".parse::<VggArch>(), Ok(VggArch::Vgg11));
        assert!("resnet50".parse::<VggArch>().is_err());
        assert_eq!(VggArch::default().to_string(), "vgg16");
    }

    #[test]
    fn test_forward_shape() {
        let device  = Default::default();
        let cfg     = tiny();
        let encoder = cfg.init::<TestBackend>(&device);

        let images   = Tensor::<TestBackend, 4>::ones([2, 3, 8, 8], &device);
        let features = encoder.forward(images);
        assert_eq!(features.dims(), [2, cfg.grid_positions(8), cfg.feature_dim()]);
        assert_eq!(features.dims(), [2, 4, 8]);
    }

    #[test]
    fn test_frozen_features_do_not_require_grad() {
        let device  = Default::default();
        let encoder = tiny().init::<TestBackend>(&device);
        let images  = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);

        let features = frozen_features::<Autodiff<TestBackend>>(&encoder, images);
        assert!(!features.is_require_grad());
    }

    #[test]
    fn test_load_weights_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("encoder");
        let device = Default::default();

        let encoder = tiny().init::<TestBackend>(&device);
        let images  = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let expected = encoder.forward(images.clone());
        CompactRecorder::new()
            .record(encoder.into_record(), path.clone())
            .unwrap();

        let restored = tiny()
            .init::<TestBackend>(&device)
            .load_weights(&path, &device)
            .unwrap();
        let got      = restored.forward(images).into_data().to_vec::<f32>().unwrap();
        let expected = expected.into_data().to_vec::<f32>().unwrap();
        // CompactRecorder stores half precision
        for (a, b) in got.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-2 * (1.0 + b.abs()));
        }
    }

    #[test]
    fn test_missing_weights_file_is_an_error() {
        let device = Default::default();
        let result = tiny()
            .init::<TestBackend>(&device)
            .load_weights(Path::new("/definitely/not/here"), &device);
        assert!(result.is_err());
    }
}
