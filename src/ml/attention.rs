// ============================================================
// Layer 5 — Attention over image regions
// ============================================================
// Scores the decoder's current hidden state h against every
// projected feature vector f_i of the image grid (Luong et al.):
//
//   dot      score_i = h · f_i
//   general  score_i = h · (W f_i)
//   concat   score_i = v · tanh(W [h; f_i])
//
// Softmax over positions turns the scores into weights that sum
// to 1; the context vector is the weighted sum of the f_i.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttentionMethod {
    Dot,
    #[default]
    General,
    Concat,
}

impl fmt::Display for AttentionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dot     => "dot",
            Self::General => "general",
            Self::Concat  => "concat",
        })
    }
}

impl FromStr for AttentionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot"     => Ok(Self::Dot),
            "general" => Ok(Self::General),
            "concat"  => Ok(Self::Concat),
            other => Err(format!("unknown attention method '{other}' (expected dot, general or concat)")),
        }
    }
}

#[derive(Config, Debug)]
pub struct AttentionConfig {
    pub hidden_size: usize,
    #[config(default = "AttentionMethod::General")]
    pub method: AttentionMethod,
}

impl AttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Attention<B> {
        let h = self.hidden_size;
        let (weight, v) = match self.method {
            AttentionMethod::Dot => (None, None),
            AttentionMethod::General => (Some(LinearConfig::new(h, h).init(device)), None),
            AttentionMethod::Concat => (
                Some(LinearConfig::new(2 * h, h).init(device)),
                Some(LinearConfig::new(h, 1).with_bias(false).init(device)),
            ),
        };
        Attention { weight, v, hidden_size: h }
    }
}

/// The scoring method is encoded by which projections exist:
/// none → dot, `weight` only → general, `weight` + `v` → concat.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    weight:      Option<Linear<B>>,
    v:           Option<Linear<B>>,
    hidden_size: usize,
}

impl<B: Backend> Attention<B> {
    pub fn method(&self) -> AttentionMethod {
        match (&self.weight, &self.v) {
            (None, _)          => AttentionMethod::Dot,
            (Some(_), None)    => AttentionMethod::General,
            (Some(_), Some(_)) => AttentionMethod::Concat,
        }
    }

    /// hidden: [batch, H], maps: [batch, L, H] → weights: [batch, L]
    pub fn forward(&self, hidden: Tensor<B, 2>, maps: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.scores(hidden, maps), 1)
    }

    /// weights: [batch, L], maps: [batch, L, H] → context: [batch, H]
    pub fn context(&self, weights: Tensor<B, 2>, maps: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, positions] = weights.dims();
        weights
            .reshape([batch, 1, positions])
            .matmul(maps)
            .reshape([batch, self.hidden_size])
    }

    fn scores(&self, hidden: Tensor<B, 2>, maps: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, positions, h] = maps.dims();

        match (&self.weight, &self.v) {
            (Some(w), Some(v)) => {
                let expanded = hidden.reshape([batch, 1, h]).expand([batch, positions, h]);
                let energy   = w.forward(Tensor::cat(vec![expanded, maps], 2)).tanh();
                v.forward(energy).reshape([batch, positions])
            }
            (weight, _) => {
                let keys = match weight {
                    Some(w) => w.forward(maps),
                    None    => maps,
                };
                keys.matmul(hidden.reshape([batch, h, 1]))
                    .reshape([batch, positions])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    fn row_sums(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.sum_dim(1).into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_weights_are_distributions_for_every_method() {
        let device = Default::default();
        for method in [AttentionMethod::Dot, AttentionMethod::General, AttentionMethod::Concat] {
            let attn = AttentionConfig::new(6).with_method(method).init::<TestBackend>(&device);
            assert_eq!(attn.method(), method);

            let hidden = Tensor::<TestBackend, 2>::random([2, 6], Distribution::Default, &device);
            let maps   = Tensor::<TestBackend, 3>::random([2, 5, 6], Distribution::Default, &device);
            let w      = attn.forward(hidden, maps);

            assert_eq!(w.dims(), [2, 5]);
            for s in row_sums(w) {
                assert!((s - 1.0).abs() < 1e-5, "{method}: row sums to {s}");
            }
        }
    }

    #[test]
    fn test_dot_attention_prefers_aligned_position() {
        let device = Default::default();
        let attn   = AttentionConfig::new(2)
            .with_method(AttentionMethod::Dot)
            .init::<TestBackend>(&device);

        let hidden = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0]], &device);
        let maps   = Tensor::<TestBackend, 3>::from_floats(
            [[[0.0, 1.0], [5.0, 0.0], [-5.0, 0.0]]],
            &device,
        );
        let w = attn.forward(hidden, maps).into_data().to_vec::<f32>().unwrap();
        assert!(w[1] > 0.99);
        assert!(w[2] < 1e-3);
    }

    #[test]
    fn test_context_is_weighted_sum() {
        let device = Default::default();
        let attn   = AttentionConfig::new(2).init::<TestBackend>(&device);

        let weights = Tensor::<TestBackend, 2>::from_floats([[0.25, 0.75]], &device);
        let maps    = Tensor::<TestBackend, 3>::from_floats([[[4.0, 0.0], [0.0, 8.0]]], &device);
        let ctx     = attn.context(weights, maps).into_data().to_vec::<f32>().unwrap();
        assert_eq!(ctx, vec![1.0, 6.0]);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("General".parse::<AttentionMethod>(), Ok(AttentionMethod::General));
        assert!("additive".parse::<AttentionMethod>().is_err());
    }
}
