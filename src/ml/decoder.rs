// ============================================================
// Layer 5 — Attention Decoder
// ============================================================
// Generates a caption one word per call to `step`:
//
//   previous word ──► Embedding ─┐
//                                ├─ cat ─► LSTM x n_layers ─► h_top
//   previous context ────────────┘                              │
//                                                               ▼
//   projected image grid ───────────────────────────────► Attention
//                                                               │
//                                 [h_top; context] ◄── context ─┘
//                                        │
//                                        ▼
//                              Linear ─► log_softmax ─► next word
//
// Shapes use `batch` as the first dimension everywhere; training
// runs one caption at a time so batch = 1 in practice.
//
// Reference: Luong et al. (2015) Effective Approaches to
//            Attention-based NMT; Xu et al. (2015) Show, Attend and Tell

use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::ml::attention::{Attention, AttentionConfig, AttentionMethod};

#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub vocab_size:  usize,
    pub hidden_size: usize,
    /// Channel width of the encoder's feature vectors
    pub feature_dim: usize,
    #[config(default = 1)]
    pub n_layers:    usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = "AttentionMethod::General")]
    pub attention:   AttentionMethod,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderRnn<B> {
        let h = self.hidden_size;
        let n_layers = self.n_layers.max(1);

        // Layer 0 sees [word embedding; previous context]
        let lstm = (0..n_layers)
            .map(|layer| {
                let d_input = if layer == 0 { 2 * h } else { h };
                LstmConfig::new(d_input, h, true).init(device)
            })
            .collect();

        DecoderRnn {
            embedding:    EmbeddingConfig::new(self.vocab_size, h).init(device),
            feature_proj: LinearConfig::new(self.feature_dim, h).init(device),
            lstm,
            attention:    AttentionConfig::new(h).with_method(self.attention).init(device),
            out:          LinearConfig::new(2 * h, self.vocab_size).init(device),
            dropout:      DropoutConfig::new(self.dropout).init(),
            hidden_size:  h,
            n_layers,
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderRnn<B: Backend> {
    pub embedding:    Embedding<B>,
    pub feature_proj: Linear<B>,
    pub lstm:         Vec<Lstm<B>>,
    pub attention:    Attention<B>,
    pub out:          Linear<B>,
    pub dropout:      Dropout,
    pub hidden_size:  usize,
    pub n_layers:     usize,
}

/// Everything carried from one decoding step to the next.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    /// Last attention context: [batch, hidden]
    pub context: Tensor<B, 2>,
    /// Per-layer hidden state: [n_layers, batch, hidden]
    pub hidden:  Tensor<B, 3>,
    /// Per-layer cell state: [n_layers, batch, hidden]
    pub cell:    Tensor<B, 3>,
}

/// Output of one decoding step.
pub struct DecoderStep<B: Backend> {
    /// Log-probabilities over the vocabulary: [batch, vocab]
    pub log_probs: Tensor<B, 2>,
    pub state:     DecoderState<B>,
    /// Attention weights over image positions: [batch, positions]
    pub attention: Tensor<B, 2>,
}

impl<B: Backend> DecoderRnn<B> {
    /// All-zero context and recurrent state.
    pub fn init_state(&self, batch: usize, device: &B::Device) -> DecoderState<B> {
        let h = self.hidden_size;
        DecoderState {
            context: Tensor::zeros([batch, h], device),
            hidden:  Tensor::zeros([self.n_layers, batch, h], device),
            cell:    Tensor::zeros([self.n_layers, batch, h], device),
        }
    }

    /// features: [batch, positions, feature_dim] → [batch, positions, hidden]
    /// Done once per image, not once per step.
    pub fn project_features(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        self.feature_proj.forward(features)
    }

    /// One decoding step.
    ///
    /// word_input: [batch, 1] previous word indices
    /// maps:       [batch, positions, hidden] projected image features
    pub fn step(
        &self,
        word_input: Tensor<B, 2, Int>,
        state:      DecoderState<B>,
        maps:       Tensor<B, 3>,
    ) -> DecoderStep<B> {
        let [batch, _] = word_input.dims();
        let h = self.hidden_size;

        let embedded = self.embedding.forward(word_input); // [batch, 1, h]
        let last_ctx = state.context.reshape([batch, 1, h]);
        let mut x    = Tensor::cat(vec![embedded, last_ctx], 2);

        let mut hidden = Vec::with_capacity(self.n_layers);
        let mut cell   = Vec::with_capacity(self.n_layers);
        for (layer, lstm) in self.lstm.iter().enumerate() {
            let prev = LstmState::new(
                layer_slice(&state.cell, layer, batch, h),
                layer_slice(&state.hidden, layer, batch, h),
            );
            let (output, next) = lstm.forward(x, Some(prev));
            hidden.push(next.hidden.reshape([1, batch, h]));
            cell.push(next.cell.reshape([1, batch, h]));

            // Dropout between stacked layers, not after the last one
            x = if layer + 1 < self.lstm.len() {
                self.dropout.forward(output)
            } else {
                output
            };
        }
        let rnn_output = x.reshape([batch, h]);

        let attention = self.attention.forward(rnn_output.clone(), maps.clone());
        let context   = self.attention.context(attention.clone(), maps);

        let logits    = self.out.forward(Tensor::cat(vec![rnn_output, context.clone()], 1));
        let log_probs = log_softmax(logits, 1);

        DecoderStep {
            log_probs,
            state: DecoderState {
                context,
                hidden: Tensor::cat(hidden, 0),
                cell:   Tensor::cat(cell, 0),
            },
            attention,
        }
    }
}

/// [n_layers, batch, h] → [batch, h] for one layer
fn layer_slice<B: Backend>(t: &Tensor<B, 3>, layer: usize, batch: usize, h: usize) -> Tensor<B, 2> {
    t.clone()
        .slice([layer..layer + 1, 0..batch, 0..h])
        .reshape([batch, h])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn config() -> DecoderConfig {
        DecoderConfig::new(11, 8, 5).with_n_layers(2).with_dropout(0.0)
    }

    #[test]
    fn test_init_state_is_zero() {
        let device  = Default::default();
        let decoder = config().init::<TestBackend>(&device);
        let state   = decoder.init_state(1, &device);

        assert_eq!(state.context.dims(), [1, 8]);
        assert_eq!(state.hidden.dims(), [2, 1, 8]);
        let total: f32 = state.cell.abs().sum().into_scalar();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_step_shapes() {
        let device  = Default::default();
        let decoder = config().init::<TestBackend>(&device);

        let features = Tensor::<TestBackend, 3>::ones([1, 4, 5], &device);
        let maps     = decoder.project_features(features);
        assert_eq!(maps.dims(), [1, 4, 8]);

        let input = Tensor::<TestBackend, 1, Int>::from_ints([0].as_slice(), &device).reshape([1, 1]);
        let step  = decoder.step(input, decoder.init_state(1, &device), maps);

        assert_eq!(step.log_probs.dims(), [1, 11]);
        assert_eq!(step.attention.dims(), [1, 4]);
        assert_eq!(step.state.hidden.dims(), [2, 1, 8]);
        assert_eq!(step.state.cell.dims(), [2, 1, 8]);
        assert_eq!(step.state.context.dims(), [1, 8]);
    }

    #[test]
    fn test_log_probs_normalise() {
        let device  = Default::default();
        let decoder = config().init::<TestBackend>(&device);

        let maps  = decoder.project_features(Tensor::ones([1, 3, 5], &device));
        let input = Tensor::<TestBackend, 1, Int>::from_ints([4].as_slice(), &device).reshape([1, 1]);
        let step  = decoder.step(input, decoder.init_state(1, &device), maps);

        let total: f32 = step.log_probs.exp().sum().into_scalar();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_state_changes_between_steps() {
        let device  = Default::default();
        let decoder = config().init::<TestBackend>(&device);
        let maps    = decoder.project_features(Tensor::ones([1, 3, 5], &device));

        let input = Tensor::<TestBackend, 1, Int>::from_ints([3].as_slice(), &device).reshape([1, 1]);
        let first = decoder.step(input.clone(), decoder.init_state(1, &device), maps.clone());
        let h1: Vec<f32> = first.state.hidden.clone().into_data().to_vec().unwrap();
        let second = decoder.step(input, first.state, maps);
        let h2: Vec<f32> = second.state.hidden.into_data().to_vec().unwrap();

        assert_ne!(h1, h2);
    }

    #[test]
    fn test_single_layer_decoder() {
        let device  = Default::default();
        let decoder = DecoderConfig::new(7, 4, 4)
            .with_attention(AttentionMethod::Concat)
            .init::<TestBackend>(&device);
        assert_eq!(decoder.lstm.len(), 1);

        let maps  = decoder.project_features(Tensor::ones([2, 3, 4], &device));
        let input = Tensor::<TestBackend, 1, Int>::from_ints([0, 0].as_slice(), &device).reshape([2, 1]);
        let step  = decoder.step(input, decoder.init_state(2, &device), maps);
        assert_eq!(step.log_probs.dims(), [2, 7]);
    }
}
