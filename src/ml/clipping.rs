// ============================================================
// Layer 5 — Global Gradient-Norm Clipping
// ============================================================
// Treats every decoder gradient as one long vector:
//
//   norm  = sqrt( Σ_params Σ_elements g² )
//   scale = max_norm / (norm + 1e-6)      when norm > max_norm
//   g     = g * scale                     for every parameter
//
// so the update direction is kept and only its length shrinks.
// Gradients are looked up by ParamId while a ModuleVisitor walks
// the module's float parameters.

use burn::{
    module::{AutodiffModule, ModuleVisitor, Param},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const EPSILON: f64 = 1e-6;

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(param.id) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct ScaleGrads<'a> {
    grads:  &'a mut GradientsParams,
    factor: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleGrads<'_> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(param.id) {
            self.grads
                .register::<B::InnerBackend, D>(param.id, grad.mul_scalar(self.factor));
        }
    }
}

/// L2 norm over the gradients of all of `module`'s float parameters.
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Rescale `grads` in place so their global norm is at most `max_norm`.
/// Returns the norm before clipping. A non-positive `max_norm` disables
/// clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(module, grads);
    if max_norm > 0.0 && norm > max_norm {
        let mut visitor = ScaleGrads { grads, factor: max_norm / (norm + EPSILON) };
        module.visit(&mut visitor);
        tracing::trace!("Clipped gradient norm {:.4} to {}", norm, max_norm);
    }
    norm
}
