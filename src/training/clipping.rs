//! Global L2 gradient-norm clipping.
//!
//! Burn's optimizer-level clipping works per parameter tensor. The factor
//! model is clipped on the norm of the concatenation of every parameter
//! gradient, which needs a pass over all parameter ids of the module.

use burn::module::{Module, ModuleVisitor, ParamId};
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use std::marker::PhantomData;

/// Added to the norm before dividing, as in the usual clip-by-norm formula.
const NORM_EPSILON: f64 = 1e-6;

struct SquaredNormVisitor<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    sum_squares: f64,
    phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNormVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let n = grad.shape().num_elements();
            let squares = grad.reshape([n]).powf_scalar(2.0).sum().into_scalar();
            self.sum_squares += squares.elem::<f64>();
        }
    }
}

struct ScaleVisitor<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f64,
    phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm of all gradients of `module` held in `grads`.
pub fn gradient_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let mut visitor = SquaredNormVisitor::<B> {
        grads,
        sum_squares: 0.0,
        phantom: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.sum_squares.sqrt()
}

/// Rescale every gradient so that their global L2 norm is at most
/// `max_norm`.
///
/// Returns the clipped gradients and the norm measured before clipping.
pub fn clip_gradient_norm<B, M>(
    module: &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let norm = gradient_norm::<B, M>(module, &grads);
    if norm > max_norm {
        let scale = max_norm / (norm + NORM_EPSILON);
        log::debug!("clipping gradient norm {norm:.4} to {max_norm}");
        let mut visitor = ScaleVisitor::<B> {
            grads: &mut grads,
            scale,
            phantom: PhantomData,
        };
        module.visit(&mut visitor);
    }
    (grads, norm)
}
