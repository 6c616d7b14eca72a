// ============================================================
// Layer 5 — Gradient Norm Clipping
// ============================================================
// Clips the gradients of one module by their global L2 norm:
//
//   norm = √(Σ g²)              over every parameter of the module
//   if norm > max_norm:
//       g *= max_norm / norm    for every parameter
//
// All tensors are scaled by the same factor, so the direction of
// the update is kept and only its length is bounded.
//
// Gradients are stored on the inner (non-autodiff) backend, keyed
// by parameter id. The module is walked with a ModuleVisitor to
// find those ids.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

struct SquaredNorm<'a> {
    grads:  &'a GradientsParams,
    sum_sq: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_sq += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Scale<'a> {
    grads:  &'a mut GradientsParams,
    factor: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Scale<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.factor));
        }
    }
}

/// L2 norm over every gradient that belongs to `module`.
pub fn grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, sum_sq: 0.0 };
    module.visit(&mut visitor);
    visitor.sum_sq.sqrt()
}

/// Scale `grads` so their global norm is at most `max_norm`.
/// Returns the norm measured before clipping. `max_norm <= 0` leaves
/// the gradients untouched.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = grad_norm::<B, M>(module, grads);
    if max_norm > 0.0 && norm > max_norm {
        let mut visitor = Scale { grads, factor: max_norm / norm };
        module.visit(&mut visitor);
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Param;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    #[derive(Module, Debug)]
    struct TwoParams<B: Backend> {
        a: Param<Tensor<B, 1>>,
        b: Param<Tensor<B, 1>>,
    }

    /// Gradients of exactly `ga` and `gb` for the two parameters.
    fn setup(ga: [f32; 2], gb: [f32; 2]) -> (TwoParams<TestBackend>, GradientsParams) {
        let device = Default::default();
        let module = TwoParams {
            a: Param::from_tensor(Tensor::<TestBackend, 1>::zeros([2], &device)),
            b: Param::from_tensor(Tensor::<TestBackend, 1>::zeros([2], &device)),
        };
        let loss = (module.a.val() * Tensor::from_floats(ga, &device)).sum()
            + (module.b.val() * Tensor::from_floats(gb, &device)).sum();
        let mut grads = loss.backward();
        let params = GradientsParams::from_module(&mut grads, &module);
        (module, params)
    }

    #[test]
    fn test_norm_spans_all_parameters() {
        let (module, grads) = setup([3.0, 0.0], [0.0, 4.0]);
        let norm = grad_norm::<TestBackend, _>(&module, &grads);
        assert!((norm - 5.0).abs() < 1e-6, "{norm}");
    }

    #[test]
    fn test_clip_bounds_the_global_norm() {
        // Each tensor is under the limit on its own; together they are not.
        let (module, mut grads) = setup([0.8, 0.0], [0.0, 0.8]);
        let before = clip_grad_norm::<TestBackend, _>(&module, &mut grads, 1.0);
        assert!((before - 0.8 * 2f64.sqrt()).abs() < 1e-6, "{before}");

        let after = grad_norm::<TestBackend, _>(&module, &grads);
        assert!((after - 1.0).abs() < 1e-5, "{after}");

        let a = grads
            .get::<burn::backend::NdArray, 1>(module.a.id)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!((a[0] - 0.8 / (0.8 * 2f32.sqrt())).abs() < 1e-5);
        assert_eq!(a[1], 0.0);
    }

    #[test]
    fn test_small_gradients_are_left_alone() {
        let (module, mut grads) = setup([0.3, 0.0], [0.0, 0.4]);
        clip_grad_norm::<TestBackend, _>(&module, &mut grads, 1.0);
        let after = grad_norm::<TestBackend, _>(&module, &grads);
        assert!((after - 0.5).abs() < 1e-6, "{after}");
    }

    #[test]
    fn test_zero_limit_disables_clipping() {
        let (module, mut grads) = setup([30.0, 0.0], [0.0, 40.0]);
        clip_grad_norm::<TestBackend, _>(&module, &mut grads, 0.0);
        let after = grad_norm::<TestBackend, _>(&module, &grads);
        assert!((after - 50.0).abs() < 1e-4, "{after}");
    }
}
