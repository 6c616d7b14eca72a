// ============================================================
// Layer 5 — Masked NLL Loss
// ============================================================
// Negative log-likelihood of the target token, averaged only
// over real (non-padding) positions of one decoder step.
//
//   loss = Σ_i  mask_i · -log p_i[target_i]  /  Σ_i mask_i
//
// The decoder already emits probabilities (softmax applied),
// so this gathers and logs them directly rather than going
// through a logits-based cross-entropy.

use burn::prelude::*;

/// probs: [batch, vocab], target: [batch], mask: [batch] (true = real).
///
/// Returns the mean loss over real positions as a one-element tensor and
/// the number of real positions. With no real positions the loss is zero.
pub fn mask_nll_loss<B: Backend>(
    probs:  Tensor<B, 2>,
    target: Tensor<B, 1, Int>,
    mask:   Tensor<B, 1, Bool>,
) -> (Tensor<B, 1>, usize) {
    let [batch, _] = probs.dims();
    let device = probs.device();

    let n_total = mask.clone().int().sum().into_scalar().elem::<i64>() as usize;
    if n_total == 0 {
        return (Tensor::zeros([1], &device), 0);
    }

    // clamp keeps log finite if a probability underflows to 0
    let cross_entropy = probs
        .gather(1, target.reshape([batch, 1]))
        .reshape([batch])
        .clamp_min(1e-12)
        .log()
        .neg();

    let loss = cross_entropy
        .mask_fill(mask.bool_not(), 0.0)
        .sum()
        .div_scalar(n_total as f64);

    (loss, n_total)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn mask(values: &[i32]) -> Tensor<TestBackend, 1, Bool> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).equal_elem(1)
    }

    #[test]
    fn test_mean_over_real_positions() {
        let device = Default::default();
        let probs = Tensor::<TestBackend, 1>::from_floats(
            [0.5f32, 0.5, 0.25, 0.75, 0.9, 0.1].as_slice(), &device,
        ).reshape([3, 2]);
        let target = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 0].as_slice(), &device);

        let (loss, n) = mask_nll_loss(probs, target, mask(&[1, 1, 0]));
        assert_eq!(n, 2);

        let expected = -(0.5f32.ln() + 0.75f32.ln()) / 2.0;
        let got: f32 = loss.into_scalar().elem();
        assert!((got - expected).abs() < 1e-5, "{got} vs {expected}");
    }

    #[test]
    fn test_padding_never_contributes() {
        let device = Default::default();
        let target = Tensor::<TestBackend, 1, Int>::from_ints([1, 0].as_slice(), &device);

        // Same real row, wildly different padded rows
        let a = Tensor::<TestBackend, 1>::from_floats([0.3f32, 0.7, 0.5, 0.5].as_slice(), &device)
            .reshape([2, 2]);
        let b = Tensor::<TestBackend, 1>::from_floats([0.3f32, 0.7, 0.0, 1.0].as_slice(), &device)
            .reshape([2, 2]);

        let (la, _) = mask_nll_loss(a, target.clone(), mask(&[1, 0]));
        let (lb, _) = mask_nll_loss(b, target, mask(&[1, 0]));
        let la: f32 = la.into_scalar().elem();
        let lb: f32 = lb.into_scalar().elem();
        assert_eq!(la, lb);
    }

    #[test]
    fn test_all_padding_is_zero_loss() {
        let device = Default::default();
        let probs  = Tensor::<TestBackend, 2>::ones([2, 3], &device).div_scalar(3.0);
        let target = Tensor::<TestBackend, 1, Int>::from_ints([0, 0].as_slice(), &device);

        let (loss, n) = mask_nll_loss(probs, target, mask(&[0, 0]));
        assert_eq!(n, 0);
        let v: f32 = loss.into_scalar().elem();
        assert_eq!(v, 0.0);
    }
}
