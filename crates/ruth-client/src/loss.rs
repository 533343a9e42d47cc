//! The opaque model boundary the client training step perturbs.
//!
//! spec.md §9 requires the perturbed forward pass to be pure: the persistent
//! parameters must equal `theta` exactly once `loss_perturbed` returns,
//! regardless of whether an implementation realizes that with a functional
//! substitution, a copy, or an in-place apply-then-revert.

/// A model exposing the two pure loss operations the client step needs.
/// Implementations own `theta`; the trait only ever hands them a
/// perturbation direction and scale.
pub trait LossModel {
    /// Total number of trainable parameter elements (`d` in spec.md §4.2),
    /// the length every noise vector drawn for this model must have.
    fn param_count(&self) -> usize;

    /// `L(theta, x, y)` at the current parameters, unperturbed.
    fn loss_at(&self, batch: &Batch) -> f32;

    /// `L(theta + alpha * v, x, y)`. Must leave `theta` unchanged on return.
    fn loss_perturbed(&self, batch: &Batch, alpha: f32, v: &[f32]) -> f32;
}

/// A minimal stand-in for a training batch; the client step only ever
/// forwards this opaquely to the model.
#[derive(Clone, Debug)]
pub struct Batch {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

/// A trivial quadratic-loss fixture model for tests: `L = sum((theta+d)^2)`,
/// independent of the batch, whose directional derivative along `v` has a
/// closed form (`2 * dot(theta, v)`) we can assert against directly.
pub struct QuadraticLossModel {
    pub theta: Vec<f32>,
}

impl QuadraticLossModel {
    pub fn new(theta: Vec<f32>) -> Self {
        QuadraticLossModel { theta }
    }

    fn loss(&self, shifted: &[f32]) -> f32 {
        shifted.iter().map(|t| t * t).sum()
    }
}

impl LossModel for QuadraticLossModel {
    fn param_count(&self) -> usize {
        self.theta.len()
    }

    fn loss_at(&self, _batch: &Batch) -> f32 {
        self.loss(&self.theta)
    }

    fn loss_perturbed(&self, _batch: &Batch, alpha: f32, v: &[f32]) -> f32 {
        let shifted: Vec<f32> = self
            .theta
            .iter()
            .zip(v.iter())
            .map(|(t, vi)| t + alpha * vi)
            .collect();
        self.loss(&shifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_model_perturbed_matches_closed_form() {
        let model = QuadraticLossModel::new(vec![1.0, 2.0, 3.0]);
        let v = vec![1.0, 0.0, 0.0];
        let batch = Batch { x: vec![], y: vec![] };

        let l0 = model.loss_at(&batch);
        let lp = model.loss_perturbed(&batch, 0.5, &v);
        let lm = model.loss_perturbed(&batch, -0.5, &v);

        // (1+0.5)^2 + 4 + 9 = 2.25 + 13 = 15.25
        assert!((lp - 15.25).abs() < 1e-5);
        // (1-0.5)^2 + 4 + 9 = 0.25 + 13 = 13.25
        assert!((lm - 13.25).abs() < 1e-5);
        assert!((l0 - 14.0).abs() < 1e-5);
    }

    #[test]
    fn test_loss_perturbed_does_not_mutate_theta() {
        let model = QuadraticLossModel::new(vec![1.0, 2.0]);
        let batch = Batch { x: vec![], y: vec![] };
        let before = model.theta.clone();
        let _ = model.loss_perturbed(&batch, 10.0, &[1.0, 1.0]);
        assert_eq!(model.theta, before);
    }
}
