//! The client training step: antithetic directional-derivative estimation
//! with an EMA baseline and magnitude clip (spec.md §4.2).

use crate::loss::{Batch, LossModel};
use ruth_core::error::{Error, Result};
use ruth_core::noise::{noise, SeedCursor};
use ruth_core::types::ClientRuntimeState;

/// A schedule mapping step count to epsilon. Tests and simple deployments
/// use a constant; this trait leaves room for a decaying schedule without
/// threading it through every call site.
pub trait EpsilonSchedule {
    fn epsilon(&self, step_count: u64) -> f32;
}

/// The simplest schedule: a fixed epsilon for every step.
pub struct ConstantEpsilon(pub f32);

impl EpsilonSchedule for ConstantEpsilon {
    fn epsilon(&self, _step_count: u64) -> f32 {
        self.0
    }
}

/// What one successful training step produces, ready for the signer.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub seed_id: u64,
    pub scalar: f32,
    pub loss: f32,
    pub raw_rho: f32,
    pub epsilon: f32,
}

/// Drives the antithetic-sampling training step for one device across
/// rounds, owning the seed cursor and the EMA-baseline runtime state.
pub struct ClientRuntime {
    cursor: SeedCursor,
    state: ClientRuntimeState,
}

impl ClientRuntime {
    pub fn new(seeds: Vec<u64>, beta: f32, max_norm: f32) -> Result<Self> {
        let cursor = SeedCursor::new(seeds)?;
        Ok(ClientRuntime {
            cursor,
            state: ClientRuntimeState::new(beta, max_norm),
        })
    }

    pub fn step_count(&self) -> u64 {
        self.state.step_count
    }

    pub fn baseline(&self) -> f32 {
        self.state.baseline
    }

    /// Perform one step of spec.md §4.2's 8-step operation against an
    /// opaque model and batch. Returns `None` if the step's loss values are
    /// non-finite (a `NumericError` is logged-and-discarded by the caller's
    /// policy in spec.md §7, not propagated as a hard failure); the cursor
    /// still advances in that case (OQ-5).
    pub fn step<M: LossModel>(
        &mut self,
        model: &M,
        batch: &Batch,
        schedule: &dyn EpsilonSchedule,
    ) -> Result<Option<StepOutcome>> {
        let d = model.param_count();
        if d == 0 {
            return Err(Error::Config("model has zero trainable parameters".into()));
        }

        let seed_id = self.cursor.next_seed();
        let v = noise(seed_id, d);
        let epsilon = schedule.epsilon(self.state.step_count);

        let loss = model.loss_at(batch);
        let loss_plus = model.loss_perturbed(batch, epsilon, &v);
        let loss_minus = model.loss_perturbed(batch, -epsilon, &v);

        self.state.step_count += 1;

        if !loss_plus.is_finite() || !loss_minus.is_finite() {
            return Ok(None);
        }

        let raw_rho = (loss_plus - loss_minus) / (2.0 * epsilon);

        self.state.baseline =
            self.state.beta * self.state.baseline + (1.0 - self.state.beta) * raw_rho;
        let mut scalar = raw_rho - self.state.baseline;

        if scalar.abs() > self.state.max_norm {
            scalar = scalar.signum() * self.state.max_norm;
        }

        Ok(Some(StepOutcome {
            seed_id,
            scalar,
            loss,
            raw_rho,
            epsilon,
        }))
    }
}
