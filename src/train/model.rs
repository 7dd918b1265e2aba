//! The seams a fitted model plugs into

use crate::data::Batch;
use crate::io::ArchitectureInfo;
use crate::Tensor;

/// Monte Carlo and importance-weighted sample counts for one forward pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleCounts {
    pub mc_samples: usize,
    pub iw_samples: usize,
}

impl Default for SampleCounts {
    fn default() -> Self {
        Self {
            mc_samples: 1,
            iw_samples: 1,
        }
    }
}

/// A latent-variable model fitted by [`Fitter`](super::Fitter)
///
/// Parameters are owned by the model. `forward` builds its graph from clones
/// of them, which share gradient cells with the originals, so the optimizer
/// sees the gradients through `parameters_mut`.
pub trait LatentModel {
    /// Whatever the objective needs from a forward pass (reconstructions,
    /// posterior parameters, samples...)
    type Output;

    fn forward(&self, batch: &Batch, samples: SampleCounts) -> Self::Output;

    /// Named parameters, in the same order as [`LatentModel::parameters_mut`]
    fn parameters(&self) -> Vec<(String, Tensor)>;

    fn parameters_mut(&mut self) -> &mut [Tensor];

    /// Switch between training and evaluation behavior
    fn set_training(&mut self, _training: bool) {}

    /// Layer sizes recorded in checkpoints
    fn architecture(&self) -> ArchitectureInfo {
        ArchitectureInfo::default()
    }
}

/// Per-call information passed to an [`Objective`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossContext {
    pub mc_samples: usize,
    pub iw_samples: usize,
    /// Weight of the annealed regularizer, in `[0, 1]`
    pub anneal_weight: f32,
    pub training: bool,
}

/// Scalar loss of a model output on a batch
pub trait Objective<O> {
    fn loss(&self, batch: &Batch, output: &O, ctx: &LossContext) -> Tensor;
}

impl<O, F> Objective<O> for F
where
    F: Fn(&Batch, &O, &LossContext) -> Tensor,
{
    fn loss(&self, batch: &Batch, output: &O, ctx: &LossContext) -> Tensor {
        self(batch, output, ctx)
    }
}
