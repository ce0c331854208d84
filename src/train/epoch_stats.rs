use serde::{Deserialize, Serialize};

/// One sampled point of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean cross-entropy over the batch, before this epoch's update.
    pub loss: f64,
    /// Training accuracy as a fraction in [0, 1], from the same forward pass as `loss`.
    pub accuracy: f64,
}

/// Everything a training run produces besides the updated parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Loss of every epoch, in order; `losses.len()` equals the epoch count.
    pub losses: Vec<f64>,
    pub checkpoints: Vec<EpochStats>,
    /// Loss of the last epoch.
    pub final_loss: f64,
    /// Training accuracy after the last update.
    pub final_accuracy: f64,
}
