/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`           : number of full-batch passes over the training data
/// - `checkpoint_every` : record an `EpochStats` checkpoint every this many
///                        epochs (the last epoch is always recorded); `0`
///                        records only the last epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub checkpoint_every: usize,
}

impl TrainConfig {
    /// Checkpoints every 10 epochs.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            checkpoint_every: 10,
        }
    }

    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every;
        self
    }

    /// Whether the 0-based epoch `index` gets a checkpoint.
    pub fn is_checkpoint(&self, index: usize) -> bool {
        index + 1 == self.epochs || (self.checkpoint_every > 0 && index % self.checkpoint_every == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_sampled_epochs_and_the_last() {
        let config = TrainConfig::new(25);
        let picked: Vec<usize> = (0..25).filter(|&i| config.is_checkpoint(i)).collect();
        assert_eq!(picked, vec![0, 10, 20, 24]);
    }

    #[test]
    fn zero_interval_keeps_only_the_last() {
        let config = TrainConfig::new(5).with_checkpoint_every(0);
        let picked: Vec<usize> = (0..5).filter(|&i| config.is_checkpoint(i)).collect();
        assert_eq!(picked, vec![4]);
    }
}
