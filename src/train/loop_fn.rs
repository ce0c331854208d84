use log::{debug, trace};

use crate::error::{NetworkError, Result};
use crate::layers::output::SoftmaxCrossEntropy;
use crate::math::matrix::Matrix;
use crate::network::network::{accuracy, Network};
use crate::train::epoch_stats::{EpochStats, TrainingReport};
use crate::train::train_config::TrainConfig;

/// How often (in epochs) progress is logged at debug level.
const LOG_EVERY: usize = 100;

/// Trains `network` on the full batch `(x, y)` for `config.epochs` epochs.
///
/// Every epoch is one forward pass, one loss evaluation and one
/// gradient-descent step over all rows, in order. There is no shuffling,
/// no mini-batching and no early stopping.
///
/// # Errors
/// - `ShapeMismatch` if `x` or `y` do not fit the architecture or their row
///   counts differ
/// - `EmptyBatch` if `x` has no rows
///
/// With `epochs == 0` the parameters are untouched, `losses` and
/// `checkpoints` are empty and the final metrics describe the untrained
/// network.
pub fn train_loop(
    network: &mut Network,
    x: &Matrix,
    y: &Matrix,
    config: &TrainConfig,
) -> Result<TrainingReport> {
    if x.rows() == 0 {
        return Err(NetworkError::EmptyBatch);
    }
    network.check_batch(x, y)?;

    let mut losses = Vec::with_capacity(config.epochs);
    let mut checkpoints = Vec::new();

    for index in 0..config.epochs {
        let (output, fwd) = network.forward(x)?;
        let loss = SoftmaxCrossEntropy::loss(&output, y);
        losses.push(loss);

        let epoch = index + 1;
        if config.is_checkpoint(index) || epoch % LOG_EVERY == 0 {
            let acc = accuracy(&output, y);
            if config.is_checkpoint(index) {
                checkpoints.push(EpochStats { epoch, loss, accuracy: acc });
            }
            if epoch % LOG_EVERY == 0 {
                debug!("epoch {epoch}/{} - loss: {loss:.4} - accuracy: {acc:.4}", config.epochs);
            }
        }
        trace!("epoch {epoch} loss {loss}");

        network.backward(&fwd, y, &output)?;
    }

    let final_output = network.probabilities(x)?;
    let final_accuracy = accuracy(&final_output, y);
    let final_loss = match losses.last() {
        Some(&loss) => loss,
        None => SoftmaxCrossEntropy::loss(&final_output, y),
    };

    Ok(TrainingReport {
        losses,
        checkpoints,
        final_loss,
        final_accuracy,
    })
}
