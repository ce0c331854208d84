pub mod epoch_stats;
pub mod train_config;
pub mod loop_fn;

pub use epoch_stats::{EpochStats, TrainingReport};
pub use train_config::TrainConfig;
pub use loop_fn::train_loop;
