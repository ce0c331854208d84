pub mod architecture;
pub mod network;
pub mod snapshot;
pub mod trace;

pub use architecture::Architecture;
pub use network::Network;
pub use snapshot::ParameterSnapshot;
pub use trace::ForwardTrace;
