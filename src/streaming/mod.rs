pub mod aggregator;
pub mod supervisor;

pub use aggregator::BarAggregator;
pub use supervisor::{StreamingStatus, StreamingSupervisor};
