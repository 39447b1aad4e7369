pub mod client;
pub mod filter;
pub mod loop_;
pub mod metrics;
pub mod pause;

pub use client::ClusterManagerClient;
pub use loop_::{run_aggregator_loop, AggregatorConfig};
pub use pause::PauseController;
