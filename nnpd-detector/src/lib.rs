pub mod config_gen;
pub mod http;
pub mod log_watcher;
pub mod loop_;
pub mod metrics;

pub use http::DetectorState;
pub use loop_::run_detector_loop;
