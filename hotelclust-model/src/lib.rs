pub mod batched;
pub mod classifier;
pub mod config;
pub mod metrics;
pub mod random_forest;
