pub mod aggregator;
pub mod config;
pub mod control;
pub mod daemon;
pub mod enforcement;
pub mod engine;
pub mod enrichment;
pub mod events;
pub mod export;
pub mod focus;
pub mod identity;
pub mod limits;
pub mod notifications;
pub mod pin;
pub mod sampler;
pub mod service;
pub mod tracker;
pub mod zone;

pub use config::DaemonConfig;
pub use engine::Engine;
pub use service::ScreenTime;
