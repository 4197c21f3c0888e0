pub mod config;
pub mod pipeline;

pub use config::CaptureConfig;
pub use pipeline::PacketPipeline;
