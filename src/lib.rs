pub mod cli;
pub mod config;
pub mod image;
mod metrics;
pub mod profile;
pub mod rekognition;
pub mod server;
pub mod sigv4;
pub mod workflow;

pub use config::Opts;
pub use image::{ImageFormat, ImagePayload};
pub use rekognition::{CompareError, RekognitionClient};
pub use workflow::{CompareSession, ComparisonResult, FaceComparator, FaceMatch, Outcome};
