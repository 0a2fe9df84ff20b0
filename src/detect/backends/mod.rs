pub mod edge;
pub mod fixed;

pub use edge::EdgeDensityDetector;
pub use fixed::FixedEnvelopeDetector;
