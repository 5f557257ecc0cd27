//! Model registry, scorers and output normalization

pub mod loader;
pub mod normalizer;
pub mod onnx;
pub mod registry;
pub mod scorer;

pub use loader::ModelLoader;
pub use normalizer::{normalize, LabelOrder};
pub use registry::{ModelId, ModelRegistry, ModelSpec};
pub use scorer::{Capability, RawOutput, Scorer};
