pub mod error;
pub mod extract;
pub mod merge;
pub mod normalize;
pub mod ocr;
pub mod queue;
pub mod registry;
pub mod resolve;
pub mod types;

pub use error::ReconcileError;
pub use normalize::{normalize, NormalizedDocument};
pub use ocr::{AzureOcr, OcrCapability};
pub use queue::QueueController;
pub use registry::{MemoryRegistry, SqliteRegistry, WellRegistry};
