//! Upload of finished batches to the GPU

pub mod context;
pub mod upload;

pub use context::GpuContext;
pub use upload::GpuBatch;
