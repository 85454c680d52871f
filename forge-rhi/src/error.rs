//! Error kind taxonomy (component B / §7).

use thiserror::Error;

/// Errors a backend operation can surface. Pipeline-barrier and destroy calls are infallible
/// and never return this type.
#[derive(Debug, Error)]
pub enum RhiError {
    /// Unrecoverable; the process must terminate.
    #[error("device lost")]
    DeviceLost,

    /// Fatal for GPU memory allocations; propagates out of the affected call for host memory.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A precondition on the API was violated; does not corrupt backend state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested feature not present on the device.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The underlying surface is gone; the swapchain must be dropped.
    #[error("surface lost")]
    SurfaceLost,

    /// The swapchain is stale; the next resize transparently re-creates it.
    #[error("swapchain out of date")]
    OutOfDate,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type RhiResult<T> = Result<T, RhiError>;
