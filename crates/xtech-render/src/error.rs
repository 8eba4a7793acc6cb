use std::fmt;
use std::path::PathBuf;

/// Failure reported by a [`Backend`](crate::backend::Backend).
///
/// The render layer turns all of these into degraded output plus a log line;
/// only backend construction surfaces them to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The image file does not exist or cannot be opened.
    NotFound(PathBuf),
    /// The file exists but is not a decodable image.
    Decode { path: PathBuf, reason: String },
    /// Not enough texture memory left for the allocation.
    OutOfMemory { requested: usize, free: usize },
    /// Surface dimensions above the backend's largest size tier.
    SurfaceTooLarge { w: u32, h: u32, max: u32 },
    /// Device or driver level failure.
    Device(String),
}

impl BackendError {
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, BackendError::OutOfMemory { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotFound(path) => write!(f, "image not found: {}", path.display()),
            BackendError::Decode { path, reason } => {
                write!(f, "cannot decode {}: {reason}", path.display())
            }
            BackendError::OutOfMemory { requested, free } => {
                write!(f, "out of texture memory ({requested} bytes requested, {free} free)")
            }
            BackendError::SurfaceTooLarge { w, h, max } => {
                write!(f, "surface {w}x{h} exceeds the {max}px limit")
            }
            BackendError::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = Result<T, BackendError>;
