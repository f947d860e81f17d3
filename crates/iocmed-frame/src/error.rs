/// Errors that can occur while encoding or parsing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The service frame exceeds the link layer maximum.
    #[error("service frame too large ({size} bytes, max {max})")]
    ServiceTooLarge { size: usize, max: usize },

    /// The destination buffer cannot hold the frame.
    #[error("buffer too small ({size} bytes, need {needed})")]
    BufferTooSmall { size: usize, needed: usize },

    /// A service frame is shorter than its fixed header.
    #[error("service frame truncated ({len} bytes)")]
    Truncated { len: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
