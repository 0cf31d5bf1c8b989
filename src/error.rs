//! Error type shared by every blit operation.

use std::fmt;

/// Shader stage named in compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Fatal errors raised by the blit engine.
///
/// A completeness failure is not an error: operations that can hit one return
/// `Ok(false)` instead.
#[derive(Debug, thiserror::Error)]
pub enum BlitError {
    /// An internally generated shader failed to compile.
    #[error("failed to compile internal blit {stage} shader: {log}")]
    ShaderCompile {
        /// Stage that failed.
        stage: ShaderStage,
        /// Driver info log.
        log: String,
    },
    /// An internally generated program failed to link.
    #[error("failed to link internal blit program: {0}")]
    ProgramLink(String),
    /// The backend could not create a GL object.
    #[error("failed to create {kind}: {message}")]
    ResourceCreation {
        /// Object kind, e.g. `"texture"`.
        kind: &'static str,
        /// Backend message.
        message: String,
    },
    /// Host scratch memory for the readback path could not be reserved.
    #[error("failed to allocate {bytes} bytes of scratch memory")]
    OutOfMemory {
        /// Requested size.
        bytes: usize,
    },
    /// The readback path has no conversion for this destination.
    #[error("no cpu conversion for destination format {format:#06x} / type {ty:#06x}")]
    UnsupportedFormat {
        /// Destination pixel format.
        format: u32,
        /// Destination pixel type.
        ty: u32,
    },
}

impl BlitError {
    /// Whether this error belongs to the out-of-memory class.
    ///
    /// Generated shaders must always compile and link, so a failure there is
    /// reported the same way as an allocation failure: the context should be
    /// considered unusable for further blits.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            Self::ShaderCompile { .. } | Self::ProgramLink(_) | Self::OutOfMemory { .. }
        )
    }

    pub(crate) fn creation(kind: &'static str) -> impl FnOnce(String) -> Self {
        move |message| Self::ResourceCreation { kind, message }
    }
}

/// Result alias used throughout the crate.
pub type BlitResult<T> = Result<T, BlitError>;
