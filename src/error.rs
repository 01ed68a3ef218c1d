//! Engine error types
//!
//! All failure paths are explicit return values. Fatal errors abort startup
//! or terminate the render loop; recoverable errors cause the current frame
//! to be skipped and retried.

/// Engine-wide result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("GPU device creation failed: {message}")]
    DeviceCreation { message: String },

    #[error("Surface creation failed: {message}")]
    SurfaceCreation { message: String },

    #[error("Shader compilation failed: {shader}: {log}")]
    ShaderCompile { shader: String, log: String },

    #[error("Frame skipped: {reason}")]
    FrameSkipped { reason: String },

    #[error("GPU device lost: {message}")]
    DeviceLost { message: String },

    #[error("Out of GPU memory: {operation}")]
    OutOfMemory { operation: String },

    #[error("System error in {component}: {error}")]
    SystemError { component: String, error: String },
}

impl EngineError {
    /// Whether the render loop may continue after this error by skipping
    /// the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::FrameSkipped { .. } | EngineError::SystemError { .. }
        )
    }
}

/// Helper trait to attach a component context to foreign errors
pub trait EngineErrorContext<T> {
    fn engine_context(self, component: &str) -> EngineResult<T>;
}

impl<T, E> EngineErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn engine_context(self, component: &str) -> EngineResult<T> {
        self.map_err(|e| EngineError::SystemError {
            component: component.to_string(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        let skip = EngineError::FrameSkipped {
            reason: "surface outdated".to_string(),
        };
        assert!(skip.is_recoverable());

        let lost = EngineError::DeviceLost {
            message: "removed".to_string(),
        };
        assert!(!lost.is_recoverable());
    }

    #[test]
    fn context_helper_wraps_display_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing shader",
        ));
        let wrapped = result.engine_context("shader_library");
        match wrapped {
            Err(EngineError::SystemError { component, error }) => {
                assert_eq!(component, "shader_library");
                assert!(error.contains("missing shader"));
            }
            _ => panic!("expected SystemError"),
        }
    }
}
