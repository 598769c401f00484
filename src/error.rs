use core::fmt;

use thiserror::Error;

use crate::Entity;

/// Errors produced by entity storage, buffers and the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The entity {0} does not exist or has been destroyed")]
    NoSuchEntity(Entity),
    #[error("The entity {entity} belongs to layer {} but was used with layer {layer}", .entity.layer())]
    ForeignEntity { entity: Entity, layer: u8 },
    #[error("The entity {0} does not have the component {1}")]
    MissingComponent(Entity, String),
    #[error("The component {0} has not been registered")]
    UnregisteredComponent(String),
    #[error("No update buffer named {0:?}")]
    MissingBuffer(String),
    #[error("The component {component} was not requested by the buffer {buffer:?}")]
    NotRequested { buffer: String, component: String },
    #[error("The component {component} is requested as read only in the buffer {buffer:?}")]
    ReadOnly { buffer: String, component: String },
    #[error("The system {system:?} depends on the unknown system {dependency:?}")]
    UnknownDependency { system: String, dependency: String },
    #[error("A system named {0:?} has already been added")]
    DuplicateSystem(String),
    #[error("The systems {0:?} form a dependency cycle")]
    DependencyCycle(Vec<String>),
    #[error("Layer index {0} is out of range")]
    InvalidLayerIndex(usize),
    #[error("All layer indices are in use")]
    TooManyLayers,
    #[error("The layer uses a different component registry than the systems")]
    RegistryMismatch,
}

/// Result alias for [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

/// Error returned when executing systems.
#[derive(Debug)]
pub enum SystemError {
    /// The schedule itself could not be built or applied
    Schedule(Error),
    /// A system returned an error from its update
    Failed {
        /// The name of the failing system
        name: String,
        /// The error returned by the system
        source: anyhow::Error,
    },
    /// A system panicked during its update
    Panicked {
        /// The name of the panicking system
        name: String,
    },
}

impl SystemError {
    /// Returns the name of the system which caused the error, if any
    pub fn system(&self) -> Option<&str> {
        match self {
            SystemError::Schedule(_) => None,
            SystemError::Failed { name, .. } | SystemError::Panicked { name } => Some(name),
        }
    }
}

impl From<Error> for SystemError {
    fn from(value: Error) -> Self {
        Self::Schedule(value)
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::Schedule(err) => write!(f, "Failed to execute schedule: {err}"),
            SystemError::Failed { name, source } => write!(f, "System {name:?} failed: {source:#}"),
            SystemError::Panicked { name } => write!(f, "System {name:?} panicked"),
        }
    }
}

impl std::error::Error for SystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SystemError::Schedule(err) => Some(err),
            SystemError::Failed { source, .. } => {
                let source: &(dyn std::error::Error + 'static) = source.as_ref();
                Some(source)
            }
            SystemError::Panicked { .. } => None,
        }
    }
}

/// Result alias for [`SystemError`]
pub type SystemResult<T> = core::result::Result<T, SystemError>;
