use core::fmt;

use crate::ComponentId;

/// The name of the buffer used when a request does not name one
pub const DEFAULT_BUFFER: &str = "";

/// Describes how a system accesses a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Usage {
    /// The component is only read. Changes are never committed
    Read,
    /// The component is written back to the layer on commit
    Write,
}

/// Describes whether a component must be present for an entity to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cardinality {
    /// Only entities owning the component are selected
    Required,
    /// The component is fetched when present, without affecting the selection
    Optional,
}

/// A resolved declaration of a component a system needs, and which named
/// buffer it is gathered into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataRequest {
    /// The requested component
    pub component: ComponentId,
    /// Read or write access
    pub usage: Usage,
    /// Required or optional
    pub cardinality: Cardinality,
    /// The named buffer this request belongs to
    pub buffer: String,
}

impl DataRequest {
    /// Creates a request for the default buffer
    pub fn new(component: ComponentId, usage: Usage, cardinality: Cardinality) -> Self {
        Self {
            component,
            usage,
            cardinality,
            buffer: DEFAULT_BUFFER.into(),
        }
    }

    /// Moves the request into a named buffer
    pub fn in_buffer(mut self, buffer: impl Into<String>) -> Self {
        self.buffer = buffer.into();
        self
    }

    /// Returns true if the request writes
    #[inline]
    pub fn is_write(&self) -> bool {
        self.usage == Usage::Write
    }

    /// Returns true if the component must be present
    #[inline]
    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }
}

impl fmt::Display for DataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let usage = match self.usage {
            Usage::Read => "read",
            Usage::Write => "write",
        };

        let cardinality = match self.cardinality {
            Cardinality::Required => "",
            Cardinality::Optional => "?",
        };

        write!(f, "{usage} {}{cardinality} in {:?}", self.component, self.buffer)
    }
}
