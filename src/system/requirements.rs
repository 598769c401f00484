use core::any::TypeId;

use crate::{
    error::{Error, Result},
    request::{Cardinality, DataRequest, Usage},
    ComponentRegistry, ComponentValue, Tags,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement {
    type_id: TypeId,
    name: String,
    usage: Usage,
    cardinality: Cardinality,
    buffer: String,
}

/// The components and tags a system declares, by type.
///
/// Types are resolved to component ids when the system is added to a
/// [`SystemsManager`](crate::SystemsManager).
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    components: Vec<Requirement>,
    tags: Vec<(String, Tags)>,
}

impl Requirements {
    /// Creates an empty set of requirements
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a component access in the named buffer.
    ///
    /// # Panics
    /// If the same component, usage and cardinality is already declared for
    /// the buffer.
    pub fn push<T: ComponentValue>(
        &mut self,
        usage: Usage,
        cardinality: Cardinality,
        buffer: &str,
    ) {
        let requirement = Requirement {
            type_id: TypeId::of::<T>(),
            name: tynm::type_name::<T>(),
            usage,
            cardinality,
            buffer: buffer.into(),
        };

        assert!(
            !self.components.contains(&requirement),
            "Duplicate request of {} ({usage:?}, {cardinality:?}) in buffer {buffer:?}",
            requirement.name,
        );

        self.components.push(requirement);
    }

    /// Requires entities of the named buffer to carry `tags`
    pub fn push_tag(&mut self, tags: Tags, buffer: &str) {
        match self.tags.iter_mut().find(|v| v.0 == buffer) {
            Some(existing) => existing.1 |= tags,
            None => self.tags.push((buffer.into(), tags)),
        }
    }

    /// Returns the tag requirements per buffer
    pub fn tags(&self) -> &[(String, Tags)] {
        &self.tags
    }

    /// Returns the number of component declarations
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.tags.is_empty()
    }

    /// Resolves the declared types against a registry
    pub fn resolve(&self, registry: &ComponentRegistry) -> Result<Vec<DataRequest>> {
        self.components
            .iter()
            .map(|v| {
                let component = registry
                    .id_of_type(v.type_id)
                    .ok_or_else(|| Error::UnregisteredComponent(v.name.clone()))?;

                Ok(DataRequest {
                    component,
                    usage: v.usage,
                    cardinality: v.cardinality,
                    buffer: v.buffer.clone(),
                })
            })
            .collect()
    }
}
