use core::any::TypeId;

use crate::{
    error::{Error, Result},
    layer::Column,
    request::{Cardinality, DataRequest, Usage},
    ComponentId, ComponentMask, ComponentRegistry, ComponentValue, Entity, EntityLayer,
    ReadView, Tags, WriteView,
};

/// A packed copy of one component for every entity of an [`UpdateBuffer`].
///
/// Entry `i` belongs to the `i`th matched entity. Entities lacking an
/// optional component hold the default value and are flagged as absent.
#[derive(Debug)]
pub struct ComponentBuffer {
    component: ComponentId,
    type_id: TypeId,
    name: String,
    usage: Usage,
    cardinality: Cardinality,
    data: Column,
    exists: Vec<bool>,
}

impl ComponentBuffer {
    pub(crate) fn new(registry: &ComponentRegistry, request: &DataRequest) -> Self {
        let info = registry.info(request.component);
        Self {
            component: request.component,
            type_id: info.type_id(),
            name: info.name().into(),
            usage: request.usage,
            cardinality: request.cardinality,
            data: Column::new(info, 0),
            exists: Vec::new(),
        }
    }

    /// Returns the buffered component
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Returns the declared usage
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Returns the declared cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.exists.len()
    }

    /// Returns true if there are no entries
    pub fn is_empty(&self) -> bool {
        self.exists.is_empty()
    }

    /// Returns true if the `i`th entity owns the component
    pub fn exists(&self, i: usize) -> bool {
        self.exists.get(i).copied().unwrap_or(false)
    }

    /// Copies the live values of `entities` out of the layer
    ///
    /// # Panics
    /// If the layer stores a different type under the buffered component id.
    pub fn fill(&mut self, layer: &EntityLayer, entities: &[Entity]) {
        self.check_layer(layer);
        let src = layer.column(self.component).borrow();
        self.data.grow(entities.len());
        self.exists.clear();

        for (i, id) in entities.iter().enumerate() {
            let slot = id.index() as usize;
            // Safety
            // `i` is within the grown capacity, `slot` is a slot of the layer
            // and both columns hold the same component type
            unsafe {
                if layer.owns(slot, self.component) {
                    self.data.copy_from(i, &src, slot);
                    self.exists.push(true);
                } else {
                    self.data.construct(i);
                    self.exists.push(false);
                }
            }
        }
    }

    /// Writes the values back into the layer.
    ///
    /// Only done for write usage, and only for entities which own the
    /// component.
    ///
    /// # Panics
    /// If the layer stores a different type under the buffered component id.
    pub fn commit(&self, layer: &EntityLayer, entities: &[Entity]) {
        if self.usage != Usage::Write {
            return;
        }

        self.check_layer(layer);
        let mut dst = layer.column(self.component).borrow_mut();
        for (i, id) in entities.iter().enumerate() {
            if self.exists[i] {
                unsafe { dst.copy_from(id.index() as usize, &self.data, i) }
            }
        }
    }

    fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    fn check_layer(&self, layer: &EntityLayer) {
        let stored = layer.registry().get(self.component).map(|v| v.type_id());
        assert_eq!(
            stored,
            Some(self.type_id),
            "The layer does not store {} as component {}",
            self.name,
            self.component
        );
    }
}

/// The per frame materialized entities and components of one named buffer.
#[derive(Debug)]
pub struct UpdateBuffer {
    name: String,
    required: ComponentMask,
    tags: Tags,
    entities: Vec<Entity>,
    buffers: Vec<ComponentBuffer>,
}

impl UpdateBuffer {
    pub(crate) fn new(
        registry: &ComponentRegistry,
        name: String,
        requests: &[&DataRequest],
        tags: Tags,
    ) -> Self {
        let required = requests
            .iter()
            .filter(|v| v.is_required())
            .map(|v| v.component)
            .collect();

        // Requests of the same component share one buffer, which writes if
        // any of them does
        let mut merged: Vec<DataRequest> = Vec::with_capacity(requests.len());
        for &request in requests {
            match merged.iter_mut().find(|v| v.component == request.component) {
                Some(existing) => {
                    existing.usage = existing.usage.max(request.usage);
                    existing.cardinality = existing.cardinality.min(request.cardinality);
                }
                None => merged.push(request.clone()),
            }
        }

        Self {
            name,
            required,
            tags,
            entities: Vec::new(),
            buffers: merged
                .iter()
                .map(|v| ComponentBuffer::new(registry, v))
                .collect(),
        }
    }

    /// Returns the name of the buffer
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the components an entity must own to be selected
    pub fn required(&self) -> &ComponentMask {
        &self.required
    }

    /// Returns the tags an entity must carry to be selected
    pub fn tags(&self) -> Tags {
        self.tags
    }

    /// Selects the matching entities and copies their components
    pub fn fill(&mut self, layer: &EntityLayer) {
        profile_function!();
        self.entities.clear();
        layer.find_all_with_into(&self.required, self.tags, &mut self.entities);

        for buffer in &mut self.buffers {
            buffer.fill(layer, &self.entities);
        }
    }

    /// Writes all write usage components back to the layer
    pub fn commit(&self, layer: &EntityLayer) {
        profile_function!();
        for buffer in &self.buffers {
            buffer.commit(layer, &self.entities);
        }
    }

    /// Returns the selected entities, in slot order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns the number of selected entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entities were selected
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the component buffers
    pub fn buffers(&self) -> &[ComponentBuffer] {
        &self.buffers
    }

    fn find<T: 'static>(&self) -> Result<usize> {
        self.buffers
            .iter()
            .position(|v| v.is::<T>())
            .ok_or_else(|| Error::NotRequested {
                buffer: self.name.clone(),
                component: tynm::type_name::<T>(),
            })
    }

    /// Returns read access to component `T`
    pub fn read<T: ComponentValue>(&self) -> Result<ReadView<T>> {
        let buffer = &self.buffers[self.find::<T>()?];
        let len = self.entities.len();

        Ok(ReadView {
            // Safety
            // the buffer holds `len` initialized values of `T`
            values: unsafe { buffer.data.as_slice(len) },
            exists: &buffer.exists,
        })
    }

    /// Returns write access to component `T`
    pub fn write<T: ComponentValue>(&mut self) -> Result<WriteView<T>> {
        let index = self.find::<T>()?;
        let len = self.entities.len();
        let buffer = &mut self.buffers[index];

        if buffer.usage != Usage::Write {
            return Err(Error::ReadOnly {
                buffer: self.name.clone(),
                component: buffer.name.clone(),
            });
        }

        Ok(WriteView {
            values: unsafe { buffer.data.as_slice_mut(len) },
            exists: &buffer.exists,
        })
    }
}
