mod buffer;
mod view;

pub use buffer::*;
pub use view::*;

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    request::DataRequest,
    CommandBuffer, ComponentRegistry, Entity, EntityBuilder, EntityLayer, Tags,
};

/// Everything a system sees during one update: one [`UpdateBuffer`] per named
/// buffer, and a [`CommandBuffer`] for structural changes.
///
/// Systems never create or destroy entities directly. Recorded commands are
/// applied by [`UpdateData::commit_changes`] once all systems of the frame have
/// finished.
#[derive(Debug)]
pub struct UpdateData {
    buffers: Vec<UpdateBuffer>,
    commands: CommandBuffer,
}

impl UpdateData {
    /// Creates the buffers for a set of resolved requests.
    ///
    /// A buffer is created for every name used by either a request or a tag
    /// requirement, in order of first appearance.
    pub fn new(
        registry: &ComponentRegistry,
        requests: &[DataRequest],
        tags: &[(String, Tags)],
    ) -> Self {
        let names = requests
            .iter()
            .map(|v| v.buffer.as_str())
            .chain(tags.iter().map(|v| v.0.as_str()))
            .unique()
            .collect_vec();

        let buffers = names
            .into_iter()
            .map(|name| {
                let requests = requests.iter().filter(|v| v.buffer == name).collect_vec();
                let tags = tags
                    .iter()
                    .filter(|v| v.0 == name)
                    .fold(Tags::empty(), |acc, v| acc | v.1);

                UpdateBuffer::new(registry, name.into(), &requests, tags)
            })
            .collect();

        Self {
            buffers,
            commands: CommandBuffer::new(),
        }
    }

    /// Returns the buffer with the given name
    pub fn data(&self, name: &str) -> Result<&UpdateBuffer> {
        self.buffers
            .iter()
            .find(|v| v.name() == name)
            .ok_or_else(|| Error::MissingBuffer(name.into()))
    }

    /// Returns the buffer with the given name mutably
    pub fn data_mut(&mut self, name: &str) -> Result<&mut UpdateBuffer> {
        self.buffers
            .iter_mut()
            .find(|v| v.name() == name)
            .ok_or_else(|| Error::MissingBuffer(name.into()))
    }

    /// Iterate all buffers
    pub fn buffers(&self) -> impl Iterator<Item = &UpdateBuffer> {
        self.buffers.iter()
    }

    /// Returns the commands recorded by the system
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Records the creation of an entity
    pub fn create_entity(&mut self, entity: impl Into<EntityBuilder>) {
        self.commands.create(entity);
    }

    /// Records the destruction of an entity
    pub fn destroy_entity(&mut self, id: Entity) {
        self.commands.destroy(id);
    }

    /// Fills every buffer from the layer
    pub fn fill(&mut self, layer: &EntityLayer) {
        for buffer in &mut self.buffers {
            buffer.fill(layer);
        }
    }

    /// Writes every buffer back to the layer
    pub fn commit(&self, layer: &EntityLayer) {
        for buffer in &self.buffers {
            buffer.commit(layer);
        }
    }

    /// Applies the recorded commands
    pub fn commit_changes(&mut self, layer: &mut EntityLayer) -> anyhow::Result<()> {
        self.commands.apply(layer)
    }
}
