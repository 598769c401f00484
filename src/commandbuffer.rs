use core::any::TypeId;

use crate::{
    entity::PendingComponent, error::Result, ComponentValue, Entity, EntityBuilder, EntityLayer,
    Tags,
};

enum Command {
    Create(EntityBuilder),
    Destroy(Entity),
    Set(Entity, PendingComponent),
    Remove {
        id: Entity,
        type_id: TypeId,
        name: &'static str,
    },
    AddTag(Entity, Tags),
    RemoveTag(Entity, Tags),
}

type DeferFn = Box<dyn FnOnce(&mut EntityLayer) -> anyhow::Result<()> + Send + Sync>;

/// Records structural changes to a layer.
///
/// Allows creating and destroying entities, and adding or removing
/// components, while the layer is only borrowed immutably, such as in systems.
/// Commands are applied in the order they were recorded.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    defers: Vec<DeferFn>,
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("commands", &self.commands.len())
            .field("defers", &self.defers.len())
            .finish()
    }
}

impl CommandBuffer {
    /// Creates a new commandbuffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Deferred creation of an entity with the components of the builder
    pub fn create(&mut self, entity: impl Into<EntityBuilder>) -> &mut Self {
        self.commands.push(Command::Create(entity.into()));
        self
    }

    /// Deferred destruction of an entity
    pub fn destroy(&mut self, id: Entity) -> &mut Self {
        self.commands.push(Command::Destroy(id));
        self
    }

    /// Deferred set of a component for `id`, adding it if missing
    pub fn set<T: ComponentValue>(&mut self, id: Entity, value: T) -> &mut Self {
        self.commands.push(Command::Set(id, PendingComponent::new(value)));
        self
    }

    /// Deferred removal of a component for `id`
    pub fn remove<T: ComponentValue>(&mut self, id: Entity) -> &mut Self {
        self.commands.push(Command::Remove {
            id,
            type_id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        });
        self
    }

    /// Deferred addition of tags
    pub fn add_tag(&mut self, id: Entity, tags: Tags) -> &mut Self {
        self.commands.push(Command::AddTag(id, tags));
        self
    }

    /// Deferred removal of tags
    pub fn remove_tag(&mut self, id: Entity, tags: Tags) -> &mut Self {
        self.commands.push(Command::RemoveTag(id, tags));
        self
    }

    /// Defer a function to execute upon the layer after all other commands.
    ///
    /// Errors will be propagated.
    pub fn defer(
        &mut self,
        func: impl FnOnce(&mut EntityLayer) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.defers.push(Box::new(func));
        self
    }

    /// Returns the number of recorded commands, including deferred functions
    pub fn len(&self) -> usize {
        self.commands.len() + self.defers.len()
    }

    /// Returns true if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.defers.is_empty()
    }

    /// Applies all commands to the layer.
    ///
    /// Stops at the first failing command. The commandbuffer is cleared and can
    /// be reused either way.
    pub fn apply(&mut self, layer: &mut EntityLayer) -> anyhow::Result<()> {
        profile_function!();
        let result = self.apply_commands(layer);
        let defers = core::mem::take(&mut self.defers);
        self.clear();
        result?;

        defers.into_iter().try_for_each(|func| (func)(layer))
    }

    fn apply_commands(&mut self, layer: &mut EntityLayer) -> Result<()> {
        tracing::trace!(count = self.commands.len(), "applying commands");
        self.commands.drain(..).try_for_each(|cmd| match cmd {
            Command::Create(builder) => layer.create_entity_with(builder).map(|_| ()),
            Command::Destroy(id) => layer.destroy_entity(id),
            Command::Set(id, value) => layer.set_pending(id, &value),
            Command::Remove { id, type_id, name } => layer.remove_by_type(id, type_id, name),
            Command::AddTag(id, tags) => layer.add_tag(id, tags),
            Command::RemoveTag(id, tags) => layer.remove_tag(id, tags),
        })
    }

    /// Clears all commands but keeps allocations around.
    /// Is automatically called for [`Self::apply`].
    pub fn clear(&mut self) {
        self.commands.clear();
        self.defers.clear();
    }
}
