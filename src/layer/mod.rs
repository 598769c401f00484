mod layers;
mod storage;

use core::{any::TypeId, fmt, ptr::NonNull};
use std::sync::Arc;

use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};

pub use layers::*;
pub(crate) use storage::*;

use crate::{
    entity::{EntityEntry, EntryFlags, PendingComponent},
    error::{Error, Result},
    events::{EventKind, EventSink, LayerEvent, MessageQueue},
    ComponentId, ComponentMask, ComponentRegistry, ComponentValue, Entity, EntityBuilder,
    EntityIndex, Tags,
};

/// The default number of entity slots of a layer
pub const MAX_ENTITIES: usize = 1024;

/// An isolated simulation space owning its entities and component storage.
///
/// Every registered component type has one column of `capacity` values, where
/// the value of entity slot `i` is stored at index `i`. When all slots are in
/// use the capacity doubles and every column is reallocated.
///
/// Entity creation and destruction is deferred: created entities become alive
/// and destroyed entities release their slot in [`EntityLayer::update`], which
/// is the only place slot state transitions are applied.
pub struct EntityLayer {
    index: u8,
    registry: Arc<ComponentRegistry>,
    entries: Vec<EntityEntry>,
    free: Vec<EntityIndex>,
    columns: Box<[AtomicRefCell<Column>]>,
    live: usize,
    messages: MessageQueue,
}

impl EntityLayer {
    /// Creates a new layer with index 0 and the default capacity
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_capacity(registry, MAX_ENTITIES)
    }

    /// Creates a new layer with room for `capacity` entities before growing
    pub fn with_capacity(registry: Arc<ComponentRegistry>, capacity: usize) -> Self {
        Self::build(registry, 0, capacity)
    }

    /// Creates a layer with an explicit layer index, baked into every handle
    /// it creates.
    pub fn with_index(registry: Arc<ComponentRegistry>, index: usize) -> Result<Self> {
        if index >= MAX_LAYERS {
            return Err(Error::InvalidLayerIndex(index));
        }

        Ok(Self::build(registry, index as u8, MAX_ENTITIES))
    }

    pub(crate) fn build(registry: Arc<ComponentRegistry>, index: u8, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let columns = registry
            .iter()
            .map(|info| AtomicRefCell::new(Column::new(info, capacity)))
            .collect();

        Self {
            index,
            registry,
            entries: vec![EntityEntry::default(); capacity],
            free: (0..capacity as EntityIndex).rev().collect(),
            columns,
            live: 0,
            messages: MessageQueue::new(),
        }
    }

    /// Returns the index of this layer
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Returns the component registry the layer was created with
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Returns the number of entity slots
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of live entities
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Returns the lifecycle messages produced by the last update
    pub fn messages(&self) -> &MessageQueue {
        &self.messages
    }

    /// Returns the message queue mutably, for draining or subscribing
    pub fn messages_mut(&mut self) -> &mut MessageQueue {
        &mut self.messages
    }

    /// Subscribe to lifecycle messages of the given kinds
    pub fn subscribe<S>(&mut self, kinds: &[EventKind], sink: S)
    where
        S: EventSink + 'static,
    {
        self.messages.subscribe(kinds, sink)
    }

    /// Returns the id of component `T`
    pub fn component_id<T: 'static>(&self) -> Result<ComponentId> {
        self.registry
            .id_of::<T>()
            .ok_or_else(|| Error::UnregisteredComponent(tynm::type_name::<T>()))
    }

    fn resolve(&self, type_id: TypeId, name: &str) -> Result<ComponentId> {
        self.registry
            .id_of_type(type_id)
            .ok_or_else(|| Error::UnregisteredComponent(name.into()))
    }

    /// Returns the slot of an entity which is alive or pending creation
    fn slot(&self, id: Entity) -> Result<usize> {
        if id.layer() != self.index {
            return Err(Error::ForeignEntity {
                entity: id,
                layer: self.index,
            });
        }

        let index = id.index() as usize;
        match self.entries.get(index) {
            Some(entry) if entry.version == id.version() && entry.is_alive_or_created() => {
                Ok(index)
            }
            _ => Err(Error::NoSuchEntity(id)),
        }
    }

    fn entry(&self, id: Entity) -> Result<&EntityEntry> {
        let slot = self.slot(id)?;
        Ok(&self.entries[slot])
    }

    fn grow(&mut self) {
        profile_function!();
        let old_cap = self.entries.len();
        let new_cap = old_cap * 2;
        tracing::debug!(old_cap, new_cap, layer = self.index, "growing entity storage");

        self.entries.resize(new_cap, EntityEntry::default());
        self.free
            .extend((old_cap as EntityIndex..new_cap as EntityIndex).rev());

        for column in self.columns.iter_mut() {
            let column = column.get_mut();
            column.grow(new_cap);
            debug_assert_eq!(column.cap(), new_cap);
        }
    }

    /// Creates a new entity.
    ///
    /// The entity is not alive until the next [`Self::update`], though
    /// components and tags may be added to it immediately.
    pub fn create_entity(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(v) => v,
            None => {
                self.grow();
                match self.free.pop() {
                    Some(v) => v,
                    None => unreachable!("growing storage yields free slots"),
                }
            }
        };

        let version = self.entries[index as usize].claim();
        Entity::from_parts(index, version, self.index)
    }

    /// Creates a new entity with the components and tags of `builder`.
    pub fn create_entity_with(&mut self, builder: impl Into<EntityBuilder>) -> Result<Entity> {
        let builder = builder.into();

        let ids = builder
            .components
            .iter()
            .map(|v| self.resolve(v.type_id, v.name))
            .collect::<Result<Vec<_>>>()?;

        let id = self.create_entity();
        for (component, pending) in ids.into_iter().zip(&builder.components) {
            self.write_pending(id, component, pending)?;
        }

        self.entries[id.index() as usize].tags |= builder.tags;
        Ok(id)
    }

    /// Marks an entity for destruction on the next [`Self::update`].
    ///
    /// The entity stays alive and queryable until then. Destroying an entity
    /// which is already pending destruction does nothing.
    pub fn destroy_entity(&mut self, id: Entity) -> Result<()> {
        let slot = self.slot(id)?;
        self.entries[slot].flags |= EntryFlags::DESTROY;
        Ok(())
    }

    /// Applies all pending creations and destructions in slot order, then
    /// dispatches the resulting messages.
    pub fn update(&mut self) {
        profile_function!();
        self.messages.begin();

        let mut created = 0;
        let mut destroyed = 0;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.flags.contains(EntryFlags::DESTROY) {
                let id = Entity::from_parts(index as EntityIndex, entry.version, self.index);
                if entry.is_alive() {
                    self.live -= 1;
                    self.messages.push(LayerEvent {
                        kind: EventKind::Destroyed,
                        id,
                    });
                }

                entry.release();
                self.free.push(index as EntityIndex);
                destroyed += 1;
            } else if entry.flags.contains(EntryFlags::CREATE) {
                entry.flags = EntryFlags::ALIVE;
                self.live += 1;
                created += 1;

                self.messages.push(LayerEvent {
                    kind: EventKind::Created,
                    id: Entity::from_parts(index as EntityIndex, entry.version, self.index),
                });
            }
        }

        if created > 0 || destroyed > 0 {
            tracing::trace!(layer = self.index, created, destroyed, "applied entity changes");
        }

        self.messages.dispatch();
    }

    /// Returns true if the entity is alive.
    ///
    /// Entities created this frame are not alive, entities pending destruction
    /// are.
    pub fn is_alive(&self, id: Entity) -> bool {
        self.entry(id).map(|v| v.is_alive()).unwrap_or(false)
    }

    /// Returns true if the entity is alive or pending creation
    pub fn is_alive_or_created(&self, id: Entity) -> bool {
        self.slot(id).is_ok()
    }

    /// Returns true if the entity will be destroyed on the next update
    pub fn is_pending_destroy(&self, id: Entity) -> bool {
        self.entry(id)
            .map(|v| v.is_pending_destroy())
            .unwrap_or(false)
    }

    /// Adds a component, constructing the default value in place.
    ///
    /// If the entity already owns the component the existing value is left
    /// untouched. Returns a pointer to the value, which is invalidated by the
    /// next mutable access to the layer.
    pub fn add_component(&mut self, id: Entity, component: ComponentId) -> Result<NonNull<u8>> {
        let slot = self.slot(id)?;
        let column = self
            .columns
            .get_mut(component.index())
            .ok_or_else(|| Error::UnregisteredComponent(component.to_string()))?
            .get_mut();
        let entry = &mut self.entries[slot];

        if !entry.components.contains(component) {
            entry.components.set(component);
            // Safety
            // slot is within the capacity which all columns share
            unsafe { column.construct(slot) };
        }

        let ptr = unsafe { column.at_mut(slot) };
        match NonNull::new(ptr) {
            Some(v) => Ok(v),
            None => unreachable!("column pointers are never null"),
        }
    }

    /// Adds component `T`, returning the existing or newly constructed value
    pub fn add<T: ComponentValue>(&mut self, id: Entity) -> Result<&mut T> {
        let component = self.component_id::<T>()?;
        let ptr = self.add_component(id, component)?;
        // Safety
        // The column holds values of `T` and is borrowed mutably through `self`
        Ok(unsafe { &mut *ptr.as_ptr().cast::<T>() })
    }

    /// Sets component `T`, adding it if it is missing
    pub fn set<T: ComponentValue>(&mut self, id: Entity, value: T) -> Result<()> {
        *self.add::<T>(id)? = value;
        Ok(())
    }

    fn write_pending(
        &mut self,
        id: Entity,
        component: ComponentId,
        pending: &PendingComponent,
    ) -> Result<()> {
        let ptr = self.add_component(id, component)?;
        debug_assert_eq!(
            pending.bytes.len(),
            self.registry.info(component).size(),
            "Mismatched component size"
        );

        unsafe {
            core::ptr::copy_nonoverlapping(
                pending.bytes.as_ptr().cast::<u8>(),
                ptr.as_ptr(),
                pending.bytes.len(),
            );
        }

        Ok(())
    }

    pub(crate) fn set_pending(&mut self, id: Entity, pending: &PendingComponent) -> Result<()> {
        let component = self.resolve(pending.type_id, pending.name)?;
        self.write_pending(id, component, pending)
    }

    fn check_component<T: ComponentValue>(&self, id: Entity) -> Result<(usize, ComponentId)> {
        let component = self.component_id::<T>()?;
        let slot = self.slot(id)?;
        if !self.entries[slot].components.contains(component) {
            return Err(Error::MissingComponent(
                id,
                self.registry.info(component).name().into(),
            ));
        }

        Ok((slot, component))
    }

    /// Borrows component `T` of an entity
    pub fn get<T: ComponentValue>(&self, id: Entity) -> Result<AtomicRef<T>> {
        let (slot, component) = self.check_component::<T>(id)?;
        let column = self.columns[component.index()].borrow();

        // Safety
        // The entity owns the component, so the value is initialized
        Ok(AtomicRef::map(column, |column| unsafe {
            &*column.at(slot).cast::<T>()
        }))
    }

    /// Mutably borrows component `T` of an entity
    pub fn get_mut<T: ComponentValue>(&self, id: Entity) -> Result<AtomicRefMut<T>> {
        let (slot, component) = self.check_component::<T>(id)?;
        let column = self.columns[component.index()].borrow_mut();

        Ok(AtomicRefMut::map(column, |column| unsafe {
            &mut *column.at_mut(slot).cast::<T>()
        }))
    }

    /// Returns true if the entity owns the component
    pub fn has_component(&self, id: Entity, component: ComponentId) -> bool {
        self.entry(id)
            .map(|v| v.components.contains(component))
            .unwrap_or(false)
    }

    /// Returns true if the entity owns component `T`
    pub fn has<T: ComponentValue>(&self, id: Entity) -> bool {
        match self.registry.id_of::<T>() {
            Some(component) => self.has_component(id, component),
            None => false,
        }
    }

    /// Removes a component from the entity.
    ///
    /// Only the ownership bit is cleared, the stored value is not dropped.
    pub fn remove_component(&mut self, id: Entity, component: ComponentId) -> Result<()> {
        let slot = self.slot(id)?;
        self.entries[slot].components.clear(component);
        Ok(())
    }

    /// Removes component `T` from the entity
    pub fn remove<T: ComponentValue>(&mut self, id: Entity) -> Result<()> {
        let component = self.component_id::<T>()?;
        self.remove_component(id, component)
    }

    pub(crate) fn remove_by_type(&mut self, id: Entity, type_id: TypeId, name: &str) -> Result<()> {
        let component = self.resolve(type_id, name)?;
        self.remove_component(id, component)
    }

    /// Returns the components owned by the entity
    pub fn components(&self, id: Entity) -> Result<ComponentMask> {
        Ok(self.entry(id)?.components)
    }

    /// Adds tags to the entity
    pub fn add_tag(&mut self, id: Entity, tags: Tags) -> Result<()> {
        let slot = self.slot(id)?;
        self.entries[slot].tags |= tags;
        Ok(())
    }

    /// Removes tags from the entity
    pub fn remove_tag(&mut self, id: Entity, tags: Tags) -> Result<()> {
        let slot = self.slot(id)?;
        self.entries[slot].tags.remove(tags);
        Ok(())
    }

    /// Returns true if the entity has all of `tags`
    pub fn has_tag(&self, id: Entity, tags: Tags) -> bool {
        self.entry(id)
            .map(|v| v.tags.contains(tags))
            .unwrap_or(false)
    }

    /// Returns the tags of the entity
    pub fn tags(&self, id: Entity) -> Result<Tags> {
        Ok(self.entry(id)?.tags)
    }

    /// Returns all alive entities owning every component in `components` and
    /// carrying every tag in `tags`, in slot order.
    pub fn find_all_with(&self, components: &ComponentMask, tags: Tags) -> Vec<Entity> {
        let mut result = Vec::new();
        self.find_all_with_into(components, tags, &mut result);
        result
    }

    /// Same as [`Self::find_all_with`] but appends to an existing vector
    pub fn find_all_with_into(
        &self,
        components: &ComponentMask,
        tags: Tags,
        result: &mut Vec<Entity>,
    ) {
        profile_function!();
        result.extend(
            self.entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.matches(components, tags))
                .map(|(index, entry)| {
                    Entity::from_parts(index as EntityIndex, entry.version, self.index)
                }),
        );
    }

    /// Iterate all alive entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_alive())
            .map(|(index, entry)| {
                Entity::from_parts(index as EntityIndex, entry.version, self.index)
            })
    }

    #[inline]
    pub(crate) fn column(&self, component: ComponentId) -> &AtomicRefCell<Column> {
        &self.columns[component.index()]
    }

    #[inline]
    pub(crate) fn owns(&self, slot: usize, component: ComponentId) -> bool {
        self.entries[slot].components.contains(component)
    }
}

impl fmt::Debug for EntityLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLayer")
            .field("index", &self.index)
            .field("capacity", &self.capacity())
            .field("live", &self.live)
            .field("components", &self.registry.len())
            .finish()
    }
}
