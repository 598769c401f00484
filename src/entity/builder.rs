use core::{any::TypeId, mem::MaybeUninit, ptr};

use smallvec::SmallVec;

use crate::{error::Result, ComponentValue, Entity, EntityLayer, Tags};

/// A type erased component value waiting to be written into a layer
#[derive(Clone)]
pub(crate) struct PendingComponent {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) bytes: SmallVec<[MaybeUninit<u8>; 32]>,
}

impl PendingComponent {
    pub(crate) fn new<T: ComponentValue>(value: T) -> Self {
        let size = core::mem::size_of::<T>();
        let mut bytes: SmallVec<[MaybeUninit<u8>; 32]> =
            SmallVec::from_elem(MaybeUninit::uninit(), size);

        // Safety
        // `T` is `Copy`, so duplicating its bytes is a valid copy of the value
        unsafe {
            ptr::copy_nonoverlapping(
                (&value as *const T).cast::<MaybeUninit<u8>>(),
                bytes.as_mut_ptr(),
                size,
            );
        }

        Self {
            type_id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
            bytes,
        }
    }
}

/// Incrementally build a single entity which allows for more efficient
/// creation than adding components one by one.
#[derive(Default, Clone)]
pub struct EntityBuilder {
    pub(crate) components: Vec<PendingComponent>,
    pub(crate) tags: Tags,
}

impl EntityBuilder {
    /// Creates a new entity builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the component of the entity, replacing any previous value of the
    /// same type.
    pub fn set<T: ComponentValue>(&mut self, value: T) -> &mut Self {
        let pending = PendingComponent::new(value);
        match self
            .components
            .iter_mut()
            .find(|v| v.type_id == pending.type_id)
        {
            Some(existing) => *existing = pending,
            None => self.components.push(pending),
        }

        self
    }

    /// Sets the default value of `T`
    pub fn set_default<T: ComponentValue>(&mut self) -> &mut Self {
        self.set(T::default())
    }

    /// Adds tags to the entity
    pub fn tag(&mut self, tags: Tags) -> &mut Self {
        self.tags |= tags;
        self
    }

    /// Returns true if the builder holds a value of `T`
    pub fn has<T: ComponentValue>(&self) -> bool {
        self.components
            .iter()
            .any(|v| v.type_id == TypeId::of::<T>())
    }

    /// Creates the entity in the layer and clears the builder.
    ///
    /// The entity becomes alive on the next [`EntityLayer::update`].
    pub fn spawn(&mut self, layer: &mut EntityLayer) -> Result<Entity> {
        let builder = core::mem::take(self);
        layer.create_entity_with(builder)
    }
}

impl From<&mut EntityBuilder> for EntityBuilder {
    fn from(builder: &mut EntityBuilder) -> Self {
        core::mem::take(builder)
    }
}

impl core::fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityBuilder")
            .field(
                "components",
                &self.components.iter().map(|v| v.name).collect::<Vec<_>>(),
            )
            .field("tags", &self.tags)
            .finish()
    }
}
