use core::any::TypeId;
use std::collections::BTreeMap;

use crate::{ComponentId, ComponentInfo, ComponentValue, MAX_COMPONENTS};

/// Maps component types to dense ids and their type erased description.
///
/// The registry is populated before any [`EntityLayer`](crate::EntityLayer) is
/// created and then shared behind an `Arc`, which freezes it.
///
/// ```rust
/// use std::sync::Arc;
/// use ddcore::ComponentRegistry;
///
/// #[derive(Debug, Default, Clone, Copy, PartialEq)]
/// struct Position(f32, f32);
///
/// let mut registry = ComponentRegistry::new();
/// let id = registry.register::<Position>();
/// assert_eq!(registry.register::<Position>(), id);
///
/// let registry = Arc::new(registry);
/// assert_eq!(registry.id_of::<Position>(), Some(id));
/// ```
#[derive(Default, Debug, Clone)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: BTreeMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its id.
    ///
    /// Registering the same type again returns the existing id.
    ///
    /// # Panics
    /// If more than [`MAX_COMPONENTS`] types are registered.
    pub fn register<T: ComponentValue>(&mut self) -> ComponentId {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return id;
        }

        assert!(
            self.infos.len() < MAX_COMPONENTS,
            "Attempt to register more than {MAX_COMPONENTS} component types"
        );

        let id = ComponentId::new(self.infos.len());
        let info = ComponentInfo::of::<T>(id);
        tracing::debug!(%id, name = info.name(), size = info.size(), "registered component");

        self.infos.push(info);
        self.by_type.insert(TypeId::of::<T>(), id);
        id
    }

    /// Builder style [`Self::register`]
    pub fn with<T: ComponentValue>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Returns the id of `T` if registered
    pub fn id_of<T: 'static>(&self) -> Option<ComponentId> {
        self.id_of_type(TypeId::of::<T>())
    }

    /// Returns the id of a type if registered
    pub fn id_of_type(&self, type_id: TypeId) -> Option<ComponentId> {
        self.by_type.get(&type_id).copied()
    }

    /// Returns the description of a component.
    ///
    /// # Panics
    /// If `id` was not allocated by this registry.
    pub fn info(&self, id: ComponentId) -> &ComponentInfo {
        &self.infos[id.index()]
    }

    /// Returns the description of a component if `id` belongs to this registry
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Iterate all registered components in id order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Returns the number of registered components
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns true if no components are registered
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Copy)]
    struct A(u32);
    #[derive(Default, Clone, Copy)]
    struct B(#[allow(dead_code)] [f64; 3]);

    #[test]
    fn register_idempotent() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>();
        let b = registry.register::<B>();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.register::<A>(), a);
        assert_eq!(registry.len(), 2);

        let info = registry.info(b);
        assert_eq!(info.size(), 24);
        assert_eq!(info.name(), "B");
        assert!(info.is::<B>());
        assert_eq!(registry.id_of::<u64>(), None);
    }

    #[test]
    fn construct_default() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>();
        let info = registry.info(a);

        let mut value = core::mem::MaybeUninit::<A>::uninit();
        unsafe {
            (info.construct)(value.as_mut_ptr().cast());
            assert_eq!(value.assume_init().0, 0);
        }
    }
}
