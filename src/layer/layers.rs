use std::sync::Arc;

use crate::{
    error::{Error, Result},
    ComponentRegistry, Entity, EntityLayer,
};

/// The maximum number of layers a [`Layers`] collection can hold, bounded by
/// the layer bits of an [`Entity`].
pub const MAX_LAYERS: usize = 8;

/// A fixed size collection of layers sharing one registry.
///
/// Each pushed layer receives the next free layer index, so an entity can be
/// routed back to the layer which created it.
#[derive(Debug)]
pub struct Layers {
    registry: Arc<ComponentRegistry>,
    layers: Vec<EntityLayer>,
}

impl Layers {
    /// Creates an empty collection
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            layers: Vec::new(),
        }
    }

    /// Creates a new layer, returning its index.
    ///
    /// Fails with [`Error::TooManyLayers`] once [`MAX_LAYERS`] layers exist.
    pub fn push(&mut self) -> Result<u8> {
        let index = self.layers.len();
        if index >= MAX_LAYERS {
            return Err(Error::TooManyLayers);
        }

        self.layers.push(EntityLayer::with_index(self.registry.clone(), index)?);
        tracing::debug!(index, "created layer");
        Ok(index as u8)
    }

    /// Returns the layer with the given index
    pub fn get(&self, index: u8) -> Option<&EntityLayer> {
        self.layers.get(index as usize)
    }

    /// Returns the layer with the given index mutably
    pub fn get_mut(&mut self, index: u8) -> Option<&mut EntityLayer> {
        self.layers.get_mut(index as usize)
    }

    /// Returns the layer which owns `id`
    pub fn layer_of(&self, id: Entity) -> Result<&EntityLayer> {
        self.get(id.layer()).ok_or(Error::NoSuchEntity(id))
    }

    /// Returns the layer which owns `id` mutably
    pub fn layer_of_mut(&mut self, id: Entity) -> Result<&mut EntityLayer> {
        self.get_mut(id.layer()).ok_or(Error::NoSuchEntity(id))
    }

    /// Iterate the layers in index order
    pub fn iter(&self) -> impl Iterator<Item = &EntityLayer> {
        self.layers.iter()
    }

    /// Iterate the layers mutably in index order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityLayer> {
        self.layers.iter_mut()
    }

    /// Returns the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if there are no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Updates every layer in index order
    pub fn update_all(&mut self) {
        for layer in &mut self.layers {
            layer.update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Copy, Debug, PartialEq)]
    struct Mass(f32);

    #[test]
    fn route_by_layer() {
        let registry = Arc::new(ComponentRegistry::new().with::<Mass>());
        let mut layers = Layers::new(registry);

        let a = layers.push().unwrap();
        let b = layers.push().unwrap();
        assert_eq!((a, b), (0, 1));

        let id = layers.get_mut(b).unwrap().create_entity();
        layers.layer_of_mut(id).unwrap().set(id, Mass(2.0)).unwrap();
        layers.update_all();

        assert_eq!(id.layer(), 1);
        assert!(layers.layer_of(id).unwrap().is_alive(id));
        assert!(!layers.get(a).unwrap().is_alive_or_created(id));
    }

    #[test]
    fn layer_limit() {
        let mut layers = Layers::new(Arc::new(ComponentRegistry::new()));
        for _ in 0..MAX_LAYERS {
            layers.push().unwrap();
        }

        assert_eq!(layers.push(), Err(Error::TooManyLayers));
        assert_eq!(layers.len(), MAX_LAYERS);
    }
}
