mod builder;
mod entry;

use core::fmt;
use core::num::NonZeroU64;

pub use builder::*;
pub(crate) use entry::*;

/// The entity version, incremented every time a slot is handed out
pub type EntityVersion = u16;
/// The slot index of an entity within its layer
pub type EntityIndex = u32;

/// Represents an entity within a specific [`EntityLayer`](crate::EntityLayer).
///
/// # Structure
///
/// An Entity is 64 bits in size.
///
/// | 8        | 16      | 8     | 32    |
/// | Reserved | Version | Layer | Index |
///
/// The version of a live entity is never zero, which gives `Option<Entity>` the
/// same size as `Entity`.
///
/// Two handles refer to the same live entity iff index and version match and
/// the slot is alive in the layer the handle names.
#[derive(PartialOrd, Clone, Copy, PartialEq, Eq, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(NonZeroU64);

impl Entity {
    /// Create an entity id from parts
    ///
    /// # Panics
    /// If `version` is zero
    pub fn from_parts(index: EntityIndex, version: EntityVersion, layer: u8) -> Self {
        assert_ne!(version, 0, "Entity versions start at 1");
        let bits = (index as u64) | ((layer as u64) << 32) | ((version as u64) << 40);

        match NonZeroU64::new(bits) {
            Some(bits) => Self(bits),
            None => unreachable!(),
        }
    }

    /// Convert the entity into its parts
    pub fn into_parts(self) -> (EntityIndex, EntityVersion, u8) {
        (self.index(), self.version(), self.layer())
    }

    #[inline]
    /// Returns the slot index of the entity
    pub fn index(self) -> EntityIndex {
        self.0.get() as u32
    }

    #[inline]
    /// Returns the version of the entity
    pub fn version(self) -> EntityVersion {
        (self.0.get() >> 40) as u16
    }

    #[inline]
    /// Returns the index of the layer the entity belongs to
    pub fn layer(self) -> u8 {
        (self.0.get() >> 32) as u8
    }

    #[inline]
    /// Returns the raw bits of the entity
    pub fn to_bits(self) -> NonZeroU64 {
        self.0
    }

    #[inline]
    /// Creates an entity from raw bits
    pub fn from_bits(bits: NonZeroU64) -> Self {
        Self(bits)
    }

    /// Returns a new entity builder.
    /// See [crate::EntityBuilder] for more details.
    pub fn builder() -> EntityBuilder {
        EntityBuilder::new()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, version, layer) = self.into_parts();
        write!(f, "{index}v{version}@{layer}")
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id() {
        let parts = (23298, 30, 7);

        let a = Entity::from_parts(parts.0, parts.1, parts.2);

        assert_eq!(parts.0, a.index());
        assert_eq!(parts, a.into_parts());
        assert_eq!(format!("{a}"), "23298v30@7");
    }

    #[test]
    fn entity_id_max() {
        let a = Entity::from_parts(u32::MAX, u16::MAX, u8::MAX);
        assert_eq!(a.into_parts(), (u32::MAX, u16::MAX, u8::MAX));
        assert_eq!(core::mem::size_of::<Option<Entity>>(), 8);
    }
}
