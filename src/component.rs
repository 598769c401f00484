use core::{
    alloc::Layout,
    any::TypeId,
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign},
};

/// The maximum number of component types a registry can hold
pub const MAX_COMPONENTS: usize = 128;

const MASK_WORDS: usize = MAX_COMPONENTS / 64;

/// Trait alias for plain data which can be stored as a component.
///
/// Components are copied in and out of columns byte for byte and are never
/// dropped, which `Copy` guarantees is sound.
pub trait ComponentValue: Copy + Default + Send + Sync + 'static {}
impl<T> ComponentValue for T where T: Copy + Default + Send + Sync + 'static {}

/// A dense component identifier assigned by a
/// [`ComponentRegistry`](crate::ComponentRegistry).
///
/// Ids are only meaningful for the registry which allocated them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u8);

impl ComponentId {
    pub(crate) fn new(index: usize) -> Self {
        assert!(
            index < MAX_COMPONENTS,
            "Component id {index} exceeds MAX_COMPONENTS"
        );
        Self(index as u8)
    }

    /// Returns the dense index of the component
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type erased description of a registered component type.
#[derive(Clone)]
pub struct ComponentInfo {
    pub(crate) id: ComponentId,
    pub(crate) name: String,
    pub(crate) layout: Layout,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// Writes the default value into uninitialized, properly aligned memory
    pub(crate) construct: unsafe fn(*mut u8),
}

impl ComponentInfo {
    pub(crate) fn of<T: ComponentValue>(id: ComponentId) -> Self {
        unsafe fn construct<T: ComponentValue>(dst: *mut u8) {
            dst.cast::<T>().write(T::default())
        }

        Self {
            id,
            name: tynm::type_name::<T>(),
            layout: Layout::new::<T>(),
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            construct: construct::<T>,
        }
    }

    /// Returns the component id
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the short human friendly name of the component type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the size in bytes of a single component value
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns the memory layout of a single value
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the type id of the component type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns true if the component is of type `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.layout.size())
            .finish()
    }
}

/// Fixed size bitset with one bit per component id
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentMask {
    bits: [u64; MASK_WORDS],
}

impl ComponentMask {
    /// Creates an empty mask
    pub const fn new() -> Self {
        Self {
            bits: [0; MASK_WORDS],
        }
    }

    /// Creates a mask from an iterator of component ids
    pub fn from_ids(ids: impl IntoIterator<Item = ComponentId>) -> Self {
        let mut mask = Self::new();
        for id in ids {
            mask.set(id);
        }
        mask
    }

    /// Adds a component to the mask
    #[inline]
    pub fn set(&mut self, id: ComponentId) {
        let index = id.index();
        self.bits[index / 64] |= 1u64 << (index % 64);
    }

    /// Removes a component from the mask
    #[inline]
    pub fn clear(&mut self, id: ComponentId) {
        let index = id.index();
        self.bits[index / 64] &= !(1u64 << (index % 64));
    }

    /// Returns true if the component is in the mask
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        let index = id.index();
        self.bits[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Returns true if every component in `other` is also in `self`
    #[inline]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.bits
            .iter()
            .zip(&other.bits)
            .all(|(a, b)| a & b == *b)
    }

    /// Returns true if the masks have at least one component in common
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.bits.iter().zip(&other.bits).any(|(a, b)| a & b != 0)
    }

    /// Removes all components
    pub fn reset(&mut self) {
        self.bits = [0; MASK_WORDS];
    }

    /// Returns true if no components are set
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|v| *v == 0)
    }

    /// Returns the number of set components
    pub fn count(&self) -> usize {
        self.bits.iter().map(|v| v.count_ones() as usize).sum()
    }

    /// Iterate the set component ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..MAX_COMPONENTS)
            .filter(|&i| self.bits[i / 64] & (1u64 << (i % 64)) != 0)
            .map(ComponentId::new)
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self::Output {
        self |= rhs;
        self
    }
}

impl BitOrAssign for ComponentMask {
    fn bitor_assign(&mut self, rhs: Self) {
        for (a, b) in self.bits.iter_mut().zip(rhs.bits) {
            *a |= b;
        }
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self::Output {
        for (a, b) in self.bits.iter_mut().zip(rhs.bits) {
            *a &= b;
        }
        self
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_superset() {
        let a = ComponentMask::from_ids([ComponentId::new(1), ComponentId::new(70)]);
        let b = ComponentMask::from_ids([ComponentId::new(70)]);

        assert!(a.is_superset_of(&b));
        assert!(!b.is_superset_of(&a));
        assert!(a.is_superset_of(&ComponentMask::new()));
        assert!(a.intersects(&b));
        assert_eq!(a.count(), 2);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            [ComponentId::new(1), ComponentId::new(70)]
        );
    }

    #[test]
    fn mask_clear() {
        let mut mask = ComponentMask::new();
        mask.set(ComponentId::new(127));
        assert!(mask.contains(ComponentId::new(127)));
        mask.clear(ComponentId::new(127));
        assert!(mask.is_empty());
    }
}
