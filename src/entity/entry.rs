use crate::{ComponentMask, EntityVersion, Tags};

bitflags::bitflags! {
    /// Lifecycle state of an entity slot
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct EntryFlags: u8 {
        /// The entity is live and visible to queries
        const ALIVE = 1;
        /// The entity was created this frame and becomes alive on the next update
        const CREATE = 2;
        /// The entity is destroyed on the next update
        const DESTROY = 4;
    }
}

/// Per slot entity metadata.
///
/// `ALIVE` and `CREATE` are never set together, and `DESTROY` implies one of
/// them.
#[derive(Default, Debug, Clone)]
pub(crate) struct EntityEntry {
    pub(crate) flags: EntryFlags,
    pub(crate) components: ComponentMask,
    pub(crate) tags: Tags,
    /// Version of the current or last occupant, zero for a slot never used
    pub(crate) version: EntityVersion,
}

impl EntityEntry {
    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.flags.contains(EntryFlags::ALIVE)
    }

    #[inline]
    pub(crate) fn is_alive_or_created(&self) -> bool {
        self.flags.intersects(EntryFlags::ALIVE | EntryFlags::CREATE)
    }

    #[inline]
    pub(crate) fn is_pending_destroy(&self) -> bool {
        self.flags.contains(EntryFlags::DESTROY)
    }

    #[inline]
    pub(crate) fn matches(&self, components: &ComponentMask, tags: Tags) -> bool {
        self.is_alive() && self.components.is_superset_of(components) && self.tags.contains(tags)
    }

    /// Marks a free slot as created, returning the new version
    pub(crate) fn claim(&mut self) -> EntityVersion {
        debug_assert!(self.flags.is_empty(), "Claiming a slot which is in use");
        self.version = match self.version.wrapping_add(1) {
            0 => 1,
            v => v,
        };
        self.flags = EntryFlags::CREATE;
        self.version
    }

    /// Resets the slot after destruction. The version is kept so the next
    /// claim increments it.
    pub(crate) fn release(&mut self) {
        self.flags = EntryFlags::empty();
        self.components.reset();
        self.tags = Tags::empty();
    }
}
