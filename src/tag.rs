bitflags::bitflags! {
    /// Single bit entity metadata usable as an additional query filter.
    ///
    /// Bits not named here are free for game code, see
    /// [`Tags::from_bits_retain`].
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Tags: u32 {
        /// The entity should be drawn
        const VISIBLE = 1 << 0;
        /// The entity never moves
        const STATIC = 1 << 1;
        /// The entity is simulated
        const DYNAMIC = 1 << 2;
        /// The entity has input focus
        const FOCUSED = 1 << 3;
        /// The entity is selected in a tool
        const SELECTED = 1 << 4;
    }
}
