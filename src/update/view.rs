use core::{
    fmt,
    ops::{Index, IndexMut},
};

/// Typed read access to a packed component buffer.
///
/// Index `i` corresponds to the `i`th entity of the owning
/// [`UpdateBuffer`](crate::UpdateBuffer).
pub struct ReadView<'a, T> {
    pub(crate) values: &'a [T],
    pub(crate) exists: &'a [bool],
}

impl<'a, T> ReadView<'a, T> {
    /// Returns the number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value of the `i`th entity, or `None` if an optional
    /// component is absent
    #[inline]
    pub fn get(&self, i: usize) -> Option<&'a T> {
        if *self.exists.get(i)? {
            Some(&self.values[i])
        } else {
            None
        }
    }

    /// Iterate all entries
    pub fn iter(&self) -> impl Iterator<Item = Option<&'a T>> + 'a {
        self.values
            .iter()
            .zip(self.exists)
            .map(|(v, &exists)| exists.then_some(v))
    }

    /// Returns the raw values.
    ///
    /// Absent optional entries hold the default value.
    pub fn values(&self) -> &'a [T] {
        self.values
    }
}

impl<'a, T> Index<usize> for ReadView<'a, T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(v) => v,
            None => panic!("No value at index {index}"),
        }
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for ReadView<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Typed mutable access to a packed component buffer.
///
/// Changes are written back to the layer on commit, except for absent optional
/// entries.
pub struct WriteView<'a, T> {
    pub(crate) values: &'a mut [T],
    pub(crate) exists: &'a [bool],
}

impl<'a, T> WriteView<'a, T> {
    /// Returns the number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value of the `i`th entity
    #[inline]
    pub fn get(&self, i: usize) -> Option<&T> {
        if *self.exists.get(i)? {
            Some(&self.values[i])
        } else {
            None
        }
    }

    /// Mutably returns the value of the `i`th entity
    #[inline]
    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        if *self.exists.get(i)? {
            Some(&mut self.values[i])
        } else {
            None
        }
    }

    /// Iterate all entries
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> {
        self.values
            .iter()
            .zip(self.exists)
            .map(|(v, &exists)| exists.then_some(v))
    }

    /// Iterate all entries mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = Option<&mut T>> {
        self.values
            .iter_mut()
            .zip(self.exists)
            .map(|(v, &exists)| exists.then_some(v))
    }

    /// Returns the raw values
    pub fn values(&self) -> &[T] {
        self.values
    }

    /// Returns the raw values mutably.
    ///
    /// Writes to absent optional entries are discarded.
    pub fn values_mut(&mut self) -> &mut [T] {
        self.values
    }
}

impl<'a, T> Index<usize> for WriteView<'a, T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(v) => v,
            None => panic!("No value at index {index}"),
        }
    }
}

impl<'a, T> IndexMut<usize> for WriteView<'a, T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match self.get_mut(index) {
            Some(v) => v,
            None => panic!("No value at index {index}"),
        }
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for WriteView<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
