mod requirements;

use core::fmt;

pub use requirements::*;

use crate::{
    request::{Cardinality, Usage, DEFAULT_BUFFER},
    ComponentValue, Tags, UpdateData,
};

/// A unit of per frame logic operating over the buffers gathered from its
/// declared requirements.
pub trait System: Send {
    /// Describes the name, data needs and dependencies of the system
    fn desc(&self) -> &SystemDesc;
    /// Execute the system on the filled buffers
    fn update(&mut self, data: &mut UpdateData) -> anyhow::Result<()>;
}

/// A type erased system
pub type BoxedSystem = Box<dyn System>;

/// Declares what a system is called, which data it accesses, and which
/// systems it must run after.
#[derive(Debug, Clone)]
pub struct SystemDesc {
    name: String,
    requirements: Requirements,
    dependencies: Vec<String>,
}

impl SystemDesc {
    /// Creates a new description without any data requirements
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Requirements::new(),
            dependencies: Vec::new(),
        }
    }

    /// Returns the name of the system
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared data requirements
    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Returns the names of the systems this system runs after
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Reads `T`, selecting only entities which own it
    pub fn require_read<T: ComponentValue>(self) -> Self {
        self.require_read_in::<T>(DEFAULT_BUFFER)
    }

    /// Writes `T`, selecting only entities which own it
    pub fn require_write<T: ComponentValue>(self) -> Self {
        self.require_write_in::<T>(DEFAULT_BUFFER)
    }

    /// Reads `T` where present
    pub fn optional_read<T: ComponentValue>(self) -> Self {
        self.optional_read_in::<T>(DEFAULT_BUFFER)
    }

    /// Writes `T` where present
    pub fn optional_write<T: ComponentValue>(self) -> Self {
        self.optional_write_in::<T>(DEFAULT_BUFFER)
    }

    /// Selects only entities carrying `tags`
    pub fn require_tag(self, tags: Tags) -> Self {
        self.require_tag_in(tags, DEFAULT_BUFFER)
    }

    /// Same as [`Self::require_read`] for a named buffer
    pub fn require_read_in<T: ComponentValue>(self, buffer: &str) -> Self {
        self.request::<T>(Usage::Read, Cardinality::Required, buffer)
    }

    /// Same as [`Self::require_write`] for a named buffer
    pub fn require_write_in<T: ComponentValue>(self, buffer: &str) -> Self {
        self.request::<T>(Usage::Write, Cardinality::Required, buffer)
    }

    /// Same as [`Self::optional_read`] for a named buffer
    pub fn optional_read_in<T: ComponentValue>(self, buffer: &str) -> Self {
        self.request::<T>(Usage::Read, Cardinality::Optional, buffer)
    }

    /// Same as [`Self::optional_write`] for a named buffer
    pub fn optional_write_in<T: ComponentValue>(self, buffer: &str) -> Self {
        self.request::<T>(Usage::Write, Cardinality::Optional, buffer)
    }

    /// Same as [`Self::require_tag`] for a named buffer
    pub fn require_tag_in(mut self, tags: Tags, buffer: &str) -> Self {
        self.requirements.push_tag(tags, buffer);
        self
    }

    fn request<T: ComponentValue>(
        mut self,
        usage: Usage,
        cardinality: Cardinality,
        buffer: &str,
    ) -> Self {
        self.requirements.push::<T>(usage, cardinality, buffer);
        self
    }

    /// Runs the system after the named system.
    ///
    /// Depending on the same system twice has no further effect.
    ///
    /// # Panics
    /// If the system depends on itself
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        assert_ne!(name, self.name, "A system can not depend on itself");
        self.dependencies.push(name);
        self
    }

    /// Creates a system from a closure
    pub fn build<F>(self, func: F) -> FnSystem<F>
    where
        F: FnMut(&mut UpdateData) -> anyhow::Result<()> + Send,
    {
        FnSystem { desc: self, func }
    }
}

/// A system backed by a closure, see [`SystemDesc::build`]
pub struct FnSystem<F> {
    desc: SystemDesc,
    func: F,
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut UpdateData) -> anyhow::Result<()> + Send,
{
    fn desc(&self) -> &SystemDesc {
        &self.desc
    }

    fn update(&mut self, data: &mut UpdateData) -> anyhow::Result<()> {
        (self.func)(data)
    }
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut UpdateData) -> anyhow::Result<()> + Send + 'static,
{
    /// Box the system
    pub fn boxed(self) -> BoxedSystem {
        Box::new(self)
    }
}

impl<F> fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("System").field(&self.desc().name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Copy)]
    struct Health(f32);

    #[test]
    fn describe() {
        let desc = SystemDesc::new("regen")
            .require_write::<Health>()
            .require_tag(Tags::DYNAMIC)
            .depends_on("damage")
            .depends_on("damage");

        assert_eq!(desc.name(), "regen");
        assert_eq!(desc.requirements().len(), 1);
        assert_eq!(desc.dependencies(), ["damage", "damage"]);
    }

    #[test]
    #[should_panic(expected = "can not depend on itself")]
    fn self_dependency() {
        let _ = SystemDesc::new("physics").depends_on("physics");
    }

    #[test]
    fn closure_system() {
        let mut count = 0;
        let mut system = SystemDesc::new("count").build(move |_: &mut UpdateData| {
            count += 1;
            Ok(())
        });

        let registry = crate::ComponentRegistry::new();
        let mut data = UpdateData::new(&registry, &[], &[]);
        system.update(&mut data).unwrap();
        assert_eq!(system.desc().name(), "count");
    }
}
