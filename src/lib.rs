//! Columnar entity-component storage with a dependency scheduled system
//! executor and a work-stealing job system.
//!
//! Components are plain `Copy` data registered in an explicit
//! [`ComponentRegistry`]. Each [`EntityLayer`] stores one contiguous column per
//! component type, indexed by entity slot.
//!
//! Systems declare what they read and write through a [`SystemDesc`]. The
//! [`SystemsManager`] orders them into a graph, either from explicit
//! dependencies or from inferred data conflicts, and runs every node as a job
//! on the [`JobSystem`].
//!
//! # Features
//! - Deferred entity creation and destruction, applied by [`EntityLayer::update`]
//! - Per system packed scratch buffers, copied out on fill and written back on commit
//! - Cycle detecting topological scheduling
//! - Fixed capacity job rings without per task heap allocation

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod commandbuffer;
mod component;
mod entity;
/// Error types
pub mod error;
/// Entity lifecycle events
pub mod events;
/// Fixed capacity work-stealing job system
pub mod job;
mod layer;
mod registry;
mod request;
/// System ordering and execution
pub mod schedule;
mod system;
mod tag;
mod update;

pub use commandbuffer::*;
pub use component::*;
pub use entity::*;
pub use error::{Error, Result, SystemError, SystemResult};
pub use job::{JobConfig, JobHandle, JobSystem, WaitStrategy};
pub use layer::*;
pub use registry::*;
pub use request::*;
pub use schedule::{SchedulePolicy, SystemId, SystemsManager};
pub use system::*;
pub use tag::*;
pub use update::*;
