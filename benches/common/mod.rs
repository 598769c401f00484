#![allow(clippy::new_without_default)]

use std::sync::Arc;

use ddcore::ComponentRegistry;

pub mod find_all;
pub mod jobs;
pub mod schedule;
pub mod simple_insert;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Position(pub [f32; 3]);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Velocity(pub [f32; 3]);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Rotation(pub [f32; 4]);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub f32);

pub fn registry() -> Arc<ComponentRegistry> {
    Arc::new(
        ComponentRegistry::new()
            .with::<Position>()
            .with::<Velocity>()
            .with::<Rotation>()
            .with::<Scale>(),
    )
}
