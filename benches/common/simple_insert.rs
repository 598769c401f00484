use std::sync::Arc;

use ddcore::{ComponentRegistry, Entity, EntityLayer};

use super::*;

pub struct Benchmark(Arc<ComponentRegistry>);

impl Benchmark {
    pub fn new() -> Self {
        Self(registry())
    }

    pub fn run(&mut self) {
        let mut layer = EntityLayer::new(self.0.clone());
        let mut builder = Entity::builder();
        builder
            .set(Position([1.0, 0.0, 0.0]))
            .set(Velocity([1.0, 0.0, 0.0]))
            .set(Rotation([0.0, 0.0, 0.0, 1.0]))
            .set(Scale(1.0));

        for _ in 0..10_000 {
            layer.create_entity_with(builder.clone()).unwrap();
        }

        layer.update();
    }
}
