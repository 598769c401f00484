use ddcore::{ComponentMask, Entity, EntityLayer, Tags};

use super::*;

pub struct Benchmark {
    layer: EntityLayer,
    mask: ComponentMask,
    result: Vec<Entity>,
}

impl Benchmark {
    pub fn new() -> Self {
        let mut layer = EntityLayer::new(registry());

        // Interleave entities with and without velocity
        for i in 0..10_000 {
            let mut builder = Entity::builder();
            builder.set(Position::default());
            if i % 2 == 0 {
                builder.set(Velocity::default()).tag(Tags::DYNAMIC);
            }

            layer.create_entity_with(&mut builder).unwrap();
        }

        layer.update();

        let mask = ComponentMask::from_ids([
            layer.component_id::<Position>().unwrap(),
            layer.component_id::<Velocity>().unwrap(),
        ]);

        Self {
            layer,
            mask,
            result: Vec::new(),
        }
    }

    pub fn run(&mut self) -> usize {
        self.result.clear();
        self.layer
            .find_all_with_into(&self.mask, Tags::DYNAMIC, &mut self.result);
        self.result.len()
    }
}
