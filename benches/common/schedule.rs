use ddcore::{
    Entity, EntityLayer, JobConfig, JobSystem, SystemDesc, SystemsManager, UpdateData,
    DEFAULT_BUFFER,
};

use super::*;

fn integrate(name: &str) -> SystemDesc {
    SystemDesc::new(name)
        .require_read::<Velocity>()
        .require_write::<Position>()
}

fn spin(name: &str) -> SystemDesc {
    SystemDesc::new(name).require_write::<Rotation>()
}

fn grow(name: &str) -> SystemDesc {
    SystemDesc::new(name).require_write::<Scale>()
}

pub struct Benchmark {
    layer: EntityLayer,
    manager: SystemsManager,
    jobs: JobSystem,
}

impl Benchmark {
    pub fn new() -> Self {
        let registry = registry();
        let mut layer = EntityLayer::new(registry.clone());
        let mut builder = Entity::builder();
        builder
            .set(Position::default())
            .set(Velocity([1.0, 0.5, 0.0]))
            .set(Rotation([0.0, 0.0, 0.0, 1.0]))
            .set(Scale(1.0));

        for _ in 0..10_000 {
            layer.create_entity_with(builder.clone()).unwrap();
        }
        layer.update();

        let mut manager = SystemsManager::new(registry);
        manager
            .add(integrate("integrate").build(|data: &mut UpdateData| {
                let buffer = data.data_mut(DEFAULT_BUFFER)?;
                let velocity = buffer.read::<Velocity>()?.values().to_vec();
                let mut position = buffer.write::<Position>()?;

                for (pos, vel) in position.values_mut().iter_mut().zip(velocity) {
                    for (p, v) in pos.0.iter_mut().zip(vel.0) {
                        *p += v * 0.016;
                    }
                }
                Ok(())
            }))
            .unwrap();

        // Disjoint from `integrate`, runs in parallel
        manager
            .add(spin("spin").build(|data: &mut UpdateData| {
                let buffer = data.data_mut(DEFAULT_BUFFER)?;
                for rot in buffer.write::<Rotation>()?.values_mut() {
                    rot.0.rotate_left(1);
                }
                Ok(())
            }))
            .unwrap();

        manager
            .add(grow("grow").build(|data: &mut UpdateData| {
                let buffer = data.data_mut(DEFAULT_BUFFER)?;
                for scale in buffer.write::<Scale>()?.values_mut() {
                    scale.0 *= 1.001;
                }
                Ok(())
            }))
            .unwrap();

        Self {
            layer,
            manager,
            jobs: JobSystem::new(JobConfig::default()),
        }
    }

    pub fn run(&mut self) {
        self.manager.update(&mut self.layer, &self.jobs).unwrap();
    }

    pub fn run_seq(&mut self) {
        self.manager.update_seq(&mut self.layer).unwrap();
    }
}
