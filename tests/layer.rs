use std::sync::{Arc, Mutex};

use ddcore::{
    events::{EventKind, LayerEvent},
    CommandBuffer, ComponentMask, ComponentRegistry, Entity, EntityLayer, Error, Layers, Tags,
    MAX_ENTITIES,
};
use itertools::Itertools;
use pretty_assertions::assert_eq;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Position(f32, f32);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Health(i32);

fn registry() -> Arc<ComponentRegistry> {
    Arc::new(
        ComponentRegistry::new()
            .with::<Position>()
            .with::<Health>(),
    )
}

#[test]
fn version_reuse() {
    let mut layer = EntityLayer::new(registry());

    let ids = (0..16).map(|_| layer.create_entity()).collect_vec();
    layer.update();

    for &id in &ids {
        layer.destroy_entity(id).unwrap();
    }
    layer.update();

    for &old in ids.iter().rev() {
        let new = layer.create_entity();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.version(), old.version() + 1);
        assert!(!layer.is_alive(old));
    }
}

#[test]
fn creation_deferral() {
    let mut layer = EntityLayer::new(registry());
    let mask = ComponentMask::from_ids([layer.component_id::<Health>().unwrap()]);

    let id = Entity::builder().set(Health(10)).spawn(&mut layer).unwrap();
    assert!(layer.find_all_with(&mask, Tags::empty()).is_empty());
    assert!(!layer.is_alive(id));
    assert!(layer.is_alive_or_created(id));

    layer.update();
    assert_eq!(layer.find_all_with(&mask, Tags::empty()), [id]);

    layer.destroy_entity(id).unwrap();
    // Entities pending destruction are visible until the update
    assert_eq!(layer.find_all_with(&mask, Tags::empty()), [id]);
    layer.update();
    assert!(layer.find_all_with(&mask, Tags::empty()).is_empty());
}

#[test]
fn add_remove_component() {
    let mut layer = EntityLayer::new(registry());
    let health = layer.component_id::<Health>().unwrap();

    let id = layer.create_entity();
    let first = layer.add_component(id, health).unwrap();
    layer.get_mut::<Health>(id).unwrap().0 = 5;

    let second = layer.add_component(id, health).unwrap();
    assert_eq!(first, second);
    assert_eq!(*layer.get::<Health>(id).unwrap(), Health(5));

    layer.remove_component(id, health).unwrap();
    assert!(!layer.has_component(id, health));
    assert_eq!(
        layer.get::<Health>(id).map(|v| *v),
        Err(Error::MissingComponent(id, "Health".into()))
    );

    layer.add_component(id, health).unwrap();
    assert_eq!(*layer.get::<Health>(id).unwrap(), Health::default());
}

#[test]
fn grow_past_initial_capacity() {
    let mut layer = EntityLayer::new(registry());
    let ids = (0..MAX_ENTITIES + 10)
        .map(|i| {
            Entity::builder()
                .set(Health(i as i32))
                .spawn(&mut layer)
                .unwrap()
        })
        .collect_vec();

    layer.update();
    assert_eq!(layer.capacity(), MAX_ENTITIES * 2);
    assert_eq!(layer.live_count(), ids.len());

    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(*layer.get::<Health>(id).unwrap(), Health(i as i32));
    }
}

#[test]
fn tags_and_components_filter() {
    let mut layer = EntityLayer::new(registry());
    let position = layer.component_id::<Position>().unwrap();
    let health = layer.component_id::<Health>().unwrap();

    let player = Entity::builder()
        .set(Position(0.0, 1.0))
        .set(Health(100))
        .tag(Tags::DYNAMIC | Tags::VISIBLE)
        .spawn(&mut layer)
        .unwrap();

    let rock = Entity::builder()
        .set(Position(4.0, 2.0))
        .tag(Tags::STATIC | Tags::VISIBLE)
        .spawn(&mut layer)
        .unwrap();

    layer.update();

    let positioned = ComponentMask::from_ids([position]);
    assert_eq!(
        layer.find_all_with(&positioned, Tags::VISIBLE),
        [player, rock]
    );
    assert_eq!(layer.find_all_with(&positioned, Tags::STATIC), [rock]);
    assert_eq!(
        layer.find_all_with(&ComponentMask::from_ids([position, health]), Tags::empty()),
        [player]
    );

    layer.remove_tag(rock, Tags::VISIBLE).unwrap();
    assert_eq!(layer.find_all_with(&positioned, Tags::VISIBLE), [player]);
    assert_eq!(layer.entities().collect_vec(), [player, rock]);
}

#[test]
fn lifecycle_messages() {
    let mut layer = EntityLayer::new(registry());
    let received = Arc::new(Mutex::new(Vec::new()));

    layer.subscribe(&[EventKind::Destroyed], {
        let received = received.clone();
        move |event: &LayerEvent| received.lock().unwrap().push(*event)
    });

    let a = layer.create_entity();
    let b = layer.create_entity();
    layer.update();

    assert_eq!(
        layer.messages().messages(),
        [
            LayerEvent {
                kind: EventKind::Created,
                id: a
            },
            LayerEvent {
                kind: EventKind::Created,
                id: b
            }
        ]
    );
    assert!(received.lock().unwrap().is_empty());

    layer.destroy_entity(b).unwrap();
    layer.update();

    assert_eq!(
        *received.lock().unwrap(),
        [LayerEvent {
            kind: EventKind::Destroyed,
            id: b
        }]
    );
    assert_eq!(layer.messages_mut().drain().count(), 1);
    assert!(layer.messages().messages().is_empty());
}

#[test]
#[cfg(feature = "flume")]
fn flume_subscriber() {
    let mut layer = EntityLayer::new(registry());
    let (tx, rx) = flume::unbounded();
    layer.subscribe(&[EventKind::Created, EventKind::Destroyed], tx);

    let id = layer.create_entity();
    layer.update();
    layer.destroy_entity(id).unwrap();
    layer.update();

    assert_eq!(
        rx.drain().map(|v| v.kind).collect_vec(),
        [EventKind::Created, EventKind::Destroyed]
    );

    drop(rx);
    layer.create_entity();
    layer.update();
    assert_eq!(layer.messages().subscriber_count(), 0);
}

#[test]
fn command_buffer() {
    let mut layer = EntityLayer::new(registry());
    let id = layer.create_entity();
    layer.update();

    let mut cmd = CommandBuffer::new();
    cmd.set(id, Health(3))
        .add_tag(id, Tags::SELECTED)
        .create(Entity::builder().set(Position(1.0, 1.0)))
        .defer(move |layer| {
            layer.get_mut::<Health>(id)?.0 *= 2;
            Ok(())
        });

    cmd.apply(&mut layer).unwrap();
    assert!(cmd.is_empty());
    layer.update();

    assert_eq!(*layer.get::<Health>(id).unwrap(), Health(6));
    assert!(layer.has_tag(id, Tags::SELECTED));
    assert_eq!(layer.live_count(), 2);
}

#[test]
fn layers_route_entities() {
    let registry = registry();
    let mut layers = Layers::new(registry);
    let world = layers.push().unwrap();
    let ui = layers.push().unwrap();

    let a = layers
        .get_mut(world)
        .unwrap()
        .create_entity_with(Entity::builder().set(Health(1)))
        .unwrap();
    let b = layers
        .get_mut(ui)
        .unwrap()
        .create_entity_with(Entity::builder().set(Health(2)))
        .unwrap();

    layers.update_all();

    assert_eq!(a.layer(), world);
    assert_eq!(b.layer(), ui);
    assert_eq!(*layers.layer_of(b).unwrap().get::<Health>(b).unwrap(), Health(2));
    assert!(matches!(
        layers.get(world).unwrap().get::<Health>(b),
        Err(Error::ForeignEntity { .. })
    ));
}
