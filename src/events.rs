use core::fmt;

use crate::Entity;

/// The message type of a [`LayerEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// The entity became alive
    Created,
    /// The entity was destroyed and its slot released
    Destroyed,
}

impl EventKind {
    /// Returns the numeric message type id
    pub fn id(self) -> u8 {
        match self {
            EventKind::Created => 0,
            EventKind::Destroyed => 1,
        }
    }

    fn bit(self) -> u8 {
        1 << self.id()
    }
}

/// Announces a lifecycle transition applied by
/// [`EntityLayer::update`](crate::EntityLayer::update)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerEvent {
    /// The kind of transition
    pub kind: EventKind,
    /// The affected entity
    pub id: Entity,
}

/// Receives the lifecycle messages of a layer.
///
/// Closures taking `&LayerEvent` are always connected. A `flume::Sender`
/// disconnects once its receiver is dropped.
pub trait EventSink: Send + Sync {
    /// Handles one message, returning false once the sink is disconnected
    fn on_event(&self, event: &LayerEvent) -> bool;
}

impl<F> EventSink for F
where
    F: Fn(&LayerEvent) + Send + Sync,
{
    fn on_event(&self, event: &LayerEvent) -> bool {
        self(event);
        true
    }
}

#[cfg(feature = "flume")]
impl EventSink for flume::Sender<LayerEvent> {
    fn on_event(&self, event: &LayerEvent) -> bool {
        self.send(*event).is_ok()
    }
}

struct Subscriber {
    kinds: u8,
    sink: Box<dyn EventSink>,
}

/// Per layer pub/sub queue for entity lifecycle messages.
///
/// Holds the messages produced by the most recent update until the next one,
/// and forwards each message to the subscribers of its kind.
#[derive(Default)]
pub struct MessageQueue {
    subscribers: Vec<Subscriber>,
    messages: Vec<LayerEvent>,
}

impl MessageQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the given message types.
    ///
    /// The subscriber is removed once the sink disconnects.
    pub fn subscribe<S>(&mut self, kinds: &[EventKind], sink: S)
    where
        S: EventSink + 'static,
    {
        self.subscribers.push(Subscriber {
            kinds: kinds.iter().fold(0, |acc, v| acc | v.bit()),
            sink: Box::new(sink),
        })
    }

    /// Returns the messages of the last update
    pub fn messages(&self) -> &[LayerEvent] {
        &self.messages
    }

    /// Takes the messages of the last update
    pub fn drain(&mut self) -> impl Iterator<Item = LayerEvent> + '_ {
        self.messages.drain(..)
    }

    /// Returns the number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn begin(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn push(&mut self, event: LayerEvent) {
        self.messages.push(event);
    }

    /// Forwards the buffered messages to the subscribers
    pub(crate) fn dispatch(&mut self) {
        let messages = &self.messages;
        self.subscribers.retain(|subscriber| {
            let connected = messages
                .iter()
                .filter(|v| subscriber.kinds & v.kind.bit() != 0)
                .all(|v| subscriber.sink.on_event(v));

            if !connected {
                tracing::warn!("dropping disconnected layer subscriber");
            }

            connected
        });
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("subscribers", &self.subscribers.len())
            .field("messages", &self.messages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn dispatch_by_kind() {
        let mut queue = MessageQueue::new();
        let created = Arc::new(Mutex::new(Vec::new()));

        queue.subscribe(&[EventKind::Created], {
            let created = created.clone();
            move |event: &LayerEvent| created.lock().unwrap().push(event.id)
        });

        let a = Entity::from_parts(0, 1, 0);
        let b = Entity::from_parts(1, 1, 0);

        queue.begin();
        queue.push(LayerEvent {
            kind: EventKind::Created,
            id: a,
        });
        queue.push(LayerEvent {
            kind: EventKind::Destroyed,
            id: b,
        });
        queue.dispatch();

        assert_eq!(*created.lock().unwrap(), [a]);
        assert_eq!(queue.messages().len(), 2);
    }

    #[test]
    #[cfg(feature = "flume")]
    fn prune_disconnected() {
        let mut queue = MessageQueue::new();
        let (tx, rx) = flume::unbounded();
        queue.subscribe(&[EventKind::Created, EventKind::Destroyed], tx);
        drop(rx);

        queue.begin();
        queue.push(LayerEvent {
            kind: EventKind::Created,
            id: Entity::from_parts(0, 1, 0),
        });
        queue.dispatch();

        assert_eq!(queue.subscriber_count(), 0);
    }
}
