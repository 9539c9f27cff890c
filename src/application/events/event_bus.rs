//! Event Bus for broadcasting spot changes to the viewers of a location
//!
//! One broadcast channel per location. A topic is created by its first
//! subscriber and removed when its last subscriber drops, so closed views
//! never leave channels behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{Event, EventMessage, ResyncRequiredEvent};
use crate::domain::events::EventPublisher;

const DEFAULT_CAPACITY: usize = 256;

struct Topic {
    sender: broadcast::Sender<EventMessage>,
    subscribers: usize,
}

/// Per-location event bus
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<DashMap<i32, Topic>>,
    capacity: usize,
    next_handle: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Deliver to the location's current subscribers. Never waits on them.
    pub fn publish(&self, event: Event) {
        let location_id = event.location_id();
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();

        let Some(topic) = self.topics.get(&location_id) else {
            debug!(event_type, location_id, "Event published (no subscribers)");
            return;
        };

        match topic.sender.send(message) {
            Ok(count) => {
                debug!(event_type, location_id, subscribers = count, "Event published");
            }
            Err(_) => {
                debug!(event_type, location_id, "Event published (no subscribers)");
            }
        }
    }

    pub fn subscribe(&self, location_id: i32) -> EventSubscriber {
        let (receiver, total) = {
            let mut topic = self.topics.entry(location_id).or_insert_with(|| Topic {
                sender: broadcast::channel(self.capacity).0,
                subscribers: 0,
            });
            topic.subscribers += 1;
            (topic.sender.subscribe(), topic.subscribers)
        };
        info!(location_id, total, "New event subscriber");

        EventSubscriber {
            location_id,
            receiver,
            topics: self.topics.clone(),
        }
    }

    /// Run `on_change` for every event on the location until the returned
    /// handle is dropped or passed to [`EventBus::unsubscribe`].
    pub fn subscribe_with<F>(&self, location_id: i32, on_change: F) -> SubscriptionHandle
    where
        F: Fn(EventMessage) + Send + Sync + 'static,
    {
        let mut subscriber = self.subscribe(location_id);
        let task = tokio::spawn(async move {
            while let Some(message) = subscriber.recv().await {
                on_change(message);
            }
        });

        SubscriptionHandle {
            id: self.next_handle.fetch_add(1, Ordering::Relaxed),
            location_id,
            task: Some(task),
        }
    }

    /// Stop a callback subscription. Returns once its subscriber has been
    /// released, so the topic count is already updated.
    pub async fn unsubscribe(&self, mut handle: SubscriptionHandle) {
        if let Some(task) = handle.task.take() {
            task.abort();
            let _ = task.await;
        }
        debug!(
            handle = handle.id,
            location_id = handle.location_id,
            "Subscription removed"
        );
    }

    pub fn subscriber_count(&self, location_id: i32) -> usize {
        self.topics
            .get(&location_id)
            .map(|t| t.subscribers)
            .unwrap_or(0)
    }

    /// Locations that currently have at least one subscriber
    pub fn watched_locations(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.topics.iter().map(|t| *t.key()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: Event) {
        EventBus::publish(self, event)
    }
}

/// Receives the events of one location
pub struct EventSubscriber {
    location_id: i32,
    receiver: broadcast::Receiver<EventMessage>,
    topics: Arc<DashMap<i32, Topic>>,
}

impl EventSubscriber {
    pub fn location_id(&self) -> i32 {
        self.location_id
    }

    /// Next event. A subscriber that fell behind gets a `ResyncRequired`
    /// in place of the events it missed.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        match self.receiver.recv().await {
            Ok(msg) => Some(msg),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(location_id = self.location_id, missed, "Subscriber lagged");
                Some(EventMessage::new(Event::ResyncRequired(
                    ResyncRequiredEvent {
                        location_id: self.location_id,
                        missed,
                    },
                )))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        if let Entry::Occupied(mut topic) = self.topics.entry(self.location_id) {
            let remaining = topic.get().subscribers.saturating_sub(1);
            topic.get_mut().subscribers = remaining;
            if remaining == 0 {
                topic.remove();
                debug!(location_id = self.location_id, "Topic closed");
            }
            info!(
                location_id = self.location_id,
                remaining, "Event subscriber disconnected"
            );
        }
    }
}

/// Owns a callback subscription; dropping it stops the callback.
pub struct SubscriptionHandle {
    id: u64,
    location_id: i32,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location_id(&self) -> i32 {
        self.location_id
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

/// Create a shared event bus
pub fn create_event_bus(capacity: usize) -> SharedEventBus {
    Arc::new(EventBus::with_capacity(capacity))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::events::{SpotBookedEvent, SpotReleasedEvent};

    fn booked(location_id: i32, spot_number: u32) -> Event {
        Event::SpotBooked(SpotBookedEvent {
            location_id,
            spot_number,
            booked_by: "alice".into(),
            booking_start: Utc::now(),
        })
    }

    fn released(location_id: i32, spot_number: u32) -> Event {
        Event::SpotReleased(SpotReleasedEvent {
            location_id,
            spot_number,
            released_by: "alice".into(),
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_location() {
        let bus = EventBus::new();
        let mut one = bus.subscribe(1);
        let mut two = bus.subscribe(2);

        bus.publish(booked(1, 12));
        bus.publish(released(2, 3));

        let msg = one.recv().await.unwrap();
        assert_eq!(msg.event.location_id(), 1);
        assert_eq!(msg.event.spot_number(), Some(12));

        let msg = two.recv().await.unwrap();
        assert_eq!(msg.event.event_type(), "spot_released");
        assert!(one.receiver.is_empty());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(booked(7, 1));
        assert!(bus.watched_locations().is_empty());
    }

    #[tokio::test]
    async fn test_topic_removed_with_last_subscriber() {
        let bus = EventBus::new();
        let a = bus.subscribe(4);
        let b = bus.subscribe(4);
        assert_eq!(bus.subscriber_count(4), 2);
        assert_eq!(bus.watched_locations(), vec![4]);

        drop(a);
        assert_eq!(bus.subscriber_count(4), 1);
        drop(b);
        assert_eq!(bus.subscriber_count(4), 0);
        assert!(bus.watched_locations().is_empty());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_resync() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe(1);
        for n in 1..=5 {
            bus.publish(booked(1, n));
        }

        let msg = sub.recv().await.unwrap();
        match msg.event {
            Event::ResyncRequired(e) => {
                assert_eq!(e.location_id, 1);
                assert_eq!(e.missed, 3);
            }
            other => panic!("expected resync, got {:?}", other),
        }
        assert_eq!(sub.recv().await.unwrap().event.spot_number(), Some(4));
    }

    #[tokio::test]
    async fn test_callback_subscription_and_unsubscribe() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = bus.subscribe_with(3, move |msg| {
            sink.lock().unwrap().push(msg.event.spot_number());
        });
        assert_eq!(handle.location_id(), 3);
        assert_eq!(bus.subscriber_count(3), 1);

        bus.publish(booked(3, 8));
        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(8)]);

        bus.unsubscribe(handle).await;
        assert_eq!(bus.subscriber_count(3), 0);
        assert!(bus.watched_locations().is_empty());
    }

    #[tokio::test]
    async fn test_publisher_port_routes_to_bus() {
        let bus = create_event_bus(16);
        let mut sub = bus.subscribe(2);
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        publisher.publish(released(2, 5));
        assert_eq!(sub.recv().await.unwrap().event.spot_number(), Some(5));
    }
}
