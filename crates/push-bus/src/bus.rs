use crate::auth::SessionAuthorizer;
use crate::error::{PushBusError, PushBusResult};
use crate::{Group, PushEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Bounded broadcast capacity per group. A slow subscriber that falls this
/// far behind loses the oldest events rather than blocking the producer.
const CHANNEL_CAPACITY: usize = 256;

/// Typed, group-addressed push channel. Delivery is best-effort and
/// at-most-once per subscriber: a producer call to [`PushBus::publish`]
/// never blocks on a slow or absent subscriber.
#[derive(Clone)]
pub struct PushBus {
    senders: Arc<RwLock<HashMap<Group, broadcast::Sender<PushEvent>>>>,
}

impl PushBus {
    pub fn new() -> Self {
        Self {
            senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to a group, creating its channel if this is the first
    /// subscriber.
    pub async fn subscribe(&self, group: Group) -> broadcast::Receiver<PushEvent> {
        let mut senders = self.senders.write().await;
        let sender = senders
            .entry(group)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish `event` to every current subscriber of `group`. A group with
    /// no subscribers silently drops the event.
    pub async fn publish(&self, group: Group, event: PushEvent) {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(&group) {
            let _ = sender.send(event);
        }
    }

    /// Remove a group's channel once nothing is listening, so the map does
    /// not grow unbounded with one-shot session groups.
    pub async fn cleanup(&self, group: &Group) {
        let mut senders = self.senders.write().await;
        if let Some(sender) = senders.get(group) {
            if sender.receiver_count() == 0 {
                senders.remove(group);
            }
        }
    }

    /// Connection lifecycle hook: authorize the session, then subscribe it
    /// to its own per-session group. Rejects connections without a valid
    /// session.
    pub async fn on_connect(
        &self,
        session_id: &str,
        authorizer: &dyn SessionAuthorizer,
    ) -> PushBusResult<broadcast::Receiver<PushEvent>> {
        if !authorizer.authorize(session_id, false).await {
            return Err(PushBusError::Unauthorized);
        }
        Ok(self.subscribe(Group::Session(session_id.to_string())).await)
    }

    /// Connection lifecycle hook: drop the per-session group once its last
    /// subscriber disconnects.
    pub async fn on_disconnect(&self, session_id: &str) {
        self.cleanup(&Group::Session(session_id.to_string())).await;
    }

    /// Join an additional named group (e.g. `Admin`) on top of the
    /// connection's own session group.
    pub async fn add_to_group(&self, group: Group) -> broadcast::Receiver<PushEvent> {
        self.subscribe(group).await
    }

    /// Leave a group explicitly (in addition to the automatic cleanup that
    /// happens once receiver_count reaches zero).
    pub async fn remove(&self, group: &Group) {
        self.cleanup(group).await;
    }
}

impl Default for PushBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_before_subscribe_is_dropped_silently() {
        let bus = PushBus::new();
        bus.publish(Group::All, PushEvent::new("x", serde_json::json!({})))
            .await;
        // no panic, no subscriber to observe it
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = PushBus::new();
        let mut r1 = bus.subscribe(Group::All).await;
        let mut r2 = bus.subscribe(Group::All).await;

        bus.publish(Group::All, PushEvent::new("ping", serde_json::json!({})))
            .await;

        assert_eq!(r1.recv().await.unwrap().name, "ping");
        assert_eq!(r2.recv().await.unwrap().name, "ping");
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let bus = PushBus::new();
        let mut admin_rx = bus.subscribe(Group::Admin).await;
        let mut guest_rx = bus.subscribe(Group::Guest).await;

        bus.publish(Group::Admin, PushEvent::new("secret", serde_json::json!({})))
            .await;

        assert_eq!(admin_rx.recv().await.unwrap().name, "secret");
        assert!(guest_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn session_groups_are_per_key() {
        let bus = PushBus::new();
        let mut a = bus.subscribe(Group::Session("a".into())).await;
        let mut b = bus.subscribe(Group::Session("b".into())).await;

        bus.publish(
            Group::Session("a".into()),
            PushEvent::new("hello-a", serde_json::json!({})),
        )
        .await;

        assert_eq!(a.recv().await.unwrap().name, "hello-a");
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn ordering_preserved_within_one_operation() {
        let bus = PushBus::new();
        let mut rx = bus.subscribe(Group::All).await;

        for i in 0..5 {
            bus.publish(
                Group::All,
                PushEvent::new(format!("evt-{i}"), serde_json::json!({})),
            )
            .await;
        }

        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap().name, format!("evt-{i}"));
        }
    }

    struct DenyAll;

    #[async_trait::async_trait]
    impl crate::auth::SessionAuthorizer for DenyAll {
        async fn authorize(&self, _session_id: &str, _group_is_privileged: bool) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn on_connect_rejects_unauthorized_sessions() {
        let bus = PushBus::new();
        let result = bus.on_connect("sess-1", &DenyAll).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn on_connect_subscribes_authorized_sessions_to_their_own_group() {
        let bus = PushBus::new();
        let mut rx = bus
            .on_connect("sess-1", &crate::auth::AllowAll)
            .await
            .unwrap();

        bus.publish(
            Group::Session("sess-1".into()),
            PushEvent::new("hi", serde_json::json!({})),
        )
        .await;
        assert_eq!(rx.recv().await.unwrap().name, "hi");
    }

    #[tokio::test]
    async fn cleanup_removes_group_with_no_subscribers() {
        let bus = PushBus::new();
        {
            let _rx = bus.subscribe(Group::Guest).await;
        }
        // receiver dropped, receiver_count should now be 0
        bus.cleanup(&Group::Guest).await;
        let senders = bus.senders.read().await;
        assert!(!senders.contains_key(&Group::Guest));
    }
}
