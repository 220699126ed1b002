//! End-to-end scenarios exercised through the real in-process transport
//! (spec §8), as opposed to the unit-level stub senders used inside
//! `notification_handler`'s own test module.

use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use lola_harness::TestCluster;
use lola_messaging::MessagingConfig;
use lola_wire::{ElementId, Plane};

const E: ElementId = ElementId { service_id: 1, element_id: 1, instance_id: 1, element_kind: 0 };

fn recv_within(rx: &mpsc::Receiver<()>, timeout: Duration) -> bool {
    rx.recv_timeout(timeout).is_ok()
}

#[test]
fn remote_subscriber_receives_update_after_registration() {
    let cluster = TestCluster::new();
    let provider = cluster.spawn_node(1001, MessagingConfig::default()).unwrap();
    let consumer = cluster.spawn_node(1002, MessagingConfig::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        let _ = tx.send(());
    });
    consumer.register_event_notification(Plane::Qm, E, Arc::downgrade(&callback), 1001).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    provider.notify_event(Plane::Qm, E);

    assert!(recv_within(&rx, Duration::from_secs(5)), "consumer should have been notified");
    drop(callback);
}

#[test]
fn unregistering_stops_further_delivery() {
    let cluster = TestCluster::new();
    let provider = cluster.spawn_node(2001, MessagingConfig::default()).unwrap();
    let consumer = cluster.spawn_node(2002, MessagingConfig::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        let _ = tx.send(());
    });
    let handle = consumer.register_event_notification(Plane::Qm, E, Arc::downgrade(&callback), 2001).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    provider.notify_event(Plane::Qm, E);
    assert!(recv_within(&rx, Duration::from_secs(5)), "first notification should arrive");

    consumer.unregister_event_notification(Plane::Qm, E, handle, 2001);
    std::thread::sleep(Duration::from_millis(100));

    provider.notify_event(Plane::Qm, E);
    assert!(!recv_within(&rx, Duration::from_millis(500)), "no notification should arrive after unregistering");
    drop(callback);
}

#[test]
fn outdated_peer_purges_remote_subscriber() {
    let cluster = TestCluster::new();
    let provider = cluster.spawn_node(3001, MessagingConfig::default()).unwrap();
    let consumer = cluster.spawn_node(3002, MessagingConfig::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        let _ = tx.send(());
    });
    consumer.register_event_notification(Plane::Qm, E, Arc::downgrade(&callback), 3001).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    // Tell the provider that the consumer pid is stale; it should purge it
    // from its remote subscriber set for every element.
    provider.notify_outdated_peer(Plane::Qm, 3002, 3001);
    std::thread::sleep(Duration::from_millis(100));

    provider.notify_event(Plane::Qm, E);
    assert!(!recv_within(&rx, Duration::from_millis(500)), "purged peer should not receive further updates");
    drop(callback);
}
