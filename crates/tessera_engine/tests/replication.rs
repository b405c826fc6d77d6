//! Replication scenarios: merging, relaying, corrections and deletions.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::{ComponentHandle, EntityState};
use tessera_engine::{ChangeEvent, Engine};
use tessera_shared::{ComponentId, CrdtMessage, CrdtMessageType, Entity};

use common::{engine, recording, static_recording};

const BLOB: &str = "test::Blob";

fn entity() -> Entity {
    Entity::new(600, 0)
}

fn with_blob() -> (Engine, ComponentHandle<Vec<u8>>) {
    let mut engine = engine();
    let blob = engine.world_mut().define_component::<Vec<u8>>(BLOB).unwrap();
    (engine, blob)
}

#[tokio::test]
async fn test_equal_timestamps_larger_payload_wins_in_both_orders() {
    for order in [[0x02u8, 0x01], [0x01, 0x02]] {
        let (mut engine, blob) = with_blob();
        let (a, peer_a) = recording();
        let (b, peer_b) = recording();
        engine.add_transport(a);
        engine.add_transport(b);

        for byte in order {
            peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 7, vec![byte])]);
        }
        engine.update(0.0).await.unwrap();

        let store = engine.world().component(blob).unwrap();
        assert_eq!(store.get(entity()), Some(&vec![0x02]));
        assert_eq!(store.timestamp(entity()), Some(7));

        // Whatever was relayed, the winner comes last.
        assert_eq!(
            peer_b.last().last(),
            Some(&CrdtMessage::put(entity(), blob.id(), 7, vec![0x02]))
        );
    }
}

#[tokio::test]
async fn test_messages_are_not_echoed_to_their_sender() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    let (b, peer_b) = recording();
    engine.add_transport(a);
    engine.add_transport(b);

    let message = CrdtMessage::put(entity(), blob.id(), 1, vec![5]);
    peer_a.push(&[message.clone()]);
    engine.update(0.0).await.unwrap();

    assert!(peer_a.last().is_empty());
    assert_eq!(peer_b.last(), vec![message]);
}

#[tokio::test]
async fn test_stale_write_is_corrected_at_its_source() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    let (b, peer_b) = recording();
    engine.add_transport(a);
    engine.add_transport(b);

    peer_b.push(&[CrdtMessage::put(entity(), blob.id(), 5, vec![9])]);
    engine.update(0.0).await.unwrap();

    peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 3, vec![1])]);
    engine.update(0.0).await.unwrap();

    assert_eq!(peer_a.last(), vec![CrdtMessage::put(entity(), blob.id(), 5, vec![9])]);
    assert!(peer_b.last().is_empty());
    assert_eq!(
        engine.world().component(blob).unwrap().get(entity()),
        Some(&vec![9])
    );
}

#[tokio::test]
async fn test_stale_delete_is_corrected_with_current_value() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 4, vec![3])]);
    engine.update(0.0).await.unwrap();

    peer_a.push(&[CrdtMessage::delete(entity(), blob.id(), 2)]);
    engine.update(0.0).await.unwrap();

    assert_eq!(peer_a.last(), vec![CrdtMessage::put(entity(), blob.id(), 4, vec![3])]);
}

#[tokio::test]
async fn test_local_writes_respect_transport_filters() {
    let mut engine = engine();
    let transform = engine
        .world_mut()
        .define_component::<Vec<u8>>("core::Transform")
        .unwrap();
    let blob = engine.world_mut().define_component::<Vec<u8>>(BLOB).unwrap();
    let (renderer, renderer_view) = static_recording();
    let (peer, peer_view) = recording();
    engine.add_transport(renderer);
    engine.add_transport(peer);

    let e = engine.add_entity().unwrap();
    engine
        .world_mut()
        .component_mut(transform)
        .unwrap()
        .create(e, vec![1])
        .unwrap();
    engine
        .world_mut()
        .component_mut(blob)
        .unwrap()
        .create(e, vec![2])
        .unwrap();
    engine.update(0.0).await.unwrap();

    assert_eq!(transform.id(), ComponentId(1));
    assert_eq!(
        renderer_view.last(),
        vec![CrdtMessage::put(e, transform.id(), 1, vec![1])]
    );
    assert_eq!(peer_view.last().len(), 2);
}

#[tokio::test]
async fn test_local_write_nobody_wants_is_dropped() {
    let (mut engine, blob) = with_blob();
    let (renderer, renderer_view) = static_recording();
    engine.add_transport(renderer);

    let e = engine.add_entity().unwrap();
    engine
        .world_mut()
        .component_mut(blob)
        .unwrap()
        .create(e, vec![2])
        .unwrap();
    engine.update(0.0).await.unwrap();

    assert_eq!(renderer_view.payload_count(), 1);
    assert!(renderer_view.last().is_empty());
    assert!(!engine.world().component(blob).unwrap().is_dirty(e));
}

#[tokio::test]
async fn test_deleted_entity_is_removed_regardless_of_batch_order() {
    for delete_first in [false, true] {
        let (mut engine, blob) = with_blob();
        let (a, peer_a) = recording();
        engine.add_transport(a);

        let put = CrdtMessage::put(entity(), blob.id(), 1, vec![1]);
        let delete = CrdtMessage::delete_entity(entity());
        if delete_first {
            peer_a.push(&[delete, put]);
        } else {
            peer_a.push(&[put, delete]);
        }
        engine.update(0.0).await.unwrap();

        assert_eq!(engine.world().entity_state(entity()), EntityState::Removed);
        assert!(!engine.world().component(blob).unwrap().has(entity()));
    }
}

#[tokio::test]
async fn test_removed_entity_ignores_late_messages() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    let (b, peer_b) = recording();
    engine.add_transport(a);
    engine.add_transport(b);

    peer_a.push(&[CrdtMessage::delete_entity(entity())]);
    engine.update(0.0).await.unwrap();
    assert_eq!(peer_b.last(), vec![CrdtMessage::delete_entity(entity())]);

    peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 10, vec![1])]);
    engine.update(0.0).await.unwrap();

    assert!(peer_b.last().is_empty());
    assert!(!engine.world().component(blob).unwrap().has(entity()));
}

#[tokio::test]
async fn test_entity_deletion_drops_pending_corrections() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 5, vec![1])]);
    engine.update(0.0).await.unwrap();

    peer_a.push(&[
        CrdtMessage::put(entity(), blob.id(), 1, vec![2]),
        CrdtMessage::delete_entity(entity()),
    ]);
    engine.update(0.0).await.unwrap();

    assert!(peer_a.last().is_empty());
}

#[tokio::test]
async fn test_local_entity_removal_is_replicated() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    let e = engine.add_entity().unwrap();
    engine
        .world_mut()
        .component_mut(blob)
        .unwrap()
        .create(e, vec![1])
        .unwrap();
    engine.update(0.0).await.unwrap();

    assert!(engine.remove_entity(e));
    engine.update(0.0).await.unwrap();

    assert_eq!(
        peer_a.last(),
        vec![
            CrdtMessage::delete(e, blob.id(), 2),
            CrdtMessage::delete_entity(e),
        ]
    );
    assert_eq!(engine.world().entity_state(e), EntityState::Removed);
}

#[tokio::test]
async fn test_change_callback_sees_remote_and_local_changes() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on_change(move |event: &ChangeEvent<'_>| {
        sink.lock().push((
            event.entity,
            event.operation,
            event.data.map(<[u8]>::to_vec),
        ));
    });

    peer_a.push(&[CrdtMessage::put(entity(), blob.id(), 1, vec![7])]);
    let local = engine.add_entity().unwrap();
    engine
        .world_mut()
        .component_mut(blob)
        .unwrap()
        .create(local, vec![8])
        .unwrap();
    engine.update(0.0).await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            (entity(), CrdtMessageType::PutComponent, Some(vec![7])),
            (local, CrdtMessageType::PutComponent, Some(vec![8])),
        ]
    );
}

#[tokio::test]
async fn test_unknown_entity_becomes_used() {
    let (mut engine, blob) = with_blob();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    let remote = Entity::new(700, 3);
    peer_a.push(&[CrdtMessage::put(remote, blob.id(), 1, vec![1])]);
    engine.update(0.0).await.unwrap();

    let world = engine.world();
    assert_eq!(world.entity_state(remote), EntityState::UsedEntity);
    assert_eq!(world.entity_state(Entity::new(700, 2)), EntityState::Removed);
}

#[tokio::test]
async fn test_undecodable_payload_is_neither_applied_nor_relayed() {
    let mut engine = engine();
    let counter = engine
        .world_mut()
        .define_component::<u32>("test::Counter")
        .unwrap();
    let (a, peer_a) = recording();
    let (b, peer_b) = recording();
    engine.add_transport(a);
    engine.add_transport(b);

    let changes = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&changes);
    engine.on_change(move |_: &ChangeEvent<'_>| *sink.lock() += 1);

    peer_a.push(&[CrdtMessage::put(entity(), counter.id(), 1, vec![1])]);
    engine.update(0.0).await.unwrap();

    let store = engine.world().component(counter).unwrap();
    assert!(!store.has(entity()));
    assert_eq!(store.timestamp(entity()), None);
    assert!(peer_a.last().is_empty());
    assert!(peer_b.last().is_empty());
    assert_eq!(*changes.lock(), 0);
}

#[tokio::test]
async fn test_remote_delete_of_reserved_entity_is_never_recycled() {
    let mut engine = engine();
    let (a, peer_a) = recording();
    engine.add_transport(a);

    let reserved = Entity::new(5, 0);
    peer_a.push(&[CrdtMessage::delete_entity(reserved)]);
    engine.update(0.0).await.unwrap();
    assert_eq!(engine.world().entity_state(reserved), EntityState::Reserved);

    let first = engine.add_entity().unwrap();
    let _second = engine.add_entity().unwrap();
    assert!(engine.remove_entity(first));
    engine.update(0.0).await.unwrap();

    let recycled = engine.add_entity().unwrap();
    assert_eq!(recycled, Entity::new(512, 1));
    assert_eq!(engine.world().entity_state(recycled), EntityState::UsedEntity);
}
