use ethereum_common::{network::Spec, Hash256};
use relayer::beacon::{CheckpointStore, Protocol, SyncError, Syncer};

use crate::mock::MockBeaconSource;

const SPEC: Spec = Spec {
    slots_in_epoch: 8,
    slots_per_historical_root: 64,
};

fn protocol() -> Protocol {
    Protocol::new(SPEC, 32)
}

fn store() -> CheckpointStore {
    let mut store = CheckpointStore::temporary(10);
    store.connect().unwrap();

    store
}

#[tokio::test]
async fn finalized_update_is_consistent() {
    crate::init_logger();

    let source = MockBeaconSource::new(110, 100, &[]);
    let header = source.header(100);
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let update = syncer.get_finalized_update().await.unwrap();
    let checkpoint = update.checkpoint();

    assert_eq!(update.payload.finalized_header, header);
    assert_eq!(update.finalized_header_block_root, header.block_root());
    assert_eq!(update.block_roots_tree.root(), update.payload.block_roots_root);
    assert_eq!(update.block_roots_tree.len(), 64);
    assert_eq!(
        update.block_roots_tree.leaf(99 % 64),
        Some(&header.parent_root)
    );
    assert!(checkpoint.is_consistent_with(&header));

    // Leaves of the window [36; 100) are the roots of the corresponding slots.
    for slot in 36..100 {
        assert_eq!(
            update.block_roots_tree.leaf(slot as usize % 64),
            Some(&syncer.source().root(slot))
        );
    }

    // Fetching does not touch the store.
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn finalized_update_at_root() {
    let source = MockBeaconSource::new(110, 100, &[]);
    let (root_90, root_105) = (source.root(90), source.root(105));
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let update = syncer.get_finalized_update_at(root_90).await.unwrap();
    assert_eq!(update.payload.finalized_header.slot, 90);
    assert_eq!(update.finalized_header_block_root, root_90);

    assert!(matches!(
        syncer.get_finalized_update_at(root_105).await,
        Err(SyncError::NotFinalized {
            slot: 105,
            finalized_slot: 100
        })
    ));

    let unknown = Hash256::repeat_byte(0xab);
    assert!(matches!(
        syncer.get_finalized_update_at(unknown).await,
        Err(SyncError::NotFound(root)) if root == unknown
    ));
}

#[tokio::test]
async fn skipped_slots_repeat_previous_root() {
    // Slot 36 opens the window of slot 100 and is skipped as well.
    let source = MockBeaconSource::new(110, 100, &[35, 36, 60, 61, 62]);
    let (root_34, root_59) = (source.root(34), source.root(59));
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let tree = syncer.get_finalized_update().await.unwrap().block_roots_tree;

    assert_eq!(tree.leaf(36), Some(&root_34));
    for slot in [59, 60, 61, 62] {
        assert_eq!(tree.leaf(slot), Some(&root_59));
    }
    assert_eq!(tree.leaf(63), Some(&syncer.source().root(63)));
}

#[tokio::test]
async fn incomplete_window() {
    let source = MockBeaconSource::new(110, 100, &[]).truncate_roots(1);
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    assert!(matches!(
        syncer.get_finalized_update().await,
        Err(SyncError::ProofConstruction(_))
    ));
}

#[tokio::test]
async fn chain_younger_than_window() {
    let source = MockBeaconSource::new(50, 40, &[]);
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    assert!(matches!(
        syncer.get_finalized_update().await,
        Err(SyncError::ProofConstruction(_))
    ));
}

#[tokio::test]
async fn cached_block_roots_are_reused() {
    let (store, protocol) = (store(), protocol());

    let checkpoint = {
        let source = MockBeaconSource::new(110, 100, &[]);
        let syncer = Syncer::new(source, &store, &protocol);

        let checkpoint = syncer.get_finalized_update().await.unwrap().checkpoint();
        syncer.cache_checkpoint(&checkpoint).await.unwrap();

        checkpoint
    };

    assert_eq!(store.len().unwrap(), 1);

    let source = MockBeaconSource::new(110, 100, &[]).without_roots();
    let syncer = Syncer::new(source, &store, &protocol);

    let update = syncer.get_finalized_update().await.unwrap();
    assert_eq!(update.block_roots_tree, checkpoint.block_roots_tree);

    let source = MockBeaconSource::new(110, 90, &[]).without_roots();
    let syncer = Syncer::new(source, &store, &protocol);

    assert!(matches!(
        syncer.get_finalized_update().await,
        Err(SyncError::Source(_))
    ));
}

#[tokio::test]
async fn header_update_proves_target() {
    let source = MockBeaconSource::new(110, 100, &[]);
    let target = source.root(95);
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let checkpoint = syncer.get_finalized_update().await.unwrap().checkpoint();
    let update = syncer.get_header_update(target, &checkpoint).await.unwrap();

    assert_eq!(update.header.slot, 95);
    assert_eq!(update.header.block_root(), target);
    assert_eq!(update.execution_header, crate::mock::execution_header(95));
    assert_eq!(update.block_roots_root, checkpoint.block_roots_tree.root());
    assert_eq!(update.block_root_proof.len(), 6);
    assert!(checkpoint
        .block_roots_tree
        .is_valid_proof(&target, 95 % 64, &update.block_root_proof));
}

#[tokio::test]
async fn stale_checkpoint() {
    let source = MockBeaconSource::new(110, 100, &[]);
    let (root_40, root_68) = (source.root(40), source.root(68));
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let checkpoint = syncer.get_finalized_update().await.unwrap().checkpoint();

    assert!(matches!(
        syncer.get_header_update(root_40, &checkpoint).await,
        Err(SyncError::StaleCheckpoint {
            checkpoint_slot: 100,
            slot: 40,
            header_redundancy: 32
        })
    ));

    // The oldest slot still within the redundancy window.
    assert!(syncer.get_header_update(root_68, &checkpoint).await.is_ok());
}

#[tokio::test]
async fn target_not_provable() {
    let mut source = MockBeaconSource::new(110, 100, &[]);
    let fork = source.add_fork(95);
    let (root_100, root_105) = (source.root(100), source.root(105));
    let (store, protocol) = (store(), protocol());
    let syncer = Syncer::new(source, &store, &protocol);

    let checkpoint = syncer.get_finalized_update().await.unwrap().checkpoint();

    let unknown = Hash256::repeat_byte(0x11);
    assert!(matches!(
        syncer.get_header_update(unknown, &checkpoint).await,
        Err(SyncError::NotFound(root)) if root == unknown
    ));

    // Not canonical.
    assert!(matches!(
        syncer.get_header_update(fork, &checkpoint).await,
        Err(SyncError::ProofConstruction(_))
    ));

    // Outside of the window [36; 100).
    for root in [root_100, root_105] {
        assert!(matches!(
            syncer.get_header_update(root, &checkpoint).await,
            Err(SyncError::ProofConstruction(_))
        ));
    }
}
