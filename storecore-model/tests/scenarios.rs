//! End-to-end MVCC scenarios exercised against the public
//! [`storecore_model::Database`] API.

use storecore_model::{Database, ModelError, ReadScope};

const TABLE: &str = "t";

#[test]
fn scenario_1_basic_mvcc_and_checkpoint() {
    let db = Database::new();

    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k1", b"v1".to_vec()).unwrap();
    db.commit_transaction(t1, Some(10), None).unwrap();

    let t2 = db.begin_transaction(None);
    db.insert(t2, TABLE, b"k2", b"v2".to_vec()).unwrap();
    db.commit_transaction(t2, Some(20), None).unwrap();

    db.create_checkpoint(Some("ckpt1".to_string()));

    db.set_stable_timestamp(15);
    db.create_checkpoint(None);

    let t3 = db.begin_transaction(None);
    db.insert(t3, TABLE, b"k3", b"v3".to_vec()).unwrap();
    db.commit_transaction(t3, Some(30), None).unwrap();

    let ckpt1 = db.checkpoint(Some("ckpt1")).unwrap();
    assert_eq!(ckpt1.get(TABLE, b"k1"), Some(b"v1".to_vec()));
    assert_eq!(ckpt1.get(TABLE, b"k2"), Some(b"v2".to_vec()));
    assert_eq!(ckpt1.get(TABLE, b"k3"), None);
    assert_eq!(
        ckpt1.get_with_debug_ts(TABLE, b"k1", Some(15)),
        Some(b"v1".to_vec())
    );
    assert_eq!(ckpt1.get_with_debug_ts(TABLE, b"k2", Some(15)), None);

    let unnamed = db.checkpoint(None).unwrap();
    assert_eq!(unnamed.get(TABLE, b"k1"), Some(b"v1".to_vec()));
    assert_eq!(unnamed.get(TABLE, b"k2"), None);
}

#[test]
fn scenario_2_partial_commit_before_checkpoint() {
    let db = Database::new();

    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k4", b"v4".to_vec()).unwrap();
    let t2 = db.begin_transaction(None);
    db.insert(t2, TABLE, b"k5", b"v5".to_vec()).unwrap();

    db.commit_transaction(t1, Some(40), None).unwrap();
    db.set_stable_timestamp(40);
    let ckpt2 = db.create_checkpoint(Some("ckpt2".to_string()));

    db.commit_transaction(t2, Some(50), None).unwrap();

    assert_eq!(ckpt2.get(TABLE, b"k4"), Some(b"v4".to_vec()));
    assert_eq!(ckpt2.get(TABLE, b"k5"), None);
}

#[test]
fn scenario_3_prepared_transactions_bracketing_stable() {
    let db = Database::new();

    let t_prior = db.begin_transaction(None);
    db.insert(t_prior, TABLE, b"k2", b"v2_prior".to_vec()).unwrap();
    db.commit_transaction(t_prior, Some(10), None).unwrap();

    let t3 = db.begin_transaction(None);
    db.insert(t3, TABLE, b"k3", b"v3".to_vec()).unwrap();
    db.commit_transaction(t3, Some(20), None).unwrap();

    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k1", b"v4".to_vec()).unwrap();
    let t2 = db.begin_transaction(None);
    db.insert(t2, TABLE, b"k2", b"v5".to_vec()).unwrap();

    db.prepare_transaction(t1, 55).unwrap();
    db.prepare_transaction(t2, 55).unwrap();

    db.commit_transaction(t1, Some(60), Some(60)).unwrap();
    db.commit_transaction(t2, Some(60), Some(65)).unwrap();
    db.set_stable_timestamp(60);
    let ckpt3 = db.create_checkpoint(Some("ckpt3".to_string()));

    assert_eq!(ckpt3.get(TABLE, b"k1"), Some(b"v4".to_vec()));
    assert_eq!(ckpt3.get(TABLE, b"k2"), Some(b"v2_prior".to_vec()));
    assert_eq!(ckpt3.get(TABLE, b"k3"), Some(b"v3".to_vec()));
}

#[test]
fn scenario_4_stable_cannot_regress() {
    let db = Database::new();
    db.set_stable_timestamp(60);
    db.set_stable_timestamp(50);
    assert_eq!(db.stable_timestamp(), 60);

    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k", b"v".to_vec()).unwrap();
    db.commit_transaction(t1, Some(60), None).unwrap();
    let ckpt = db.create_checkpoint(Some("ckpt4".to_string()));
    assert_eq!(ckpt.stable_ts_at_creation(), Some(60));
}

#[test]
fn scenario_5_illegal_prepared_commit_aborts() {
    let db = Database::new();
    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k1", b"v1".to_vec()).unwrap();
    db.prepare_transaction(t1, 62).unwrap();
    db.set_stable_timestamp(62);

    let result = db.commit_transaction(t1, Some(60), Some(62));
    assert!(matches!(
        result,
        Err(ModelError::InvalidCommitTimestamp { .. })
    ));

    // The transaction was rolled back: its write never becomes visible.
    let t2 = db.begin_transaction(None);
    assert_eq!(
        db.get(TABLE, b"k1", ReadScope::InTransaction(t2)).unwrap(),
        None
    );
}

#[test]
fn write_conflict_aborts_the_second_writer() {
    let db = Database::new();
    let t1 = db.begin_transaction(None);
    let t2 = db.begin_transaction(None);

    db.insert(t1, TABLE, b"disjoint1", b"a".to_vec()).unwrap();
    db.insert(t2, TABLE, b"disjoint2", b"b".to_vec()).unwrap();

    db.insert(t1, TABLE, b"shared", b"from-t1".to_vec()).unwrap();
    let conflict = db.insert(t2, TABLE, b"shared", b"from-t2".to_vec());
    assert!(matches!(conflict, Err(ModelError::Rollback)));

    db.commit_transaction(t1, Some(1), None).unwrap();
}

#[test]
fn read_your_own_writes_inside_active_transaction() {
    let db = Database::new();
    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k", b"pending".to_vec()).unwrap();
    assert_eq!(
        db.get(TABLE, b"k", ReadScope::InTransaction(t1)).unwrap(),
        Some(b"pending".to_vec())
    );
}

#[test]
fn prepared_update_blocks_other_readers_with_prepare_conflict() {
    let db = Database::new();
    let t1 = db.begin_transaction(None);
    db.insert(t1, TABLE, b"k", b"v".to_vec()).unwrap();
    db.prepare_transaction(t1, 10).unwrap();

    let result = db.get(TABLE, b"k", ReadScope::Latest);
    assert!(matches!(result, Err(ModelError::PrepareConflict)));
}
