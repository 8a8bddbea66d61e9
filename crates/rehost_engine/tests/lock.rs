use std::time::Duration;

use rehost_engine::{MemoryLocks, RunLock};

#[test]
fn a_held_lock_blocks_a_second_acquirer() {
    let locks = MemoryLocks::new();
    let ttl = Duration::from_secs(120);

    let guard = locks.try_acquire("rehost_message_1", ttl);
    assert!(guard.is_some());
    assert!(locks.try_acquire("rehost_message_1", ttl).is_none());
}

#[test]
fn different_keys_do_not_contend() {
    let locks = MemoryLocks::new();
    let ttl = Duration::from_secs(120);

    let _one = locks.try_acquire("rehost_message_1", ttl);
    assert!(locks.try_acquire("rehost_message_2", ttl).is_some());
}

#[test]
fn dropping_the_guard_releases_the_lock() {
    let locks = MemoryLocks::new();
    let ttl = Duration::from_secs(120);

    let guard = locks.try_acquire("rehost_message_1", ttl);
    drop(guard);
    assert!(locks.try_acquire("rehost_message_1", ttl).is_some());
}

#[test]
fn an_expired_lock_can_be_stolen() {
    let locks = MemoryLocks::new();

    let _stale = locks.try_acquire("rehost_message_1", Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(25));
    assert!(locks
        .try_acquire("rehost_message_1", Duration::from_secs(120))
        .is_some());
}
