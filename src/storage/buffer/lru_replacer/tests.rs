use super::*;

#[test]
fn test_victim_returns_least_recently_inserted() {
    let mut replacer = LRUReplacer::new();
    for frame_id in 1..=6 {
        replacer.insert(frame_id);
    }
    assert_eq!(replacer.size(), 6);

    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.size(), 3);
}

#[test]
fn test_reinsert_moves_frame_to_front() {
    let mut replacer = LRUReplacer::new();
    replacer.insert(1);
    replacer.insert(2);
    replacer.insert(1);

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(1));
}

#[test]
fn test_victim_on_empty_replacer() {
    let mut replacer = LRUReplacer::new();
    assert_eq!(replacer.victim(), None);

    replacer.insert(4);
    assert_eq!(replacer.victim(), Some(4));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_erase() {
    let mut replacer = LRUReplacer::new();
    for frame_id in 1..=4 {
        replacer.insert(frame_id);
    }

    assert!(replacer.erase(&3));
    assert!(!replacer.erase(&3));
    assert_eq!(replacer.size(), 3);

    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(4));
}
