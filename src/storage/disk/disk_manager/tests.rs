use super::*;
use crate::assert_errors;
use crate::common::constants::PAGE_SIZE;
use tempfile::NamedTempFile;

fn patterned_page(seed: u8) -> [u8; PAGE_SIZE] {
    let mut data = [0u8; PAGE_SIZE];
    data.iter_mut()
        .enumerate()
        .for_each(|(i, byte)| *byte = seed.wrapping_add(i as u8));
    data
}

#[test]
fn test_allocate_page_is_monotone_and_skips_header() {
    let mut dm = DiskManager::new_for_test();
    let ids: Vec<PageId> = (0..5).map(|_| dm.allocate_page()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_write_then_read_round_trip() {
    let mut dm = DiskManager::new_for_test();
    let page_id = dm.allocate_page();
    let data = patterned_page(42);

    dm.write_page(page_id, &data).unwrap();

    let mut read_back = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut read_back).unwrap();
    assert_eq!(read_back, data);
}

#[test]
fn test_read_unwritten_page_is_zero_filled() {
    let mut dm = DiskManager::new_for_test();
    let page_id = dm.allocate_page();

    let mut buf = patterned_page(7);
    dm.read_page(page_id, &mut buf).unwrap();
    assert!(buf.iter().all(|&byte| byte == 0));
}

#[test]
fn test_read_negative_page_id_fails() {
    let mut dm = DiskManager::new_for_test();
    let mut buf = [0u8; PAGE_SIZE];
    assert_errors!(dm.read_page(-1, &mut buf));
}

#[test]
fn test_reopen_resumes_allocation_after_existing_pages() {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    let path = file.path().to_path_buf();

    let data = patterned_page(1);
    let last_page_id = {
        let mut dm = DiskManager::new(&path).unwrap();
        let ids: Vec<PageId> = (0..3).map(|_| dm.allocate_page()).collect();
        dm.write_page(*ids.last().unwrap(), &data).unwrap();
        *ids.last().unwrap()
    };

    let mut dm = DiskManager::new(&path).unwrap();
    assert!(dm.allocate_page() > last_page_id);

    let mut read_back = [0u8; PAGE_SIZE];
    dm.read_page(last_page_id, &mut read_back).unwrap();
    assert_eq!(read_back, data);
}
