use super::*;

fn storage_in(dir: &tempfile::TempDir) -> FileStorage {
    FileStorage::new(dir.path().join("nested").join("session.json"))
}

#[test]
fn missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    assert_eq!(storage.get_item("auth_token").unwrap(), None);
}

#[test]
fn set_creates_parent_dirs_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    storage.set_item("auth_token", "abc123").unwrap();
    assert!(storage.path().exists());

    let reopened = storage_in(&dir);
    assert_eq!(reopened.get_item("auth_token").unwrap().as_deref(), Some("abc123"));
}

#[test]
fn entries_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    storage.set_item("a", "1").unwrap();
    storage.set_item("b", "2").unwrap();
    storage.remove_item("a").unwrap();
    assert_eq!(storage.get_item("a").unwrap(), None);
    assert_eq!(storage.get_item("b").unwrap().as_deref(), Some("2"));
}

#[test]
fn remove_missing_key_does_not_create_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    storage.remove_item("auth_user").unwrap();
    assert!(!storage.path().exists());
}

#[test]
fn external_deletion_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    storage.set_item("auth_token", "abc").unwrap();
    std::fs::remove_file(storage.path()).unwrap();
    assert_eq!(storage.get_item("auth_token").unwrap(), None);
}

#[test]
fn corrupt_document_fails_reads() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
    std::fs::write(storage.path(), "{not json").unwrap();
    assert!(matches!(storage.get_item("auth_token"), Err(StorageError::Corrupt(_))));
}

#[test]
fn corrupt_document_is_replaced_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
    std::fs::write(storage.path(), "[1, 2, 3]").unwrap();
    storage.set_item("auth_token", "fresh").unwrap();
    assert_eq!(storage.get_item("auth_token").unwrap().as_deref(), Some("fresh"));
}

#[test]
fn blank_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
    std::fs::write(storage.path(), "  \n").unwrap();
    assert_eq!(storage.get_item("auth_token").unwrap(), None);
}

#[test]
fn removing_from_corrupt_document_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
    std::fs::write(storage.path(), "{not json").unwrap();
    storage.remove_item("auth_user").unwrap();
    assert_eq!(storage.get_item("auth_user").unwrap(), None);
}
