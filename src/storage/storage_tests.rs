use super::*;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    id: String,
    title: String,
    done: bool,
}

impl Document for Note {
    fn id(&self) -> &str { &self.id }
}

fn note(id: &str, title: &str) -> Note {
    Note { id: id.to_string(), title: title.to_string(), done: false }
}

#[test]
fn test_insert_find_update_delete_in_memory() {
    let store = DocumentStore::in_memory();
    let notes: Collection<Note> = store.collection("notes").unwrap();
    assert!(notes.is_empty());

    notes.insert(note("1", "first")).unwrap();
    notes.insert(note("2", "second")).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes.find_by_id("2").unwrap().title, "second");
    assert_eq!(notes.find_one(|n| n.title == "first").unwrap().id, "1");
    assert!(notes.find_by_id("3").is_none());

    let updated = notes.update("1", |n| n.done = true).unwrap().unwrap();
    assert!(updated.done);
    assert_eq!(notes.count_where(|n| n.done), 1);
    assert!(notes.update("missing", |n| n.done = true).unwrap().is_none());

    let removed = notes.delete("2").unwrap().unwrap();
    assert_eq!(removed.title, "second");
    assert!(notes.delete("2").unwrap().is_none());
    assert_eq!(notes.len(), 1);
}

#[test]
fn test_duplicate_ids_and_keys_are_rejected() {
    let notes: Collection<Note> = DocumentStore::in_memory().collection("notes").unwrap();
    notes.insert(note("1", "same")).unwrap();
    assert!(matches!(notes.insert(note("1", "other")), Err(StoreError::Duplicate(_))));
    let err = notes.insert_unique_by(note("2", "same"), |n| n.title.clone()).unwrap_err();
    match err {
        StoreError::Duplicate(k) => assert_eq!(k, "same"),
        other => panic!("unexpected error: {other}"),
    }
    // Original document untouched
    assert_eq!(notes.len(), 1);
    assert_eq!(notes.find_by_id("1").unwrap().title, "same");
}

#[test]
fn test_collection_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let store = DocumentStore::open(tmp.path()).unwrap();
        let notes: Collection<Note> = store.collection("notes").unwrap();
        notes.insert(note("a", "kept")).unwrap();
        notes.insert(note("b", "dropped")).unwrap();
        notes.delete("b").unwrap();
    }
    assert!(tmp.path().join("notes.json").exists());
    assert!(!tmp.path().join("notes.json.tmp").exists());

    let store = DocumentStore::open(tmp.path()).unwrap();
    let notes: Collection<Note> = store.collection("notes").unwrap();
    assert_eq!(notes.all(), vec![note("a", "kept")]);
}

#[test]
fn test_corrupt_file_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("notes.json"), b"{ not json").unwrap();
    let store = DocumentStore::open(tmp.path()).unwrap();
    let res: StoreResult<Collection<Note>> = store.collection("notes");
    assert!(matches!(res, Err(StoreError::Decode { .. })));
}

#[test]
fn test_empty_file_is_empty_collection() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("notes.json"), b"\n").unwrap();
    let store = DocumentStore::open(tmp.path()).unwrap();
    let notes: Collection<Note> = store.collection("notes").unwrap();
    assert!(notes.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_writes_on_blocking_pool_all_persist() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DocumentStore::open(tmp.path()).unwrap();
    let notes: Collection<Note> = store.collection("notes").unwrap();

    let mut tasks = Vec::new();
    for n in 0..16 {
        let notes = notes.clone();
        tasks.push(tokio::spawn(async move {
            blocking(move || notes.insert(note(&format!("n{n}"), "t"))).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap().unwrap();
    }
    assert_eq!(notes.len(), 16);

    let reopened: Collection<Note> = DocumentStore::open(tmp.path()).unwrap().collection("notes").unwrap();
    assert_eq!(reopened.len(), 16);
    assert!(!tmp.path().join("notes.json.tmp").exists());

    let done = blocking({
        let notes = notes.clone();
        move || notes.update("n3", |d| d.done = true)
    })
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    assert!(done.done);
}
