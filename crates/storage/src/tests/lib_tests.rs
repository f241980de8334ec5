use super::*;

fn key(course: &str, exam: &str) -> AutosaveKey {
    AutosaveKey::new(CourseId::new(course), ExamId::new(exam))
}

fn answers(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("exam_autosave_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("autosave.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn saves_and_loads_answers_with_null_slots() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let k = key("course-1", "exam-1");

    storage
        .save_answers(&k, &answers(&["x", "", "y"]))
        .await
        .expect("save");

    let loaded = storage.load_answers(&k).await.expect("load").expect("entry");
    assert_eq!(
        loaded,
        vec![Some("x".to_string()), None, Some("y".to_string())]
    );
}

#[tokio::test]
async fn overwrites_existing_entry() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let k = key("course-1", "exam-1");

    storage.save_answers(&k, &answers(&["a"])).await.expect("first");
    storage.save_answers(&k, &answers(&["b", "c"])).await.expect("second");

    let loaded = storage.load_answers(&k).await.expect("load").expect("entry");
    assert_eq!(loaded, vec![Some("b".to_string()), Some("c".to_string())]);
}

#[tokio::test]
async fn entries_are_scoped_per_course_and_exam() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    // Keys that would collide if the two halves were concatenated.
    let left = key("ab", "c");
    let right = key("a", "bc");

    storage.save_answers(&left, &answers(&["left"])).await.expect("left");
    storage.save_answers(&right, &answers(&["right"])).await.expect("right");

    assert_eq!(
        storage.load_answers(&left).await.expect("load"),
        Some(vec![Some("left".to_string())])
    );
    assert_eq!(
        storage.load_answers(&right).await.expect("load"),
        Some(vec![Some("right".to_string())])
    );
    assert!(storage
        .load_answers(&key("ab", "other"))
        .await
        .expect("load")
        .is_none());
}

#[tokio::test]
async fn clear_removes_only_the_targeted_entry() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = key("course-1", "exam-1");
    let second = key("course-1", "exam-2");

    storage.save_answers(&first, &answers(&["a"])).await.expect("save");
    storage.save_answers(&second, &answers(&["b"])).await.expect("save");
    storage.clear_answers(&first).await.expect("clear");

    assert!(storage.load_answers(&first).await.expect("load").is_none());
    assert!(storage.load_answers(&second).await.expect("load").is_some());

    let entries = storage
        .list_entries(&CourseId::new("course-1"))
        .await
        .expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, second);
    assert!(entries[0].updated_at.is_some());
}

#[tokio::test]
async fn clearing_missing_entry_is_not_an_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .clear_answers(&key("nobody", "nothing"))
        .await
        .expect("clear");
}

#[tokio::test]
async fn memory_store_rejects_malformed_entries() {
    let store = MemoryAutosaveStore::new();
    let k = key("course-1", "exam-1");
    store.insert_raw(k.clone(), "{not json").await;

    assert!(store.load_answers(&k).await.is_err());

    store.save_answers(&k, &answers(&["", "z"])).await.expect("save");
    assert_eq!(
        store.load_answers(&k).await.expect("load"),
        Some(vec![None, Some("z".to_string())])
    );
    store.clear_answers(&k).await.expect("clear");
    assert!(!store.contains(&k).await);
}

#[test]
fn database_file_path_skips_memory_urls() {
    assert!(sqlite_file_path("sqlite::memory:").is_none());
    assert!(sqlite_file_path("sqlite://file.db?mode=memory").is_none());
    assert!(sqlite_file_path("postgres://db/exams").is_none());
    assert_eq!(
        sqlite_file_path("sqlite://./data/autosave.db?mode=rwc"),
        Some(Path::new("./data/autosave.db"))
    );
    assert_eq!(
        sqlite_file_path("sqlite:autosave.db"),
        Some(Path::new("autosave.db"))
    );
}
