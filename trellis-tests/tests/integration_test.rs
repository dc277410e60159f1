use trellis_api::{Direction, Key, ReadKind};
use trellis_test_utils::{
    assert_string_field, field_strings, user, user_in_state, TestDatabase,
};

#[tokio::test]
async fn test_add_then_point_lookup() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob")]).await;

    let record = t
        .db
        .table("users")
        .where_key(1)
        .get(ReadKind::Single)
        .await
        .unwrap()
        .into_record()
        .unwrap()
        .expect("user 1 exists");
    assert_string_field(&record, "name", "alice");

    let absent = t
        .db
        .table("users")
        .where_key(99)
        .get(ReadKind::Single)
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn test_index_scan_sorted_by_index_key() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "carol"), user(2, "alice"), user(3, "bob")])
        .await;

    // Unbounded range over the name index yields records sorted by name
    let records = t
        .db
        .table("users")
        .where_range(None, None, true)
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&records, "name"), ["alice", "bob", "carol"]);

    let backwards = t
        .db
        .table("users")
        .order(Direction::Backward)
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&backwards, "name"), ["carol", "bob", "alice"]);
}

#[tokio::test]
async fn test_where_inclusive_and_exclusive() {
    let t = TestDatabase::new();
    t.seed_users((1..=5).map(|i| user(i, &format!("u{}", i))).collect())
        .await;

    let keys = t
        .db
        .table("users")
        .where_range(Some(Key::Int(2)), Some(Key::Int(4)), true)
        .get(ReadKind::MultipleKeys)
        .await
        .unwrap()
        .into_keys()
        .unwrap();
    assert_eq!(keys, [Key::Int(2), Key::Int(3), Key::Int(4)]);

    let keys = t
        .db
        .table("users")
        .where_range(Some(Key::Int(2)), Some(Key::Int(4)), false)
        .get(ReadKind::MultipleKeys)
        .await
        .unwrap()
        .into_keys()
        .unwrap();
    assert_eq!(keys, [Key::Int(3)]);
}

#[tokio::test]
async fn test_single_arg_where_equals_degenerate_range() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob")]).await;

    let exact = t
        .db
        .table("users")
        .where_key(2)
        .get(ReadKind::MultipleKeys)
        .await
        .unwrap()
        .into_keys()
        .unwrap();
    let degenerate = t
        .db
        .table("users")
        .where_range(Some(Key::Int(2)), Some(Key::Int(2)), true)
        .get(ReadKind::MultipleKeys)
        .await
        .unwrap()
        .into_keys()
        .unwrap();
    assert_eq!(exact, degenerate);
}

#[tokio::test]
async fn test_index_scan_honors_limit() {
    let t = TestDatabase::new();
    t.seed_users((1..=10).map(|i| user(i, &format!("u{:02}", i))).collect())
        .await;

    let limited = t
        .db
        .table("users")
        .limit(3)
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(limited.len(), 3);

    let all = t
        .db
        .table("users")
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn test_index_scan_predicate() {
    let t = TestDatabase::new();
    t.seed_users(vec![
        user_in_state(1, "alice", "active"),
        user_in_state(2, "bob", "idle"),
        user_in_state(3, "carol", "active"),
    ])
    .await;

    let active = t
        .db
        .table("users")
        .get_filtered(ReadKind::Index("by_name".into()), |item, _key| {
            item.get("state").and_then(|v| v.as_string()) == Some("active")
        })
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&active, "name"), ["alice", "carol"]);
}

#[tokio::test]
async fn test_composite_index_orders_by_components() {
    let t = TestDatabase::new();
    t.seed_users(vec![
        user_in_state(3, "c", "idle"),
        user_in_state(1, "a", "idle"),
        user_in_state(2, "b", "active"),
    ])
    .await;

    // by_state sorts on (state, id): active/2, idle/1, idle/3
    let records = t
        .db
        .table("users")
        .get(ReadKind::Index("by_state".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&records, "name"), ["b", "a", "c"]);
}

#[tokio::test]
async fn test_set_upserts_and_overwrites() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice")]).await;

    // Existing key: overwrite through an updater
    t.db.table("users")
        .set_with(1, |existing| {
            let mut v = existing.expect("user 1 exists");
            v.insert("name".to_string(), trellis_core::Value::string("A"));
            v
        })
        .await
        .unwrap();
    let record = t
        .db
        .table("users")
        .where_key(1)
        .get(ReadKind::Single)
        .await
        .unwrap()
        .into_record()
        .unwrap()
        .unwrap();
    assert_string_field(&record, "name", "A");

    // Absent key: created
    t.db.table("users").set(7, user(7, "greta")).await.unwrap();
    let count = t
        .db
        .table("users")
        .get(ReadKind::Count)
        .await
        .unwrap()
        .into_count()
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_set_index_updates_in_place() {
    let t = TestDatabase::new();
    t.seed_users(vec![
        user_in_state(1, "alice", "idle"),
        user_in_state(2, "bob", "idle"),
        user_in_state(3, "carol", "idle"),
    ])
    .await;

    // Promote at most two idle users, in name order
    t.db.table("users")
        .set_index(
            "by_name",
            |mut item, _key| {
                item.insert("state".to_string(), trellis_core::Value::string("active"));
                item
            },
            Some(2),
        )
        .await
        .unwrap();

    let records = t
        .db
        .table("users")
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    let states = field_strings(&records, "state");
    assert_eq!(states, ["active", "active", "idle"]);
}

#[tokio::test]
async fn test_delete_index_bounded_by_count_and_direction() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob"), user(3, "carol")])
        .await;

    // Backward over by_name deletes carol first
    t.db.table("users")
        .order(Direction::Backward)
        .delete_index("by_name", Some(1))
        .await
        .unwrap();

    let remaining = t
        .db
        .table("users")
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&remaining, "name"), ["alice", "bob"]);
}

#[tokio::test]
async fn test_clear_then_count_is_zero() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob")]).await;

    t.db.table("users").clear().await.unwrap();
    let count = t
        .db
        .table("users")
        .get(ReadKind::Count)
        .await
        .unwrap()
        .into_count()
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_surrogate_table_assigns_keys() {
    let t = TestDatabase::new();
    let events = t.db.table("events");
    events
        .add_all(vec![
            trellis_api::ItemBuilder::new().string("kind", "login").build(),
            trellis_api::ItemBuilder::new().string("kind", "logout").build(),
        ])
        .await
        .unwrap();

    let keys = events
        .get(ReadKind::MultipleKeys)
        .await
        .unwrap()
        .into_keys()
        .unwrap();
    assert_eq!(keys, [Key::Int(1), Key::Int(2)]);
}

#[tokio::test]
async fn test_single_key_honors_direction() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob"), user(3, "carol")])
        .await;

    let first = t
        .db
        .table("users")
        .get(ReadKind::SingleKey)
        .await
        .unwrap()
        .into_key()
        .unwrap();
    assert_eq!(first, Some(Key::Int(1)));

    let last = t
        .db
        .table("users")
        .order(Direction::Backward)
        .get(ReadKind::SingleKey)
        .await
        .unwrap()
        .into_key()
        .unwrap();
    assert_eq!(last, Some(Key::Int(3)));
}

#[tokio::test]
async fn test_index_predicate_receives_index_key() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(10, "alice"), user(11, "bob")]).await;

    // The key handed to the predicate is the index key, not the primary key
    let seen = std::sync::Mutex::new(Vec::new());
    t.db.table("users")
        .get_filtered(ReadKind::Index("by_name".into()), |_item, key| {
            seen.lock().unwrap().push(key.clone());
            true
        })
        .await
        .unwrap();
    assert_eq!(
        seen.into_inner().unwrap(),
        [Key::Str("alice".into()), Key::Str("bob".into())]
    );
}

#[tokio::test]
async fn test_set_index_updater_receives_index_key() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice")]).await;

    t.db.table("users")
        .set_index(
            "by_name",
            |mut item, key| {
                item.insert("tag".to_string(), key.to_value());
                item
            },
            None,
        )
        .await
        .unwrap();

    let record = t
        .db
        .table("users")
        .where_key(1)
        .get(ReadKind::Single)
        .await
        .unwrap()
        .into_record()
        .unwrap()
        .unwrap();
    assert_eq!(record.get("tag"), Some(&trellis_core::Value::string("alice")));
}

#[tokio::test]
async fn test_delete_index_predicate_matches_index_key() {
    let t = TestDatabase::new();
    t.seed_users(vec![user(1, "alice"), user(2, "bob"), user(3, "carol")])
        .await;

    t.db.table("users")
        .delete_index_where("by_name", None, |_item, key| {
            *key == Key::Str("bob".into())
        })
        .await
        .unwrap();

    let remaining = t
        .db
        .table("users")
        .get(ReadKind::Index("by_name".into()))
        .await
        .unwrap()
        .into_records()
        .unwrap();
    assert_eq!(field_strings(&remaining, "name"), ["alice", "carol"]);
}

#[tokio::test]
async fn test_shared_context_across_operations() {
    let t = TestDatabase::new();
    t.seed_users((1..=6).map(|i| user(i, &format!("u{}", i))).collect())
        .await;

    // One context, reused for several reads without interference
    let base = t
        .db
        .table("users")
        .where_range(Some(Key::Int(2)), Some(Key::Int(5)), true);
    let limited = base.limit(2);
    let (count, keys) = tokio::join!(
        base.get(ReadKind::Count),
        limited.get(ReadKind::MultipleKeys),
    );
    assert_eq!(count.unwrap().into_count().unwrap(), 4);
    assert_eq!(
        keys.unwrap().into_keys().unwrap(),
        [Key::Int(2), Key::Int(3)]
    );
}
