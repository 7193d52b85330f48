use chrono::{DateTime, TimeZone, Utc};
use moneycontrol_core::db::migrations::latest_version;
use moneycontrol_core::db::open_db_in_memory;
use moneycontrol_core::{
    Item, ItemChange, ItemListQuery, ItemRepository, RepoError, SortOrder, SqliteItemRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn fixed_id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

#[test]
fn insert_and_get_roundtrip_preserves_nanoseconds() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let timestamps = [
        Utc.timestamp_opt(1_735_689_600, 123_456_789).unwrap(),
        Utc.timestamp_opt(-30_610_224_000, 1).unwrap(),
        Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap(),
        DateTime::<Utc>::MAX_UTC,
        DateTime::<Utc>::MIN_UTC,
    ];

    for (n, timestamp) in timestamps.into_iter().enumerate() {
        let id = fixed_id(n as u128 + 1);
        repo.insert_item(id, &Item::new(timestamp)).unwrap();
        let loaded = repo.get_item(id).unwrap().unwrap();
        assert_eq!(loaded.timestamp(), timestamp);
    }
}

#[test]
fn get_missing_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    assert!(repo.get_item(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn insert_duplicate_id_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let id = fixed_id(7);

    repo.insert_item(id, &Item::new(at(2025, 1, 1))).unwrap();
    let err = repo.insert_item(id, &Item::new(at(2025, 1, 2))).unwrap_err();

    assert!(matches!(err, RepoError::DuplicateId(dup) if dup == id));
}

#[test]
fn update_existing_item() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let id = fixed_id(1);

    repo.insert_item(id, &Item::new(at(2025, 1, 1))).unwrap();
    repo.update_item(id, &Item::new(at(2025, 6, 1))).unwrap();

    assert_eq!(repo.get_item(id).unwrap().unwrap().timestamp(), at(2025, 6, 1));
}

#[test]
fn update_and_delete_missing_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let id = fixed_id(42);

    let update_err = repo.update_item(id, &Item::new(at(2025, 1, 1))).unwrap_err();
    assert!(matches!(update_err, RepoError::NotFound(missing) if missing == id));

    let delete_err = repo.delete_item(id).unwrap_err();
    assert!(matches!(delete_err, RepoError::NotFound(missing) if missing == id));
}

#[test]
fn delete_removes_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let id = fixed_id(1);

    repo.insert_item(id, &Item::new(at(2025, 1, 1))).unwrap();
    repo.delete_item(id).unwrap();

    assert!(repo.get_item(id).unwrap().is_none());
    assert_eq!(repo.count_items(&ItemListQuery::default()).unwrap(), 0);
}

#[test]
fn list_orders_by_timestamp_then_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.insert_item(fixed_id(3), &Item::new(at(2025, 3, 1))).unwrap();
    repo.insert_item(fixed_id(2), &Item::new(at(2025, 1, 1))).unwrap();
    repo.insert_item(fixed_id(1), &Item::new(at(2025, 1, 1))).unwrap();

    let ascending: Vec<Uuid> = repo
        .list_items(&ItemListQuery::default())
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ascending, vec![fixed_id(1), fixed_id(2), fixed_id(3)]);

    let descending: Vec<Uuid> = repo
        .list_items(&ItemListQuery {
            order: SortOrder::Descending,
            ..ItemListQuery::default()
        })
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(descending, vec![fixed_id(3), fixed_id(1), fixed_id(2)]);
}

#[test]
fn list_filters_by_half_open_range() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.insert_item(fixed_id(1), &Item::new(at(2025, 1, 1))).unwrap();
    repo.insert_item(fixed_id(2), &Item::new(at(2025, 2, 1))).unwrap();
    repo.insert_item(fixed_id(3), &Item::new(at(2025, 3, 1))).unwrap();
    let just_before_march = at(2025, 3, 1) - chrono::Duration::nanoseconds(1);
    repo.insert_item(fixed_id(4), &Item::new(just_before_march))
        .unwrap();

    let query = ItemListQuery {
        from: Some(at(2025, 2, 1)),
        until: Some(at(2025, 3, 1)),
        ..ItemListQuery::default()
    };
    let ids: Vec<Uuid> = repo
        .list_items(&query)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();

    assert_eq!(ids, vec![fixed_id(2), fixed_id(4)]);
    assert_eq!(repo.count_items(&query).unwrap(), 2);
}

#[test]
fn list_pagination_with_limit_and_offset_is_stable() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    for n in 1..=4 {
        repo.insert_item(fixed_id(n), &Item::new(at(2025, 1, n as u32)))
            .unwrap();
    }

    let limited = repo
        .list_items(&ItemListQuery {
            limit: Some(2),
            offset: 1,
            ..ItemListQuery::default()
        })
        .unwrap();
    assert_eq!(
        limited.iter().map(|record| record.id).collect::<Vec<_>>(),
        vec![fixed_id(2), fixed_id(3)]
    );

    let offset_only = repo
        .list_items(&ItemListQuery {
            offset: 3,
            ..ItemListQuery::default()
        })
        .unwrap();
    assert_eq!(offset_only.len(), 1);
    assert_eq!(offset_only[0].id, fixed_id(4));

    let counted = repo
        .count_items(&ItemListQuery {
            limit: Some(1),
            ..ItemListQuery::default()
        })
        .unwrap();
    assert_eq!(counted, 4);
}

#[test]
fn apply_changes_is_all_or_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let existing = fixed_id(1);
    repo.insert_item(existing, &Item::new(at(2025, 1, 1))).unwrap();

    let fresh = Item::new(at(2025, 2, 1));
    let moved = Item::new(at(2025, 3, 1));
    let err = repo
        .apply_changes(&[
            ItemChange::Insert(fixed_id(2), &fresh),
            ItemChange::Update(existing, &moved),
            ItemChange::Delete(fixed_id(99)),
        ])
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound(id) if id == fixed_id(99)));
    assert!(repo.get_item(fixed_id(2)).unwrap().is_none());
    assert_eq!(
        repo.get_item(existing).unwrap().unwrap().timestamp(),
        at(2025, 1, 1)
    );
}

#[test]
fn apply_changes_commits_every_change() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    repo.insert_item(fixed_id(1), &Item::new(at(2025, 1, 1))).unwrap();
    repo.insert_item(fixed_id(2), &Item::new(at(2025, 1, 2))).unwrap();

    let fresh = Item::new(at(2025, 2, 1));
    let moved = Item::new(at(2025, 3, 1));
    repo.apply_changes(&[
        ItemChange::Insert(fixed_id(3), &fresh),
        ItemChange::Update(fixed_id(1), &moved),
        ItemChange::Delete(fixed_id(2)),
    ])
    .unwrap();

    assert_eq!(repo.get_item(fixed_id(3)).unwrap(), Some(fresh));
    assert_eq!(repo.get_item(fixed_id(1)).unwrap(), Some(moved));
    assert!(repo.get_item(fixed_id(2)).unwrap().is_none());
}

#[test]
fn corrupt_rows_are_reported_not_masked() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    conn.execute(
        "INSERT INTO items (uuid, timestamp_secs, timestamp_nanos) VALUES ('not-a-uuid', 0, 0);",
        [],
    )
    .unwrap();

    let err = repo.list_items(&ItemListQuery::default()).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn out_of_range_seconds_are_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let id = fixed_id(5);
    conn.execute(
        "INSERT INTO items (uuid, timestamp_secs, timestamp_nanos) VALUES (?1, ?2, 0);",
        rusqlite::params![id.to_string(), i64::MAX],
    )
    .unwrap();

    let err = repo.get_item(id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteItemRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_items_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteItemRepository::try_new(&conn);
    assert!(matches!(result, Err(RepoError::MissingRequiredTable("items"))));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE items (
            uuid TEXT PRIMARY KEY NOT NULL,
            timestamp_secs INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteItemRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "items",
            column: "timestamp_nanos"
        })
    ));
}
