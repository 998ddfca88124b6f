//! End-to-end tests for the table engine against in-memory SQLite

use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tablekit_core::{Connection, DataType, LogicalColumn, SqlExecutor, Value};
use tablekit_driver_sqlite::SqliteConnection;
use tablekit_services::{
    ApplyDisposition, EngineConfig, ReconciliationService, RowFilter, RowService, ServiceError,
    TableService, TableUpdateRequest,
};

fn connect() -> Arc<dyn Connection> {
    static TRACING: std::sync::Once = std::sync::Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    Arc::new(SqliteConnection::open(":memory:").unwrap())
}

fn table_service() -> TableService {
    TableService::new(EngineConfig::default())
}

fn row_service() -> RowService {
    RowService::new(500)
}

fn order_columns() -> Vec<LogicalColumn> {
    vec![
        LogicalColumn::named("Item", DataType::Text).required().order(0),
        LogicalColumn::named("Price", DataType::Decimal).order(1),
        LogicalColumn::named("OrderedAt", DataType::Timestamp).order(2),
    ]
}

async fn create_orders(conn: &dyn Connection, owner_id: i64) {
    let outcome = table_service()
        .create_table(conn, owner_id, "Orders", None, order_columns())
        .await
        .unwrap();
    assert!(outcome.ddl.success, "{}", outcome.ddl.message);
}

async fn insert_order(conn: &dyn Connection, owner_id: i64, item: &str, price: f64) -> i64 {
    row_service()
        .insert_row(
            conn,
            owner_id,
            "Orders",
            HashMap::from([
                ("Item".to_string(), Value::String(item.to_string())),
                ("Price".to_string(), Value::Float64(price)),
            ]),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn create_table_derives_transliterated_physical_name() {
    let conn = connect();
    let outcome = table_service()
        .create_table(
            conn.as_ref(),
            7,
            "Müşteriler",
            None,
            vec![LogicalColumn::named("Ad", DataType::Text).order(0)],
        )
        .await
        .unwrap();
    assert!(outcome.ddl.success);

    let introspection = conn.as_schema_introspection().unwrap();
    assert!(introspection.table_exists("Table_7_Musteriler").await.unwrap());
}

#[tokio::test]
async fn create_then_read_back_preserves_columns() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let loaded = table_service()
        .get_table(conn.as_ref(), 1, "Orders")
        .await
        .unwrap();
    let names: Vec<&str> = loaded.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Item", "Price", "OrderedAt"]);
    assert_eq!(loaded.columns[1].data_type, DataType::Decimal);
    assert!(loaded.columns[0].required);
}

#[tokio::test]
async fn duplicate_table_name_is_rejected_per_owner() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let err = table_service()
        .create_table(conn.as_ref(), 1, "Orders", None, order_columns())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateTable(_)));

    // a different owner may reuse the name
    let outcome = table_service()
        .create_table(conn.as_ref(), 2, "Orders", None, order_columns())
        .await
        .unwrap();
    assert!(outcome.ddl.success);
}

#[tokio::test]
async fn hostile_table_name_is_refused() {
    let conn = connect();
    let err = table_service()
        .create_table(
            conn.as_ref(),
            1,
            "Orders; DROP TABLE users --",
            None,
            order_columns(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidIdentifier(_)));
}

#[tokio::test]
async fn row_identifier_sequence_is_monotonic() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    let rows = row_service();

    for expected in 1..=5 {
        let assigned = insert_order(conn.as_ref(), 1, "item", 1.0).await;
        assert_eq!(assigned, expected);
    }

    let assigned = insert_order(conn.as_ref(), 1, "sixth", 1.0).await;
    assert_eq!(assigned, 6);

    rows.delete_row(conn.as_ref(), 1, "Orders", 3).await.unwrap();
    let assigned = insert_order(conn.as_ref(), 1, "after-delete", 1.0).await;
    assert_eq!(assigned, 7);

    let listed = rows
        .list_rows(conn.as_ref(), 1, "Orders", None)
        .await
        .unwrap();
    assert_eq!(listed.row_count(), 6);
    // ordered by RowIdentifier with no reuse of 3
    let ids: Vec<i64> = listed
        .rows
        .iter()
        .map(|r| r.get_by_name("RowIdentifier").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 4, 5, 6, 7]);
}

#[tokio::test]
async fn required_column_rejects_null_insert() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let err = row_service()
        .insert_row(
            conn.as_ref(),
            1,
            "Orders",
            HashMap::from([("Price".to_string(), Value::Float64(1.0))]),
        )
        .await
        .unwrap_err();
    // the backend's NOT NULL constraint is the final arbiter
    assert!(matches!(err, ServiceError::InvalidValue(_)));
}

#[tokio::test]
async fn lossy_retype_requires_force_and_then_converts() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    for i in 0..10 {
        insert_order(conn.as_ref(), 1, &format!("item-{i}"), 2.75).await;
    }

    let service = table_service();
    let refused = service
        .change_column_type(conn.as_ref(), 1, "Orders", "Price", DataType::Integer, false)
        .await
        .unwrap();
    assert_eq!(refused.disposition, ApplyDisposition::Rejected);
    assert!(refused.validation.requires_force_update);
    assert!(refused.validation.has_data_compatibility_issues);
    assert_eq!(refused.validation.affected_row_count, 10);
    assert!(refused.ddl.is_none());

    let applied = service
        .change_column_type(conn.as_ref(), 1, "Orders", "Price", DataType::Integer, true)
        .await
        .unwrap();
    assert_eq!(applied.disposition, ApplyDisposition::AppliedWithForce);
    assert_eq!(applied.backup_created, Some(true));
    let backup = applied.backup_table.clone().unwrap();
    assert!(backup.starts_with("Table_1_Orders_backup_"));

    // metadata reflects the new type
    let loaded = service.get_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert_eq!(loaded.column("Price").unwrap().data_type, DataType::Integer);

    // values were truncated by the conversion; the backup kept the originals
    let listed = row_service()
        .list_rows(conn.as_ref(), 1, "Orders", None)
        .await
        .unwrap();
    assert_eq!(
        listed.rows[0].get_by_name("Price").and_then(|v| v.as_i64()),
        Some(2)
    );
    let backed_up = conn
        .query(&format!("SELECT COUNT(*) FROM \"{}\"", backup), &[])
        .await
        .unwrap();
    assert_eq!(backed_up.scalar().and_then(|v| v.as_i64()), Some(10));
}

#[tokio::test]
async fn lossy_retype_on_empty_table_applies_without_force() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let outcome = table_service()
        .change_column_type(conn.as_ref(), 1, "Orders", "Price", DataType::Integer, false)
        .await
        .unwrap();
    assert_eq!(outcome.disposition, ApplyDisposition::Applied);
    assert!(!outcome.validation.requires_force_update);
    assert_eq!(outcome.validation.affected_row_count, 0);
}

#[tokio::test]
async fn timestamp_to_integer_is_rejected_even_with_force() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let outcome = table_service()
        .change_column_type(
            conn.as_ref(),
            1,
            "Orders",
            "OrderedAt",
            DataType::Integer,
            true,
        )
        .await
        .unwrap();
    assert_eq!(outcome.disposition, ApplyDisposition::Rejected);
    assert!(!outcome.validation.is_valid);
    assert!(outcome.ddl.is_none());
}

#[tokio::test]
async fn required_addition_needs_force_then_backfills() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    for i in 0..3 {
        insert_order(conn.as_ref(), 1, &format!("item-{i}"), 1.0).await;
    }

    let service = table_service();
    let column = LogicalColumn::named("Code", DataType::Integer).required();

    let refused = service
        .add_column(conn.as_ref(), 1, "Orders", column.clone(), false)
        .await
        .unwrap();
    assert_eq!(refused.disposition, ApplyDisposition::Rejected);
    assert!(refused.validation.requires_force_update);
    assert_eq!(refused.validation.affected_row_count, 3);

    let applied = service
        .add_column(conn.as_ref(), 1, "Orders", column, true)
        .await
        .unwrap();
    assert_eq!(applied.disposition, ApplyDisposition::AppliedWithForce);
    assert!(applied.ddl.as_ref().unwrap().success);

    // the risk was recorded, and the rows got the type's zero value
    let listed = row_service()
        .list_rows(conn.as_ref(), 1, "Orders", None)
        .await
        .unwrap();
    for row in &listed.rows {
        assert_eq!(row.get_by_name("Code").and_then(|v| v.as_i64()), Some(0));
    }
}

#[tokio::test]
async fn dropping_populated_column_needs_force() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    insert_order(conn.as_ref(), 1, "item", 9.5).await;

    let service = table_service();
    let refused = service
        .drop_column(conn.as_ref(), 1, "Orders", "Price", false)
        .await
        .unwrap();
    assert_eq!(refused.disposition, ApplyDisposition::Rejected);

    let applied = service
        .drop_column(conn.as_ref(), 1, "Orders", "Price", true)
        .await
        .unwrap();
    assert_eq!(applied.disposition, ApplyDisposition::AppliedWithForce);

    let loaded = service.get_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(loaded.column("Price").is_none());
}

#[tokio::test]
async fn whole_table_update_applies_rename_and_column_changes() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    insert_order(conn.as_ref(), 1, "item", 3.25).await;

    let service = table_service();
    let current = service.get_table(conn.as_ref(), 1, "Orders").await.unwrap();

    // rename the table, drop OrderedAt (empty), add a nullable Note column
    let mut columns: Vec<LogicalColumn> = current
        .columns
        .iter()
        .filter(|c| c.name != "OrderedAt")
        .cloned()
        .collect();
    columns.push(LogicalColumn::named("Note", DataType::Text).order(5));

    let outcome = service
        .update_table(
            conn.as_ref(),
            1,
            "Orders",
            TableUpdateRequest {
                new_name: Some("Purchases".to_string()),
                description: Some("renamed".to_string()),
                columns,
                force: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.disposition, ApplyDisposition::Applied, "{}", outcome.message);
    assert!(outcome.validation.has_structural_changes);
    assert!(outcome.backup_attempted);
    assert!(outcome.backup_created);

    // old name gone, new name resolves, data survived
    assert!(matches!(
        service.get_table(conn.as_ref(), 1, "Orders").await,
        Err(ServiceError::TableNotFound(_))
    ));
    let renamed = service.get_table(conn.as_ref(), 1, "Purchases").await.unwrap();
    assert_eq!(renamed.description.as_deref(), Some("renamed"));
    assert!(renamed.column("Note").is_some());
    assert!(renamed.column("OrderedAt").is_none());

    let introspection = conn.as_schema_introspection().unwrap();
    assert!(introspection.table_exists("Table_1_Purchases").await.unwrap());
    assert!(!introspection.table_exists("Table_1_Orders").await.unwrap());

    let listed = row_service()
        .list_rows(conn.as_ref(), 1, "Purchases", None)
        .await
        .unwrap();
    assert_eq!(listed.row_count(), 1);
}

#[tokio::test]
async fn update_with_impossible_conversion_is_rejected_outright() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let service = table_service();
    let current = service.get_table(conn.as_ref(), 1, "Orders").await.unwrap();
    let columns: Vec<LogicalColumn> = current
        .columns
        .iter()
        .map(|c| {
            let mut c = c.clone();
            if c.name == "OrderedAt" {
                c.data_type = DataType::Decimal;
            }
            c
        })
        .collect();

    let outcome = service
        .update_table(
            conn.as_ref(),
            1,
            "Orders",
            TableUpdateRequest {
                new_name: None,
                description: None,
                columns,
                force: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.disposition, ApplyDisposition::Rejected);
    assert!(!outcome.validation.is_valid);
    assert!(outcome.validation.column_issues.contains_key("OrderedAt"));
}

#[tokio::test]
async fn delete_table_is_soft_and_idempotent_at_ddl_level() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;

    let service = table_service();
    let result = service.delete_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(result.success);

    let introspection = conn.as_schema_introspection().unwrap();
    assert!(!introspection.table_exists("Table_1_Orders").await.unwrap());
    assert!(matches!(
        service.get_table(conn.as_ref(), 1, "Orders").await,
        Err(ServiceError::TableNotFound(_))
    ));

    // the name is free again after the soft delete
    create_orders(conn.as_ref(), 1).await;
}

#[tokio::test]
async fn rename_table_refuses_occupied_destination() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    let service = table_service();

    table_service()
        .create_table(
            conn.as_ref(),
            1,
            "Archive",
            None,
            vec![LogicalColumn::named("X", DataType::Text).order(0)],
        )
        .await
        .unwrap();

    let err = service
        .rename_table(conn.as_ref(), 1, "Orders", "Archive")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateTable(_)));

    let ok = service
        .rename_table(conn.as_ref(), 1, "Orders", "History")
        .await
        .unwrap();
    assert!(ok.success, "{}", ok.message);
    assert!(service.get_table(conn.as_ref(), 1, "History").await.is_ok());
}

#[tokio::test]
async fn rename_column_updates_physical_and_metadata() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    insert_order(conn.as_ref(), 1, "kept", 1.0).await;

    let service = table_service();
    let outcome = service
        .rename_column(conn.as_ref(), 1, "Orders", "Item", "Product")
        .await
        .unwrap();
    assert_eq!(outcome.disposition, ApplyDisposition::Applied);

    let loaded = service.get_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(loaded.column("Product").is_some());
    assert!(loaded.column("Item").is_none());

    let listed = row_service()
        .list_rows(conn.as_ref(), 1, "Orders", None)
        .await
        .unwrap();
    assert_eq!(
        listed.rows[0].get_by_name("Product").and_then(|v| v.as_str()),
        Some("kept")
    );
}

#[tokio::test]
async fn making_column_required_over_nulls_needs_force() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    // Price left NULL
    row_service()
        .insert_row(
            conn.as_ref(),
            1,
            "Orders",
            HashMap::from([("Item".to_string(), Value::String("x".into()))]),
        )
        .await
        .unwrap();

    let service = table_service();
    let refused = service
        .set_column_required(conn.as_ref(), 1, "Orders", "Price", true, false)
        .await
        .unwrap();
    assert_eq!(refused.disposition, ApplyDisposition::Rejected);
    assert_eq!(refused.validation.affected_row_count, 1);
}

#[tokio::test]
async fn update_rows_by_filter() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    insert_order(conn.as_ref(), 1, "a", 1.0).await;
    insert_order(conn.as_ref(), 1, "b", 2.0).await;

    let rows = row_service();
    let updated = rows
        .update_rows(
            conn.as_ref(),
            1,
            "Orders",
            HashMap::from([("Price".to_string(), Value::Float64(8.0))]),
            RowFilter::new("Item", Value::String("a".into())),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let deleted = rows
        .delete_rows(
            conn.as_ref(),
            1,
            "Orders",
            RowFilter::new("Item", Value::String("b".into())),
        )
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(rows.row_count(conn.as_ref(), 1, "Orders").await.unwrap(), 1);
}

#[tokio::test]
async fn reconciliation_detects_and_repairs_drift() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    let reconcile = ReconciliationService::new();

    let report = reconcile.check_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(report.in_sync);
    assert_eq!(report.expected_physical_name, "Table_1_Orders");

    // someone drops the physical table behind the engine's back
    conn.execute("DROP TABLE \"Table_1_Orders\"", &[]).await.unwrap();
    let report = reconcile.check_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(report.metadata_exists);
    assert!(!report.physical_exists);
    assert!(!report.in_sync);

    // repair from metadata
    let repaired = reconcile
        .recreate_physical_table(conn.as_ref(), 1, "Orders")
        .await
        .unwrap();
    assert!(repaired.success, "{}", repaired.message);
    let report = reconcile.check_table(conn.as_ref(), 1, "Orders").await.unwrap();
    assert!(report.in_sync);
}

#[tokio::test]
async fn reconciliation_finds_and_drops_orphans() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    let reconcile = ReconciliationService::new();

    // an engine-prefixed physical table with no metadata record
    conn.execute("CREATE TABLE \"Table_9_Ghost\" (Id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    let orphans = reconcile.find_orphans(conn.as_ref()).await.unwrap();
    assert_eq!(orphans, vec!["Table_9_Ghost".to_string()]);

    // a referenced table cannot be dropped as an orphan
    let err = reconcile
        .drop_orphaned_physical(conn.as_ref(), "Table_1_Orders")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TableOperationFailed(_)));

    let dropped = reconcile
        .drop_orphaned_physical(conn.as_ref(), "Table_9_Ghost")
        .await
        .unwrap();
    assert!(dropped.success);
    assert!(reconcile.find_orphans(conn.as_ref()).await.unwrap().is_empty());
}

#[tokio::test]
async fn debug_listing_shows_engine_tables_with_row_counts() {
    let conn = connect();
    create_orders(conn.as_ref(), 1).await;
    insert_order(conn.as_ref(), 1, "a", 1.0).await;
    insert_order(conn.as_ref(), 1, "b", 2.0).await;

    let listing = ReconciliationService::new()
        .list_physical_tables(conn.as_ref())
        .await
        .unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "Table_1_Orders");
    assert_eq!(listing[0].row_count, Some(2));
}
