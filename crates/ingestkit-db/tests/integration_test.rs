use ingestkit_core::{DataSource, ExportOptions, Exported, IngestError, RetryPolicy, Schema};
use ingestkit_db::test_utils::TestDb;
use ingestkit_db::{Credentials, DatabaseSource, Postgres};
use serde_json::{Value, json};
use std::time::Duration;

fn source(test_db: &TestDb, schema: Schema) -> DatabaseSource {
    DatabaseSource::new(test_db.credentials(), Postgres, schema)
        .with_retry(RetryPolicy::new(2, Duration::from_millis(50)))
}

#[tokio::test]
async fn test_run_query_with_params() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_users(&test_db.pool)
        .await
        .expect("Failed to create users fixture");

    let mut src = source(&test_db, Schema::count(7));
    let data = src
        .run_query(
            "SELECT id, name, email, age, score, active, profile FROM users WHERE age > $1 ORDER BY id",
            &[json!(30)],
        )
        .await
        .expect("Failed to run query");

    // ages run 20..=39, so ids 12..=20 match
    assert_eq!(data.len(), 9);
    assert_eq!(
        data.column_names(),
        vec!["id", "name", "email", "age", "score", "active", "profile"]
    );

    let first = data.row(0).expect("Missing first row");
    assert_eq!(first[0], &json!(12));
    assert_eq!(first[1], &json!("User 11"));
    assert_eq!(first[3], &json!(31));
    assert_eq!(first[4], &json!(16.5));
    assert_eq!(first[5], &json!(true));
    assert_eq!(first[6]["country"], json!("US"));

    // user 15 has no email
    let emails = &data.column("email").expect("Missing email column").values;
    assert_eq!(emails[4], Value::Null);

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_load_and_sample() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_users(&test_db.pool)
        .await
        .expect("Failed to create users fixture");

    let mut src = source(&test_db, Schema::fields(["id", "name", "email"]))
        .with_query("SELECT id, name, email FROM users ORDER BY id", vec![]);

    // lazy: nothing happens until asked
    assert!(!src.is_connected());
    assert!(matches!(src.get_sample(), Err(IngestError::NotLoaded { .. })));

    let loaded = src.ensure_loaded().await.expect("Failed to load");
    assert_eq!(loaded.len(), 20);

    let sample = src.get_sample().expect("Failed to sample");
    assert_eq!(sample.len(), 5);
    assert_eq!(sample.row(0).expect("Missing row")[1], &json!("User 0"));
    assert_eq!(src.get_sample().expect("Failed to sample"), sample);

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_load_rejects_schema_mismatch() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_users(&test_db.pool)
        .await
        .expect("Failed to create users fixture");

    let mut src = source(&test_db, Schema::fields(["id", "signup_date"]))
        .with_query("SELECT id, name FROM users", vec![]);

    let err = src.load().await.unwrap_err();
    match err {
        IngestError::SchemaMismatch { mismatch, .. } => {
            assert!(mismatch.to_string().contains("signup_date"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(src.dataset(), Err(IngestError::NotLoaded { .. })));

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_users(&test_db.pool)
        .await
        .expect("Failed to create users fixture");

    let mut src = source(&test_db, Schema::count(2));
    let data = src
        .run_query("SELECT id, name FROM users WHERE id < 0", &[])
        .await
        .expect("Failed to run query");

    assert!(data.is_empty());
    assert_eq!(data.column_names(), vec!["id", "name"]);

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_decode_numeric_date_time_and_uuid_columns() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_users(&test_db.pool)
        .await
        .expect("Failed to create users fixture");

    let expected_id: String = sqlx::query_scalar("SELECT md5('user-1')::uuid::text")
        .fetch_one(&test_db.pool)
        .await
        .expect("Failed to compute uuid");

    let mut src = source(
        &test_db,
        Schema::fields(["balance", "signup_date", "last_login", "external_id"]),
    )
    .with_query(
        "SELECT balance, signup_date, last_login, external_id FROM users WHERE id = $1",
        vec![json!(2)],
    );
    let data = src.load().await.expect("Failed to load typed columns");

    let row = data.row(0).expect("Missing row");
    assert_eq!(row[0], &json!(100.01));
    assert_eq!(row[1], &json!("2024-01-02"));
    assert_eq!(row[2], &json!("2024-01-01T01:00:00+00:00"));
    assert_eq!(row[3], &json!(expected_id));

    // literals and aggregates come back as NUMERIC
    let data = src
        .run_query(
            "SELECT 1.5 AS lit, avg(age) AS avg_age, count(*) AS n, \
             current_date AS today, now()::timestamp AS local_ts, gen_random_uuid() AS id \
             FROM users",
            &[],
        )
        .await
        .expect("Failed to run query");
    let row = data.row(0).expect("Missing row");
    assert_eq!(row[0], &json!(1.5));
    assert!(row[1].is_f64(), "avg should be a float, got {}", row[1]);
    assert_eq!(row[2], &json!(20));
    assert!(row[3].is_string());
    assert!(row[4].as_str().is_some_and(|ts| ts.contains('T')));
    assert_eq!(row[5].as_str().map(str::len), Some(36));

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_unsupported_column_type_is_query_error() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    let mut src = source(&test_db, Schema::count(1));
    let err = src.run_query("SELECT point(1, 2) AS p", &[]).await.unwrap_err();

    match err {
        IngestError::Query { message } => assert!(message.contains("'p'"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }

    // same answer when the query returns no rows
    let mut src = source(&test_db, Schema::fields(["p"]))
        .with_query("SELECT point(1, 2) AS p WHERE false", vec![]);
    assert!(matches!(src.load().await, Err(IngestError::Query { .. })));

    let err = src
        .run_query("SELECT * FROM no_such_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Query { .. }));
}

#[tokio::test]
async fn test_export_data_formats() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    ingestkit_db::fixtures::create_events(&test_db.pool)
        .await
        .expect("Failed to create events fixture");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let xlsx = dir.path().join("events.xlsx");
    let mut src = source(&test_db, Schema::count(2))
        .with_export_options(ExportOptions::default().spreadsheet_path(&xlsx));
    let sql = "SELECT user_id, kind FROM events WHERE user_id = $1 ORDER BY id";

    let csv = src
        .export_data(sql, &[json!(1)], "csv")
        .await
        .expect("Failed to export csv");
    assert_eq!(
        csv.as_text(),
        Some("user_id,kind\n1,login\n1,logout\n")
    );

    let exported = src
        .export_data(sql, &[json!(1)], "JSON")
        .await
        .expect("Failed to export json");
    let records: Value =
        serde_json::from_str(exported.as_text().expect("json is text")).expect("Invalid json");
    assert_eq!(records, json!([
        {"user_id": 1, "kind": "login"},
        {"user_id": 1, "kind": "logout"}
    ]));

    let exported = src
        .export_data(sql, &[json!(2)], "spreadsheet")
        .await
        .expect("Failed to export spreadsheet");
    assert!(matches!(exported, Exported::File(ref path) if path == &xlsx));
    assert!(xlsx.exists());

    let err = src.export_data(sql, &[json!(1)], "xml").await.unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat { .. }));

    test_db
        .cleanup()
        .await
        .expect("Failed to cleanup test database");
}

#[tokio::test]
async fn test_close_connection_and_reconnect() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    let mut src = source(&test_db, Schema::count(1));
    src.run_query("SELECT 1::int4 AS one", &[])
        .await
        .expect("Failed to run query");
    assert!(src.is_connected());

    src.close_connection().await;
    src.close_connection().await;
    assert!(!src.is_connected());

    let data = src
        .run_query("SELECT 1::int4 AS one", &[])
        .await
        .expect("Failed to reconnect");
    assert_eq!(data.column("one").expect("Missing column").values, vec![json!(1)]);
}

#[tokio::test]
async fn test_connect_retries_then_fails() {
    // nothing listens on port 1
    let mut src = DatabaseSource::new(
        Credentials::new("ingest", "secret", "127.0.0.1", Some(1), "ingest"),
        Postgres,
        Schema::count(1),
    )
    .with_retry(RetryPolicy::new(2, Duration::from_millis(10)))
    .with_connect_timeout(Duration::from_millis(200));

    let err = src.run_query("SELECT 1", &[]).await.unwrap_err();
    match err {
        IngestError::ApiConnection {
            status, attempts, ..
        } => {
            assert_eq!(status, None);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!src.is_connected());
}
