//! Integration tests for the qb module, driven by a scripted client.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::client::{Db, GenericClient};
use crate::dialect::Dialect;
use crate::error::QueryResult;
use crate::qb::where_clause::placeholder_run;
use crate::qb::{ChunkControl, table};
use crate::row::Row;
use crate::value::{Record, Value};

/// A client that replays scripted pages and records every statement it
/// is handed.
struct MockClient {
    dialect: Dialect,
    pages: Mutex<VecDeque<Vec<Row>>>,
    affected: u64,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockClient {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            pages: Mutex::new(VecDeque::new()),
            affected: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_pages(dialect: Dialect, pages: Vec<Vec<Row>>) -> Self {
        let mut client = Self::new(dialect);
        client.pages = Mutex::new(pages.into());
        client
    }

    fn with_affected(dialect: Dialect, affected: u64) -> Self {
        let mut client = Self::new(dialect);
        client.affected = affected;
        client
    }

    fn recorded(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl GenericClient for MockClient {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.affected)
    }
}

fn id_row(id: i64) -> Row {
    Row::from_pairs([("id", Value::Int(id))])
}

fn id_page(ids: &[i64]) -> Vec<Row> {
    ids.iter().copied().map(id_row).collect()
}

fn page_ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r.try_get::<i64>("id").unwrap()).collect()
}

#[test]
fn test_placeholders_match_ledger_across_sections() {
    let qb = table("users", Dialect::Postgres)
        .select_raw("COALESCE(nickname, ?) AS label", vec!["anon".into()])
        .where_eq("status", "active")
        .where_in("role", vec!["admin", "ops"])
        .where_raw("(karma + ?) > ?", vec![5i64.into(), 100i64.into()])
        .group_by(&["label"])
        .having("COUNT(*)", ">", 1i64);
    let (sql, params) = qb.render().unwrap();
    assert_eq!(placeholder_run(&sql).unwrap(), params.len());
    assert_eq!(params.len(), 7);
}

#[test]
fn test_mysql_render_binds_positionally() {
    let qb = table("users", Dialect::MySql)
        .where_eq("status", "active")
        .where_between("age", 18i64, 65i64);
    let (sql, params) = qb.render().unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM users WHERE status = ? AND age BETWEEN ? AND ?"
    );
    assert_eq!(
        params,
        vec![
            Value::Text("active".to_string()),
            Value::Int(18),
            Value::Int(65)
        ]
    );
}

#[tokio::test]
async fn test_dialect_mismatch_is_rejected_before_execution() {
    let client = MockClient::new(Dialect::Sqlite);
    let err = table("users", Dialect::Postgres)
        .get(&client)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(client.recorded().is_empty());
}

#[tokio::test]
async fn test_db_context_scopes_builders() {
    let db = Db::new(MockClient::with_pages(
        Dialect::Sqlite,
        vec![id_page(&[1, 2])],
    ));
    let rows = db.table("users").get(&db).await.unwrap();
    assert_eq!(page_ids(&rows), vec![1, 2]);
    assert_eq!(db.client().recorded()[0].0, "SELECT * FROM users");
}

#[tokio::test]
async fn test_first_appends_limit_one() {
    let client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[5])]);
    let row = table("users", Dialect::Postgres)
        .where_eq("status", "active")
        .first(&client)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("id").unwrap(), 5);
    assert_eq!(
        client.recorded()[0].0,
        "SELECT * FROM users WHERE status = $1 LIMIT 1"
    );
}

#[tokio::test]
async fn test_exists_short_circuits_without_predicates() {
    let client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[1])]);
    let qb = table("users", Dialect::Postgres);
    assert!(qb.exists(&client).await.unwrap());
    assert_eq!(client.recorded()[0].0, "SELECT 1 FROM users LIMIT 1");

    let empty_client = MockClient::new(Dialect::Postgres);
    assert!(qb.doesnt_exist(&empty_client).await.unwrap());
}

#[tokio::test]
async fn test_count_applies_where_state() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![vec![Row::from_pairs([("count", Value::Int(3))])]],
    );
    let n = table("users", Dialect::Postgres)
        .where_eq("status", "active")
        .count(&client)
        .await
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(
        client.recorded()[0].0,
        "SELECT COUNT(*) FROM users WHERE status = $1"
    );
}

#[tokio::test]
async fn test_pluck_projects_single_column() {
    let client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[4, 8])]);
    let ids: Vec<i64> = table("users", Dialect::Postgres)
        .pluck(&client, "id")
        .await
        .unwrap();
    assert_eq!(ids, vec![4, 8]);
}

#[tokio::test]
async fn test_chunk_visits_every_page_then_stops_on_empty() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![
            id_page(&[1, 2, 3]),
            id_page(&[4, 5, 6]),
            id_page(&[7, 8, 9]),
            id_page(&[10]),
        ],
    );
    let mut sizes = Vec::new();
    table("items", Dialect::Postgres)
        .chunk(&client, 3, |rows| {
            sizes.push(rows.len());
            async { Ok(ChunkControl::Continue) }
        })
        .await
        .unwrap();
    assert_eq!(sizes, vec![3, 3, 3, 1]);

    let calls = client.recorded();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0].0, "SELECT * FROM items LIMIT 3 OFFSET 0");
    assert_eq!(calls[3].0, "SELECT * FROM items LIMIT 3 OFFSET 9");
    assert_eq!(calls[4].0, "SELECT * FROM items LIMIT 3 OFFSET 12");
}

#[tokio::test]
async fn test_chunk_callback_stop_halts_fetching() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![id_page(&[1, 2]), id_page(&[3, 4])],
    );
    let mut pages = 0;
    table("items", Dialect::Postgres)
        .chunk(&client, 2, |_| {
            pages += 1;
            async { Ok(ChunkControl::Stop) }
        })
        .await
        .unwrap();
    assert_eq!(pages, 1);
    assert_eq!(client.recorded().len(), 1);
}

#[tokio::test]
async fn test_chunk_by_id_tracks_ascending_cursor() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![
            id_page(&[1, 2, 3]),
            id_page(&[4, 5, 6]),
            id_page(&[7, 8, 9]),
            id_page(&[10]),
        ],
    );
    let mut seen = Vec::new();
    table("items", Dialect::Postgres)
        .chunk_by_id(&client, 3, |rows| {
            seen.push(page_ids(&rows));
            async { Ok(ChunkControl::Continue) }
        })
        .await
        .unwrap();
    assert_eq!(
        seen,
        vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10]]
    );

    let calls = client.recorded();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[0].0, "SELECT * FROM items ORDER BY id ASC LIMIT 3");
    assert_eq!(
        calls[1].0,
        "SELECT * FROM items WHERE id > $1 ORDER BY id ASC LIMIT 3"
    );
    assert_eq!(calls[1].1, vec![Value::Int(3)]);
    assert_eq!(calls[4].1, vec![Value::Int(10)]);
}

#[tokio::test]
async fn test_chunk_by_id_desc_tracks_descending_cursor() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![
            id_page(&[10, 9, 8]),
            id_page(&[7, 6, 5]),
            id_page(&[4, 3, 2]),
            id_page(&[1]),
        ],
    );
    let mut seen = Vec::new();
    table("items", Dialect::Postgres)
        .chunk_by_id_desc(&client, 3, |rows| {
            seen.push(page_ids(&rows));
            async { Ok(ChunkControl::Continue) }
        })
        .await
        .unwrap();
    assert_eq!(
        seen,
        vec![vec![10, 9, 8], vec![7, 6, 5], vec![4, 3, 2], vec![1]]
    );
    let calls = client.recorded();
    assert_eq!(
        calls[1].0,
        "SELECT * FROM items WHERE id < $1 ORDER BY id DESC LIMIT 3"
    );
    assert_eq!(calls[1].1, vec![Value::Int(8)]);
}

#[tokio::test]
async fn test_chunk_by_id_overrides_caller_ordering() {
    let client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[1])]);
    table("items", Dialect::Postgres)
        .order_by_desc("created_at")
        .chunk_by_id(&client, 5, |_| async { Ok(ChunkControl::Continue) })
        .await
        .unwrap();
    assert_eq!(
        client.recorded()[0].0,
        "SELECT * FROM items ORDER BY id ASC LIMIT 5"
    );
}

#[tokio::test]
async fn test_lazy_yields_rows_across_chunk_boundaries() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![id_page(&[1, 2, 3]), id_page(&[4, 5])],
    );
    let mut seen = Vec::new();
    table("items", Dialect::Postgres)
        .lazy(&client, 3, |row| {
            seen.push(row.try_get::<i64>("id").unwrap());
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_chunk_rejects_non_positive_size() {
    let client = MockClient::new(Dialect::Postgres);
    let err = table("items", Dialect::Postgres)
        .chunk(&client, 0, |_| async { Ok(ChunkControl::Continue) })
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_insert_get_id_via_returning() {
    let client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[7])]);
    let id = table("users", Dialect::Postgres)
        .insert_get_id(&client, Record::new().set("name", "alice"))
        .await
        .unwrap();
    assert_eq!(id, Value::Int(7));
    assert_eq!(
        client.recorded()[0].0,
        "INSERT INTO users (name) VALUES ($1) RETURNING id"
    );
}

#[tokio::test]
async fn test_insert_get_id_follow_up_matches_find() {
    let client = MockClient::with_pages(
        Dialect::Sqlite,
        vec![
            vec![Row::from_pairs([("last_insert_rowid()", Value::Int(42))])],
            id_page(&[42]),
        ],
    );
    let qb = table("users", Dialect::Sqlite);
    let id = qb
        .insert_get_id(&client, Record::new().set("name", "alice"))
        .await
        .unwrap();
    assert_eq!(id, Value::Int(42));

    let found = qb.find(&client, id).await.unwrap().unwrap();
    assert_eq!(found.try_get::<i64>("id").unwrap(), 42);

    let calls = client.recorded();
    assert_eq!(calls[0].0, "INSERT INTO users (name) VALUES (?)");
    assert_eq!(calls[1].0, "SELECT last_insert_rowid()");
    assert_eq!(calls[2].0, "SELECT * FROM users WHERE id = ? LIMIT 1");
    assert_eq!(calls[2].1, vec![Value::Int(42)]);
}

#[tokio::test]
async fn test_update_without_where_counts_whole_table() {
    let client = MockClient::with_affected(Dialect::Postgres, 120);
    let blocked = table("users", Dialect::Postgres)
        .update(&client, Record::new().set("status", "archived"))
        .await
        .unwrap_err();
    assert!(blocked.is_validation());
    assert!(client.recorded().is_empty());

    let affected = table("users", Dialect::Postgres)
        .allow_full_table(true)
        .update(&client, Record::new().set("status", "archived"))
        .await
        .unwrap();
    assert_eq!(affected, 120);
    assert_eq!(client.recorded()[0].0, "UPDATE users SET status = $1");
}

#[tokio::test]
async fn test_update_or_insert_updates_when_row_exists() {
    let mut client = MockClient::with_pages(Dialect::Postgres, vec![id_page(&[1])]);
    client.affected = 1;
    let n = table("users", Dialect::Postgres)
        .update_or_insert(
            &client,
            Record::new().set("email", "a@x.io"),
            Record::new().set("name", "alice"),
        )
        .await
        .unwrap();
    assert_eq!(n, 1);
    let calls = client.recorded();
    assert_eq!(calls[0].0, "SELECT 1 FROM users WHERE email = $1 LIMIT 1");
    assert_eq!(calls[1].0, "UPDATE users SET name = $1 WHERE email = $2");
}

#[tokio::test]
async fn test_update_or_insert_inserts_merged_record_when_missing() {
    let mut client = MockClient::new(Dialect::Postgres);
    client.affected = 1;
    table("users", Dialect::Postgres)
        .update_or_insert(
            &client,
            Record::new().set("email", "a@x.io"),
            Record::new().set("name", "alice"),
        )
        .await
        .unwrap();
    let calls = client.recorded();
    assert_eq!(calls[1].0, "INSERT INTO users (email, name) VALUES ($1, $2)");
    assert_eq!(
        calls[1].1,
        vec![
            Value::Text("a@x.io".to_string()),
            Value::Text("alice".to_string())
        ]
    );
}

#[tokio::test]
async fn test_truncate_uses_dialect_statement() {
    let client = MockClient::new(Dialect::Sqlite);
    table("logs", Dialect::Sqlite).truncate(&client).await.unwrap();
    assert_eq!(client.recorded()[0].0, "DELETE FROM logs");

    let pg = MockClient::new(Dialect::Postgres);
    table("logs", Dialect::Postgres).truncate(&pg).await.unwrap();
    assert_eq!(pg.recorded()[0].0, "TRUNCATE TABLE logs CASCADE");
}

#[tokio::test]
async fn test_insert_using_threads_subquery_parameters() {
    let client = MockClient::with_affected(Dialect::Postgres, 4);
    let archive = table("archived_users", Dialect::Postgres);
    let source = table("users", Dialect::Postgres)
        .select(&["id", "name"])
        .where_eq("status", "inactive");
    let n = archive
        .insert_using(&client, &["id", "name"], source)
        .await
        .unwrap();
    assert_eq!(n, 4);
    let calls = client.recorded();
    assert_eq!(
        calls[0].0,
        "INSERT INTO archived_users (id, name) \
         SELECT id, name FROM users WHERE status = $1"
    );
}

#[tokio::test]
async fn test_value_projects_field_or_none() {
    let client = MockClient::with_pages(
        Dialect::Postgres,
        vec![vec![Row::from_pairs([
            ("id", Value::Int(1)),
            ("name", Value::Text("ada".to_string())),
        ])]],
    );
    let qb = table("users", Dialect::Postgres);
    let name: Option<String> = qb.value(&client, "name").await.unwrap();
    assert_eq!(name.as_deref(), Some("ada"));

    let empty = MockClient::new(Dialect::Postgres);
    let missing: Option<String> = qb.value(&empty, "name").await.unwrap();
    assert!(missing.is_none());
}
