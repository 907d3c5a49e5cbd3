use crate::error::AppError;
use nanoid::nanoid;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// A schema-free record as stored in a collection.
pub type Document = Map<String, Value>;

/// Field carrying the store-generated identifier on documents read back.
pub const ID_FIELD: &str = "_id";

/// Handle to the document store, shared by every request for the lifetime of
/// the process. Documents live in one SQLite table keyed by database name and
/// collection, so collections spring into existence on first insert.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    name: String,
}

impl Database {
    pub async fn connect(url: &str, name: &str) -> Result<Self, AppError> {
        let connect_options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every connection to an in-memory url is its own database
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?
        };
        Self::open(pool, name).await
    }

    pub async fn open(pool: SqlitePool, name: &str) -> Result<Self, AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                database TEXT NOT NULL,
                collection TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_by_collection
             ON documents (database, collection, seq);",
        )
        .execute(&pool)
        .await?;

        Ok(Database {
            pool,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Names of the collections holding at least one document.
    pub async fn list_collection_names(&self) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar(
            "SELECT DISTINCT collection FROM documents WHERE database = ? ORDER BY collection",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }
}

pub async fn create_document<T>(
    db: &Database,
    collection: &str,
    data: &T,
) -> Result<String, AppError>
where
    T: Serialize + ?Sized,
{
    let mut document = match serde_json::to_value(data)? {
        Value::Object(map) => map,
        _ => return Err(AppError::InvalidDocument),
    };
    document.remove(ID_FIELD);

    let id = nanoid!();
    sqlx::query("INSERT INTO documents (id, database, collection, data) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&db.name)
        .bind(collection)
        .bind(Value::Object(document).to_string())
        .execute(&db.pool)
        .await?;

    tracing::debug!(collection, %id, "document created");
    Ok(id)
}

/// Equality match on one top-level field.
enum Clause {
    IsNull(String),
    Text(String, String),
    Integer(String, i64),
    Real(String, f64),
}

fn json_path(field: &str) -> Result<String, AppError> {
    if field.contains('"') {
        return Err(AppError::InvalidFilter(format!("unsupported field name {field:?}")));
    }
    Ok(format!("$.\"{field}\""))
}

fn compile_filter(filter: &Document) -> Result<Vec<Clause>, AppError> {
    filter
        .iter()
        .map(|(field, value)| {
            let path = json_path(field)?;
            match value {
                Value::Null => Ok(Clause::IsNull(path)),
                Value::Bool(b) => Ok(Clause::Integer(path, i64::from(*b))),
                Value::String(s) => Ok(Clause::Text(path, s.clone())),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Clause::Integer(path, i)),
                    None => n
                        .as_f64()
                        .map(|f| Clause::Real(path, f))
                        .ok_or_else(|| AppError::InvalidFilter(format!("{field}: {n}"))),
                },
                Value::Array(_) | Value::Object(_) => Err(AppError::InvalidFilter(format!(
                    "{field}: only scalar values can be matched"
                ))),
            }
        })
        .collect()
}

/// Up to `limit` documents of `collection` matching every field of `filter`,
/// in insertion order. Each document carries its identifier under `_id`.
pub async fn get_documents(
    db: &Database,
    collection: &str,
    filter: &Document,
    limit: u32,
) -> Result<Vec<Document>, AppError> {
    let clauses = compile_filter(filter)?;

    let mut sql =
        String::from("SELECT id, data FROM documents WHERE database = ? AND collection = ?");
    for clause in &clauses {
        match clause {
            Clause::IsNull(_) => sql.push_str(" AND json_extract(data, ?) IS NULL"),
            _ => sql.push_str(" AND json_extract(data, ?) = ?"),
        }
    }
    sql.push_str(" ORDER BY seq LIMIT ?");

    let mut query = sqlx::query_as::<_, (String, String)>(&sql)
        .bind(&db.name)
        .bind(collection);
    for clause in clauses {
        query = match clause {
            Clause::IsNull(path) => query.bind(path),
            Clause::Text(path, s) => query.bind(path).bind(s),
            Clause::Integer(path, i) => query.bind(path).bind(i),
            Clause::Real(path, f) => query.bind(path).bind(f),
        };
    }
    let rows = query.bind(i64::from(limit)).fetch_all(&db.pool).await?;

    rows.into_iter()
        .map(|(id, data)| {
            let mut document: Document = serde_json::from_str(&data)?;
            document.insert(ID_FIELD.to_string(), Value::String(id));
            Ok(document)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_db(name: &str) -> Database {
        Database::connect("sqlite::memory:", name).await.unwrap()
    }

    fn filter(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("filter must be an object"),
        }
    }

    #[tokio::test]
    async fn create_then_read_back_in_insertion_order() {
        let db = memory_db("center").await;
        let first = create_document(&db, "event", &json!({ "title": "a" })).await.unwrap();
        let second = create_document(&db, "event", &json!({ "title": "b" })).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 21);

        let docs = get_documents(&db, "event", &Document::new(), 10).await.unwrap();
        let ids: Vec<&Value> = docs.iter().map(|d| &d[ID_FIELD]).collect();
        assert_eq!(ids, [&json!(first), &json!(second)]);
        assert_eq!(docs[0]["title"], "a");
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let db = memory_db("center").await;
        for i in 0..5 {
            create_document(&db, "galleryimage", &json!({ "n": i })).await.unwrap();
        }
        let docs = get_documents(&db, "galleryimage", &Document::new(), 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        let none = get_documents(&db, "galleryimage", &Document::new(), 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn collections_appear_on_first_write() {
        let db = memory_db("center").await;
        assert!(db.list_collection_names().await.unwrap().is_empty());
        create_document(&db, "contactmessage", &json!({ "name": "Ana" })).await.unwrap();
        create_document(&db, "event", &json!({ "title": "x" })).await.unwrap();
        assert_eq!(
            db.list_collection_names().await.unwrap(),
            ["contactmessage", "event"]
        );
    }

    #[tokio::test]
    async fn database_name_scopes_documents() {
        let db = memory_db("center").await;
        let other = Database::open(db.pool.clone(), "archive").await.unwrap();
        create_document(&db, "event", &json!({ "title": "x" })).await.unwrap();
        assert!(other.list_collection_names().await.unwrap().is_empty());
        let docs = get_documents(&other, "event", &Document::new(), 10).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn filters_match_scalar_fields() {
        let db = memory_db("center").await;
        let a = json!({ "title": "a", "all_day": true, "category": "music" });
        let b = json!({ "title": "b", "all_day": false, "category": null });
        create_document(&db, "event", &a).await.unwrap();
        create_document(&db, "event", &b).await.unwrap();

        let music = get_documents(&db, "event", &filter(json!({ "category": "music" })), 10)
            .await
            .unwrap();
        assert_eq!(music.len(), 1);
        assert_eq!(music[0]["title"], "a");

        let all_day = get_documents(&db, "event", &filter(json!({ "all_day": false })), 10)
            .await
            .unwrap();
        assert_eq!(all_day[0]["title"], "b");

        let uncategorised = get_documents(&db, "event", &filter(json!({ "category": null })), 10)
            .await
            .unwrap();
        assert_eq!(uncategorised.len(), 1);
        assert_eq!(uncategorised[0]["title"], "b");
    }

    #[tokio::test]
    async fn rejects_non_scalar_filters_and_documents() {
        let db = memory_db("center").await;
        let err = get_documents(&db, "event", &filter(json!({ "tags": ["a"] })), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFilter(_)));

        let err = create_document(&db, "event", &json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument));
    }

    #[tokio::test]
    async fn store_owns_identifiers() {
        let db = memory_db("center").await;
        let id = create_document(&db, "event", &json!({ "_id": "mine", "title": "x" }))
            .await
            .unwrap();
        assert_ne!(id, "mine");
        let docs = get_documents(&db, "event", &Document::new(), 1).await.unwrap();
        assert_eq!(docs[0][ID_FIELD], json!(id));
    }
}
