use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::error::StoreError;
use crate::graph::{Label, Node, NodeRef, RelKind, Relationship, Upsert};

const BUSY_TIMEOUT_SECS: u64 = 30;

/// Merge-by-key write primitive of the graph store.
///
/// Applying the same upsert twice leaves the store unchanged; upserting a known
/// key with new attribute values overwrites those attributes and keeps the rest.
pub trait GraphStore: Send + Sync {
    fn upsert(&self, op: &Upsert) -> Result<(), StoreError>;
}

/// Applies upserts in order, stopping at the first failure. Returns how many were applied.
pub fn apply_all<S: GraphStore + ?Sized>(store: &S, ops: &[Upsert]) -> Result<usize, StoreError> {
    for op in ops {
        store.upsert(op)?;
    }
    Ok(ops.len())
}

/// Property graph kept in SQLite: one row per node keyed by `(label, key)` and one
/// row per relationship keyed by its type and endpoints.
pub struct SqliteGraph {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub finished_at: String,
    pub files_imported: usize,
    pub files_failed: usize,
    pub seasons_written: usize,
    pub errors: Vec<String>,
}

impl SqliteGraph {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn upsert_node(&self, node: &Node) -> Result<(), StoreError> {
        let properties = serde_json::to_string(&node.properties()?)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO nodes (label, key, properties) VALUES (?1, ?2, ?3)
            ON CONFLICT(label, key) DO UPDATE SET
                properties = json_patch(nodes.properties, excluded.properties)
            "#,
        )?;
        stmt.execute(params![node.label().as_str(), node.key(), properties])?;
        Ok(())
    }

    fn upsert_relationship(&self, rel: &Relationship) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO relationships (rel_type, from_label, from_key, to_label, to_key)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT DO NOTHING
            "#,
        )?;
        stmt.execute(params![
            rel.kind.as_str(),
            rel.from.label.as_str(),
            rel.from.key,
            rel.to.label.as_str(),
            rel.to.key,
        ])?;
        Ok(())
    }

    pub fn node_count(&self, label: Label) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE label = ?1",
            params![label.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(n as u64)
    }

    pub fn relationship_count(&self, kind: RelKind) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE rel_type = ?1",
            params![kind.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(n as u64)
    }

    pub fn node_properties(&self, label: Label, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT properties FROM nodes WHERE label = ?1 AND key = ?2",
                params![label.as_str(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn has_relationship(&self, rel: &Relationship) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                r#"
                SELECT 1 FROM relationships
                WHERE rel_type = ?1 AND from_label = ?2 AND from_key = ?3
                  AND to_label = ?4 AND to_key = ?5
                "#,
                params![
                    rel.kind.as_str(),
                    rel.from.label.as_str(),
                    rel.from.key,
                    rel.to.label.as_str(),
                    rel.to.key,
                ],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Keys of the nodes reached from `from` over `kind`, sorted.
    pub fn targets(&self, from: &NodeRef, kind: RelKind) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT to_key FROM relationships
            WHERE rel_type = ?1 AND from_label = ?2 AND from_key = ?3
            ORDER BY to_key
            "#,
        )?;
        let rows = stmt.query_map(
            params![kind.as_str(), from.label.as_str(), from.key],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn begin_run(&self, started_at: &str, files_total: usize) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ingest_runs(started_at, finished_at, files_total, files_imported, files_failed, seasons_written, errors_json)
             VALUES (?1, NULL, ?2, 0, 0, 0, '[]')",
            params![started_at, files_total as i64],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn finish_run(&self, run_id: i64, record: &RunRecord) -> Result<(), StoreError> {
        let errors_json = serde_json::to_string(&record.errors)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE ingest_runs
             SET finished_at = ?1, files_imported = ?2, files_failed = ?3, seasons_written = ?4, errors_json = ?5
             WHERE run_id = ?6",
            params![
                record.finished_at,
                record.files_imported as i64,
                record.files_failed as i64,
                record.seasons_written as i64,
                errors_json,
                run_id
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n = conn.query_row("SELECT COUNT(*) FROM ingest_runs", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(n as u64)
    }
}

impl GraphStore for SqliteGraph {
    fn upsert(&self, op: &Upsert) -> Result<(), StoreError> {
        match op {
            Upsert::Node(node) => self.upsert_node(node),
            Upsert::Relationship(rel) => self.upsert_relationship(rel),
        }
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            label TEXT NOT NULL,
            key TEXT NOT NULL,
            properties TEXT NOT NULL,
            PRIMARY KEY (label, key)
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS relationships (
            rel_type TEXT NOT NULL,
            from_label TEXT NOT NULL,
            from_key TEXT NOT NULL,
            to_label TEXT NOT NULL,
            to_key TEXT NOT NULL,
            PRIMARY KEY (rel_type, from_label, from_key, to_label, to_key)
        ) WITHOUT ROWID;
        CREATE INDEX IF NOT EXISTS idx_relationships_to
            ON relationships(to_label, to_key, rel_type);

        CREATE INDEX IF NOT EXISTS idx_player_name
            ON nodes(json_extract(properties, '$.name')) WHERE label = 'Player';
        CREATE INDEX IF NOT EXISTS idx_match_date
            ON nodes(json_extract(properties, '$.date')) WHERE label = 'Match';
        CREATE INDEX IF NOT EXISTS idx_match_season
            ON nodes(json_extract(properties, '$.season')) WHERE label = 'Match';
        CREATE INDEX IF NOT EXISTS idx_innings_team
            ON nodes(json_extract(properties, '$.team')) WHERE label = 'Innings';
        CREATE INDEX IF NOT EXISTS idx_delivery_ball_number
            ON nodes(json_extract(properties, '$.ball_number')) WHERE label = 'Delivery';
        CREATE INDEX IF NOT EXISTS idx_delivery_phase
            ON nodes(json_extract(properties, '$.phase')) WHERE label = 'Delivery';

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            files_total INTEGER NOT NULL,
            files_imported INTEGER NOT NULL,
            files_failed INTEGER NOT NULL,
            seasons_written INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Player, Team, Venue};

    fn venue(city: Option<&str>) -> Upsert {
        Upsert::Node(Node::Venue(Venue {
            name: "Wankhede Stadium".to_string(),
            city: city.map(str::to_string),
        }))
    }

    #[test]
    fn repeated_upsert_is_a_no_op() {
        let store = SqliteGraph::open_in_memory().unwrap();
        let op = venue(Some("Mumbai"));
        store.upsert(&op).unwrap();
        store.upsert(&op).unwrap();
        assert_eq!(store.node_count(Label::Venue).unwrap(), 1);
        let props = store
            .node_properties(Label::Venue, "Wankhede Stadium")
            .unwrap()
            .unwrap();
        assert_eq!(props["city"], "Mumbai");
    }

    #[test]
    fn later_values_win_and_unset_fields_survive() {
        let store = SqliteGraph::open_in_memory().unwrap();
        store.upsert(&venue(Some("Mumbai"))).unwrap();
        store.upsert(&venue(None)).unwrap();
        let props = store
            .node_properties(Label::Venue, "Wankhede Stadium")
            .unwrap()
            .unwrap();
        assert_eq!(props["city"], "Mumbai");

        store.upsert(&venue(Some("Bombay"))).unwrap();
        let props = store
            .node_properties(Label::Venue, "Wankhede Stadium")
            .unwrap()
            .unwrap();
        assert_eq!(props["city"], "Bombay");
    }

    #[test]
    fn relationships_merge_by_endpoints() {
        let store = SqliteGraph::open_in_memory().unwrap();
        let player = Node::Player(Player {
            registry_id: "p1".to_string(),
            name: "V Kohli".to_string(),
        });
        let team = Node::Team(Team {
            name: "Royal Challengers Bengaluru".to_string(),
        });
        let rel = Relationship::new(player.node_ref(), RelKind::PlaysFor, team.node_ref());
        let ops = vec![
            Upsert::Node(player),
            Upsert::Node(team),
            Upsert::Relationship(rel.clone()),
            Upsert::Relationship(rel.clone()),
        ];
        assert_eq!(apply_all(&store, &ops).unwrap(), 4);
        assert_eq!(store.relationship_count(RelKind::PlaysFor).unwrap(), 1);
        assert!(store.has_relationship(&rel).unwrap());
        assert_eq!(
            store
                .targets(&NodeRef::new(Label::Player, "p1"), RelKind::PlaysFor)
                .unwrap(),
            vec!["Royal Challengers Bengaluru".to_string()]
        );
    }

    #[test]
    fn run_ledger_records_outcome() {
        let store = SqliteGraph::open_in_memory().unwrap();
        let run_id = store.begin_run("2026-01-01T00:00:00Z", 3).unwrap();
        store
            .finish_run(
                run_id,
                &RunRecord {
                    finished_at: "2026-01-01T00:01:00Z".to_string(),
                    files_imported: 2,
                    files_failed: 1,
                    seasons_written: 1,
                    errors: vec!["bad.json: decode".to_string()],
                },
            )
            .unwrap();
        assert_eq!(store.run_count().unwrap(), 1);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("graph.sqlite");
        let store = SqliteGraph::open(&path).expect("store");
        assert_eq!(store.run_count().unwrap(), 0);
        assert!(path.is_file());
    }

    #[test]
    fn open_reports_unusable_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let opened = SqliteGraph::open(&blocker.join("graph.sqlite"));
        match opened {
            Err(StoreError::CreateDir { path, .. }) => assert_eq!(path, blocker),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("store opened below a regular file"),
        }
    }
}
