use crate::error::Result;
use crate::types::{Bookmark, HistoryEntry};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "termi";

fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn get_db_path() -> PathBuf {
    get_data_dir().join("termi.db")
}

pub trait HistoryLog {
    fn append(&mut self, entry: &HistoryEntry) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
    limit: usize,
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            query TEXT NOT NULL,
            command TEXT NOT NULL,
            mode TEXT NOT NULL,
            model TEXT NOT NULL,
            exit_code INTEGER,
            cwd TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bookmarks (
            name TEXT PRIMARY KEY,
            command TEXT NOT NULL,
            description TEXT NOT NULL,
            created INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn history_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        timestamp: row.get(0)?,
        query: row.get(1)?,
        command: row.get(2)?,
        mode: row.get(3)?,
        model: row.get(4)?,
        exit_code: row.get(5)?,
        cwd: row.get(6)?,
    })
}

fn bookmark_row(row: &Row) -> rusqlite::Result<Bookmark> {
    Ok(Bookmark {
        name: row.get(0)?,
        command: row.get(1)?,
        description: row.get(2)?,
        created: row.get(3)?,
    })
}

const HISTORY_COLUMNS: &str = "timestamp, query, command, mode, model, exit_code, cwd";

impl SqliteStore {
    pub fn open(path: &Path, limit: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?, limit)
    }

    pub fn open_in_memory(limit: usize) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, limit)
    }

    fn with_connection(conn: Connection, limit: usize) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            limit: limit.max(1),
        })
    }

    pub fn recent(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM history ORDER BY id DESC LIMIT ?1",
            HISTORY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![n as i64], history_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    pub fn search(&self, query: &str) -> Result<Vec<HistoryEntry>> {
        // SQLite's lower() only folds ASCII
        let needle = query.to_lowercase();
        let sql = format!("SELECT {} FROM history ORDER BY id DESC", HISTORY_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], history_row)?
            .filter_map(|r| r.ok())
            .filter(|e| {
                e.query.to_lowercase().contains(&needle) || e.command.to_lowercase().contains(&needle)
            })
            .collect();
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM history", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn last_command(&self) -> Result<Option<String>> {
        let cmd = self
            .conn
            .query_row(
                "SELECT command FROM history ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cmd)
    }

    pub fn add_bookmark(&mut self, name: &str, command: &str, description: &str) -> Result<()> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.conn.execute(
            "INSERT OR REPLACE INTO bookmarks (name, command, description, created)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, command, description, now],
        )?;
        Ok(())
    }

    pub fn bookmark(&self, name: &str) -> Result<Option<Bookmark>> {
        let bookmark = self
            .conn
            .query_row(
                "SELECT name, command, description, created FROM bookmarks WHERE name = ?1",
                params![name],
                bookmark_row,
            )
            .optional()?;
        Ok(bookmark)
    }

    pub fn remove_bookmark(&mut self, name: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM bookmarks WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    pub fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, command, description, created FROM bookmarks ORDER BY name")?;
        let bookmarks = stmt
            .query_map([], bookmark_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(bookmarks)
    }
}

impl HistoryLog for SqliteStore {
    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO history (timestamp, query, command, mode, model, exit_code, cwd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.timestamp,
                entry.query,
                entry.command,
                entry.mode,
                entry.model,
                entry.exit_code,
                entry.cwd
            ],
        )?;
        tx.execute(
            "DELETE FROM history WHERE id NOT IN (
                SELECT id FROM history ORDER BY id DESC LIMIT ?1
            )",
            params![self.limit as i64],
        )?;
        tx.commit()?;
        Ok(())
    }
}
