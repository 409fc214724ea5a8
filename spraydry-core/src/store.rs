use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::error::Result;

// The schema is the compatibility surface: databases produced here must
// stay interchangeable with other implementations.

const CREATE_REHYDRATE: &str = "CREATE TABLE IF NOT EXISTS rehydrate (
    id INTEGER PRIMARY KEY
    , name TEXT NOT NULL
    , version TEXT NOT NULL
    , chunking TEXT NOT NULL
    , algorithm TEXT NOT NULL
    , data BLOB NOT NULL
    , UNIQUE (name, version)
);";

const SETUP_REHYDRATE: &str = "INSERT OR IGNORE INTO rehydrate (id, name, version, chunking, algorithm, data)
VALUES (0, 'nocompress-fixed', '0', 'fixed size:0x2000', 'nocompress', X'')
    , (1, 'nocompress-crc32', '0', 'crc32 cutoff:0x000a0000 initializer:0xfacade00 max:0x4000 min:0x0800', 'nocompress', X'');";

const CREATE_CHUNKHASH: &str = "CREATE TABLE IF NOT EXISTS chunkhash (
    id INTEGER PRIMARY KEY
    , rehydrate INTEGER NOT NULL
        REFERENCES rehydrate (id)
        ON DELETE CASCADE
    , size INTEGER NOT NULL
    , data BLOB NOT NULL
    , UNIQUE (id, rehydrate, size)
    , UNIQUE (rehydrate, data)
);";

const CREATE_CHUNK: &str = "CREATE TABLE IF NOT EXISTS chunk (
    id INTEGER PRIMARY KEY
        REFERENCES chunkhash (id)
        ON DELETE CASCADE
    , data BLOB NOT NULL
);";

const CREATE_FILE: &str = "CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY
    , hash BLOB NOT NULL
    , rehydrate INTEGER NOT NULL
        REFERENCES rehydrate (id)
        ON DELETE CASCADE
    , UNIQUE (hash, rehydrate)
);";

const CREATE_CONTENT: &str = "CREATE TABLE IF NOT EXISTS content (
    file INTEGER NOT NULL
        REFERENCES file (id)
        ON DELETE CASCADE
    , rehydrate INTEGER NOT NULL
        REFERENCES rehydrate (id)
        ON DELETE CASCADE
    , offset INTEGER NOT NULL
    , size INTEGER NOT NULL
    , chunk INTEGER NOT NULL
        REFERENCES chunk (id)
        ON DELETE RESTRICT
    , PRIMARY KEY (file, rehydrate, offset)
    , FOREIGN KEY (chunk, rehydrate, size)
        REFERENCES chunkhash (id, rehydrate, size)
        ON DELETE RESTRICT
) WITHOUT ROWID;";

const CREATE_ENTRY: &str = "CREATE TABLE IF NOT EXISTS entry (
    id INTEGER PRIMARY KEY
    , directory INTEGER NOT NULL
        REFERENCES file (id)
    , name BLOB NOT NULL
    , isdirectory BOOL NOT NULL
    , mode BLOB NOT NULL
    , size INTEGER NOT NULL
    , file INTEGER NOT NULL
        REFERENCES file (id)
    , UNIQUE (directory, name)
);";

const CREATE_ROOT: &str = "CREATE TABLE IF NOT EXISTS root (
    id INTEGER PRIMARY KEY
    , name TEXT NOT NULL
    , version TEXT NOT NULL
    , isdirectory BOOL NOT NULL
    , mode BLOB NOT NULL
    , size INTEGER NOT NULL
    , file INTEGER NOT NULL
        REFERENCES file (id)
    , UNIQUE (name, version)
);";

/// Open the single writer connection: WAL, foreign keys on, autocommit
/// with explicitly managed transactions. Creates and seeds the schema.
pub fn open_writer(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    for statement in [
        CREATE_REHYDRATE,
        SETUP_REHYDRATE,
        CREATE_CHUNKHASH,
        CREATE_CHUNK,
        CREATE_FILE,
        CREATE_CONTENT,
        CREATE_ENTRY,
        CREATE_ROOT,
    ] {
        conn.execute_batch(statement)?;
    }
    Ok(conn)
}

/// Open a read-only reader connection, optionally with a memory-mapped
/// region of `mmap` bytes.
pub fn open_reader(path: &Path, mmap: Option<u64>) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    if let Some(size) = mmap {
        conn.query_row(&format!("PRAGMA mmap_size={size}"), [], |_| Ok(()))?;
    }
    Ok(conn)
}

/// A named savepoint tied to the recursive descent of an ingest. Must be
/// resolved explicitly; dropping an unresolved savepoint rolls it back.
pub struct Savepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    open: bool,
}

impl<'conn> Savepoint<'conn> {
    /// `name` must be a valid SQL identifier; the ingestor derives it
    /// from a path hash, so recursion never reuses an ancestor's name.
    pub fn open(conn: &'conn Connection, name: String) -> Result<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(Self {
            conn,
            name,
            open: true,
        })
    }

    /// Merge into the parent scope.
    pub fn release(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute_batch(&format!("RELEASE {}", self.name))?;
        Ok(())
    }

    /// Undo everything since the savepoint, then discard it.
    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0};", self.name))?;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self
                .conn
                .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0};", self.name));
        }
    }
}
