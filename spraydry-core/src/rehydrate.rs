use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::codec::Decoder;
use crate::conf::algosplit;
use crate::error::{Result, SprayDryError};
use crate::store::open_reader;

pub const MMAP_DEFAULT: u64 = 128 * 1024 * 1024;

/// One row of a directory, or a root pseudo-entry (`id` is None).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: Option<i64>,
    pub directory: Option<i64>,
    pub name: Vec<u8>,
    pub isdir: bool,
    pub mode: u16,
    pub size: u64,
    pub file: i64,
}

fn mode_from_blob(blob: &[u8]) -> u16 {
    let mut bytes = [0u8; 2];
    for (slot, b) in bytes.iter_mut().zip(blob) {
        *slot = *b;
    }
    u16::from_le_bytes(bytes)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let mode: Vec<u8> = row.get(4)?;
    Ok(Entry {
        id: Some(row.get(0)?),
        directory: Some(row.get(1)?),
        name: row.get(2)?,
        isdir: row.get(3)?,
        mode: mode_from_blob(&mode),
        size: row.get::<_, i64>(5)? as u64,
        file: row.get(6)?,
    })
}

/// Reassembles file bytes from stored chunks through a read-only
/// connection. A decoder per rehydrate config is materialised once at
/// startup and dispatched per chunk.
pub struct Rehydrator {
    reader: Connection,
    decoders: HashMap<i64, Decoder>,
}

impl Rehydrator {
    pub fn open(dbpath: &Path, mmap: Option<u64>) -> Result<Self> {
        let reader = open_reader(dbpath, mmap)?;
        let decoders = make_decoders(&reader)?;
        Ok(Self { reader, decoders })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.reader
    }

    /// The named root, as an entry without id or parent.
    pub fn root(&self, name: &str, version: &str) -> Result<Option<Entry>> {
        let res = self
            .reader
            .query_row(
                "SELECT isdirectory, mode, size, file FROM root WHERE name = ?1 AND version = ?2",
                params![name, version],
                |row| {
                    let mode: Vec<u8> = row.get(1)?;
                    Ok(Entry {
                        id: None,
                        directory: None,
                        name: name.as_bytes().to_vec(),
                        isdir: row.get(0)?,
                        mode: mode_from_blob(&mode),
                        size: row.get::<_, i64>(2)? as u64,
                        file: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(res)
    }

    pub fn attributes(&self, entryid: i64) -> Result<Option<Entry>> {
        let res = self
            .reader
            .query_row(
                "SELECT id, directory, name, isdirectory, mode, size, file
                 FROM entry
                 WHERE id = ?1",
                params![entryid],
                entry_from_row,
            )
            .optional()?;
        Ok(res)
    }

    /// Find an entry by directory file id and raw name bytes.
    pub fn entry(&self, dirid: i64, name: &[u8]) -> Result<Option<Entry>> {
        let res = self
            .reader
            .query_row(
                "SELECT id, directory, name, isdirectory, mode, size, file
                 FROM entry
                 WHERE directory = ?1
                   AND name = ?2",
                params![dirid, name],
                entry_from_row,
            )
            .optional()?;
        Ok(res)
    }

    /// Walk the directory listing in name order, starting after row
    /// number `offset`. Row numbers are 1-based and dense, so they act
    /// as a stable resume cursor. The callback returns whether to keep
    /// going.
    pub fn for_each_entry(
        &self,
        dirid: i64,
        offset: u64,
        mut take: impl FnMut(u64, Entry) -> bool,
    ) -> Result<()> {
        let mut stmt = self.reader.prepare(
            "SELECT rownum, id, directory, name, isdirectory, mode, size, file
             FROM (
               SELECT ROW_NUMBER() OVER ( ORDER BY name ) AS rownum
                 , id, directory, name, isdirectory, mode, size, file
               FROM entry
               WHERE directory = ?1
             )
             WHERE rownum > ?2",
        )?;
        let mut rows = stmt.query(params![dirid, offset as i64])?;
        while let Some(row) = rows.next()? {
            let rownum: i64 = row.get(0)?;
            let mode: Vec<u8> = row.get(5)?;
            let entry = Entry {
                id: Some(row.get(1)?),
                directory: Some(row.get(2)?),
                name: row.get(3)?,
                isdir: row.get(4)?,
                mode: mode_from_blob(&mode),
                size: row.get::<_, i64>(6)? as u64,
                file: row.get(7)?,
            };
            if !take(rownum as u64, entry) {
                break;
            }
        }
        Ok(())
    }

    /// The full listing from `offset`, for callers without early exit.
    pub fn list(&self, dirid: i64, offset: u64) -> Result<Vec<(u64, Entry)>> {
        let mut out = Vec::new();
        self.for_each_entry(dirid, offset, |rownum, entry| {
            out.push((rownum, entry));
            true
        })?;
        Ok(out)
    }

    /// Read up to `size` bytes of the file starting at `offset`. Plans
    /// the minimal chunk sequence, decodes each chunk to its recorded
    /// size and slices to the requested window. Reads past the end
    /// return fewer bytes, never an error.
    pub fn pread(&self, fileid: i64, offset: u64, size: u64) -> Result<Vec<u8>> {
        let end = offset + size;
        let mut out = Vec::new();
        let mut stmt = self.reader.prepare(
            "SELECT co.rehydrate, co.offset, co.size, ch.data
             FROM content AS co
               INNER JOIN chunk AS ch
                 ON co.chunk = ch.id
             WHERE co.file = ?1
               AND ?2 < (co.offset + co.size)
               AND co.offset < (?2 + ?3)
             ORDER BY co.offset",
        )?;
        let mut rows = stmt.query(params![fileid, offset as i64, size as i64])?;
        while let Some(row) = rows.next()? {
            let rehydrate: i64 = row.get(0)?;
            let cstart = row.get::<_, i64>(1)? as u64;
            let csize = row.get::<_, i64>(2)? as usize;
            let data: Vec<u8> = row.get(3)?;
            let decoder = self.decoders.get(&rehydrate).ok_or_else(|| {
                SprayDryError::Integrity(format!("no decoder for rehydrate id {rehydrate}"))
            })?;
            let chunk = decoder.rehydrate(csize, &data)?;
            if offset <= cstart && cstart + csize as u64 <= end {
                out.extend_from_slice(&chunk);
            } else {
                let from = offset.saturating_sub(cstart) as usize;
                let to = (end - cstart).min(csize as u64) as usize;
                out.extend_from_slice(&chunk[from..to]);
            }
        }
        Ok(out)
    }
}

fn make_decoders(conn: &Connection) -> Result<HashMap<i64, Decoder>> {
    let mut decoders = HashMap::new();
    let mut stmt = conn.prepare("SELECT id, algorithm, data FROM rehydrate")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let algorithm: String = row.get(1)?;
        let data: Vec<u8> = row.get(2)?;
        decoders.insert(id, Decoder::from_conf(&algosplit(&algorithm)?, &data)?);
    }
    Ok(decoders)
}
