use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use log::{debug, info};
use memmap2::Mmap;
use rusqlite::{Connection, OptionalExtension, params};

use crate::codec::Dryer;
use crate::conf::{AlgoConf, algojoin, algosplit};
use crate::error::{Result, SprayDryError};
use crate::hash::HashAlgorithm;
use crate::spray::Sprayer;
use crate::store::{Savepoint, open_writer};
use crate::train;

/// Stat fields carried from a dried entry to its parent directory.
#[derive(Clone, Copy, Debug)]
struct EntryStat {
    mode: u32,
    size: u64,
    isdir: bool,
}

fn mode_bytes(mode: u32) -> [u8; 2] {
    (mode as u16).to_le_bytes()
}

/// The spray-dry ingest pipeline: walks a source tree, chunks and
/// encodes file contents, and writes the content-addressed graph under
/// per-entry savepoints. Duplicate hashes roll the savepoint back and
/// reuse the existing file id.
pub struct SprayDryStore {
    writer: Connection,
    algorithm: HashAlgorithm,
    rehydrate: i64,
    sprayer: Sprayer,
    dryer: Dryer,
}

impl SprayDryStore {
    /// Open the single writer and bind it to the named rehydrate config.
    ///
    /// When the config does not exist yet it is created from the given
    /// spray/dry specs, which only works for dryers that need no
    /// training data. When it does exist, explicitly given specs must
    /// match the stored ones.
    pub fn open(
        dbpath: &Path,
        algorithm: HashAlgorithm,
        rehydratename: &str,
        sprayconf: Option<&AlgoConf>,
        dryconf: Option<&AlgoConf>,
    ) -> Result<Self> {
        let writer = open_writer(dbpath)?;
        let existing = writer
            .query_row(
                "SELECT id, chunking, algorithm, data FROM rehydrate WHERE name = ?1",
                [rehydratename],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()?;
        let (rehydrate, sprayer, dryer) = match existing {
            Some((id, chunking_raw, algorithm_raw, data)) => {
                if let Some(given) = sprayconf {
                    if algojoin(given) != chunking_raw {
                        return Err(SprayDryError::Config(format!(
                            "chunking spec mismatch for '{rehydratename}': stored '{chunking_raw}'"
                        )));
                    }
                }
                if let Some(given) = dryconf {
                    if algojoin(given) != algorithm_raw {
                        return Err(SprayDryError::Config(format!(
                            "codec spec mismatch for '{rehydratename}': stored '{algorithm_raw}'"
                        )));
                    }
                }
                let sprayer = Sprayer::from_conf(&algosplit(&chunking_raw)?)?;
                let dryer = Dryer::from_conf(&algosplit(&algorithm_raw)?, &data)?;
                (id, sprayer, dryer)
            }
            None => {
                let (Some(sprayconf), Some(dryconf)) = (sprayconf, dryconf) else {
                    return Err(SprayDryError::Config(format!(
                        "no rehydrate config named '{rehydratename}' and no specs to create one"
                    )));
                };
                let data = train::untrained_data(dryconf)?;
                let id = train::insert_config(&writer, rehydratename, "0", sprayconf, dryconf, &data)?;
                let sprayer = Sprayer::from_conf(sprayconf)?;
                let dryer = Dryer::from_conf(dryconf, &data)?;
                (id, sprayer, dryer)
            }
        };
        Ok(Self {
            writer,
            algorithm,
            rehydrate,
            sprayer,
            dryer,
        })
    }

    /// Ingest `path` as the root `(name, version)`. Fails if the root
    /// exists; the whole ingest happens in one transaction.
    pub fn root(&self, name: &str, version: &str, path: &Path) -> Result<()> {
        let realpath = path.canonicalize()?;
        self.writer.execute_batch("BEGIN")?;
        match self.root_inner(name, version, &realpath) {
            Ok(()) => {
                self.writer.execute_batch("COMMIT")?;
                info!("ingested root '{name}' version '{version}' from {}", realpath.display());
                Ok(())
            }
            Err(e) => {
                let _ = self.writer.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn root_inner(&self, name: &str, version: &str, path: &Path) -> Result<()> {
        let existing: Option<i64> = self
            .writer
            .query_row(
                "SELECT id FROM root WHERE name = ?1 AND version = ?2",
                params![name, version],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(SprayDryError::DuplicateRoot {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        let (fileid, _filehash, stat) = self.dry(path)?;
        self.writer.execute(
            "INSERT INTO root (name, version, isdirectory, mode, size, file) VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                name,
                version,
                stat.isdir,
                &mode_bytes(stat.mode)[..],
                stat.size as i64,
                fileid
            ],
        )?;
        Ok(())
    }

    fn dry(&self, path: &Path) -> Result<(i64, Vec<u8>, EntryStat)> {
        let metadata = std::fs::metadata(path)?;
        let stat = EntryStat {
            mode: metadata.mode(),
            size: metadata.len(),
            isdir: metadata.is_dir(),
        };
        let (fileid, filehash) = if metadata.is_dir() {
            self.dry_directory(path)?
        } else if metadata.is_file() {
            self.dry_file(path)?
        } else {
            return Err(SprayDryError::UnsupportedFileType(path.to_path_buf()));
        };
        Ok((fileid, filehash, stat))
    }

    fn dry_file(&self, path: &Path) -> Result<(i64, Vec<u8>)> {
        debug!("drying file {}", path.display());
        let savepoint = self.savepoint(path)?;
        let fileid = self.tmpid(path)?;
        let mut filehash = self.algorithm.hasher();
        let handle = File::open(path)?;
        // An empty file cannot be mapped; it simply has no chunks.
        if handle.metadata()?.len() > 0 {
            let mapping = unsafe { Mmap::map(&handle)? };
            for (offset, chunk) in self.sprayer.spray(&mapping) {
                filehash.update(chunk);
                let chunkid = self.store_chunk(chunk)?;
                self.store_content(fileid, offset, chunkid)?;
            }
        }
        let filehash = self.algorithm.tag(&filehash.digest());
        self.finalize(savepoint, fileid, filehash)
    }

    fn dry_directory(&self, path: &Path) -> Result<(i64, Vec<u8>)> {
        debug!("drying directory {}", path.display());
        let savepoint = self.savepoint(path)?;
        let fileid = self.tmpid(path)?;
        let mut filehash = self.algorithm.hasher();

        let mut children = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        children.sort_by(|a, b| {
            a.file_name()
                .map(OsStrExt::as_bytes)
                .cmp(&b.file_name().map(OsStrExt::as_bytes))
        });

        for child in &children {
            let (entryid, entryhash, entrystat) = self.dry(child)?;
            let entryname = child
                .file_name()
                .ok_or_else(|| SprayDryError::UnsupportedFileType(child.clone()))?
                .as_bytes();
            let entrymode = mode_bytes(entrystat.mode);
            let mut segment = Vec::with_capacity(1 + entryhash.len() + 2 + entryname.len() * 2);
            segment.push(0x00);
            segment.extend_from_slice(&entryhash);
            segment.extend_from_slice(&entrymode);
            segment.extend_from_slice(hex::encode(entryname).as_bytes());
            filehash.update(&segment);
            self.writer.execute(
                "INSERT OR IGNORE INTO entry (directory, name, isdirectory, mode, size, file) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    fileid,
                    entryname,
                    entrystat.isdir,
                    &entrymode[..],
                    entrystat.size as i64,
                    entryid
                ],
            )?;
        }
        let filehash = self.algorithm.tag(&filehash.digest());
        self.finalize(savepoint, fileid, filehash)
    }

    /// Deduplicate on the final hash: an existing row wins and the
    /// savepoint is rolled back, otherwise the preliminary row is
    /// promoted and the savepoint released into its parent.
    fn finalize(
        &self,
        savepoint: Savepoint<'_>,
        fileid: i64,
        filehash: Vec<u8>,
    ) -> Result<(i64, Vec<u8>)> {
        let existing: Option<i64> = self
            .writer
            .query_row(
                "SELECT id FROM file WHERE hash = ?1 AND rehydrate = ?2",
                params![filehash, self.rehydrate],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existingid) = existing {
            debug!("duplicate file hash, reusing id {existingid}");
            savepoint.rollback()?;
            return Ok((existingid, filehash));
        }
        self.writer.execute(
            "UPDATE file SET hash = ?1 WHERE id = ?2",
            params![filehash, fileid],
        )?;
        savepoint.release()?;
        Ok((fileid, filehash))
    }

    fn savepoint(&self, path: &Path) -> Result<Savepoint<'_>> {
        let pathdigest = self.algorithm.digest(path.as_os_str().as_bytes());
        Savepoint::open(
            &self.writer,
            format!("savepoint_{}", hex::encode(pathdigest)),
        )
    }

    /// Allocate a preliminary file row under a fake path-derived hash.
    fn tmpid(&self, path: &Path) -> Result<i64> {
        let pathdigest = self.algorithm.digest(path.as_os_str().as_bytes());
        let fakehash = self.algorithm.tag_preliminary(&pathdigest);
        self.writer
            .query_row(
                "INSERT OR IGNORE INTO file (hash, rehydrate) VALUES (?1, ?2) RETURNING id",
                params![fakehash, self.rehydrate],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                SprayDryError::Integrity(format!(
                    "could not insert preliminary file id for {}",
                    path.display()
                ))
            })
    }

    fn store_chunk(&self, chunk: &[u8]) -> Result<i64> {
        let chunkhash = self.algorithm.tag(&self.algorithm.digest(chunk));
        let inserted: Option<i64> = self
            .writer
            .query_row(
                "INSERT OR IGNORE INTO chunkhash (rehydrate, size, data) VALUES (?1,?2,?3) RETURNING id",
                params![self.rehydrate, chunk.len() as i64, chunkhash],
                |row| row.get(0),
            )
            .optional()?;
        match inserted {
            Some(chunkid) => {
                // Fresh logical chunk: write the encoded body exactly once.
                let dried = self.dryer.dry(chunk)?;
                self.writer.execute(
                    "INSERT INTO chunk (id, data) VALUES (?1, ?2)",
                    params![chunkid, dried],
                )?;
                Ok(chunkid)
            }
            None => self
                .writer
                .query_row(
                    "SELECT id FROM chunkhash WHERE rehydrate = ?1 AND data = ?2",
                    params![self.rehydrate, chunkhash],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| {
                    SprayDryError::Integrity(
                        "could neither insert chunk nor retrieve existing".into(),
                    )
                }),
        }
    }

    fn store_content(&self, fileid: i64, offset: u64, chunkid: i64) -> Result<()> {
        self.writer.execute(
            "INSERT OR IGNORE INTO content (file, rehydrate, offset, size, chunk)
             SELECT ?1, rehydrate, ?2, size, id FROM chunkhash WHERE id = ?3",
            params![fileid, offset as i64, chunkid],
        )?;
        Ok(())
    }
}
