use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use walkdir::WalkDir;

use crate::codec::Decoder;
use crate::conf::{AlgoConf, algojoin};
use crate::error::{Result, SprayDryError};
use crate::spray::Sprayer;
use crate::store::open_writer;

#[derive(Clone, Debug)]
pub struct TrainOptions {
    /// Upper bound for a trained dictionary, in bytes.
    pub max_dict_size: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_dict_size: 110 * 1024,
        }
    }
}

/// Dictionary data for a codec that needs no training run.
pub(crate) fn untrained_data(dryconf: &AlgoConf) -> Result<Vec<u8>> {
    match dryconf.name.as_str() {
        "nocompress" => Ok(Vec::new()),
        other => Err(SprayDryError::Config(format!(
            "cannot create rehydrate data for '{other}' without a training run"
        ))),
    }
}

pub(crate) fn insert_config(
    conn: &Connection,
    name: &str,
    version: &str,
    sprayconf: &AlgoConf,
    dryconf: &AlgoConf,
    data: &[u8],
) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO rehydrate (name, version, chunking, algorithm, data)
         VALUES (?1,?2,?3,?4,?5)
         RETURNING id",
        params![name, version, algojoin(sprayconf), algojoin(dryconf), data],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Create a new named rehydrate config. For dictionary codecs the
/// sample sources are sprayed with the config's own chunker and a
/// dictionary is trained from the resulting chunks. Existing configs
/// are never retrained.
pub fn train(
    dbpath: &Path,
    name: &str,
    version: &str,
    sprayconf: &AlgoConf,
    dryconf: &AlgoConf,
    sources: &[PathBuf],
    options: &TrainOptions,
) -> Result<i64> {
    let writer = open_writer(dbpath)?;
    let existing: Option<i64> = writer
        .query_row("SELECT id FROM rehydrate WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()?;
    if existing.is_some() {
        return Err(SprayDryError::Config(format!(
            "rehydrate config '{name}' exists, no new training run will be done"
        )));
    }
    let data = match dryconf.name.as_str() {
        "nocompress" => Vec::new(),
        "zstd" => train_dictionary(sprayconf, sources, options)?,
        other => {
            return Err(SprayDryError::Config(format!(
                "cannot create rehydrate data for '{other}'"
            )));
        }
    };
    // Reject configs the read side could not rebuild.
    Sprayer::from_conf(sprayconf)?;
    Decoder::from_conf(dryconf, &data)?;
    let id = insert_config(&writer, name, version, sprayconf, dryconf, &data)?;
    info!("created rehydrate config '{name}' version '{version}' (id {id})");
    Ok(id)
}

fn train_dictionary(
    sprayconf: &AlgoConf,
    sources: &[PathBuf],
    options: &TrainOptions,
) -> Result<Vec<u8>> {
    let sprayer = Sprayer::from_conf(sprayconf)?;
    let mut files: Vec<PathBuf> = Vec::new();
    for source in sources {
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    if files.is_empty() {
        return Err(SprayDryError::Config(
            "training needs at least one data source file".into(),
        ));
    }
    let per_file: Vec<Vec<Vec<u8>>> = files
        .par_iter()
        .map(|path| -> Result<Vec<Vec<u8>>> {
            let bytes = std::fs::read(path)?;
            Ok(sprayer
                .spray(&bytes)
                .map(|(_, chunk)| chunk.to_vec())
                .collect())
        })
        .collect::<Result<_>>()?;
    let samples: Vec<Vec<u8>> = per_file.into_iter().flatten().collect();
    zstd::dict::from_samples(&samples, options.max_dict_size)
        .map_err(|e| SprayDryError::Config(format!("dictionary training failed: {e}")))
}
