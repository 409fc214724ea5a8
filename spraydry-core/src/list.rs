use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, SprayDryError};
use crate::hash::HashAlgorithm;
use crate::rehydrate::Rehydrator;

/// Display form of one root, keyed by name then version.
#[derive(Clone, Debug, Serialize)]
pub struct RootInfo {
    pub hash: String,
    pub rehydrate_name: String,
    pub rehydrate_version: String,
}

/// Display form of one rehydrate config. The dictionary blob is
/// summarised by its blake2b hash rather than dumped.
#[derive(Clone, Debug, Serialize)]
pub struct RehydrateInfo {
    pub sprayer: String,
    pub dryer: String,
    pub data: String,
}

pub type RootListing = BTreeMap<String, BTreeMap<String, RootInfo>>;
pub type RehydrateListing = BTreeMap<String, BTreeMap<String, RehydrateInfo>>;

pub fn roots(rehydrator: &Rehydrator) -> Result<RootListing> {
    let conn = rehydrator.connection();
    let mut stmt = conn.prepare(
        "SELECT r.name, r.version, f.hash, h.name, h.version
         FROM root AS r
           INNER JOIN file AS f
             ON r.file = f.id
           INNER JOIN rehydrate AS h
             ON f.rehydrate = h.id",
    )?;
    let mut rows = stmt.query([])?;
    let mut out = RootListing::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let version: String = row.get(1)?;
        let hash: Vec<u8> = row.get(2)?;
        let info = RootInfo {
            hash: render_hash(&hash)
                .ok_or_else(|| SprayDryError::Integrity(format!("malformed root hash for '{name}'")))?,
            rehydrate_name: row.get(3)?,
            rehydrate_version: row.get(4)?,
        };
        out.entry(name).or_default().insert(version, info);
    }
    Ok(out)
}

pub fn rehydrators(rehydrator: &Rehydrator) -> Result<RehydrateListing> {
    let conn = rehydrator.connection();
    let mut stmt =
        conn.prepare("SELECT name, version, chunking, algorithm, data FROM rehydrate")?;
    let mut rows = stmt.query([])?;
    let mut out = RehydrateListing::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let version: String = row.get(1)?;
        let data: Vec<u8> = row.get(4)?;
        let info = RehydrateInfo {
            sprayer: row.get(2)?,
            dryer: row.get(3)?,
            data: if data.is_empty() {
                String::new()
            } else {
                format!("blake2b-{}", hex::encode(HashAlgorithm::Blake2b.digest(&data)))
            },
        };
        out.entry(name).or_default().insert(version, info);
    }
    Ok(out)
}

/// `algo-digest` bytes rendered as `algo-hex`.
fn render_hash(hash: &[u8]) -> Option<String> {
    let sep = hash.iter().position(|&b| b == b'-')?;
    let algo = std::str::from_utf8(&hash[..sep]).ok()?;
    Some(format!("{algo}-{}", hex::encode(&hash[sep + 1..])))
}
