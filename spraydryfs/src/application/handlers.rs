use std::path::PathBuf;

use spraydry_core::conf::algosplit;
use spraydry_core::fs::SprayDryFs;
use spraydry_core::hash::HashAlgorithm;
use spraydry_core::ingest::SprayDryStore;
use spraydry_core::list;
use spraydry_core::rehydrate::Rehydrator;
use spraydry_core::train::{self, TrainOptions};

pub fn handle_mount(
    dbfile: PathBuf,
    root_name: String,
    root_version: String,
    mountpoint: PathBuf,
    mmap: Option<u64>,
) -> anyhow::Result<()> {
    let fs = SprayDryFs::open(&dbfile, &root_name, &root_version, mmap)?;
    fs.run(&mountpoint)?;
    Ok(())
}

pub fn handle_ingest(
    dbfile: PathBuf,
    root_name: String,
    root_version: String,
    source: PathBuf,
    hash: String,
    rehydrate: String,
    chunking: Option<String>,
    codec: Option<String>,
) -> anyhow::Result<()> {
    let algorithm = HashAlgorithm::from_name(&hash)?;
    let sprayconf = chunking.as_deref().map(algosplit).transpose()?;
    let dryconf = codec.as_deref().map(algosplit).transpose()?;
    let store = SprayDryStore::open(
        &dbfile,
        algorithm,
        &rehydrate,
        sprayconf.as_ref(),
        dryconf.as_ref(),
    )?;
    store.root(&root_name, &root_version, &source)?;
    Ok(())
}

pub fn handle_train(
    dbfile: PathBuf,
    name: String,
    version: String,
    chunking: String,
    codec: String,
    sources: Vec<PathBuf>,
    max_dict_size: Option<usize>,
) -> anyhow::Result<()> {
    let sprayconf = algosplit(&chunking)?;
    let dryconf = algosplit(&codec)?;
    let mut options = TrainOptions::default();
    if let Some(size) = max_dict_size {
        options.max_dict_size = size;
    }
    train::train(&dbfile, &name, &version, &sprayconf, &dryconf, &sources, &options)?;
    Ok(())
}

pub fn handle_list(dbfile: PathBuf) -> anyhow::Result<()> {
    let rehydrator = Rehydrator::open(&dbfile, Some(0))?;
    let listing = serde_json::json!({
        "root": list::roots(&rehydrator)?,
        "rehydrate": list::rehydrators(&rehydrator)?,
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
