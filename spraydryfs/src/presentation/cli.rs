use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "The Instant File System: Spray, dry, rehydrate!", long_about = None)]
pub struct Cli {
    /// SQLite database file backing the file system
    pub dbfile: PathBuf,

    /// Logging level, defaults to INFO
    #[arg(short = 'L', long = "log-level", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mount a root read-only through FUSE
    Mount {
        /// Root name
        root_name: String,
        /// Root version
        root_version: String,
        /// Mount point
        mountpoint: PathBuf,
        /// Reader memory-map size in bytes
        #[arg(long)]
        mmap: Option<u64>,
    },

    /// Ingest a source tree as a new root
    Ingest {
        /// Root name
        root_name: String,
        /// Root version
        root_version: String,
        /// Source file or directory to ingest
        source: PathBuf,
        /// Hash algorithm for file and chunk identity
        #[arg(long, default_value = "blake2b")]
        hash: String,
        /// Rehydrate configuration name to ingest under
        #[arg(long, default_value = "nocompress-crc32")]
        rehydrate: String,
        /// Chunking spec, e.g. "crc32 min:0x0800 max:0x4000"; only
        /// needed when the named configuration does not exist yet
        #[arg(long)]
        chunking: Option<String>,
        /// Codec spec, e.g. "nocompress"; only needed when the named
        /// configuration does not exist yet
        #[arg(long)]
        codec: Option<String>,
    },

    /// Create a rehydrate configuration, training a dictionary if the
    /// codec needs one
    Train {
        /// Configuration name
        name: String,
        /// Configuration version
        version: String,
        /// Chunking spec, e.g. "fixed size:0x2000"
        chunking: String,
        /// Codec spec, e.g. "zstd level:0x03"
        codec: String,
        /// Sample sources for dictionary training
        sources: Vec<PathBuf>,
        /// Upper bound for the trained dictionary in bytes
        #[arg(long)]
        max_dict_size: Option<usize>,
    },

    /// Print roots and rehydrate configurations as JSON
    List,
}
