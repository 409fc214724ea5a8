pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;

pub mod conf;
pub mod hash;

pub mod spray {
    pub mod crc32;
    pub mod fixed;
    mod sprayer;
    pub use self::sprayer::{SprayIter, Sprayer};
}

pub mod codec;

pub mod store;

pub mod ingest;
pub mod rehydrate;

pub mod list;
pub mod train;

pub mod fs;

pub use crate::error::{Result, SprayDryError};

pub use conf::AlgoConf;
pub use hash::HashAlgorithm;
pub use ingest::SprayDryStore;
pub use rehydrate::{Entry, Rehydrator};
pub use train::TrainOptions;

pub mod prelude {
    pub use crate::Result;
    pub use crate::conf::AlgoConf;
    pub use crate::fs::SprayDryFs;
    pub use crate::hash::HashAlgorithm;
    pub use crate::ingest::SprayDryStore;
    pub use crate::rehydrate::Rehydrator;
}
