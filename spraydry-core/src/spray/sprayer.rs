use crate::conf::AlgoConf;
use crate::error::{Result, SprayDryError};
use crate::spray::crc32::Crc32Chunks;
use crate::spray::fixed::FixedChunks;

// Defaults tied to the seeded rehydrate rows in store::SETUP_REHYDRATE.
const FIXED_SIZE_DEFAULT: u64 = 0x2000;
const CRC32_INITIALIZER_DEFAULT: u64 = 0xfaca_de00;
const CRC32_CUTOFF_DEFAULT: u64 = 0x000a_0000;
const CRC32_MIN_DEFAULT: u64 = 0x0800;
const CRC32_MAX_DEFAULT: u64 = 0x4000;

/// A configured chunking algorithm, built from a `chunking` spec string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sprayer {
    Fixed {
        size: usize,
    },
    Crc32 {
        initializer: u32,
        cutoff: u32,
        min: usize,
        max: usize,
    },
}

impl Sprayer {
    pub fn from_conf(conf: &AlgoConf) -> Result<Self> {
        match conf.name.as_str() {
            "fixed" => {
                let size = conf.int_or("size", FIXED_SIZE_DEFAULT);
                if size == 0 {
                    return Err(SprayDryError::Config("fixed size must be nonzero".into()));
                }
                Ok(Self::Fixed { size: size as usize })
            }
            "crc32" => {
                let initializer = as_u32(conf, "initializer", CRC32_INITIALIZER_DEFAULT)?;
                let cutoff = as_u32(conf, "cutoff", CRC32_CUTOFF_DEFAULT)?;
                let min = conf.int_or("min", CRC32_MIN_DEFAULT) as usize;
                let max = conf.int_or("max", CRC32_MAX_DEFAULT) as usize;
                if max == 0 {
                    return Err(SprayDryError::Config("crc32 max must be nonzero".into()));
                }
                Ok(Self::Crc32 {
                    initializer,
                    cutoff,
                    min,
                    max,
                })
            }
            other => Err(SprayDryError::Config(format!(
                "unsupported spraying algorithm: '{other}'"
            ))),
        }
    }

    /// Lazily split `data` into `(offset, chunk)` pairs.
    pub fn spray<'a>(&self, data: &'a [u8]) -> SprayIter<'a> {
        match *self {
            Self::Fixed { size } => SprayIter::Fixed(FixedChunks::new(data, size)),
            Self::Crc32 {
                initializer,
                cutoff,
                min,
                max,
            } => SprayIter::Crc32(Crc32Chunks::new(data, initializer, cutoff, min, max)),
        }
    }
}

pub enum SprayIter<'a> {
    Fixed(FixedChunks<'a>),
    Crc32(Crc32Chunks<'a>),
}

impl<'a> Iterator for SprayIter<'a> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Fixed(it) => it.next(),
            Self::Crc32(it) => it.next(),
        }
    }
}

fn as_u32(conf: &AlgoConf, key: &str, default: u64) -> Result<u32> {
    let val = conf.int_or(key, default);
    u32::try_from(val)
        .map_err(|_| SprayDryError::Config(format!("{} '{key}' out of u32 range", conf.name)))
}
