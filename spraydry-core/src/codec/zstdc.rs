use zstd::bulk;
use zstd::dict::{DecoderDictionary, EncoderDictionary};

use crate::conf::AlgoConf;
use crate::error::{Result, SprayDryError};

pub fn level(conf: &AlgoConf) -> i32 {
    conf.int("level")
        .map(|v| v as i32)
        .unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL)
}

/// Zstd encoder. Each chunk becomes one complete frame so that chunks
/// stay independently decodable.
pub struct ZstdDryer {
    level: i32,
    cdict: Option<EncoderDictionary<'static>>,
}

impl ZstdDryer {
    pub fn new(level: i32, dict: &[u8]) -> Self {
        let cdict = if dict.is_empty() {
            None
        } else {
            Some(EncoderDictionary::copy(dict, level))
        };
        Self { level, cdict }
    }

    pub fn dry(&self, chunk: &[u8]) -> Result<Vec<u8>> {
        let mut compressor = match &self.cdict {
            Some(cdict) => bulk::Compressor::with_prepared_dictionary(cdict)?,
            None => bulk::Compressor::new(self.level)?,
        };
        Ok(compressor.compress(chunk)?)
    }
}

/// Zstd decoder bounded by the recorded chunk size.
pub struct ZstdDecoder {
    ddict: Option<DecoderDictionary<'static>>,
}

impl ZstdDecoder {
    pub fn new(dict: &[u8]) -> Self {
        let ddict = if dict.is_empty() {
            None
        } else {
            Some(DecoderDictionary::copy(dict))
        };
        Self { ddict }
    }

    pub fn rehydrate(&self, size: usize, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressor = match &self.ddict {
            Some(ddict) => bulk::Decompressor::with_prepared_dictionary(ddict)?,
            None => bulk::Decompressor::new()?,
        };
        decompressor
            .decompress(data, size)
            .map_err(|e| SprayDryError::Integrity(format!("zstd decode failed: {e}")))
    }
}
