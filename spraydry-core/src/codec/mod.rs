use crate::conf::AlgoConf;
use crate::error::{Result, SprayDryError};

pub mod nocompress;
pub mod zstdc;

/// Chunk encoder, built from an `algorithm` spec string and the config's
/// dictionary blob.
pub enum Dryer {
    NoCompress,
    Zstd(zstdc::ZstdDryer),
}

impl Dryer {
    pub fn from_conf(conf: &AlgoConf, dict: &[u8]) -> Result<Self> {
        match conf.name.as_str() {
            "nocompress" => Ok(Self::NoCompress),
            "zstd" => Ok(Self::Zstd(zstdc::ZstdDryer::new(zstdc::level(conf), dict))),
            other => Err(SprayDryError::Config(format!(
                "unsupported algorithm for drying: '{other}'"
            ))),
        }
    }

    pub fn dry(&self, chunk: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::NoCompress => Ok(chunk.to_vec()),
            Self::Zstd(dryer) => dryer.dry(chunk),
        }
    }
}

/// Chunk decoder. Every decode takes the recorded uncompressed size and
/// fails on any mismatch.
pub enum Decoder {
    NoCompress,
    Zstd(zstdc::ZstdDecoder),
}

impl Decoder {
    pub fn from_conf(conf: &AlgoConf, dict: &[u8]) -> Result<Self> {
        match conf.name.as_str() {
            "nocompress" => Ok(Self::NoCompress),
            "zstd" => Ok(Self::Zstd(zstdc::ZstdDecoder::new(dict))),
            other => Err(SprayDryError::Config(format!(
                "unsupported algorithm for rehydration: '{other}'"
            ))),
        }
    }

    pub fn rehydrate(&self, size: usize, data: &[u8]) -> Result<Vec<u8>> {
        let chunk = match self {
            Self::NoCompress => nocompress::rehydrate(data),
            Self::Zstd(decoder) => decoder.rehydrate(size, data)?,
        };
        if chunk.len() != size {
            return Err(SprayDryError::Integrity(format!(
                "bad chunk size: expected {size}, decoded {}",
                chunk.len()
            )));
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::algosplit;

    #[test]
    fn nocompress_is_identity() {
        let dryer = Dryer::from_conf(&algosplit("nocompress").unwrap(), b"").unwrap();
        let decoder = Decoder::from_conf(&algosplit("nocompress").unwrap(), b"").unwrap();
        let dried = dryer.dry(b"payload").unwrap();
        assert_eq!(dried, b"payload");
        assert_eq!(decoder.rehydrate(7, &dried).unwrap(), b"payload");
    }

    #[test]
    fn nocompress_rejects_size_mismatch() {
        let decoder = Decoder::from_conf(&algosplit("nocompress").unwrap(), b"").unwrap();
        assert!(decoder.rehydrate(3, b"toolong").is_err());
    }

    #[test]
    fn zstd_round_trip() {
        let data = vec![42u8; 9000];
        let dryer = Dryer::from_conf(&algosplit("zstd level:0x03").unwrap(), b"").unwrap();
        let decoder = Decoder::from_conf(&algosplit("zstd").unwrap(), b"").unwrap();
        let dried = dryer.dry(&data).unwrap();
        assert!(dried.len() < data.len());
        assert_eq!(decoder.rehydrate(data.len(), &dried).unwrap(), data);
    }

    #[test]
    fn zstd_round_trip_with_dictionary() {
        let dict = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let data = b"the quick brown fox jumps over the lazy dog, again".to_vec();
        let dryer = Dryer::from_conf(&algosplit("zstd").unwrap(), &dict).unwrap();
        let decoder = Decoder::from_conf(&algosplit("zstd").unwrap(), &dict).unwrap();
        let dried = dryer.dry(&data).unwrap();
        assert_eq!(decoder.rehydrate(data.len(), &dried).unwrap(), data);
    }

    #[test]
    fn zstd_rejects_size_mismatch() {
        let dryer = Dryer::from_conf(&algosplit("zstd").unwrap(), b"").unwrap();
        let decoder = Decoder::from_conf(&algosplit("zstd").unwrap(), b"").unwrap();
        let dried = dryer.dry(b"some chunk bytes").unwrap();
        assert!(decoder.rehydrate(4, &dried).is_err());
    }

    #[test]
    fn unknown_algorithms_are_rejected() {
        assert!(Dryer::from_conf(&algosplit("lz4").unwrap(), b"").is_err());
        assert!(Decoder::from_conf(&algosplit("lz4").unwrap(), b"").is_err());
    }
}
