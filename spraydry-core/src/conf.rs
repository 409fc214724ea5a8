use std::collections::BTreeMap;

use crate::error::{Result, SprayDryError};

/// A parsed algorithm specification of the form `name key:value ...`.
///
/// Values prefixed with `0x` are hex integers, everything else is kept
/// as literal text. Stored in the rehydrate table as plain strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlgoConf {
    pub name: String,
    pub params: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(u64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

impl AlgoConf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn int(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_int)
    }

    pub fn int_or(&self, key: &str, default: u64) -> u64 {
        self.int(key).unwrap_or(default)
    }
}

pub fn algosplit(instr: &str) -> Result<AlgoConf> {
    let mut parts = instr.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| SprayDryError::Config(format!("empty algorithm spec: '{instr}'")))?;
    let mut params = BTreeMap::new();
    for part in parts {
        let (key, val) = part
            .split_once(':')
            .ok_or_else(|| SprayDryError::Config(format!("malformed parameter: '{part}'")))?;
        let val = if let Some(hexval) = val.strip_prefix("0x") {
            let parsed = u64::from_str_radix(hexval, 16)
                .map_err(|e| SprayDryError::Config(format!("bad hex value '{val}': {e}")))?;
            Value::Int(parsed)
        } else {
            Value::Text(val.to_string())
        };
        params.insert(key.to_string(), val);
    }
    Ok(AlgoConf {
        name: name.to_string(),
        params,
    })
}

pub fn algojoin(conf: &AlgoConf) -> String {
    let mut out = conf.name.clone();
    for (key, val) in &conf.params {
        out.push(' ');
        out.push_str(key);
        out.push(':');
        out.push_str(&mkhex(val));
    }
    out
}

/// Canonical emit form: lowercase hex with an even digit count.
pub fn mkhex(val: &Value) -> String {
    match val {
        Value::Text(s) => s.clone(),
        Value::Int(v) => {
            let digits = format!("{v:x}");
            if digits.len() % 2 == 1 {
                format!("0x0{digits}")
            } else {
                format!("0x{digits}")
            }
        }
    }
}
