//! Signature-gated configuration persistence.
//!
//! The store is a dumb blob device; the gate lives here. A persisted record
//! is `CONFIG_SIGNATURE` (little-endian u32) followed by the postcard
//! encoding of `BalanceConfig`. Any mismatch or decode failure falls back to
//! compiled-in defaults, never partially-applied data.

use keel_config::{BalanceConfig, CONFIG_SIGNATURE};

use crate::error::{ConfigError, KeelResult, StoreError};

/// Upper bound on the persisted record, header included.
pub const CONFIG_BLOB_MAX: usize = 512;

const SIGNATURE_LEN: usize = 4;

/// Non-volatile blob store boundary. `read` returns the number of bytes of
/// the last written record; both calls are bounded-time.
pub trait ConfigStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;
    fn write(&mut self, data: &[u8]) -> Result<(), StoreError>;
}

/// Load the tunables, falling back to defaults on any store or decode
/// problem. The fallback itself is silent; a version mismatch logs.
pub fn load_config<S: ConfigStore>(store: &mut S) -> BalanceConfig {
    match try_load(store) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed, using defaults: {}", e);
            BalanceConfig::default()
        }
    }
}

fn try_load<S: ConfigStore>(store: &mut S) -> KeelResult<BalanceConfig> {
    let mut buf = [0u8; CONFIG_BLOB_MAX];
    let len = store.read(&mut buf)?;
    if len < SIGNATURE_LEN {
        return Err(ConfigError::Corrupt.into());
    }

    let mut sig_bytes = [0u8; SIGNATURE_LEN];
    sig_bytes.copy_from_slice(&buf[..SIGNATURE_LEN]);
    let found = u32::from_le_bytes(sig_bytes);
    if found != CONFIG_SIGNATURE {
        return Err(ConfigError::SignatureMismatch { found }.into());
    }

    let mut cfg: BalanceConfig = postcard::from_bytes(&buf[SIGNATURE_LEN..len])
        .map_err(|_| ConfigError::Corrupt)?;
    cfg.validate();
    Ok(cfg)
}

pub fn save_config<S: ConfigStore>(store: &mut S, cfg: &BalanceConfig) -> KeelResult<()> {
    let mut buf = [0u8; CONFIG_BLOB_MAX];
    buf[..SIGNATURE_LEN].copy_from_slice(&CONFIG_SIGNATURE.to_le_bytes());
    let body = postcard::to_slice(cfg, &mut buf[SIGNATURE_LEN..])
        .map_err(|_| ConfigError::Serialization)?;
    let total = SIGNATURE_LEN + body.len();
    store.write(&buf[..total])?;
    debug!("config saved, {} bytes", total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemStore {
        data: [u8; CONFIG_BLOB_MAX],
        len: usize,
        fail_reads: bool,
    }

    impl MemStore {
        fn empty() -> Self {
            Self {
                data: [0; CONFIG_BLOB_MAX],
                len: 0,
                fail_reads: false,
            }
        }
    }

    impl ConfigStore for MemStore {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
            if self.fail_reads {
                return Err(StoreError::ReadFailed);
            }
            buf[..self.len].copy_from_slice(&self.data[..self.len]);
            Ok(self.len)
        }

        fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
            if data.len() > self.data.len() {
                return Err(StoreError::Capacity);
            }
            self.data[..data.len()].copy_from_slice(data);
            self.len = data.len();
            Ok(())
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = MemStore::empty();
        let mut cfg = BalanceConfig::default();
        cfg.pid.kp = 42.0;
        cfg.faults.pitch = 12.5;
        save_config(&mut store, &cfg).unwrap();
        assert_eq!(load_config(&mut store), cfg);
    }

    #[test]
    fn empty_store_yields_defaults() {
        let mut store = MemStore::empty();
        assert_eq!(load_config(&mut store), BalanceConfig::default());
    }

    #[test]
    fn wrong_signature_yields_defaults() {
        let mut store = MemStore::empty();
        let mut cfg = BalanceConfig::default();
        cfg.pid.kp = 55.0;
        save_config(&mut store, &cfg).unwrap();

        // corrupt the version half of the signature
        store.data[0] ^= 0xff;
        assert_eq!(load_config(&mut store), BalanceConfig::default());
    }

    #[test]
    fn truncated_blob_yields_defaults() {
        let mut store = MemStore::empty();
        let cfg = BalanceConfig::default();
        save_config(&mut store, &cfg).unwrap();
        store.len = 10;
        assert_eq!(load_config(&mut store), BalanceConfig::default());
    }

    #[test]
    fn read_failure_yields_defaults() {
        let mut store = MemStore::empty();
        store.fail_reads = true;
        assert_eq!(load_config(&mut store), BalanceConfig::default());
    }

    #[test]
    fn loaded_blob_is_validated() {
        let mut store = MemStore::empty();
        let mut cfg = BalanceConfig::default();
        cfg.loop_rate.frequency_hz = 5; // below the supported floor
        save_config(&mut store, &cfg).unwrap();
        assert_eq!(
            load_config(&mut store).loop_rate.frequency_hz,
            keel_config::LOOP_HZ_MIN
        );
    }
}
