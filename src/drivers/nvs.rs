// WheelSense — NVS backend for the counter store

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use crate::config::NVS_NAMESPACE;
use crate::store::KvBackend;

pub struct NvsBackend {
    nvs: EspNvs<NvsDefault>,
}

impl NvsBackend {
    pub fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl KvBackend for NvsBackend {
    fn get_u64(&mut self, key: &str) -> anyhow::Result<Option<u64>> {
        Ok(self.nvs.get_u64(key)?)
    }

    fn set_u64(&mut self, key: &str, value: u64) -> anyhow::Result<()> {
        self.nvs.set_u64(key, value)?;
        Ok(())
    }

    fn get_u32(&mut self, key: &str) -> anyhow::Result<Option<u32>> {
        Ok(self.nvs.get_u32(key)?)
    }

    fn set_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.nvs.set_u32(key, value)?;
        Ok(())
    }

    // EspNvs commits inside every set.
    fn commit(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
