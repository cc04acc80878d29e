use serde::{Deserialize, Serialize};

use crate::error::{Result, StructuralError};

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argon2Profile {
    /// 2 GiB, 4 lanes, 1 pass
    Standard,
    /// 64 MiB, 4 lanes, 3 passes
    LessMemory,
    /// Reduced cost for automated tests, never for real credentials.
    Test,
}

impl Argon2Profile {
    /// Memory in KiB.
    pub fn memory_cost(self) -> u32 {
        match self {
            Argon2Profile::Standard => 1 << 21,
            Argon2Profile::LessMemory => 1 << 16,
            Argon2Profile::Test => 1 << 14,
        }
    }

    pub fn parallelism(self) -> u32 {
        match self {
            Argon2Profile::Standard | Argon2Profile::LessMemory => 4,
            Argon2Profile::Test => 1,
        }
    }

    pub fn iterations(self) -> u32 {
        match self {
            Argon2Profile::Standard | Argon2Profile::Test => 1,
            Argon2Profile::LessMemory => 3,
        }
    }
}

impl Default for Argon2Profile {
    fn default() -> Self {
        Argon2Profile::Standard
    }
}

fn default_group_bit_length() -> usize {
    3072
}

fn default_persistence_batch_size() -> usize {
    1000
}

/// Engine configuration. Every field has a default, so `{}` is a valid document.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default)]
    pub argon2_profile: Argon2Profile,

    /// Bit length of the modulus `p` derived from the election seed.
    #[serde(default = "default_group_bit_length")]
    pub group_bit_length: usize,

    /// Size of the worker pool, 0 lets rayon decide.
    #[serde(default)]
    pub worker_threads: usize,

    #[serde(default = "default_persistence_batch_size")]
    pub persistence_batch_size: usize,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            argon2_profile: Argon2Profile::default(),
            group_bit_length: default_group_bit_length(),
            worker_threads: 0,
            persistence_batch_size: default_persistence_batch_size(),
        }
    }
}

impl SetupConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SetupConfig = serde_json::from_str(json)
            .map_err(|e| StructuralError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_bit_length < 16 {
            return Err(StructuralError::Configuration(format!(
                "group_bit_length must be at least 16, found {}",
                self.group_bit_length
            ))
            .into());
        }
        if self.persistence_batch_size == 0 {
            return Err(StructuralError::Configuration(
                "persistence_batch_size must be positive".to_owned(),
            )
            .into());
        }
        Ok(())
    }

    /// A bounded worker pool for the per-voter stages.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|i| format!("return-codes-{}", i))
            .build()
            .map_err(|e| StructuralError::Configuration(e.to_string()).into())
    }
}
