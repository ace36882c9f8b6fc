pub use std::time::Duration as StdDuration;
pub use std::time::Instant;

pub use anyhow::{anyhow, Context};

pub type AHashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
