//! Tunables for the random-access layer.

use std::env;
use std::str::FromStr;

pub const DEFAULT_MAX_OPEN_HANDLES: usize = 100;
pub const DEFAULT_MAX_OVERHEAD: u64 = 1024 * 1024;
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_SEARCH: u64 = 512 * 1024 * 1024;
pub const DEFAULT_MEMORY_CAPACITY: usize = 1_000_000;
pub const DEFAULT_FILE_BUFFER: usize = 1024 * 1024;

/// A `major.minor` runtime version, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| format!("bad version: {s}"))?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| format!("bad version: {s}"))?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

/// Settings shared by every store, reader and the handle cache.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Soft ceiling on simultaneously open named handles.
    pub max_open_handles: usize,
    /// Size of the decoded prefix kept for compressed stores.
    pub max_overhead: u64,
    /// How far the sequential decoder can be rewound without a restart.
    pub mark_limit: u64,
    /// Block size for terminator scans.
    pub block_size: usize,
    /// Hard limit for terminator scans.
    pub max_search: u64,
    /// Default capacity of a fresh in-memory store.
    pub memory_capacity: usize,
    /// Window size materialized by native file stores.
    pub file_buffer_size: usize,
    /// Narrow platforms map files only when the runtime is at least this.
    pub mmap_min_version: Version,
    pub runtime_version: Option<Version>,
    /// Whether names ending in .zip/.gz/.bz2 open compressed stores.
    pub allow_archives: bool,
    /// Open bzip2 and zip names as lazily seeking [`CompressedHandle`]s.
    ///
    /// [`CompressedHandle`]: crate::io::CompressedHandle
    pub lazy_seek: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            max_overhead: DEFAULT_MAX_OVERHEAD,
            mark_limit: DEFAULT_MAX_OVERHEAD,
            block_size: DEFAULT_BLOCK_SIZE,
            max_search: DEFAULT_MAX_SEARCH,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            file_buffer_size: DEFAULT_FILE_BUFFER,
            mmap_min_version: Version::new(1, 7),
            runtime_version: None,
            allow_archives: true,
            lazy_seek: false,
        }
    }
}

impl IoConfig {
    /// Defaults overridden by `SEEKIO_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("SEEKIO_MAX_OPEN_HANDLES", &mut config.max_open_handles);
        override_from_env("SEEKIO_MAX_OVERHEAD", &mut config.max_overhead);
        override_from_env("SEEKIO_MARK_LIMIT", &mut config.mark_limit);
        override_from_env("SEEKIO_BLOCK_SIZE", &mut config.block_size);
        override_from_env("SEEKIO_MAX_SEARCH", &mut config.max_search);
        override_from_env("SEEKIO_MEMORY_CAPACITY", &mut config.memory_capacity);
        override_from_env("SEEKIO_FILE_BUFFER", &mut config.file_buffer_size);
        let mut runtime = None;
        override_from_env("SEEKIO_RUNTIME_VERSION", &mut runtime);
        if runtime.is_some() {
            config.runtime_version = runtime;
        }
        config
    }

    pub fn with_max_open_handles(mut self, max: usize) -> Self {
        self.max_open_handles = max;
        self
    }

    pub fn with_max_overhead(mut self, bytes: u64) -> Self {
        self.max_overhead = bytes;
        self
    }

    pub fn with_mark_limit(mut self, bytes: u64) -> Self {
        self.mark_limit = bytes;
        self
    }

    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    pub fn with_max_search(mut self, bytes: u64) -> Self {
        self.max_search = bytes;
        self
    }

    pub fn with_memory_capacity(mut self, bytes: usize) -> Self {
        self.memory_capacity = bytes;
        self
    }

    pub fn with_file_buffer_size(mut self, bytes: usize) -> Self {
        self.file_buffer_size = bytes;
        self
    }

    pub fn with_lazy_seek(mut self, lazy: bool) -> Self {
        self.lazy_seek = lazy;
        self
    }

    pub fn with_allow_archives(mut self, allow: bool) -> Self {
        self.allow_archives = allow;
        self
    }
}

trait EnvValue: Sized {
    fn parse_env(raw: &str) -> Option<Self>;
}

macro_rules! env_value {
    ($($ty:ty),*) => {
        $(impl EnvValue for $ty {
            fn parse_env(raw: &str) -> Option<Self> {
                raw.trim().parse().ok()
            }
        })*
    };
}

env_value!(usize, u64);

impl EnvValue for Option<Version> {
    fn parse_env(raw: &str) -> Option<Self> {
        raw.parse().ok().map(Some)
    }
}

fn override_from_env<T: EnvValue>(key: &str, slot: &mut T) {
    if let Ok(raw) = env::var(key) {
        match T::parse_env(&raw) {
            Some(v) => *slot = v,
            None => log::warn!("ignoring unparseable {key}={raw}"),
        }
    }
}
