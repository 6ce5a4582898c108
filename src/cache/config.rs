//! Caching policy: which commands may be cached, for how long, and how many.

use crate::command::Command;
use crate::error::{Error, Result};

/// Commands whose replies must never be cached even though they only read:
/// search, probabilistic structures, sampling and time-to-live queries can
/// legitimately differ between two reads of unchanged keys.
///
/// Kept sorted so membership is a binary search.
pub static EXCLUDED_COMMANDS: &[&str] = &[
    "BF.CARD",
    "BF.DEBUG",
    "BF.EXISTS",
    "BF.INFO",
    "BF.MEXISTS",
    "BF.SCANDUMP",
    "CF.COMPACT",
    "CF.COUNT",
    "CF.DEBUG",
    "CF.EXISTS",
    "CF.INFO",
    "CF.MEXISTS",
    "CF.SCANDUMP",
    "CMS.INFO",
    "CMS.QUERY",
    "EXPIRETIME",
    "FT.AGGREGATE",
    "FT.ALIASADD",
    "FT.ALIASDEL",
    "FT.ALIASUPDATE",
    "FT.CURSOR",
    "FT.EXPLAIN",
    "FT.EXPLAINCLI",
    "FT.GET",
    "FT.INFO",
    "FT.MGET",
    "FT.PROFILE",
    "FT.SEARCH",
    "FT.SPELLCHECK",
    "FT.SUGGET",
    "FT.SUGLEN",
    "FT.SYNDUMP",
    "FT.TAGVALS",
    "FT._ALIASADDIFNX",
    "HRANDFIELD",
    "JSON.DEBUG",
    "PEXPIRETIME",
    "PFCOUNT",
    "PTTL",
    "SRANDMEMBER",
    "TDIGEST.BYRANK",
    "TDIGEST.BYREVRANK",
    "TDIGEST.CDF",
    "TDIGEST.INFO",
    "TDIGEST.MAX",
    "TDIGEST.MIN",
    "TDIGEST.QUANTILE",
    "TDIGEST.RANK",
    "TDIGEST.REVRANK",
    "TDIGEST.TRIMMED_MEAN",
    "TOPK.INFO",
    "TOPK.LIST",
    "TOPK.QUERY",
    "TTL",
];

const DEFAULT_MAX_COUNT: usize = 1000;

/// Immutable caching policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfiguration {
    max_count: usize,
    ttl: u64,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        CacheConfiguration {
            max_count: DEFAULT_MAX_COUNT,
            ttl: 0,
        }
    }
}

impl CacheConfiguration {
    /// `max_count` must be positive; `ttl` is in seconds, 0 = no expiry.
    pub fn new(max_count: usize, ttl: u64) -> Result<Self> {
        if max_count == 0 {
            return Err(Error::InvalidConfiguration(
                "Invalid cache configuration. max_count must be positive".to_string(),
            ));
        }
        Ok(CacheConfiguration { max_count, ttl })
    }

    /// Build from loose key/value options. Recognized keys are `max_count`
    /// (alias `max-count`) and `ttl` (alias `time_to_live`); anything else
    /// rejects the whole configuration.
    pub fn from_options<I, K>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        let mut max_count = DEFAULT_MAX_COUNT;
        let mut ttl = 0;
        let mut unexpected = Vec::new();

        for (key, value) in options {
            match key.as_ref() {
                "max_count" | "max-count" => max_count = value as usize,
                "ttl" | "time_to_live" => ttl = value,
                other => unexpected.push(other.to_string()),
            }
        }

        if !unexpected.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "Invalid cache configuration. Given keys are not expected: {}",
                unexpected.join(", ")
            )));
        }

        Self::new(max_count, ttl)
    }

    /// Read-mode commands outside the exclusion table may be cached.
    pub fn is_whitelisted(&self, command: &Command) -> bool {
        command.is_read() && !is_excluded(command.id())
    }

    pub fn is_exceeds_max_count(&self, count: usize) -> bool {
        count > self.max_count
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }
}

fn is_excluded(id: &str) -> bool {
    EXCLUDED_COMMANDS.binary_search(&id).is_ok()
}
