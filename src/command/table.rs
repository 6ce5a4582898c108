//! Static command table: read/write mode and key layout per command id.

use super::{CommandMode, KeySpec};

/// Mode and key layout of a known command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub mode: CommandMode,
    pub keys: KeySpec,
}

const fn read(keys: KeySpec) -> CommandSpec {
    CommandSpec {
        mode: CommandMode::Read,
        keys,
    }
}

const fn write(keys: KeySpec) -> CommandSpec {
    CommandSpec {
        mode: CommandMode::Write,
        keys,
    }
}

const UNKNOWN: CommandSpec = write(KeySpec::None);

static COMMANDS: &[(&str, CommandSpec)] = &[
    // Strings
    ("GET", read(KeySpec::First)),
    ("MGET", read(KeySpec::All)),
    ("STRLEN", read(KeySpec::First)),
    ("GETRANGE", read(KeySpec::First)),
    ("SUBSTR", read(KeySpec::First)),
    ("GETBIT", read(KeySpec::First)),
    ("BITCOUNT", read(KeySpec::First)),
    ("BITPOS", read(KeySpec::First)),
    ("SET", write(KeySpec::First)),
    ("SETNX", write(KeySpec::First)),
    ("SETEX", write(KeySpec::First)),
    ("PSETEX", write(KeySpec::First)),
    ("GETSET", write(KeySpec::First)),
    ("GETDEL", write(KeySpec::First)),
    ("GETEX", write(KeySpec::First)),
    ("APPEND", write(KeySpec::First)),
    ("SETRANGE", write(KeySpec::First)),
    ("SETBIT", write(KeySpec::First)),
    ("INCR", write(KeySpec::First)),
    ("INCRBY", write(KeySpec::First)),
    ("INCRBYFLOAT", write(KeySpec::First)),
    ("DECR", write(KeySpec::First)),
    ("DECRBY", write(KeySpec::First)),
    ("MSET", write(KeySpec::Interleaved)),
    ("MSETNX", write(KeySpec::Interleaved)),
    // Keyspace
    ("EXISTS", read(KeySpec::All)),
    ("TOUCH", read(KeySpec::All)),
    ("TYPE", read(KeySpec::First)),
    ("TTL", read(KeySpec::First)),
    ("PTTL", read(KeySpec::First)),
    ("EXPIRETIME", read(KeySpec::First)),
    ("PEXPIRETIME", read(KeySpec::First)),
    ("DUMP", read(KeySpec::First)),
    ("OBJECT", read(KeySpec::Subcommand { offset: 1 })),
    ("KEYS", read(KeySpec::Pattern)),
    ("SCAN", read(KeySpec::None)),
    ("RANDOMKEY", read(KeySpec::None)),
    ("DBSIZE", read(KeySpec::None)),
    ("DEL", write(KeySpec::All)),
    ("UNLINK", write(KeySpec::All)),
    ("EXPIRE", write(KeySpec::First)),
    ("PEXPIRE", write(KeySpec::First)),
    ("EXPIREAT", write(KeySpec::First)),
    ("PEXPIREAT", write(KeySpec::First)),
    ("PERSIST", write(KeySpec::First)),
    ("RENAME", write(KeySpec::All)),
    ("FLUSHDB", write(KeySpec::None)),
    ("FLUSHALL", write(KeySpec::None)),
    // Hashes
    ("HGET", read(KeySpec::First)),
    ("HMGET", read(KeySpec::First)),
    ("HGETALL", read(KeySpec::First)),
    ("HKEYS", read(KeySpec::First)),
    ("HVALS", read(KeySpec::First)),
    ("HLEN", read(KeySpec::First)),
    ("HEXISTS", read(KeySpec::First)),
    ("HSTRLEN", read(KeySpec::First)),
    ("HRANDFIELD", read(KeySpec::First)),
    ("HSCAN", read(KeySpec::First)),
    ("HSET", write(KeySpec::First)),
    ("HSETNX", write(KeySpec::First)),
    ("HMSET", write(KeySpec::First)),
    ("HDEL", write(KeySpec::First)),
    ("HINCRBY", write(KeySpec::First)),
    ("HINCRBYFLOAT", write(KeySpec::First)),
    // Lists
    ("LLEN", read(KeySpec::First)),
    ("LRANGE", read(KeySpec::First)),
    ("LINDEX", read(KeySpec::First)),
    ("LPOS", read(KeySpec::First)),
    ("LPUSH", write(KeySpec::First)),
    ("RPUSH", write(KeySpec::First)),
    ("LPOP", write(KeySpec::First)),
    ("RPOP", write(KeySpec::First)),
    ("LSET", write(KeySpec::First)),
    ("LREM", write(KeySpec::First)),
    ("LTRIM", write(KeySpec::First)),
    ("LINSERT", write(KeySpec::First)),
    ("BLPOP", write(KeySpec::AllExceptLast)),
    ("BRPOP", write(KeySpec::AllExceptLast)),
    // Sets
    ("SCARD", read(KeySpec::First)),
    ("SMEMBERS", read(KeySpec::First)),
    ("SISMEMBER", read(KeySpec::First)),
    ("SMISMEMBER", read(KeySpec::First)),
    ("SRANDMEMBER", read(KeySpec::First)),
    ("SSCAN", read(KeySpec::First)),
    ("SINTER", read(KeySpec::All)),
    ("SUNION", read(KeySpec::All)),
    ("SDIFF", read(KeySpec::All)),
    ("SADD", write(KeySpec::First)),
    ("SREM", write(KeySpec::First)),
    ("SPOP", write(KeySpec::First)),
    // Sorted sets
    ("ZCARD", read(KeySpec::First)),
    ("ZCOUNT", read(KeySpec::First)),
    ("ZLEXCOUNT", read(KeySpec::First)),
    ("ZRANGE", read(KeySpec::First)),
    ("ZRANGEBYSCORE", read(KeySpec::First)),
    ("ZREVRANGE", read(KeySpec::First)),
    ("ZRANK", read(KeySpec::First)),
    ("ZREVRANK", read(KeySpec::First)),
    ("ZSCORE", read(KeySpec::First)),
    ("ZMSCORE", read(KeySpec::First)),
    ("ZSCAN", read(KeySpec::First)),
    ("ZADD", write(KeySpec::First)),
    ("ZREM", write(KeySpec::First)),
    ("ZINCRBY", write(KeySpec::First)),
    // Streams
    ("XLEN", read(KeySpec::First)),
    ("XRANGE", read(KeySpec::First)),
    ("XREVRANGE", read(KeySpec::First)),
    ("XADD", write(KeySpec::First)),
    ("XDEL", write(KeySpec::First)),
    ("XTRIM", write(KeySpec::First)),
    ("XGROUP", write(KeySpec::Subcommand { offset: 1 })),
    // HyperLogLog and geo
    ("PFCOUNT", read(KeySpec::All)),
    ("PFADD", write(KeySpec::First)),
    ("GEOPOS", read(KeySpec::First)),
    ("GEODIST", read(KeySpec::First)),
    ("GEOHASH", read(KeySpec::First)),
    ("GEOADD", write(KeySpec::First)),
    // Scripting
    ("FCALL_RO", read(KeySpec::NumKeys { index: 1 })),
    ("EVAL_RO", read(KeySpec::NumKeys { index: 1 })),
    ("EVALSHA_RO", read(KeySpec::NumKeys { index: 1 })),
    ("FCALL", write(KeySpec::NumKeys { index: 1 })),
    ("EVAL", write(KeySpec::NumKeys { index: 1 })),
    ("EVALSHA", write(KeySpec::NumKeys { index: 1 })),
    // Module commands
    ("JSON.GET", read(KeySpec::First)),
    ("JSON.TYPE", read(KeySpec::First)),
    ("JSON.DEBUG", read(KeySpec::Subcommand { offset: 1 })),
    ("JSON.SET", write(KeySpec::First)),
    ("JSON.DEL", write(KeySpec::First)),
    ("BF.EXISTS", read(KeySpec::First)),
    ("BF.MEXISTS", read(KeySpec::First)),
    ("BF.CARD", read(KeySpec::First)),
    ("BF.INFO", read(KeySpec::First)),
    ("BF.ADD", write(KeySpec::First)),
    ("CF.EXISTS", read(KeySpec::First)),
    ("CF.COUNT", read(KeySpec::First)),
    ("CF.SCANDUMP", read(KeySpec::First)),
    ("CF.ADD", write(KeySpec::First)),
    ("CMS.QUERY", read(KeySpec::First)),
    ("TOPK.QUERY", read(KeySpec::First)),
    ("TOPK.LIST", read(KeySpec::First)),
    ("TDIGEST.MIN", read(KeySpec::First)),
    ("TDIGEST.MAX", read(KeySpec::First)),
    ("TDIGEST.QUANTILE", read(KeySpec::First)),
    ("TS.RANGE", read(KeySpec::First)),
    ("TS.REVRANGE", read(KeySpec::First)),
    ("TS.GET", read(KeySpec::First)),
    ("TS.ADD", write(KeySpec::First)),
    ("FT.SEARCH", read(KeySpec::None)),
    ("FT.AGGREGATE", read(KeySpec::None)),
    ("FT.INFO", read(KeySpec::None)),
    // Connection and server
    ("PING", read(KeySpec::None)),
    ("ECHO", read(KeySpec::None)),
    ("TIME", read(KeySpec::None)),
    ("INFO", read(KeySpec::None)),
    ("HELLO", write(KeySpec::None)),
    ("AUTH", write(KeySpec::None)),
    ("SELECT", write(KeySpec::None)),
    ("CLIENT", write(KeySpec::None)),
    ("CLUSTER", write(KeySpec::None)),
    ("PUBLISH", write(KeySpec::None)),
    ("SPUBLISH", write(KeySpec::None)),
];

/// Look up a command id (case-insensitive). Unknown ids are keyless writes.
pub fn lookup(id: &str) -> CommandSpec {
    COMMANDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(id))
        .map_or(UNKNOWN, |(_, spec)| *spec)
}
