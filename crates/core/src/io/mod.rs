//! Filesystem I/O primitives: atomic writes, append-only logs, named locks,
//! and index shard-key derivation.

pub mod atomic;
pub mod index;
pub mod lock;
pub mod shard;

pub use atomic::{
    append_jsonl, read_json_optional, read_jsonl_at_offset, read_jsonl_forward,
    write_json_atomic, AppendedAt, MalformedCount, ReverseJsonlReader,
};
pub use lock::{acquire as acquire_lock, LockName, TeamLock};
pub use shard::shard_key;
