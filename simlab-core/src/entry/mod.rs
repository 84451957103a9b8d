//! Entry policy: find the first candle and price at which a strategy enters.

pub mod config;
pub mod policy;

pub use config::{CompiledEntry, EntryConfig, InitialEntry, MaxWait, TrailingEntry};
pub use policy::{find_entry, EntryFill, EntryScanner, EntryState, EntryTrigger, ExpiryReason};
