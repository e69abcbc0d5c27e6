//! Configuration section definitions.
//!
//! Each module corresponds to a section in `medialink.toml`:
//!
//! | Module    | TOML Section | Purpose                                  |
//! |-----------|--------------|------------------------------------------|
//! | `gateway` | `[gateway]`  | Listening address, library roots, proxy  |
//! | `sync`    | `[sync]`     | Link synchronization behavior            |

mod gateway;
mod sync;

pub use gateway::GatewayConfig;
pub use sync::SyncConfig;
