//! ledgerlink-core: shared types, limit policy, wire format, and identity
//! primitives. All other ledgerlink crates depend on this one.

pub mod ca;
pub mod config;
pub mod crypto;
pub mod frame;
pub mod identity;
pub mod limits;
pub mod wire;

pub use frame::{TransportError, TransportErrorKind};
pub use identity::{Identity, Role, TransactionId};
pub use limits::{LimitSettings, ResolvedLimits, SizeLimit};
