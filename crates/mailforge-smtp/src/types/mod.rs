//! Core SMTP types.

mod address;
mod dsn;
mod extension;
mod reply;

pub use address::Address;
pub use dsn::DsnNotify;
pub use extension::{AuthMechanism, Extension, ServerInfo};
pub use reply::{Reply, ReplyCode};
