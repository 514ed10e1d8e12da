//! Bot API wire model and the transport port.

pub mod keyboard;
pub mod port;
pub mod types;
