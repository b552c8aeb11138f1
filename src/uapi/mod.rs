//! Control protocol (UAPI)
//!
//! The tunnel endpoint is configured with `key=value` lines. [`write_uapi`]
//! computes the minimal directive stream between two [`DeviceConfig`]
//! snapshots; [`UapiSocket`] delivers such a stream to a running endpoint.
//!
//! [`DeviceConfig`]: crate::device::DeviceConfig

mod writer;
mod socket;

pub use writer::{to_uapi_string, write_uapi};
pub use socket::UapiSocket;
