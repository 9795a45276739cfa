//! Types shared by the crates that talk to the Internet Computer's public
//! HTTP interface: request contents and their canonical ids, envelopes, and
//! the bodies of the replica's responses.
pub mod messages;
pub mod time;

pub use ic_principal::Principal;
pub use messages::{Blob, RequestId};
