#![deny(clippy::unwrap_used)]

//! A client to interface with canisters via the public HTTP endpoints.
//!
//! The [`Agent`] submits calls, queries and state reads on behalf of an
//! [`Identity`], verifies the certificates it gets back, and drives the
//! polling for the outcome of update calls with a [`PollStrategy`].
mod agent;
mod config;
mod error;
mod http_client;
pub mod polling;
mod sender;

pub use agent::{
    query_path, read_state_path, sign_request, update_path, Agent, RequestStatusResponse,
};
pub use config::{AgentConfig, PollingConfig, DEFAULT_QUERY_TIMEOUT, DEFAULT_URL, IC_ROOT_PUBLIC_KEY_HEX};
pub use error::{AgentError, AgentResult};
pub use http::StatusCode as HttpStatusCode;
pub use http_client::{
    Credentials, HttpRequest, HttpResponse, MockTransport, ReqwestTransport, Transport,
};
pub use polling::{poll_for_response, PollStrategy};
pub use sender::{ed25519_public_key_to_der, AnonymousIdentity, BasicIdentity, Identity};
