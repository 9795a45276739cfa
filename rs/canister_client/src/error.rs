use ic_agent_certification::CertificateError;
use ic_candid_codec::CandidError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to sign the request: {0}")]
    SignatureError(String),

    /// The replica answered with a non-success HTTP status.
    #[error("the replica returned HTTP status {status}: {text}")]
    NetworkRejected { status: u16, text: String },

    /// The canister or the system rejected the call.
    #[error("the call was rejected with code {reject_code}: {reject_message}")]
    CallRejected {
        reject_code: u64,
        reject_message: String,
    },

    #[error("timed out waiting for the call to complete")]
    Timeout,

    /// The call reached its final state but its reply was already pruned
    /// from the state tree.
    #[error("the call completed but its reply is no longer available")]
    DoneWithoutReply,

    #[error("polling was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("invalid certified state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Candid(#[from] CandidError),
}

pub type AgentResult<T> = Result<T, AgentError>;
