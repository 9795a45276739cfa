//! Bodies of the replica's HTTP responses.
use super::Blob;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, str::FromStr};

/// Response body of `POST /api/v2/canister/{id}/read_state`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReadStateResponse {
    /// CBOR-encoded certificate.
    pub certificate: Blob,
}

/// Response body of `POST /api/v2/canister/{id}/query`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResponse {
    Replied {
        reply: QueryReply,
    },
    Rejected {
        reject_code: u64,
        reject_message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryReply {
    pub arg: Blob,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaHealthStatus {
    Starting,
    WaitingForCertifiedState,
    WaitingForRootDelegation,
    CertifiedStateBehind,
    Healthy,
}

/// Response body of `GET /api/v2/status`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusResponse {
    pub ic_api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_version: Option<String>,
    /// DER-encoded root public key, only reported by test networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_key: Option<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_health_status: Option<ReplicaHealthStatus>,
}

/// The status of a call as recorded under
/// `/request_status/<request_id>/status` in the state tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Received,
    Processing,
    Replied,
    Rejected,
    /// The call finished and its reply or reject has since been pruned.
    Done,
    /// The state tree holds no status for the request (yet).
    Unknown,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Received => "received",
            RequestStatus::Processing => "processing",
            RequestStatus::Replied => "replied",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Done => "done",
            RequestStatus::Unknown => "unknown",
        }
    }

    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Replied | RequestStatus::Rejected | RequestStatus::Done
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownRequestStatus(pub String);

impl fmt::Display for UnknownRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown request status {:?}", self.0)
    }
}

impl std::error::Error for UnknownRequestStatus {}

impl FromStr for RequestStatus {
    type Err = UnknownRequestStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(RequestStatus::Received),
            "processing" => Ok(RequestStatus::Processing),
            "replied" => Ok(RequestStatus::Replied),
            "rejected" => Ok(RequestStatus::Rejected),
            "done" => Ok(RequestStatus::Done),
            "unknown" => Ok(RequestStatus::Unknown),
            other => Err(UnknownRequestStatus(other.to_string())),
        }
    }
}

/// Reject codes of the public interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectCode {
    SysFatal = 1,
    SysTransient = 2,
    DestinationInvalid = 3,
    CanisterReject = 4,
    CanisterError = 5,
}

impl TryFrom<u64> for RejectCode {
    type Error = u64;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(RejectCode::SysFatal),
            2 => Ok(RejectCode::SysTransient),
            3 => Ok(RejectCode::DestinationInvalid),
            4 => Ok(RejectCode::CanisterReject),
            5 => Ok(RejectCode::CanisterError),
            other => Err(other),
        }
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectCode::SysFatal => "SysFatal",
            RejectCode::SysTransient => "SysTransient",
            RejectCode::DestinationInvalid => "DestinationInvalid",
            RejectCode::CanisterReject => "CanisterReject",
            RejectCode::CanisterError => "CanisterError",
        };
        write!(f, "{} ({})", name, *self as u64)
    }
}
