//! Requests sent to and responses received from the replica's public
//! endpoints.
mod blob;
mod http;
mod request;
mod request_id;

pub use blob::Blob;
pub use http::{
    QueryReply, QueryResponse, ReadStateResponse, RejectCode, ReplicaHealthStatus, RequestStatus,
    StatusResponse, UnknownRequestStatus,
};
pub use request::{Envelope, Path, Request, RequestType};
pub use request_id::{
    hash_of_map, RawHttpRequestVal, RequestId, RequestIdError, EXPECTED_REQUEST_ID_LENGTH,
    IC_REQUEST_DOMAIN_SEPARATOR,
};
