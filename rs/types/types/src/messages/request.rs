use super::{hash_of_map, Blob, RawHttpRequestVal, RequestId};
use ic_principal::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A path into the state tree, one label per level.
pub type Path = Vec<Blob>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Call,
    Query,
    ReadState,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Call => "call",
            RequestType::Query => "query",
            RequestType::ReadState => "read_state",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The content of a request: a sparse record in which only the fields
/// relevant to the request type are present.
///
/// `call` and `query` requests carry `canister_id`, `method_name` and `arg`;
/// `read_state` requests carry `paths`. A `nonce` is optional everywhere. An
/// absent field is left out of the request id and of the CBOR map alike;
/// an empty `nonce` or `paths` counts as absent.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Request {
    pub request_type: RequestType,
    pub sender: Principal,
    #[serde(default, skip_serializing_if = "is_absent_blob")]
    pub nonce: Option<Blob>,
    pub ingress_expiry: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canister_id: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Blob>,
    #[serde(default, skip_serializing_if = "is_absent_paths")]
    pub paths: Option<Vec<Path>>,
}

fn is_absent_blob(blob: &Option<Blob>) -> bool {
    blob.as_ref().map_or(true, Blob::is_empty)
}

fn is_absent_paths(paths: &Option<Vec<Path>>) -> bool {
    paths.as_ref().map_or(true, Vec::is_empty)
}

impl Request {
    /// An update call of `method_name` on `canister_id`.
    pub fn call(
        sender: Principal,
        canister_id: Principal,
        method_name: impl Into<String>,
        arg: Vec<u8>,
        ingress_expiry: u64,
    ) -> Self {
        Self {
            request_type: RequestType::Call,
            sender,
            nonce: None,
            ingress_expiry,
            canister_id: Some(canister_id),
            method_name: Some(method_name.into()),
            arg: Some(Blob(arg)),
            paths: None,
        }
    }

    /// A query of `method_name` on `canister_id`.
    pub fn query(
        sender: Principal,
        canister_id: Principal,
        method_name: impl Into<String>,
        arg: Vec<u8>,
        ingress_expiry: u64,
    ) -> Self {
        Self {
            request_type: RequestType::Query,
            ..Self::call(sender, canister_id, method_name, arg, ingress_expiry)
        }
    }

    /// A request for the certified state at `paths`.
    pub fn read_state(sender: Principal, paths: Vec<Path>, ingress_expiry: u64) -> Self {
        Self {
            request_type: RequestType::ReadState,
            sender,
            nonce: None,
            ingress_expiry,
            canister_id: None,
            method_name: None,
            arg: None,
            paths: Some(paths),
        }
    }

    pub fn with_nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = Some(Blob(nonce));
        self
    }

    /// The fields that take part in the request id, keyed by their wire
    /// names.
    pub fn hashed_fields(&self) -> BTreeMap<&'static str, RawHttpRequestVal> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "request_type",
            RawHttpRequestVal::String(self.request_type.as_str().to_string()),
        );
        fields.insert(
            "sender",
            RawHttpRequestVal::Bytes(self.sender.as_slice().to_vec()),
        );
        fields.insert(
            "ingress_expiry",
            RawHttpRequestVal::U64(self.ingress_expiry),
        );
        if let Some(nonce) = self.nonce.as_ref().filter(|nonce| !nonce.is_empty()) {
            fields.insert("nonce", RawHttpRequestVal::Bytes(nonce.0.clone()));
        }
        if let Some(canister_id) = &self.canister_id {
            fields.insert(
                "canister_id",
                RawHttpRequestVal::Bytes(canister_id.as_slice().to_vec()),
            );
        }
        if let Some(method_name) = &self.method_name {
            fields.insert("method_name", RawHttpRequestVal::String(method_name.clone()));
        }
        if let Some(arg) = &self.arg {
            fields.insert("arg", RawHttpRequestVal::Bytes(arg.0.clone()));
        }
        if let Some(paths) = self.paths.as_ref().filter(|paths| !paths.is_empty()) {
            let paths = paths
                .iter()
                .map(|path| {
                    RawHttpRequestVal::Array(
                        path.iter()
                            .map(|label| RawHttpRequestVal::Bytes(label.0.clone()))
                            .collect(),
                    )
                })
                .collect();
            fields.insert("paths", RawHttpRequestVal::Array(paths));
        }
        fields
    }

    /// Computes the request id of this request.
    pub fn id(&self) -> RequestId {
        hash_of_map(&self.hashed_fields())
    }
}

/// A request together with the sender's authentication, as sent over the
/// wire.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Envelope {
    pub content: Request,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_pubkey: Option<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_sig: Option<Blob>,
}

impl Envelope {
    /// An envelope without authentication, as sent by the anonymous
    /// principal.
    pub fn unsigned(content: Request) -> Self {
        Self {
            content,
            sender_pubkey: None,
            sender_sig: None,
        }
    }

    /// Serializes the envelope as self-describing CBOR (tag 55799).
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        let mut serializer = serde_cbor::Serializer::new(Vec::new());
        serializer.self_describe()?;
        self.serialize(&mut serializer)?;
        Ok(serializer.into_inner())
    }
}
