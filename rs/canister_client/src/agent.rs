//! An agent to talk to the Internet Computer through the public endpoints.
use crate::{
    config::{AgentConfig, PollingConfig, DEFAULT_QUERY_TIMEOUT},
    error::{AgentError, AgentResult},
    http_client::{HttpRequest, HttpResponse, ReqwestTransport, Transport},
    polling::poll_for_response,
    sender::Identity,
};
use ic_agent_certification::{Certificate, CertificateError};
use ic_agent_types::{
    messages::{
        Blob, Envelope, Path, QueryResponse, ReadStateResponse, Request, RequestId,
        RequestStatus, StatusResponse,
    },
    time::{expiry_time_from_now, MAX_INGRESS_TTL},
    Principal,
};
use ic_candid_codec::{IDLType, IDLValue};
use parking_lot::RwLock;
use rand::Rng;
use slog::{debug, info, o, warn, Logger};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// The HTTP path for query calls on the replica.
pub fn query_path(cid: &Principal) -> String {
    format!("api/v2/canister/{}/query", cid)
}

pub fn read_state_path(cid: &Principal) -> String {
    format!("api/v2/canister/{}/read_state", cid)
}

/// The HTTP path for update calls on the replica.
pub fn update_path(cid: &Principal) -> String {
    format!("api/v2/canister/{}/call", cid)
}

const NODE_STATUS_PATH: &str = "api/v2/status";

const NONCE_SIZE: usize = 16;

/// One observation of an update call's status in the certified state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestStatusResponse {
    Unknown,
    Received,
    Processing,
    Replied(Vec<u8>),
    Rejected {
        reject_code: u64,
        reject_message: String,
    },
    Done,
}

impl RequestStatusResponse {
    pub fn status(&self) -> RequestStatus {
        match self {
            RequestStatusResponse::Unknown => RequestStatus::Unknown,
            RequestStatusResponse::Received => RequestStatus::Received,
            RequestStatusResponse::Processing => RequestStatus::Processing,
            RequestStatusResponse::Replied(_) => RequestStatus::Replied,
            RequestStatusResponse::Rejected { .. } => RequestStatus::Rejected,
            RequestStatusResponse::Done => RequestStatus::Done,
        }
    }
}

/// An agent to talk to the Internet Computer through the public endpoints.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,

    identity: Arc<dyn Identity>,

    // Shared between clones so that `fetch_root_key` on one of them is seen
    // by all.
    root_key: Arc<RwLock<Vec<u8>>>,

    // Time-to-live of requests, sent as their `ingress_expiry`. This is
    // independent from how long `update_and_wait` polls.
    ingress_expiry: Duration,

    // How long to wait for queries.
    query_timeout: Duration,

    polling: PollingConfig,

    log: Logger,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("sender", &self.identity.sender().to_text())
            .field("ingress_expiry", &self.ingress_expiry)
            .field("query_timeout", &self.query_timeout)
            .field("polling", &self.polling)
            .finish()
    }
}

impl Agent {
    /// Creates an agent talking HTTP to the replica named in `config`.
    ///
    /// The `identity` identifies the sender on whose behalf the requests are
    /// sent. If it holds a key, the corresponding `sender_pubkey` and
    /// `sender_sig` fields are set in the request envelopes.
    pub fn from_config(config: &AgentConfig, identity: Arc<dyn Identity>) -> AgentResult<Self> {
        config.polling.validate()?;
        let mut transport = ReqwestTransport::new(config.url()?)?.with_timeout(config.query_timeout);
        if let Some(credentials) = &config.credentials {
            transport = transport.with_credentials(credentials.clone());
        }
        Ok(Self::new_with_transport(Arc::new(transport), identity, config.root_key_der()?)
            .with_ingress_expiry(config.ingress_expiry)
            .with_query_timeout(config.query_timeout)
            .with_polling_config(config.polling.clone()))
    }

    /// Same as above except that it gives the caller the option to provide
    /// any transport, e.g. a mock.
    pub fn new_with_transport(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn Identity>,
        root_key: Vec<u8>,
    ) -> Self {
        Self {
            transport,
            identity,
            root_key: Arc::new(RwLock::new(root_key)),
            ingress_expiry: MAX_INGRESS_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            polling: PollingConfig::default(),
            log: Logger::root(slog::Discard, o!()),
        }
    }

    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    /// Sets the DER-encoded root key that certificates are verified against.
    pub fn with_root_key(self, root_key: Vec<u8>) -> Self {
        *self.root_key.write() = root_key;
        self
    }

    pub fn with_ingress_expiry(mut self, ingress_expiry: Duration) -> Self {
        self.ingress_expiry = ingress_expiry;
        self
    }

    /// Sets the timeout for queries.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_polling_config(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.log
    }

    pub fn sender(&self) -> Principal {
        self.identity.sender()
    }

    pub fn root_key(&self) -> Vec<u8> {
        self.root_key.read().clone()
    }

    /// Submits an update call of `method` on `canister_id` and returns the id
    /// under which its outcome can be polled.
    pub async fn call(
        &self,
        canister_id: &Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> AgentResult<RequestId> {
        let nonce: [u8; NONCE_SIZE] = rand::thread_rng().gen();
        let content = Request::call(
            self.sender(),
            *canister_id,
            method,
            arg,
            expiry_time_from_now(self.ingress_expiry),
        )
        .with_nonce(nonce.to_vec());
        let (envelope, request_id) = sign_request(content, self.identity.as_ref())?;
        debug!(self.log, "submitting update call";
            "canister_id" => %canister_id,
            "method" => method,
            "request_id" => %request_id);

        self.post(update_path(canister_id), envelope.to_cbor()?).await?;
        Ok(request_id)
    }

    /// Calls the query method `method` on `canister_id` and returns the
    /// reply's argument bytes.
    pub async fn query(
        &self,
        canister_id: &Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> AgentResult<Vec<u8>> {
        let content = Request::query(
            self.sender(),
            *canister_id,
            method,
            arg,
            expiry_time_from_now(self.ingress_expiry),
        );
        let (envelope, request_id) = sign_request(content, self.identity.as_ref())?;
        debug!(self.log, "sending query";
            "canister_id" => %canister_id,
            "method" => method,
            "request_id" => %request_id);

        let bytes = tokio::time::timeout(
            self.query_timeout,
            self.post(query_path(canister_id), envelope.to_cbor()?),
        )
        .await
        .map_err(|_| AgentError::Timeout)??;
        match serde_cbor::from_slice::<QueryResponse>(&bytes)? {
            QueryResponse::Replied { reply } => Ok(reply.arg.into_vec()),
            QueryResponse::Rejected {
                reject_code,
                reject_message,
                ..
            } => {
                warn!(self.log, "query was rejected";
                    "canister_id" => %canister_id,
                    "method" => method,
                    "reject_code" => reject_code,
                    "reject_message" => &reject_message);
                Err(AgentError::CallRejected {
                    reject_code,
                    reject_message,
                })
            }
        }
    }

    /// Reads the state tree at `paths`. The returned certificate has not been
    /// verified.
    pub async fn read_state(
        &self,
        effective_canister_id: &Principal,
        paths: Vec<Path>,
    ) -> AgentResult<Certificate> {
        let content = Request::read_state(
            self.sender(),
            paths,
            expiry_time_from_now(self.ingress_expiry),
        );
        let (envelope, request_id) = sign_request(content, self.identity.as_ref())?;
        debug!(self.log, "reading state";
            "canister_id" => %effective_canister_id,
            "request_id" => %request_id);

        let bytes = self
            .post(read_state_path(effective_canister_id), envelope.to_cbor()?)
            .await?;
        let response: ReadStateResponse = serde_cbor::from_slice(&bytes)?;
        Ok(Certificate::from_cbor(response.certificate.as_slice())?)
    }

    /// Like [`Agent::read_state`], and verifies the certificate against the
    /// agent's root key.
    pub async fn read_state_verified(
        &self,
        effective_canister_id: &Principal,
        paths: Vec<Path>,
    ) -> AgentResult<Certificate> {
        let mut certificate = self.read_state(effective_canister_id, paths).await?;
        let root_key = self.root_key();
        certificate.verify(&root_key, effective_canister_id)?;
        Ok(certificate)
    }

    /// Requests the status of a pending update call exactly once.
    ///
    /// This is intended to be used in a loop until a final state is reached.
    pub async fn request_status(
        &self,
        canister_id: &Principal,
        request_id: &RequestId,
    ) -> AgentResult<RequestStatusResponse> {
        let prefix: Path = vec![
            Blob(b"request_status".to_vec()),
            Blob(request_id.as_bytes().to_vec()),
        ];
        let certificate = self
            .read_state_verified(canister_id, vec![prefix.clone()])
            .await?;
        lookup_request_status(&certificate, &prefix)
    }

    /// Fetches the replica's status from `/api/v2/status`.
    pub async fn status(&self) -> AgentResult<StatusResponse> {
        let response = self.fetch(HttpRequest::get(NODE_STATUS_PATH)).await?;
        Ok(serde_cbor::from_slice(&response)?)
    }

    /// Replaces the root key with the one reported by the replica.
    ///
    /// The reported key is not authenticated. Only use this against test
    /// networks, never against mainnet.
    pub async fn fetch_root_key(&self) -> AgentResult<()> {
        let root_key = self
            .status()
            .await?
            .root_key
            .ok_or_else(|| AgentError::InvalidState("the replica reported no root key".to_string()))?;
        info!(self.log, "using the root key reported by the replica";
            "root_key" => hex::encode(root_key.as_slice()));
        *self.root_key.write() = root_key.into_vec();
        Ok(())
    }

    /// Submits an update call and polls for its outcome with the configured
    /// strategy.
    pub async fn update_and_wait(
        &self,
        canister_id: &Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> AgentResult<Vec<u8>> {
        self.update_and_wait_with_cancellation(canister_id, method, arg, &CancellationToken::new())
            .await
    }

    /// Like [`Agent::update_and_wait`]; cancelling `cancel` stops polling
    /// with [`AgentError::Cancelled`].
    pub async fn update_and_wait_with_cancellation(
        &self,
        canister_id: &Principal,
        method: &str,
        arg: Vec<u8>,
        cancel: &CancellationToken,
    ) -> AgentResult<Vec<u8>> {
        let request_id = self.call(canister_id, method, arg).await?;
        let mut strategy = self.polling.strategy();
        poll_for_response(self, canister_id, &request_id, &mut strategy, cancel).await
    }

    /// Calls a query method with Candid-encoded arguments and decodes its
    /// reply.
    pub async fn query_candid(
        &self,
        canister_id: &Principal,
        method: &str,
        types: &[IDLType],
        args: &[IDLValue],
    ) -> AgentResult<Vec<IDLValue>> {
        let arg = ic_candid_codec::encode(types, args)?;
        let reply = self.query(canister_id, method, arg).await?;
        let (_, values) = ic_candid_codec::decode(&reply)?;
        Ok(values)
    }

    /// Calls an update method with Candid-encoded arguments and decodes its
    /// reply once it is available.
    pub async fn update_candid(
        &self,
        canister_id: &Principal,
        method: &str,
        types: &[IDLType],
        args: &[IDLValue],
    ) -> AgentResult<Vec<IDLValue>> {
        let arg = ic_candid_codec::encode(types, args)?;
        let reply = self.update_and_wait(canister_id, method, arg).await?;
        let (_, values) = ic_candid_codec::decode(&reply)?;
        Ok(values)
    }

    async fn post(&self, path: String, body: Vec<u8>) -> AgentResult<Vec<u8>> {
        self.fetch(HttpRequest::post_cbor(path, body)).await
    }

    /// Performs the round-trip and turns any non-success status into
    /// [`AgentError::NetworkRejected`].
    async fn fetch(&self, request: HttpRequest) -> AgentResult<Vec<u8>> {
        let HttpResponse { status, body } = self.transport.fetch(request).await?;
        if !status.is_success() {
            return Err(AgentError::NetworkRejected {
                status: status.as_u16(),
                text: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

/// Wraps the content into an envelope that contains the request signature.
///
/// Prerequisite: the `sender` of `content` is the principal of `identity`.
/// Senders without a key get an envelope without signature.
pub fn sign_request(
    content: Request,
    identity: &dyn Identity,
) -> AgentResult<(Envelope, RequestId)> {
    let request_id = content.id();
    let (sender_pubkey, sender_sig) = match identity.public_key() {
        None => (None, None),
        Some(public_key) => {
            let signature = identity
                .sign(&request_id.signable())
                .map_err(AgentError::SignatureError)?;
            (Some(Blob(public_key)), Some(Blob(signature)))
        }
    };
    let envelope = Envelope {
        content,
        sender_pubkey,
        sender_sig,
    };
    Ok((envelope, request_id))
}

fn lookup_request_status(
    certificate: &Certificate,
    prefix: &Path,
) -> AgentResult<RequestStatusResponse> {
    let lookup = |label: &str| {
        let mut path: Vec<&[u8]> = prefix.iter().map(Blob::as_slice).collect();
        path.push(label.as_bytes());
        certificate.lookup(&path)
    };

    let status = match lookup("status") {
        Ok(status) => status,
        Err(CertificateError::PathNotFound(_)) => return Ok(RequestStatusResponse::Unknown),
        Err(err) => return Err(err.into()),
    };
    let status = std::str::from_utf8(status)
        .ok()
        .and_then(|status| RequestStatus::from_str(status).ok())
        .ok_or_else(|| {
            AgentError::InvalidState(format!(
                "unexpected request status {:?}",
                String::from_utf8_lossy(status)
            ))
        })?;

    Ok(match status {
        RequestStatus::Unknown => RequestStatusResponse::Unknown,
        RequestStatus::Received => RequestStatusResponse::Received,
        RequestStatus::Processing => RequestStatusResponse::Processing,
        RequestStatus::Done => RequestStatusResponse::Done,
        RequestStatus::Replied => RequestStatusResponse::Replied(lookup("reply")?.to_vec()),
        RequestStatus::Rejected => {
            let mut code = lookup("reject_code")?;
            let reject_code = leb128::read::unsigned(&mut code).map_err(|e| {
                AgentError::InvalidState(format!("malformed reject code: {}", e))
            })?;
            let reject_message = String::from_utf8(lookup("reject_message")?.to_vec())
                .map_err(|e| AgentError::InvalidState(format!("malformed reject message: {}", e)))?;
            RequestStatusResponse::Rejected {
                reject_code,
                reject_message,
            }
        }
    })
}
