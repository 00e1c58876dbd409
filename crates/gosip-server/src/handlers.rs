//! Method-specific request handlers, per spec.md §4.12's dispatch table.
//!
//! Each handler takes an already-parsed [`Request`] — the transport
//! library owns wire parsing and transaction bookkeeping (spec.md §1
//! Non-goals) — and returns the [`Response`](s) the shell hands back to
//! it. This module is pure request/response logic; background task
//! scheduling and lifecycle live in [`crate::shell`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gosip_auth::{AuthError, DigestAuthenticator, REALM};
use gosip_moh::MohEngine;
use gosip_mwi::MwiManager;
use gosip_security::srtp::SrtpContextStore;
use gosip_security::zrtp::ZrtpManager;
use gosip_session::{CallDirection, CallState, HoldManager, HoldOutcome, ReferOutcome, SessionError, SessionStore};
use gosip_session::types::CallSession;
use gosip_sip::message::{Request, Response};
use tracing::warn;

use crate::ports::PstnProvider;

const DEFAULT_REGISTER_EXPIRES: i64 = 3600;
const DEFAULT_SUBSCRIBE_EXPIRES: i64 = 3600;
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of processing an INVITE: the provisional `100 Trying` the
/// transport is expected to send immediately, plus the final response
/// once the handler has finished (spec.md §4.12: "reply 100 Trying
/// immediately").
#[derive(Debug, Clone)]
pub struct InviteOutcome {
    pub provisional: Option<Response>,
    pub final_response: Response,
}

/// Wires every manager the dispatch table in spec.md §4.12 needs behind
/// one handle. Constructed once by the composition root (the `gosip`
/// binary) and shared (via `Arc`) with the background cleanup tasks in
/// [`crate::shell::ServerShell`].
pub struct Handlers {
    authenticator: Arc<DigestAuthenticator>,
    registrar: Arc<gosip_registrar::Registrar>,
    sessions: Arc<SessionStore>,
    hold: Arc<HoldManager>,
    transfer: Arc<gosip_session::TransferManager>,
    mwi: Arc<MwiManager>,
    moh: Arc<MohEngine>,
    srtp: Arc<SrtpContextStore>,
    zrtp: Arc<ZrtpManager>,
    pstn: Option<Arc<dyn PstnProvider>>,
    active_calls: AtomicI64,
}

impl Handlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authenticator: Arc<DigestAuthenticator>,
        registrar: Arc<gosip_registrar::Registrar>,
        sessions: Arc<SessionStore>,
        hold: Arc<HoldManager>,
        transfer: Arc<gosip_session::TransferManager>,
        mwi: Arc<MwiManager>,
        moh: Arc<MohEngine>,
        srtp: Arc<SrtpContextStore>,
        zrtp: Arc<ZrtpManager>,
        pstn: Option<Arc<dyn PstnProvider>>,
    ) -> Self {
        Self {
            authenticator,
            registrar,
            sessions,
            hold,
            transfer,
            mwi,
            moh,
            srtp,
            zrtp,
            pstn,
            active_calls: AtomicI64::new(0),
        }
    }

    pub fn active_calls(&self) -> i64 {
        self.active_calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn registrar(&self) -> &gosip_registrar::Registrar {
        &self.registrar
    }

    pub fn mwi(&self) -> &MwiManager {
        &self.mwi
    }

    pub fn authenticator(&self) -> &DigestAuthenticator {
        &self.authenticator
    }

    /// REGISTER: challenges requests with no `Authorization`, otherwise
    /// authenticates and writes through the registrar, per spec.md
    /// §4.12. The 5-second request budget is the transport's
    /// responsibility to enforce around this call.
    pub async fn handle_register(&self, request: &Request, remote_addr: &str, transport: &str) -> Response {
        if request.headers.header("authorization").is_none() {
            let nonce = self.authenticator.generate_nonce();
            return Response::new(401, "Unauthorized").with_header(
                "WWW-Authenticate",
                format!(r#"Digest realm="{REALM}", nonce="{}", algorithm=MD5"#, nonce.token),
            );
        }

        let device = match self.authenticator.authenticate(request).await {
            Ok(device) => device,
            Err(err) => return auth_error_response(err),
        };

        let contact = request.headers.header("contact").unwrap_or("").to_string();
        let expires = request
            .headers
            .header("expires")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_REGISTER_EXPIRES);
        let user_agent = request.headers.header("user-agent").unwrap_or("").to_string();

        match self
            .registrar
            .register(device.id, contact.clone(), expires, user_agent, remote_addr.to_string(), transport.to_string())
            .await
        {
            Ok(_) => Response::new(200, "OK")
                .with_header("Contact", contact)
                .with_header("Expires", expires.to_string()),
            Err(err) => {
                warn!(error = %err, "registrar store error");
                Response::new(500, "Server Internal Error")
            }
        }
    }

    /// INVITE: dispatches in-dialog re-INVITEs to the hold manager;
    /// otherwise creates a new session. Outbound routing (Authorization
    /// present and valid) has no provider wired by default, per spec.md
    /// §4.12's "respond 501 until that collaborator exists".
    pub async fn handle_invite(&self, request: &Request) -> InviteOutcome {
        if self.sessions.get(&request.call_id).is_some() {
            let final_response = match self.hold.handle_reinvite(&self.sessions, &request.call_id, request.body.as_deref()) {
                Ok(HoldOutcome::Held { answer_sdp })
                | Ok(HoldOutcome::Resumed { answer_sdp })
                | Ok(HoldOutcome::MediaUpdate { answer_sdp }) => Response::new(200, "OK").with_body(answer_sdp),
                Err(SessionError::CallNotFound(_)) => Response::new(481, "Call/Transaction Does Not Exist"),
                Err(SessionError::MissingSdp) => Response::new(400, "Bad Request"),
                Err(err) => {
                    warn!(error = %err, "re-INVITE rejected");
                    Response::new(500, "Server Internal Error")
                }
            };
            return InviteOutcome { provisional: Some(trying()), final_response };
        }

        if request.headers.header("authorization").is_none() {
            let from_uri = extract_uri(request.headers.header("from").unwrap_or(""));
            let from_tag = extract_tag(request.headers.header("from").unwrap_or(""));
            let mut session = CallSession::new(
                request.call_id.clone(),
                request.request_uri.clone(),
                from_uri,
                from_tag,
                CallDirection::Inbound,
                None,
            );
            session.remote_sdp = request.body.clone();
            self.sessions.insert(session);
            self.active_calls.fetch_add(1, Ordering::SeqCst);
            return InviteOutcome { provisional: Some(trying()), final_response: Response::new(180, "Ringing") };
        }

        let device = match self.authenticator.authenticate(request).await {
            Ok(device) => device,
            Err(err) => return InviteOutcome { provisional: None, final_response: auth_error_response(err) },
        };

        let Some(pstn) = &self.pstn else {
            return InviteOutcome { provisional: Some(trying()), final_response: Response::new(501, "Not Implemented") };
        };

        let from_uri = extract_uri(request.headers.header("from").unwrap_or(""));
        let from_tag = extract_tag(request.headers.header("from").unwrap_or(""));
        let offer = request.body.clone().unwrap_or_default();
        let mut session = CallSession::new(
            request.call_id.clone(),
            request.request_uri.clone(),
            from_uri,
            from_tag,
            CallDirection::Outbound,
            Some(device.id),
        );
        session.local_sdp = Some(offer.clone());
        let shared = self.sessions.insert(session);
        self.active_calls.fetch_add(1, Ordering::SeqCst);

        let final_response = match pstn.route_outbound(&request.request_uri, &offer).await {
            Ok(answer_sdp) => {
                let _ = shared.lock().set_state(CallState::Active);
                Response::new(200, "OK").with_body(answer_sdp)
            }
            Err(reason) => {
                warn!(reason, "outbound routing failed");
                let _ = shared.lock().set_state(CallState::Terminated);
                self.active_calls.fetch_sub(1, Ordering::SeqCst);
                Response::new(502, "Bad Gateway")
            }
        };
        InviteOutcome { provisional: Some(trying()), final_response }
    }

    /// ACK carries no response, per spec.md §4.12.
    pub fn handle_ack(&self, _request: &Request) {}

    /// BYE: stops MOH, tears down SRTP/ZRTP contexts, terminates the
    /// session, and decrements the active-call counter.
    pub fn handle_bye(&self, request: &Request) -> Response {
        let call_id = &request.call_id;
        self.moh.stop(call_id);
        self.srtp.remove(call_id);
        self.zrtp.end_session(call_id);
        if let Some(session) = self.sessions.get(call_id) {
            if session.lock().set_state(CallState::Terminated).is_ok() {
                self.active_calls.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Response::new(200, "OK")
    }

    /// CANCEL: terminates the session only if it is still `ringing`.
    pub fn handle_cancel(&self, request: &Request) -> Response {
        if let Some(session) = self.sessions.get(&request.call_id) {
            let mut guard = session.lock();
            if guard.state == CallState::Ringing {
                let _ = guard.set_state(CallState::Terminated);
            }
        }
        Response::new(200, "OK")
    }

    pub fn handle_options(&self) -> Response {
        Response::new(200, "OK")
            .with_header("Allow", "INVITE, ACK, CANCEL, OPTIONS, BYE, REGISTER, REFER, NOTIFY")
            .with_header("Accept", "application/sdp")
            .with_header("Supported", "replaces, timer")
    }

    /// REFER: replies `202 Accepted` synchronously, then runs the
    /// bridging in a detached background task with its own 30s budget
    /// (spec.md §5).
    pub async fn handle_refer(&self, request: &Request) -> Response {
        let refer_to = request.headers.header("refer-to");
        match self.transfer.handle_refer(&self.sessions, &request.call_id, refer_to) {
            Ok(outcome) => {
                let sessions = self.sessions.clone();
                let transfer = self.transfer.clone();
                let call_id = request.call_id.clone();
                tokio::spawn(async move {
                    let run = async {
                        match outcome {
                            ReferOutcome::Blind { .. } => transfer.run_blind_transfer(&sessions, &call_id).await,
                            ReferOutcome::Attended { .. } => transfer.run_attended_transfer(&sessions, &call_id).await,
                        }
                    };
                    if tokio::time::timeout(TRANSFER_TIMEOUT, run).await.is_err() {
                        warn!(call_id, "transfer execution timed out");
                    }
                });
                Response::new(202, "Accepted")
            }
            Err(SessionError::CallNotFound(_)) => Response::new(481, "Call/Transaction Does Not Exist"),
            Err(SessionError::MissingReferTo) => Response::new(400, "Bad Request"),
            Err(SessionError::ConsultSessionNotFound) => Response::new(481, "Call/Transaction Does Not Exist"),
            Err(err) => {
                warn!(error = %err, "REFER rejected");
                Response::new(500, "Server Internal Error")
            }
        }
    }

    /// SUBSCRIBE: rejects unknown `Event` values with 489; routes
    /// `message-summary` to the MWI manager.
    pub fn handle_subscribe(&self, request: &Request) -> Response {
        let event = request.headers.header("event").unwrap_or("");
        if event != "message-summary" {
            return Response::new(489, "Bad Event");
        }

        let from_tag = extract_tag(request.headers.header("from").unwrap_or(""));
        let expires = request
            .headers
            .header("expires")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SUBSCRIBE_EXPIRES);

        if expires == 0 {
            let id = format!("{}-{}", request.call_id, from_tag);
            let _ = self.mwi.unsubscribe(&id);
            return Response::new(200, "OK");
        }

        let aor = extract_uri(request.headers.header("to").unwrap_or(""));
        let contact = request.headers.header("contact").unwrap_or("");
        let (_id, to_tag) = self.mwi.subscribe(&request.call_id, &from_tag, &aor, contact, expires);

        Response::new(200, "OK")
            .with_header("To", format!("{};tag={to_tag}", request.headers.header("to").unwrap_or("")))
            .with_header("Expires", expires.to_string())
    }
}

fn trying() -> Response {
    Response::new(100, "Trying")
}

fn auth_error_response(err: AuthError) -> Response {
    match err {
        AuthError::NoCredentials => Response::new(401, "Unauthorized"),
        AuthError::InvalidCredentials | AuthError::InvalidNonce | AuthError::DeviceNotFound(_) => {
            Response::new(403, "Forbidden")
        }
        AuthError::BadRequest(reason) => Response::new(400, "Bad Request").with_body(reason),
    }
}

/// Extracts the bare URI from a `From`/`To`-shaped header value such as
/// `"Alice" <sip:alice@example.com>;tag=abc`, stripping display name,
/// angle brackets, and trailing parameters.
fn extract_uri(header: &str) -> String {
    let without_params = header.split(';').next().unwrap_or(header).trim();
    match (without_params.find('<'), without_params.find('>')) {
        (Some(start), Some(end)) if end > start => without_params[start + 1..end].to_string(),
        _ => without_params.to_string(),
    }
}

/// Extracts the `tag=` parameter from a `From`/`To`-shaped header value.
fn extract_tag(header: &str) -> String {
    header
        .split(';')
        .find_map(|part| part.trim().strip_prefix("tag="))
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gosip_auth::{Device, DeviceStore};
    use gosip_session::{BridgeExecutor, TransferManager, TransferNotifier};
    use gosip_sip::message::{Headers, Method};
    use std::collections::HashMap;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeDeviceStore(HashMap<String, Device>);
    #[async_trait]
    impl DeviceStore for FakeDeviceStore {
        async fn find_by_username(&self, username: &str) -> gosip_auth::Result<Option<Device>> {
            Ok(self.0.get(username).cloned())
        }
    }

    struct AlwaysFailBridge;
    #[async_trait]
    impl BridgeExecutor for AlwaysFailBridge {
        async fn bridge(&self, _remote: &str, _target: &str) -> Result<(), String> {
            Err("no bridge".into())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(AsyncMutex<Vec<String>>);
    #[async_trait]
    impl TransferNotifier for RecordingNotifier {
        async fn notify_sipfrag(&self, _call_id: &str, body: &str) {
            self.0.lock().await.push(body.to_string());
        }
    }

    fn make_handlers() -> Handlers {
        let devices: HashMap<String, Device> = HashMap::new();
        let authenticator = Arc::new(DigestAuthenticator::new(Arc::new(FakeDeviceStore(devices))));
        let store: Arc<dyn gosip_registrar::RegistrationStore> = Arc::new(NullRegistrationStore);
        let registrar = Arc::new(gosip_registrar::Registrar::new(store));
        let sessions = Arc::new(SessionStore::new());
        let moh = Arc::new(MohEngine::new());
        let hold = Arc::new(HoldManager::new(moh.clone(), None));
        let transfer = Arc::new(TransferManager::new(Arc::new(AlwaysFailBridge), Arc::new(RecordingNotifier::default())));
        let mwi = Arc::new(MwiManager::new());
        let srtp = Arc::new(SrtpContextStore::new());
        let zrtp = Arc::new(ZrtpManager::new(None, None, Arc::new(|_| true)));
        Handlers::new(authenticator, registrar, sessions, hold, transfer, mwi, moh, srtp, zrtp, None)
    }

    struct NullRegistrationStore;
    #[async_trait]
    impl gosip_registrar::RegistrationStore for NullRegistrationStore {
        async fn upsert(&self, _r: &gosip_registrar::Registration) -> gosip_registrar::Result<()> {
            Ok(())
        }
        async fn delete(&self, _device_id: i64) -> gosip_registrar::Result<()> {
            Ok(())
        }
        async fn find(&self, _device_id: i64) -> gosip_registrar::Result<Option<gosip_registrar::Registration>> {
            Ok(None)
        }
    }

    fn request(method: Method, call_id: &str, headers: Headers, body: Option<String>) -> Request {
        Request {
            method,
            request_uri: "sip:gosip".to_string(),
            call_id: call_id.to_string(),
            from_tag: None,
            to_tag: None,
            cseq: 1,
            headers,
            body,
        }
    }

    #[tokio::test]
    async fn register_without_authorization_is_challenged() {
        let handlers = make_handlers();
        let response = handlers.handle_register(&request(Method::Register, "c1", Headers::new(), None), "1.2.3.4", "UDP").await;
        assert_eq!(response.status, 401);
        assert!(response.headers.header("www-authenticate").unwrap().contains("realm=\"gosip\""));
    }

    #[tokio::test]
    async fn options_lists_supported_methods() {
        let handlers = make_handlers();
        let response = handlers.handle_options();
        assert_eq!(response.status, 200);
        assert!(response.headers.header("allow").unwrap().contains("INVITE"));
    }

    #[tokio::test]
    async fn invite_without_authorization_creates_inbound_ringing_session() {
        let handlers = make_handlers();
        let mut headers = Headers::new();
        headers.insert("From", "<sip:bob@example.com>;tag=abc");
        let outcome = handlers.handle_invite(&request(Method::Invite, "c1", headers, Some("v=0\r\n".into()))).await;
        assert_eq!(outcome.final_response.status, 180);
        assert_eq!(handlers.active_calls(), 1);
        assert_eq!(handlers.sessions().get("c1").unwrap().lock().state, CallState::Ringing);
    }

    #[tokio::test]
    async fn bye_on_unknown_call_id_still_replies_ok() {
        let handlers = make_handlers();
        let response = handlers.handle_bye(&request(Method::Bye, "ghost", Headers::new(), None));
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn subscribe_rejects_unknown_event() {
        let handlers = make_handlers();
        let mut headers = Headers::new();
        headers.insert("Event", "dialog");
        let response = handlers.handle_subscribe(&request(Method::Subscribe, "c1", headers, None));
        assert_eq!(response.status, 489);
    }

    #[tokio::test]
    async fn subscribe_message_summary_creates_subscription() {
        let handlers = make_handlers();
        let mut headers = Headers::new();
        headers.insert("Event", "message-summary");
        headers.insert("From", "<sip:alice@example.com>;tag=f");
        headers.insert("To", "<sip:user@example.com>");
        headers.insert("Contact", "<sip:alice@1.2.3.4>");
        headers.insert("Expires", "3600");
        let response = handlers.handle_subscribe(&request(Method::Subscribe, "abc", headers, None));
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.header("expires"), Some("3600"));
    }

    #[test]
    fn extracts_uri_and_tag_from_header() {
        assert_eq!(extract_uri("\"Alice\" <sip:alice@example.com>;tag=abc"), "sip:alice@example.com");
        assert_eq!(extract_tag("\"Alice\" <sip:alice@example.com>;tag=abc"), "abc");
    }
}
