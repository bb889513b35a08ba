use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    cancel::{CancelHandle, CancelRegistry},
    config::GatewayConfig,
    envelope::ResponseEnvelope,
    error::{BuildError, Rejection, TransportError},
    interceptor::RawResponse,
    locale::{Locale, LANGUAGE_HEADER},
    notifier::{Alert, LogNotifier, Notifier},
    session::SessionState,
    store::{MemoryStore, SessionStore, LOCALE_KEY},
};

/// Shown by [`RequestGateway::post_json`] for failures outside the client-error range.
pub const REMOTE_SERVER_ERROR: &str = "远程服务器出错";

pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn SessionStore>>,
    session: Option<SessionState>,
    notifier: Option<Arc<dyn Notifier>>,
    registry: Option<CancelRegistry>,
    locale: Option<Locale>,
    inner: reqwest::ClientBuilder,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            store: None,
            session: None,
            notifier: None,
            registry: None,
            locale: None,
            inner: reqwest::Client::builder(),
        }
    }

    /// Durable storage for the token, user profile and locale preference.
    ///
    /// Defaults to an empty [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// In-memory session shared with the rest of the application.
    ///
    /// Defaults to one loaded from the store.
    pub fn session(mut self, session: SessionState) -> Self {
        self.session = Some(session);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn registry(mut self, registry: CancelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use this locale instead of the stored preference.
    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_inner(
        mut self,
        f: impl FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    ) -> Self {
        self.inner = f(self.inner);
        self
    }

    /// Create the gateway.
    ///
    /// The language header is decided here, once; a changed locale preference only takes effect
    /// in gateways built afterwards.
    pub fn build(self) -> Result<RequestGateway, BuildError> {
        let Self {
            config,
            store,
            session,
            notifier,
            registry,
            locale,
            inner,
        } = self;
        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let locale = match locale {
            Some(locale) => locale,
            None => Locale::from_preference(store.get(LOCALE_KEY)?.as_deref()),
        };
        let session = match session {
            Some(session) => session,
            None => SessionState::load(store.as_ref())?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(LANGUAGE_HEADER),
            HeaderValue::from_static(locale.header_value()),
        );
        let client = inner
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .cookie_store(config.with_credentials)
            .build()?;

        debug!("Built gateway for {} using locale {locale}", config.base_url);
        Ok(RequestGateway {
            client,
            config,
            locale,
            store,
            session,
            notifier: notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            registry: registry.unwrap_or_default(),
        })
    }
}

/// The single way the application talks to its backend.
///
/// Clones share the HTTP connection pool, the session and the cancel registry.
#[derive(Clone)]
pub struct RequestGateway {
    pub(crate) client: reqwest::Client,
    pub(crate) config: GatewayConfig,
    pub(crate) locale: Locale,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) session: SessionState,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) registry: CancelRegistry,
}

fn accept(envelope: ResponseEnvelope) -> Result<ResponseEnvelope, Rejection> {
    if envelope.is_accepted() {
        Ok(envelope)
    } else {
        Err(envelope.rejection())
    }
}

fn decode<T>(envelope: ResponseEnvelope) -> Result<T, Rejection>
where
    T: DeserializeOwned,
{
    envelope
        .decode_data()
        .map_err(|e| Rejection::transport(&TransportError::Decode(e)))
}

/// Data of a session-invalid envelope.
///
/// The sign-out has already been announced, so this never rejects: when `data` does not fit `T`
/// the call stays pending like the requests the sign-out aborted.
async fn signed_out<T>(envelope: ResponseEnvelope) -> Result<T, Rejection>
where
    T: DeserializeOwned,
{
    match envelope.decode_data() {
        Ok(data) => Ok(data),
        Err(e) => {
            debug!("Abandoning request after sign-out, data does not fit: {e}");
            std::future::pending().await
        }
    }
}

impl RequestGateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn registry(&self) -> &CancelRegistry {
        &self.registry
    }

    /// Abort every request that is currently in flight.
    ///
    /// The aborted calls never complete.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            warn!("Aborted {cancelled} request(s)");
        }
        cancelled
    }

    /// Resolves with the body of any successful response, whatever it holds.
    ///
    /// The body is usually an envelope but need not be: an empty body reads as `null` and one
    /// that is not JSON as a string.
    pub async fn get<Q>(&self, path: &str, query: &Q) -> Result<Value, Rejection>
    where
        Q: Serialize + ?Sized,
    {
        Ok(self.send(Method::GET, path, |b| b.query(query)).await?.json())
    }

    /// Resolves for codes 200 and 403, rejects with the envelope's code otherwise.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope, Rejection>
    where
        B: Serialize + ?Sized,
    {
        let envelope = self.envelope(Method::POST, path, |b| b.json(body)).await?;
        accept(envelope)
    }

    /// Like [`Self::post`] but also alerts when the envelope's code is rejected.
    pub async fn put<B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope, Rejection>
    where
        B: Serialize + ?Sized,
    {
        let envelope = self.envelope(Method::PUT, path, |b| b.json(body)).await?;
        accept(envelope).inspect_err(|r| self.notifier.alert(Alert::error(r.msg.clone())))
    }

    /// Like [`Self::put`], using `DELETE` with the parameters as JSON body.
    pub async fn del<B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope, Rejection>
    where
        B: Serialize + ?Sized,
    {
        let envelope = self.envelope(Method::DELETE, path, |b| b.json(body)).await?;
        accept(envelope).inspect_err(|r| self.notifier.alert(Alert::error(r.msg.clone())))
    }

    /// [`Self::get`] unwrapped to `data`; every rejection is alerted.
    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, Rejection>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let alert = |r: &Rejection| self.notifier.alert(Alert::error(r.msg.clone()));
        let envelope = self
            .get(path, query)
            .await
            .and_then(|body| {
                serde_json::from_value::<ResponseEnvelope>(body)
                    .map_err(|e| Rejection::transport(&TransportError::Decode(e)))
            })
            .inspect_err(alert)?;
        if envelope.is_session_invalid() {
            return signed_out(envelope).await;
        }
        decode(envelope).inspect_err(alert)
    }

    /// [`Self::post`] unwrapped to `data`; every rejection is alerted.
    ///
    /// Client errors show the server's message, everything else [`REMOTE_SERVER_ERROR`].
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, Rejection>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let alert = |r: &Rejection| {
            let message = if r.is_client_error() {
                r.msg.clone()
            } else {
                REMOTE_SERVER_ERROR.to_string()
            };
            self.notifier.alert(Alert::error(message));
        };
        let envelope = self.post(path, body).await.inspect_err(alert)?;
        if envelope.is_session_invalid() {
            return signed_out(envelope).await;
        }
        decode(envelope).inspect_err(alert)
    }

    pub async fn get_blob<Q>(&self, path: &str, query: &Q) -> Result<Bytes, Rejection>
    where
        Q: Serialize + ?Sized,
    {
        Ok(self.send(Method::GET, path, |b| b.query(query)).await?.body)
    }

    pub async fn post_blob<B>(&self, path: &str, body: &B) -> Result<Bytes, Rejection>
    where
        B: Serialize + ?Sized,
    {
        Ok(self.send(Method::POST, path, |b| b.json(body)).await?.body)
    }

    async fn envelope<F>(
        &self,
        method: Method,
        path: &str,
        f: F,
    ) -> Result<ResponseEnvelope, Rejection>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let response = self.send(method, path, f).await?;
        Ok(response.envelope()?)
    }

    async fn send<F>(&self, method: Method, path: &str, f: F) -> Result<RawResponse, TransportError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.config.resolve(path)?;
        self.dispatch(f(self.client.request(method, url))).await
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<RawResponse, TransportError> {
        let handle = CancelHandle::new();
        let outcome = match self.on_request(builder, &handle) {
            Ok(request) => {
                debug!("{} {}", request.method(), request.url());
                tokio::select! {
                    biased;
                    _ = handle.cancelled() => Err(TransportError::Cancelled),
                    result = self.transmit(request) => result,
                }
            }
            Err(e) => Err(e),
        };
        self.on_response(outcome).await
    }

    async fn transmit(&self, request: reqwest::Request) -> Result<RawResponse, TransportError> {
        let timeout = self.config.timeout;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;
        let status = response.status();
        debug!("Received {status} from {}", response.url());
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;
        Ok(RawResponse { body })
    }
}
