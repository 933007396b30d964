use std::fmt;
use std::sync::Arc;

use tokio::time::{sleep, timeout};

use crate::{
    classify::{classify, Failure},
    retry::{AttemptOutcome, AttemptState, Decision},
    transport::{ReqwestTransport, Transport, TransportError, TransportErrorKind},
    ApiResponse, ClientOptions, Messages, Request, Result,
};

/// Executes logical API operations with timeout, retry and fallback.
///
/// The client holds no session state; callers decide what to persist from
/// the returned [`ApiResponse`].
pub struct ResilientClient<T = ReqwestTransport> {
    transport: Arc<T>,
    options: ClientOptions,
    messages: Messages,
}

impl<T> Clone for ResilientClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
            messages: self.messages.clone(),
        }
    }
}

impl<T> fmt::Debug for ResilientClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.options.base_url)
            .field("fallback_base_url", &self.options.fallback_base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl ResilientClient<ReqwestTransport> {
    /// Creates a reqwest-backed client for `base_url` with default options.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_transport(ReqwestTransport::new(), ClientOptions::new(base_url))
    }

    /// Creates a reqwest-backed client from `TKA_API_*` environment variables.
    ///
    /// See [`ClientOptions::from_env`] for the variables read.
    pub fn from_env() -> Result<Self> {
        let options = ClientOptions::from_env()?;
        Ok(Self::with_transport(ReqwestTransport::new(), options))
    }
}

impl<T: Transport> ResilientClient<T> {
    pub fn with_transport(transport: T, options: ClientOptions) -> Self {
        let messages = Messages::new(options.locale);
        Self {
            transport: Arc::new(transport),
            options,
            messages,
        }
    }

    /// Applies client options such as base URLs, timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.messages = Messages::new(opts.locale);
        self.options = opts;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Runs one logical operation to a terminal state.
    pub async fn send(&self, request: &Request) -> Result<ApiResponse> {
        self.send_observed(request, |_| {}).await
    }

    /// Like [`ResilientClient::send`], reporting every state transition.
    pub async fn send_observed<F>(&self, request: &Request, mut on_state: F) -> Result<ApiResponse>
    where
        F: FnMut(AttemptState) + Send,
    {
        let mut policy = self.options.retry_policy();
        if let Some(max_attempts) = request.max_attempts {
            policy.max_attempts = max_attempts.max(1);
        }
        let messages = request.messages.as_ref().unwrap_or(&self.messages);
        let attempt_timeout = request.timeout.unwrap_or(self.options.timeout);
        // An absolute URL ignores the base, so switching bases cannot help.
        let fallback = if request.is_absolute() {
            None
        } else {
            request
                .fallback_base_url
                .as_deref()
                .or(self.options.fallback_base_url.as_deref())
        };

        let mut base_url = self.options.base_url.as_str();
        let mut fallback_used = false;
        let mut attempt = 0u32;

        on_state(AttemptState::Idle);
        on_state(AttemptState::Attempting);

        loop {
            attempt += 1;
            let http = request.to_http(base_url);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %http.method,
                url = %http.url,
                attempt,
                max_attempts = policy.max_attempts,
                "sending request"
            );

            let result = match timeout(attempt_timeout, self.transport.send(http)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::new(
                    TransportErrorKind::Timeout,
                    format!("request timed out after {} ms", attempt_timeout.as_millis()),
                )),
            };

            let error = match result {
                Ok(response) if response.is_success() => {
                    let response = ApiResponse::from_http(response);
                    if response.success() {
                        on_state(AttemptState::Success);
                        return Ok(response);
                    }

                    // The backend answered and said no; another attempt would
                    // get the same answer.
                    let error = classify(
                        &Failure::Rejected {
                            status: response.status,
                            message: response.message(),
                        },
                        messages,
                    );
                    on_state(AttemptState::Failed);

                    #[cfg(feature = "tracing")]
                    tracing::warn!(kind = %error.kind, status = response.status, "request rejected");

                    return Err(error.into());
                }
                Ok(response) => classify(
                    &Failure::Status {
                        status: response.status,
                        body: &response.body,
                    },
                    messages,
                ),
                Err(err) => classify(&Failure::Transport(&err), messages),
            };

            let decision = policy.decide(&AttemptOutcome {
                kind: error.kind,
                status: error.status,
                attempt,
                fallback_used,
                has_fallback: fallback.is_some(),
            });
            on_state(decision.next_state());

            match decision {
                Decision::Retry { delay } => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        kind = %error.kind,
                        attempt,
                        "retrying request after {} ms",
                        delay.as_millis()
                    );

                    sleep(delay).await;
                    on_state(AttemptState::Attempting);
                }
                Decision::Fallback => {
                    if let Some(url) = fallback {
                        #[cfg(feature = "tracing")]
                        tracing::info!(
                            from = %base_url,
                            to = %url,
                            "primary blocked by client, switching to fallback base url"
                        );

                        base_url = url;
                        fallback_used = true;
                    }
                }
                Decision::GiveUp => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        kind = %error.kind,
                        status = ?error.status,
                        detail = ?error.detail,
                        attempt,
                        "request failed"
                    );

                    return Err(error.into());
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde_json::json;
    use tokio::time::Instant;

    use super::ResilientClient;
    use crate::{
        retry::{AttemptState, Backoff},
        transport::{HttpRequest, HttpResponse, Transport, TransportError, TransportErrorKind},
        ClientOptions, ErrorKind, Locale, Request,
    };

    pub(crate) enum Step {
        Respond(HttpResponse),
        Fail(TransportError),
        Hang,
    }

    impl Step {
        pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
            Step::Respond(HttpResponse {
                status,
                content_type: Some("application/json".to_owned()),
                body: body.to_string(),
            })
        }

        pub(crate) fn error(message: &str) -> Self {
            Step::Fail(TransportError::new(TransportErrorKind::Other, message))
        }
    }

    /// Plays back scripted steps and records every call with its start time.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport {
        steps: Arc<Mutex<VecDeque<Step>>>,
        pub(crate) calls: Arc<Mutex<Vec<(HttpRequest, Instant)>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Arc::new(Mutex::new(steps.into())),
                calls: Arc::default(),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("calls mutex must not be poisoned")
                .iter()
                .map(|(request, _)| request.url.clone())
                .collect()
        }

        pub(crate) fn starts(&self) -> Vec<Instant> {
            self.calls
                .lock()
                .expect("calls mutex must not be poisoned")
                .iter()
                .map(|(_, at)| *at)
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls
                .lock()
                .expect("calls mutex must not be poisoned")
                .push((request, Instant::now()));
            let step = self
                .steps
                .lock()
                .expect("steps mutex must not be poisoned")
                .pop_front();

            match step {
                Some(Step::Respond(response)) => Ok(response),
                Some(Step::Fail(err)) => Err(err),
                Some(Step::Hang) => std::future::pending().await,
                None => Err(TransportError::other("no scripted step left")),
            }
        }
    }

    pub(crate) fn options() -> ClientOptions {
        ClientOptions {
            locale: Locale::English,
            ..ClientOptions::new("http://primary")
        }
    }

    fn client(steps: Vec<Step>, options: ClientOptions) -> (ResilientClient<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new(steps);
        (
            ResilientClient::with_transport(transport.clone(), options),
            transport,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn success_returns_payload_without_retry() {
        let (client, transport) = client(
            vec![Step::json(200, json!({"success": true, "data": {"token": "abc"}}))],
            options(),
        );

        let response = client
            .send(&Request::post("/api/school/login"))
            .await
            .expect("request must succeed");

        assert_eq!(response.data(), Some(&json!({"token": "abc"})));
        assert_eq!(transport.urls(), vec!["http://primary/api/school/login"]);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_retries_with_linear_backoff_then_fails() {
        let (client, transport) = client(
            vec![
                Step::json(500, json!({"message": "boom"})),
                Step::json(500, json!({"message": "boom"})),
                Step::json(500, json!({"message": "boom"})),
            ],
            options(),
        );

        let err = client
            .send(&Request::get("/api/web/health"))
            .await
            .expect_err("request must fail");

        assert_eq!(err.kind(), Some(ErrorKind::ServerError));
        let starts = transport.starts();
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[1] - starts[0], Duration::from_millis(1_000));
        assert_eq!(starts[2] - starts[1], Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_recovers_on_retry() {
        let (client, transport) = client(
            vec![
                Step::json(500, json!({"message": "boom"})),
                Step::json(200, json!({"success": true, "data": 1})),
            ],
            options(),
        );

        let response = client
            .send(&Request::get("/api/web/health"))
            .await
            .expect("second attempt must succeed");

        assert_eq!(response.data(), Some(&json!(1)));
        assert_eq!(transport.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_and_not_found_are_not_retried() {
        for (status, kind) in [(401, ErrorKind::Unauthorized), (404, ErrorKind::NotFound)] {
            let (client, transport) = client(
                vec![Step::json(status, json!({"success": false}))],
                options(),
            );

            let err = client
                .send(&Request::post("/api/web/login"))
                .await
                .expect_err("request must fail");

            assert_eq!(err.kind(), Some(kind));
            assert_eq!(transport.urls().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_by_client_uses_fallback_once() {
        let (client, transport) = client(
            vec![
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::json(200, json!({"success": true, "data": null})),
            ],
            options().with_fallback("http://fallback"),
        );

        let start = Instant::now();
        client
            .send(&Request::get("/api/web/health"))
            .await
            .expect("fallback attempt must succeed");

        assert_eq!(
            transport.urls(),
            vec![
                "http://primary/api/web/health",
                "http://fallback/api/web/health"
            ]
        );
        // Substitution is immediate, with no backoff.
        assert_eq!(transport.starts()[1], start);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_substitution_happens_at_most_once() {
        let (client, transport) = client(
            vec![
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::json(200, json!({"success": true})),
            ],
            options().with_fallback("http://fallback"),
        );

        let err = client
            .send(&Request::get("/api/web/health"))
            .await
            .expect_err("second block must be terminal");

        assert_eq!(err.kind(), Some(ErrorKind::Blocked));
        assert_eq!(transport.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_absolute_url_does_not_replay_on_fallback() {
        let (client, transport) = client(
            vec![
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::json(200, json!({"success": true})),
            ],
            options().with_fallback("http://fallback"),
        );

        let err = client
            .send(&Request::get("http://primary/api/web/health"))
            .await
            .expect_err("blocked absolute url must be terminal");

        assert_eq!(err.kind(), Some(ErrorKind::Blocked));
        assert_eq!(transport.urls(), vec!["http://primary/api/web/health"]);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_fallback_stay_on_fallback() {
        let (client, transport) = client(
            vec![
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::error("TypeError: Failed to fetch"),
                Step::json(200, json!({"success": true})),
            ],
            options().with_fallback("http://fallback"),
        );

        client
            .send(&Request::get("/api/optimized/schedules"))
            .await
            .expect("third attempt must succeed");

        let urls = transport.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[1].starts_with("http://fallback"));
        assert!(urls[2].starts_with("http://fallback"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_to_fetch_exhausts_attempts_as_network_error() {
        let (client, transport) = client(
            vec![
                Step::error("TypeError: Failed to fetch"),
                Step::error("TypeError: Failed to fetch"),
                Step::error("TypeError: Failed to fetch"),
            ],
            options(),
        );

        let err = client
            .send(&Request::post("/api/school/login"))
            .await
            .expect_err("request must fail");

        let classified = err.classified().expect("error must be classified");
        assert_eq!(classified.kind, ErrorKind::Network);
        assert!(classified.message.contains("check your internet connection"));
        assert_eq!(transport.urls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempt_times_out() {
        let (client, transport) = client(
            vec![Step::Hang, Step::json(200, json!({"success": true}))],
            ClientOptions {
                timeout: Duration::from_millis(50),
                backoff: Backoff::Fixed(Duration::from_millis(10)),
                ..options()
            },
        );

        let response = client
            .send(&Request::get("/api/web/health"))
            .await
            .expect("second attempt must succeed");
        assert!(response.success());

        let starts = transport.starts();
        assert_eq!(starts[1] - starts[0], Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_terminal_when_budget_is_one() {
        let (client, _transport) = client(vec![Step::Hang], options());

        let err = client
            .send(
                &Request::get("/api/web/health")
                    .timeout(Duration::from_millis(5))
                    .max_attempts(1),
            )
            .await
            .expect_err("request must time out");
        assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_envelope_is_terminal() {
        let (client, transport) = client(
            vec![Step::json(
                200,
                json!({"success": false, "message": "Password salah"}),
            )],
            options(),
        );

        let err = client
            .send(&Request::post("/api/web/login"))
            .await
            .expect_err("request must fail");

        let classified = err.classified().expect("error must be classified");
        assert_eq!(classified.kind, ErrorKind::Unknown);
        assert_eq!(classified.message, "Password salah");
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_state_transitions() {
        let (client, _transport) = client(
            vec![
                Step::error("net::ERR_BLOCKED_BY_CLIENT"),
                Step::json(500, json!({})),
                Step::json(200, json!({"success": true})),
            ],
            options().with_fallback("http://fallback"),
        );

        let mut states = Vec::new();
        client
            .send_observed(&Request::get("/api/web/health"), |state| states.push(state))
            .await
            .expect("request must succeed");

        assert_eq!(
            states,
            vec![
                AttemptState::Idle,
                AttemptState::Attempting,
                AttemptState::FallbackAttempting,
                AttemptState::Retrying,
                AttemptState::Attempting,
                AttemptState::Success,
            ]
        );
    }

    #[test]
    fn debug_shows_base_urls() {
        let client = ResilientClient::new("http://localhost:8000");
        let debug = format!("{client:?}");
        assert!(debug.contains("http://localhost:8000"));
    }
}
