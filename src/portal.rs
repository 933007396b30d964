use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    session::{SCHOOL_DATA, SCHOOL_TOKEN, STUDENT_DATA, STUDENT_TOKEN},
    transport::{ReqwestTransport, Transport},
    ApiError, ApiResponse, ClassifiedError, ErrorKind, Locale, LoginSession, Messages,
    RequestQueue, Request, ResilientClient, Result, SchoolCredentials, SessionStore,
    StudentCredentials,
};

pub const SCHOOL_LOGIN_PATH: &str = "/api/school/login";
pub const STUDENT_LOGIN_PATH: &str = "/api/web/login";
pub const HEALTH_PATH: &str = "/api/web/health";
pub const OPTIMIZED_PREFIX: &str = "/api/optimized";

/// Named TKA portal operations.
///
/// Every call goes through one shared [`RequestQueue`], then the
/// [`ResilientClient`]. Tokens and profiles are written through the injected
/// [`SessionStore`].
pub struct PortalClient<T = ReqwestTransport> {
    client: ResilientClient<T>,
    queue: RequestQueue,
    store: Arc<dyn SessionStore>,
}

impl<T> Clone for PortalClient<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            queue: self.queue.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> fmt::Debug for PortalClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalClient")
            .field("client", &self.client)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl PortalClient<ReqwestTransport> {
    /// Builds a reqwest-backed portal client from `TKA_API_*` variables.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_env(store: Arc<dyn SessionStore>) -> Result<Self> {
        Ok(Self::new(ResilientClient::from_env()?, store))
    }
}

impl<T: Transport> PortalClient<T> {
    /// Wraps `client` with a fresh queue using the client's `queue_delay`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(client: ResilientClient<T>, store: Arc<dyn SessionStore>) -> Self {
        let queue = RequestQueue::new(client.options().queue_delay);
        Self::with_queue(client, queue, store)
    }

    /// Shares an existing queue, e.g. with other portal clients.
    pub fn with_queue(
        client: ResilientClient<T>,
        queue: RequestQueue,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            client,
            queue,
            store,
        }
    }

    pub fn client(&self) -> &ResilientClient<T> {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Runs any request through the queue.
    ///
    /// The request is queued before this returns, so operations start in the
    /// order they were created no matter when their futures are awaited.
    pub fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<ApiResponse>> + Send + 'static {
        let client = self.client.clone();
        self.queue
            .enqueue(move || async move { client.send(&request).await })
    }

    /// `POST /api/school/login`; stores `school_token` and `school_data`.
    pub fn login_school(
        &self,
        credentials: &SchoolCredentials,
    ) -> impl Future<Output = Result<LoginSession>> + Send + 'static {
        let pending = Request::post(SCHOOL_LOGIN_PATH)
            .json(credentials)
            .map(|request| {
                self.request(request.messages(credential_messages(self.locale(), "NPSN")))
            });
        let store = Arc::clone(&self.store);
        #[cfg(feature = "tracing")]
        let npsn = credentials.npsn.clone();

        async move {
            let response = pending?.await?;
            let session = login_session(response, "school")?;
            save_session(store.as_ref(), SCHOOL_TOKEN, SCHOOL_DATA, &session);

            #[cfg(feature = "tracing")]
            tracing::info!(npsn = %npsn, "school signed in");

            Ok(session)
        }
    }

    /// `POST /api/web/login`; stores `student_token` and `student_data`.
    pub fn login_student(
        &self,
        credentials: &StudentCredentials,
    ) -> impl Future<Output = Result<LoginSession>> + Send + 'static {
        let pending = Request::post(STUDENT_LOGIN_PATH)
            .json(credentials)
            .map(|request| {
                self.request(request.messages(credential_messages(self.locale(), "NISN")))
            });
        let store = Arc::clone(&self.store);
        #[cfg(feature = "tracing")]
        let nisn = credentials.nisn.clone();

        async move {
            let response = pending?.await?;
            let session = login_session(response, "student")?;
            save_session(store.as_ref(), STUDENT_TOKEN, STUDENT_DATA, &session);

            #[cfg(feature = "tracing")]
            tracing::info!(nisn = %nisn, "student signed in");

            Ok(session)
        }
    }

    /// `GET /api/web/health`.
    pub fn health(&self) -> impl Future<Output = Result<ApiResponse>> + Send + 'static {
        self.request(Request::get(HEALTH_PATH))
    }

    /// `GET /api/optimized/{path}`.
    pub fn optimized_get(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<ApiResponse>> + Send + 'static {
        self.request(Request::get(optimized_path(path)))
    }

    /// `POST /api/optimized/{path}` with a JSON body.
    pub fn optimized_post(
        &self,
        path: &str,
        body: Value,
    ) -> impl Future<Output = Result<ApiResponse>> + Send + 'static {
        self.request(Request::post(optimized_path(path)).body(body))
    }

    /// `DELETE /api/school/students/{id}` as the signed-in school.
    ///
    /// Fails with [`ErrorKind::Unauthorized`] without touching the network
    /// when no school token is stored. A 401 answer clears the school session.
    pub fn delete_student(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<ApiResponse>> + Send + 'static {
        let pending = match self.store.get(SCHOOL_TOKEN) {
            Some(token) => Ok(self.request(
                Request::delete(format!("/api/school/students/{id}")).bearer(token),
            )),
            None => Err(ApiError::from(ClassifiedError::new(
                ErrorKind::Unauthorized,
                self.locale().message(ErrorKind::Unauthorized),
            ))),
        };
        let store = Arc::clone(&self.store);

        async move {
            let result = pending?.await;
            if let Err(err) = &result {
                if err.kind() == Some(ErrorKind::Unauthorized) {
                    clear_session(store.as_ref(), SCHOOL_TOKEN, SCHOOL_DATA);
                }
            }
            result
        }
    }

    pub fn school_token(&self) -> Option<String> {
        self.store.get(SCHOOL_TOKEN)
    }

    pub fn student_token(&self) -> Option<String> {
        self.store.get(STUDENT_TOKEN)
    }

    pub fn logout_school(&self) {
        clear_session(self.store.as_ref(), SCHOOL_TOKEN, SCHOOL_DATA);
    }

    pub fn logout_student(&self) {
        clear_session(self.store.as_ref(), STUDENT_TOKEN, STUDENT_DATA);
    }

    fn locale(&self) -> Locale {
        self.client.options().locale
    }
}

fn save_session(
    store: &dyn SessionStore,
    token_key: &str,
    data_key: &str,
    session: &LoginSession,
) {
    store.set(token_key, &session.token);
    match &session.profile {
        Some(profile) => store.set(data_key, &profile.to_string()),
        None => store.clear(data_key),
    }
}

fn clear_session(store: &dyn SessionStore, token_key: &str, data_key: &str) {
    store.clear(token_key);
    store.clear(data_key);
}

fn optimized_path(path: &str) -> String {
    format!("{OPTIMIZED_PREFIX}/{}", path.trim_start_matches('/'))
}

/// Login messages naming the identifier the user typed.
fn credential_messages(locale: Locale, identifier: &str) -> Messages {
    let (unauthorized, not_found) = match locale {
        Locale::Indonesian => (
            format!("{identifier} atau password salah"),
            format!("{identifier} tidak terdaftar"),
        ),
        Locale::English => (
            format!("Invalid {identifier} or password"),
            format!("{identifier} is not registered"),
        ),
    };
    Messages::new(locale)
        .with(ErrorKind::Unauthorized, unauthorized)
        .with(ErrorKind::NotFound, not_found)
}

/// Reads `data.token` and the `data.<profile_key>` profile from a login response.
///
/// Without a `<profile_key>` object, whatever else `data` carries becomes the profile.
fn login_session(response: ApiResponse, profile_key: &str) -> Result<LoginSession> {
    let mut data = match response.into_data::<Value>()? {
        Value::Object(data) => data,
        other => {
            return Err(ApiError::Decode(format!(
                "login data must be an object, got {other}"
            )))
        }
    };

    let token = match data.remove("token") {
        Some(Value::String(token)) if !token.is_empty() => token,
        _ => return Err(ApiError::Decode("login data has no token".to_owned())),
    };

    let profile = match data.remove(profile_key) {
        Some(profile) if !profile.is_null() => Some(profile),
        _ if data.is_empty() => None,
        _ => Some(Value::Object(data)),
    };

    Ok(LoginSession { token, profile })
}
