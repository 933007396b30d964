use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// School login form: NPSN plus password.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SchoolCredentials {
    pub npsn: String,
    pub password: String,
}

impl SchoolCredentials {
    pub fn new(npsn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            npsn: npsn.into().trim().to_owned(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SchoolCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchoolCredentials")
            .field("npsn", &self.npsn)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Student login form: NISN plus password.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct StudentCredentials {
    pub nisn: String,
    pub password: String,
}

impl StudentCredentials {
    pub fn new(nisn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            nisn: nisn.into().trim().to_owned(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for StudentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudentCredentials")
            .field("nisn", &self.nisn)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a successful login.
#[derive(Clone, PartialEq)]
pub struct LoginSession {
    pub token: String,
    /// School or student profile returned next to the token.
    pub profile: Option<Value>,
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("token", &"<redacted>")
            .field("profile", &self.profile)
            .finish()
    }
}
