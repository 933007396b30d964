use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::ErrorKind;

/// Language of user-facing error messages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Locale {
    #[default]
    Indonesian,
    English,
}

impl Locale {
    /// Built-in message for a failure kind.
    pub fn message(self, kind: ErrorKind) -> &'static str {
        match self {
            Locale::Indonesian => match kind {
                ErrorKind::Blocked => {
                    "Permintaan diblokir oleh browser atau ekstensi. Nonaktifkan ad blocker lalu coba lagi."
                }
                ErrorKind::Network => {
                    "Tidak dapat terhubung ke server. Periksa koneksi internet Anda."
                }
                ErrorKind::Timeout => "Server terlalu lama merespons. Silakan coba lagi.",
                ErrorKind::ServerError => {
                    "Terjadi kesalahan pada server. Silakan coba lagi nanti."
                }
                ErrorKind::Unauthorized => "Akses ditolak. Periksa kembali kredensial Anda.",
                ErrorKind::NotFound => "Data tidak ditemukan.",
                ErrorKind::Unknown => "Terjadi kesalahan yang tidak diketahui. Silakan coba lagi.",
            },
            Locale::English => match kind {
                ErrorKind::Blocked => {
                    "The request was blocked by the browser or an extension. Disable ad blockers and try again."
                }
                ErrorKind::Network => {
                    "Unable to reach the server. Please check your internet connection."
                }
                ErrorKind::Timeout => "The server took too long to respond. Please try again.",
                ErrorKind::ServerError => {
                    "The server encountered an error. Please try again later."
                }
                ErrorKind::Unauthorized => "Access denied. Please check your credentials.",
                ErrorKind::NotFound => "The requested data was not found.",
                ErrorKind::Unknown => "An unknown error occurred. Please try again.",
            },
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Locale::Indonesian => "id",
            Locale::English => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" | "id-id" | "indonesian" => Ok(Locale::Indonesian),
            "en" | "en-us" | "en-gb" | "english" => Ok(Locale::English),
            other => Err(format!("unsupported locale '{other}'")),
        }
    }
}

/// Per-operation message table: locale defaults plus overrides.
///
/// A login operation, for example, replaces the generic Unauthorized text
/// with "NPSN atau password salah".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Messages {
    locale: Locale,
    overrides: HashMap<ErrorKind, String>,
}

impl Messages {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            overrides: HashMap::new(),
        }
    }

    /// Replaces the message for one kind.
    pub fn with(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.overrides.insert(kind, message.into());
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn get(&self, kind: ErrorKind) -> &str {
        self.overrides
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| self.locale.message(kind))
    }
}
