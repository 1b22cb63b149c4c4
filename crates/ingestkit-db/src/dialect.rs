use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials used to build a connection string
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub host: String,
    /// Falls back to the dialect's default port when unset
    #[serde(default)]
    pub port: Option<u16>,
    pub database: String,
}

impl Credentials {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port,
            database: database.into(),
        }
    }
}

// Never print the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// How a relational backend turns credentials into a connection string.
///
/// Connect, query and export logic is shared; only this differs per backend.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn default_port(&self) -> u16;

    /// Extra query-string options appended to the URL
    fn url_options(&self) -> Option<&'static str> {
        None
    }

    fn connection_url(&self, creds: &Credentials) -> String {
        let mut url = format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&creds.user),
            urlencoding::encode(&creds.password),
            creds.host,
            creds.port.unwrap_or(self.default_port()),
            urlencoding::encode(&creds.database),
        );
        if let Some(options) = self.url_options() {
            url.push('?');
            url.push_str(options);
        }
        url
    }
}

/// Standard PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn default_port(&self) -> u16 {
        5432
    }
}

/// Redshift-style columnar warehouse speaking the PostgreSQL wire protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct Redshift;

impl Dialect for Redshift {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn default_port(&self) -> u16 {
        5439
    }

    fn url_options(&self) -> Option<&'static str> {
        Some("sslmode=require")
    }
}

/// Dialect selector for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    Redshift,
}

impl DialectKind {
    pub fn dialect(self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Postgres => Box::new(Postgres),
            DialectKind::Redshift => Box::new(Redshift),
        }
    }
}
