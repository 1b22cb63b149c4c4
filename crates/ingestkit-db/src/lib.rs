pub mod connection;
pub mod dialect;
pub mod fixtures;
pub mod query;
pub mod source;
pub mod test_utils; // Test utilities - available for integration tests

pub use connection::ConnectionPool;
pub use dialect::{Credentials, Dialect, DialectKind, Postgres, Redshift};
pub use query::fetch_dataset;
pub use source::{DatabaseSource, SourceQuery};
