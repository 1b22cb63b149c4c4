pub mod endpoint;
pub mod source;
pub mod transport;

pub use endpoint::ApiEndpoint;
pub use source::ApiSource;
pub use transport::{HttpConfig, HttpTransport, RawResponse, Transport};
