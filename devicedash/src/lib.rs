//! devicedash library: device model, telemetry formatting, the GraphQL data
//! layer with its query handles, the session object and the terminal views.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod forms;
pub mod graphql;
pub mod history;
pub mod metrics;
pub mod profiles;
pub mod query;
pub mod session;
pub mod timefmt;
pub mod tls;
pub mod transport;
pub mod types;
pub mod ui;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use metrics::{parse_metadata, DeviceMetrics, MetricField};
pub use query::{QueryHandle, QueryKind, QueryState};
pub use session::{FileTokenStore, MemoryTokenStore, Session, SessionState, TokenStore};
pub use timefmt::{format_relative, format_relative_now};
pub use transport::{HttpTransport, Transport};
