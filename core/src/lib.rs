//! Data-access and session layer for the back-office console.
//!
//! # Overview
//! The console UI calls one `Gateway` method per backend operation and reads
//! the current user from a `SessionManager`. Everything below that is this
//! crate: request normalization, fall-through over historical route
//! prefixes, error classification, and a session that survives reloads and
//! short backend outages.
//!
//! # Design
//! - `Transport` splits each exchange into a pure `build_request`, an
//!   `HttpExecutor` that does the I/O, and a pure `classify`, so everything
//!   except the network round-trip is testable as plain data.
//! - The resolver walks an explicit, per-resource `CandidateList` and only
//!   advances on 404.
//! - `Gateway` is stateless and returns either a value or an `ApiError`.
//! - `SessionManager` is the single writer of the persisted slot; its
//!   outage policy is the `reconcile` decision table.
//! - `Console` wires all of it once at startup.

pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod http;
pub mod resolver;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ConfigError};
pub use console::{Console, ConsoleError};
pub use error::ApiError;
pub use executor::ReqwestExecutor;
pub use gateway::{query_string, Gateway};
pub use http::{
    FormData, FormPart, HttpBody, HttpMethod, HttpRequest, HttpResponse, RequestBody, RequestSpec,
};
pub use resolver::{resolve, CandidateList};
pub use session::{
    reconcile, AuthApi, FailureKind, Reconciliation, Session, SessionManager, SessionState,
};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};
pub use transport::{classify, ExecuteError, HttpExecutor, Transport};
pub use types::{LoginResponse, UserRecord};
