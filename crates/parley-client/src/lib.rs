//! # parley-client
//!
//! The session and streaming connection core of the Parley chat client:
//!
//! - **Bootstrap**: REST calls for session create, history fetch, and reset
//! - **Connection**: the transport state machine and its async driver with
//!   bounded exponential reconnect backoff
//! - **Aggregation**: folding inbound assistant replies into the timeline
//! - **Runtime**: the single per-process object owning all of the above
//!
//! The only observable outputs are the timeline, the connection status
//! watch, and the bootstrap error watch.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod bootstrap;
pub mod coordinator;
pub mod errors;
pub mod fsm;
pub mod manager;
pub mod runtime;
pub mod storage;
pub mod wire;

pub use aggregator::StreamingAggregator;
pub use bootstrap::BootstrapClient;
pub use coordinator::SessionCoordinator;
pub use errors::{BootstrapError, ClientError, ConnectionError, Result, StorageError};
pub use fsm::{ConnectionFsm, ConnectionState, InterruptOutcome};
pub use manager::{ConnectionManager, ConnectionStatus, SessionEvent};
pub use runtime::SessionRuntime;
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
