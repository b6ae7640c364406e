//! Session graph model: persistence, recording lifecycle and navigation ingest.

pub mod dispatcher;
pub mod graph_store;
pub mod ingest;
pub mod lifecycle;
pub mod types;

pub use dispatcher::{Dispatcher, HostMessage};
pub use graph_store::{decode_session, GraphStore};
pub use lifecycle::{SessionLifecycle, SessionState};
pub use types::{NavEdge, PageNode, Session};
