// frontend/src/sync/mod.rs
//
// Keeps the displayed readings in step with the selected filter: one push-channel session
// per filter value (live batches or a by-date query), plus an independent REST poller for
// the latest values of the selected node.

pub mod poller;
pub mod session;
pub mod state;
pub mod transport;
pub mod view;

pub use poller::{HttpSummarySource, LatestSummary, SummaryBoard, SummaryPoller, SummarySource};
pub use session::{SessionEvent, SessionEventKind, SessionId, SessionManager, SessionStats};
pub use state::{Filter, Mode, ViewState, filter_for_node};
pub use transport::{Connector, PushLink, WsConnector};
pub use view::{ViewCommand, ViewController};
