pub use skygate_core::app::App;
pub use skygate_core::extract::Auth;
pub use skygate_types::error::{Error, SgResult};
pub use skygate_types::types::Timestamp;

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
