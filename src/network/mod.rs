//! Network-facing types: responses, failures and the transport contract.

mod error;
mod response;
mod transport;

pub use error::{ErrorKind, RequestError};
pub use response::NetworkResponse;
pub use transport::Transport;
