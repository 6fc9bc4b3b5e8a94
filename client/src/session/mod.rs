pub mod diagnoser;
pub mod store;

pub use diagnoser::{DiagnoseError, Diagnoser};
pub use store::{Completion, RequestTicket, SessionStore};
