pub mod command;
pub mod common;
pub mod response;

pub use command::{SearchKey, SequenceSet};
pub use common::Flag;
pub use response::{FetchItem, Response, Status};
