pub mod message;
pub mod record;
pub mod response;

pub use message::*;
pub use record::*;
pub use response::*;
