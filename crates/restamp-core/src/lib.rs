pub mod error;
pub mod page;
pub mod types;

pub use error::{RestampError, RestampResult};
pub use page::DomPage;
pub use types::*;
