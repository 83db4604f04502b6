pub mod locate;
pub mod replace;

pub use locate::{Heuristic, Locator};
pub use replace::{notice_markup, try_customize};
