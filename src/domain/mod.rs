pub mod grade;
pub mod history;
pub mod prop;
pub mod signal;
pub mod weights;

pub use grade::*;
pub use history::*;
pub use prop::*;
pub use signal::*;
pub use weights::*;
