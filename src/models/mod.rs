mod analysis;
mod history;
mod quiz;
mod samples;
mod summary;

pub use analysis::*;
pub use history::*;
pub use quiz::*;
pub use samples::*;
pub use summary::*;
