pub mod enums;
pub mod extracted;
pub mod metric;
pub mod note;
pub mod patient;
pub mod report;

pub use extracted::*;
pub use metric::*;
pub use note::*;
pub use patient::*;
pub use report::*;
