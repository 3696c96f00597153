pub mod batch;
pub mod extraction;
pub mod import;
pub mod processor;
pub mod structuring;
