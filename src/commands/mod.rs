pub mod between;
pub mod generators;
pub mod upcoming;
