pub mod apply;
pub mod completions;
pub mod dump;
pub mod scan;
