pub mod cwd_monitor;
pub mod entry;
pub mod path;
pub mod snapshot;
pub mod tree;
