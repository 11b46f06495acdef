pub mod buffer_pool;
pub mod catalog;
pub mod config;
pub mod disk;
pub mod heap_file;
