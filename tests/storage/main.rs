mod common;
mod config_test;
mod disk_test;
