pub mod lock_manager;
pub mod transaction;
