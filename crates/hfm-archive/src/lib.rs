pub mod bundle;
pub mod catalog;
pub mod extract;
pub mod git_ops;
pub mod retry;
pub mod verify;
