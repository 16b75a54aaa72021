//! Rule-list providers.

pub mod file;

pub use file::FileProvider;
