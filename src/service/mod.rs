//! Ready-made routers and applications.

pub mod echo;
pub mod static_files;

pub use echo::{EchoApp, EchoRouter};
pub use static_files::StaticFiles;
