mod bound;
mod pure;

pub use bound::{ArchivePath, SharedFs};
pub use pure::PurePath;
