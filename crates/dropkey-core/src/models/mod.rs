mod file;
mod quota;

pub use file::{FileRecord, KeyPair, NewFileRecord};
pub use quota::{QuotaRecord, TrafficKind};
