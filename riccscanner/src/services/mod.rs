mod scanner;

pub use scanner::{decode_payload, ScanService};
