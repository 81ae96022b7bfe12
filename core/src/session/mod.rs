mod allocator;

pub use allocator::{LogSession, LogSessionAllocator, SESSION_TIMESTAMP_FORMAT};
