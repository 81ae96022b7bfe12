mod loader;
mod types;

pub use loader::{parse_result, ResultLoader};
pub use types::ParsedResult;
