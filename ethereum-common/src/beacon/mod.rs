use super::*;

mod block_header;
mod execution_header;

pub use block_header::BlockHeader;
pub use execution_header::ExecutionHeader;
