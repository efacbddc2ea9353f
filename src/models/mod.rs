pub mod claim;
pub mod result;

pub use claim::*;
pub use result::*;
