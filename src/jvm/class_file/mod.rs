mod attribute;
mod annotations;
mod class;
mod constants;
mod constants_pool;
mod field;
mod method;
mod reader;
mod version;

pub use annotations::*;
pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use constants_pool::*;
pub use field::*;
pub use method::*;
pub use reader::*;
pub use version::*;

pub use crate::jvm::binary_format::Serialize;
