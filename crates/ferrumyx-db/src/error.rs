pub use ferrumyx_common::error::{RagError, Result};
