//! Region allocator and block manager read path.
//!
//! Page/spill allocation lives in [`alloc`]; address-cookie decoding and
//! checksum verification lives in [`bm`].

pub mod alloc;
pub mod bm;
pub mod error;

pub use alloc::{Allocator, Page, SpillHandle};
pub use bm::{BlockManager, ReadOptions};
pub use error::{AllocError, BlockManagerError};
