//! Measurement buffers, their reduction and the persistent timestamp records.

mod channel;
mod measurements;
mod nvm;
mod reducer;

pub use channel::*;
pub use measurements::*;
pub use nvm::*;
pub use reducer::*;
