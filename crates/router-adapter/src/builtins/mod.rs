//! Built-in adapter implementations.

mod fake;
mod null;
mod subprocess;

pub use fake::FakeAdapter;
pub use null::NullAdapter;
pub use subprocess::{SubprocessAdapter, SubprocessConfig};
