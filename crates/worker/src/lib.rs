//! Worker primitives shared by the realtime catalog engine.
//!
//! * [`spawn`]: classified task spawning (the only sanctioned route to `tokio::spawn`)
//! * [`GenerationClock`] / [`Generation`]: tags that let owners discard work from a superseded lifecycle
//! * [`RetryPolicy`]: fixed-delay, bounded retry schedule
//! * [`Timer`]: single-slot cancellable delay

mod class;
mod generation;
mod retry;
mod spawn;
mod timer;

pub use class::TaskClass;
pub use generation::{Generation, GenerationClock};
pub use retry::RetryPolicy;
pub use spawn::spawn;
pub use timer::Timer;
