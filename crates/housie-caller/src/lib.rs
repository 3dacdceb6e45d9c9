//! Number calling for Housie rooms.
//!
//! - [`NumberCaller`] draws from the room's pool without replacement and
//!   keeps the [`CalledNumbers`] record.
//! - [`DrawScheduler`] is the timer behind automatic mode.
//!
//! Neither type knows about rooms, players, or the network; the room actor
//! owns one of each.

mod caller;
mod error;
mod scheduler;

pub use caller::{CalledNumbers, Draw, MAX_POOL_SIZE, NumberCaller};
pub use error::CallerError;
pub use scheduler::{DrawConfig, DrawMetrics, DrawScheduler, DrawTick};
