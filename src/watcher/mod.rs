//! Filesystem change observation.

mod filter;
mod observer;

pub use filter::PathFilter;
pub use observer::{ChangeObserver, ChangeStream, ObserverStart, StopSignal};
