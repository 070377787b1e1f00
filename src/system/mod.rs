//! Host interaction: port enumeration and network reload.

pub mod reload;
pub mod sysfs;

pub use reload::{ApplyOutcome, HostReloader};
pub use sysfs::{HostInterface, InterfaceSource, SysfsSource};
