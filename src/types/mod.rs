//! Value types shared by the codec, the devices and the orchestrator.

mod kind;
mod priority;
mod token;

pub use kind::DeviceKind;
pub use priority::Priority;
pub use token::ColorToken;
