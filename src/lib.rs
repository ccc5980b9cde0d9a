mod bustypes;
mod case;
mod error;
mod fd;
mod gauss;
mod lineflow;
mod linsolve;
mod math;
mod newton;
mod pfopt;
mod runpf;
mod ybus;

pub use bustypes::*;
pub use case::*;
pub use error::*;
pub use fd::*;
pub use gauss::*;
pub use lineflow::*;
pub use newton::*;
pub use pfopt::*;
pub use runpf::*;
pub use ybus::*;
