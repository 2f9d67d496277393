mod clone;
mod execve;
mod exit;

pub use self::clone::*;
pub use self::execve::*;
pub use self::exit::*;
