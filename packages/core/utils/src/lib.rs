mod timer;

pub use timer::{SystemTimer, Timer};
