// tasklet host glue: runs the kernel on a desktop
//
// The kernel is no_std and talks to hardware only through `Clock` and
// `Transport`. Here those are a std monotonic clock and an in-memory
// mesh, plus a stdout sink for the `log` facade.

pub mod clock;
pub mod logger;
pub mod mesh;

pub use tasklet_kernel as kernel;
