//! Host devices reachable from programs through system calls.

pub mod console;
