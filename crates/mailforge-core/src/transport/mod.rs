//! Delivery through local mail programs.

mod pipe;

pub use pipe::{pipe_arguments, pipe_message};
