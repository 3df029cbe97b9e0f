mod client;
mod io;

pub use client::{CliClient, ConsoleObserver};
