mod counter;
mod list_files;
mod misc;
mod read_file;

use crate::host::{LocalToolHost, RegistrationError};
use std::sync::atomic::{AtomicI32, Ordering};

use counter::{Decrement, GetValue, Increment};
use list_files::ListFiles;
use misc::{Echo, SayHello, Sum, TodayWeather};
use read_file::ReadFiles;

/// State shared by the offline tools; starts at zero and wraps on overflow.
#[derive(Debug, Default)]
pub struct Counter(AtomicI32);

impl Counter {
    pub fn add(&self, delta: i32) -> i32 {
        self.0.fetch_add(delta, Ordering::SeqCst).wrapping_add(delta)
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn offline_toolset() -> Result<LocalToolHost<Counter>, RegistrationError> {
    LocalToolHost::new(Counter::default())
        .add_tool::<Increment>()?
        .add_tool::<Decrement>()?
        .add_tool::<GetValue>()?
        .add_tool::<SayHello>()?
        .add_tool::<TodayWeather>()?
        .add_tool::<Echo>()?
        .add_tool::<Sum>()?
        .add_tool::<ListFiles>()?
        .add_tool::<ReadFiles>()
}
