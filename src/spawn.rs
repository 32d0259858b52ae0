//! Continuation threads.
//!
//! Every `then`, `on_error` and `map` call starts one detached thread that
//! drains the parent, runs the callbacks and writes the child, then exits.
//! A [`Spawner`] decides how those threads are built.
use crate::Error;
use std::thread;

/// Builds the threads that chain continuations run on.
///
/// # Examples
///
/// ```
/// use multi_promise::{Promise, Spawner};
///
/// let spawner = Spawner::new().name("pipeline").stack_size(256 * 1024);
/// let p = Promise::<i32, String>::new();
/// let child = p.then_on(&spawner, |x| Ok(x + 1)).unwrap();
/// p.fulfill(1);
/// assert_eq!(child.wait(), Ok(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Spawner {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Spawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name given to continuation threads.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the stack size of continuation threads, in bytes.
    #[inline]
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Starts `task` on a detached thread.
    pub fn spawn<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let label = self.name.clone().unwrap_or_else(|| "continuation".into());
        builder.spawn(move || {
            log::trace!("{label} starting");
            task();
            log::trace!("{label} exiting");
        })?;
        Ok(())
    }

    /// Like [`Spawner::spawn`] but panics when the thread can't be created,
    /// the way [`std::thread::spawn`] does.
    pub(crate) fn spawn_or_panic<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(err) = self.spawn(task) {
            panic!("{err}");
        }
    }
}
