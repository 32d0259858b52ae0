use crate::{Error, Spawner};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

/// A `Promise` settles exactly once, with a value or with an error. Every
/// clone shares the same slot, so the producer and any number of consumers
/// can each hold one.
///
/// Settling twice is a programming error: [`Promise::fulfill`] and
/// [`Promise::error`] panic, [`Promise::try_fulfill`] and
/// [`Promise::try_error`] report [`Error::AlreadySettled`].
///
/// # Examples
///
/// ```
/// use multi_promise::Promise;
/// use std::thread;
/// let promise = Promise::<String, String>::new();
/// let consumer = promise.clone();
/// let consumer2 = promise.clone();
/// let task1 = thread::spawn(move || consumer.wait());
/// let task2 = thread::spawn(move || consumer2.wait());
/// promise.fulfill("Hi".into());
/// assert_eq!(task1.join().unwrap(), Ok("Hi".to_string()));
/// assert_eq!(task2.join().unwrap(), Ok("Hi".to_string()));
/// ```
pub struct Promise<T, E> {
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    settled: Condvar,
}

struct State<T, E> {
    value: Option<Result<T, E>>,
    waker: Vec<Waker>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: None,
                    waker: vec![],
                }),
                settled: Condvar::new(),
            }),
        }
    }

    /// Settles with `value`.
    ///
    /// # Panics
    ///
    /// If the promise already holds a value or an error.
    pub fn fulfill(&self, value: T) {
        if let Err(err) = self.try_fulfill(value) {
            panic!("cannot fulfill: {err}");
        }
    }

    /// Settles with `err`.
    ///
    /// # Panics
    ///
    /// If the promise already holds a value or an error.
    pub fn error(&self, err: E) {
        if let Err(misuse) = self.try_error(err) {
            panic!("cannot error: {misuse}");
        }
    }

    pub fn try_fulfill(&self, value: T) -> Result<(), Error> {
        self.settle(Ok(value))
    }

    pub fn try_error(&self, err: E) -> Result<(), Error> {
        self.settle(Err(err))
    }

    fn settle(&self, result: Result<T, E>) -> Result<(), Error> {
        let mut state = self.inner.state.lock();
        if state.value.is_some() {
            return Err(Error::AlreadySettled);
        }
        state.value = Some(result);
        self.inner.settled.notify_all();
        for waker in state.waker.drain(..) {
            waker.wake()
        }
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }
}

impl<T: Clone, E: Clone> Promise<T, E> {
    /// Blocks until the promise settles and returns a copy of the outcome.
    /// Returns immediately once settled; every caller sees the same result.
    pub fn wait(&self) -> Result<T, E> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(value) = &state.value {
                return value.clone();
            }
            self.inner.settled.wait(&mut state);
        }
    }

    /// The outcome if already settled, without blocking.
    pub fn try_get(&self) -> Option<Result<T, E>> {
        self.inner.state.lock().value.clone()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Hands the settled outcome, value or error, to `callback` on a new
    /// thread and settles the returned child with whatever it produces.
    pub fn map<U, F, C>(&self, callback: C) -> Promise<U, F>
    where
        U: Send + 'static,
        F: Send + 'static,
        C: FnOnce(Result<T, E>) -> Result<U, F> + Send + 'static,
    {
        let child = Promise::new();
        Spawner::default().spawn_or_panic(self.continuation(child.clone(), callback));
        child
    }

    pub fn map_on<U, F, C>(&self, spawner: &Spawner, callback: C) -> Result<Promise<U, F>, Error>
    where
        U: Send + 'static,
        F: Send + 'static,
        C: FnOnce(Result<T, E>) -> Result<U, F> + Send + 'static,
    {
        let child = Promise::new();
        spawner.spawn(self.continuation(child.clone(), callback))?;
        Ok(child)
    }

    fn continuation<U, F, C>(
        &self,
        child: Promise<U, F>,
        callback: C,
    ) -> impl FnOnce() + Send + 'static
    where
        U: Send + 'static,
        F: Send + 'static,
        C: FnOnce(Result<T, E>) -> Result<U, F> + Send + 'static,
    {
        let parent = self.clone();
        move || {
            let result = callback(parent.wait());
            if result.is_err() {
                log::debug!("chained promise settled with an error");
            }
            // The continuation is the only writer of `child`.
            let _ = child.settle(result);
        }
    }

    /// Runs `callback` on the parent's value. An error skips the callback and
    /// is passed to the child unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use multi_promise::Promise;
    /// let p = Promise::<i32, String>::new();
    /// let child = p.then(|x| Ok(vec![x]));
    /// p.fulfill(8);
    /// assert_eq!(child.wait(), Ok(vec![8]));
    /// ```
    pub fn then<U, C>(&self, callback: C) -> Promise<U, E>
    where
        U: Send + 'static,
        C: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.map(move |result| result.and_then(callback))
    }

    pub fn then_on<U, C>(&self, spawner: &Spawner, callback: C) -> Result<Promise<U, E>, Error>
    where
        U: Send + 'static,
        C: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.map_on(spawner, move |result| result.and_then(callback))
    }

    /// Runs `callback` on the parent's error, which may recover with a value
    /// or replace the error. A value skips the callback.
    pub fn on_error<C>(&self, callback: C) -> Promise<T, E>
    where
        C: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.map(move |result| result.or_else(callback))
    }

    pub fn on_error_on<C>(&self, spawner: &Spawner, callback: C) -> Result<Promise<T, E>, Error>
    where
        C: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.map_on(spawner, move |result| result.or_else(callback))
    }
}

impl<T: Clone, E: Clone> Future for Promise<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state.lock();
        match state.value {
            Some(ref value) => Poll::Ready(value.clone()),
            None => {
                if !state.waker.iter().any(|w| w.will_wake(cx.waker())) {
                    state.waker.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
