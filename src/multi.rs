//! A growable promise. A [`MultiPromise`] buffers every value pushed into it
//! until it is completed or fails, and replays that buffer, in order, to each
//! consumer that asks, however late it arrives.
//!
use crate::{Error, Spawner};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::sync::Arc;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

/// A stream of values that ends once, either with [`MultiPromise::complete`]
/// or with a sticky [`MultiPromise::error`].
///
/// Anything that reaches an ended `MultiPromise` is dropped silently: late
/// values, a second `complete`, every error after the first. Racing producers
/// never have to agree on who ends the stream.
///
/// Concurrent [`MultiPromise::fulfill`] calls are serialized by one lock, so
/// every consumer sees the same order. Which of two racing producers lands
/// first is unspecified.
///
/// # Examples
///
/// ```
/// use multi_promise::MultiPromise;
/// use std::thread;
/// let stream = MultiPromise::<i32, String>::new();
/// let producer = stream.clone();
/// let task = thread::spawn(move || {
///     producer.fulfill(1);
///     producer.error("💥".into());
///     producer.fulfill(2);
/// });
/// task.join().expect("The task thread has panicked");
/// assert_eq!(stream.wait(), (vec![1], Some("💥".to_string())));
/// ```
pub struct MultiPromise<T, E> {
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    changed: Condvar,
}

struct State<T, E> {
    values: Vec<T>,
    error: Option<E>,
    done: bool,
    waker: Vec<Waker>,
}

impl<T, E> State<T, E> {
    fn terminate(&mut self, error: Option<E>) {
        self.error = error;
        self.done = true;
        for waker in self.waker.drain(..) {
            waker.wake()
        }
    }
}

impl<T, E> Clone for MultiPromise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Default for MultiPromise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for MultiPromise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MultiPromise")
            .field("len", &state.values.len())
            .field("failed", &state.error.is_some())
            .field("done", &state.done)
            .finish()
    }
}

impl<T, E> MultiPromise<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    values: vec![],
                    error: None,
                    done: false,
                    waker: vec![],
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Appends `value`. Ignored once the stream has ended.
    pub fn fulfill(&self, value: T) {
        let mut state = self.inner.state.lock();
        if state.done {
            log::trace!("fulfill after the stream ended, value dropped");
            return;
        }
        state.values.push(value);
        self.inner.changed.notify_all();
    }

    /// Ends the stream without an error. Ignored once the stream has ended.
    pub fn complete(&self) {
        let mut state = self.inner.state.lock();
        if state.done {
            log::trace!("complete after the stream ended, ignored");
            return;
        }
        state.terminate(None);
        self.inner.changed.notify_all();
    }

    /// Ends the stream with `err`. Only the first error is kept.
    pub fn error(&self, err: E) {
        let mut state = self.inner.state.lock();
        if state.done {
            log::trace!("error after the stream ended, ignored");
            return;
        }
        state.terminate(Some(err));
        self.inner.changed.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.inner.state.lock().done
    }

    /// Number of values buffered so far.
    pub fn len(&self) -> usize {
        self.inner.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone, E: Clone> MultiPromise<T, E> {
    /// Blocks until the stream ends and returns every value it holds together
    /// with its error, if it failed. Values pushed before a failure are kept.
    pub fn wait(&self) -> (Vec<T>, Option<E>) {
        let mut state = self.inner.state.lock();
        while !state.done {
            self.inner.changed.wait(&mut state);
        }
        (state.values.clone(), state.error.clone())
    }

    /// Feeds every value to `on_value` in the order it was pushed, including
    /// values pushed while this call is running, then returns once the
    /// stream has ended. If it ended with an error, `on_error` gets that
    /// error after the last value.
    ///
    /// The callbacks run without the lock held and may push into this or
    /// any other promise.
    ///
    /// # Examples
    ///
    /// ```
    /// use multi_promise::MultiPromise;
    /// use std::thread;
    /// let stream = MultiPromise::<u32, String>::new();
    /// let producer = stream.clone();
    /// let task = thread::spawn(move || {
    ///     for n in 0..100 {
    ///         producer.fulfill(n);
    ///     }
    ///     producer.complete();
    /// });
    /// let mut seen = vec![];
    /// stream.receive(|n| seen.push(n), |_| unreachable!());
    /// task.join().expect("The task thread has panicked");
    /// assert_eq!(seen, (0..100).collect::<Vec<_>>());
    /// ```
    pub fn receive<V, R>(&self, mut on_value: V, on_error: R)
    where
        V: FnMut(T),
        R: FnOnce(E),
    {
        let mut cursor = 0;
        loop {
            let (batch, end) = {
                let mut state = self.inner.state.lock();
                // Checked and waited on under the same lock `fulfill` takes,
                // so a push can't slip in between.
                while cursor == state.values.len() && !state.done {
                    self.inner.changed.wait(&mut state);
                }
                let batch = state.values[cursor..].to_vec();
                cursor = state.values.len();
                let end = state.done.then(|| state.error.clone());
                (batch, end)
            };
            for value in batch {
                on_value(value);
            }
            if let Some(error) = end {
                if let Some(err) = error {
                    on_error(err);
                }
                return;
            }
        }
    }
}

impl<T, E> MultiPromise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Drains this stream on a new thread into a fresh child.
    ///
    /// Each value goes through `on_value`: `Ok` is pushed into the child,
    /// `Err` fails the child. If this stream fails, `on_error` rewrites the
    /// error for the child. The child is completed once this stream is
    /// drained.
    ///
    /// After the child has failed, the continuation pushes nothing more:
    /// values still buffered or arriving in this stream are dropped from
    /// the child, though they stay in this stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use multi_promise::MultiPromise;
    /// let stream = MultiPromise::<i32, String>::new();
    /// for x in [-1, 0, 1] {
    ///     stream.fulfill(x);
    /// }
    /// stream.complete();
    /// let halves = stream.map(
    ///     |x| if x == 0 { Err("divide by zero".to_string()) } else { Ok(2 / x) },
    ///     |err| err,
    /// );
    /// assert_eq!(halves.wait(), (vec![-2], Some("divide by zero".to_string())));
    /// ```
    pub fn map<U, F, V, R>(&self, on_value: V, on_error: R) -> MultiPromise<U, F>
    where
        U: Send + 'static,
        F: Send + 'static,
        V: FnMut(T) -> Result<U, F> + Send + 'static,
        R: FnOnce(E) -> F + Send + 'static,
    {
        let child = MultiPromise::new();
        let continuation = self.continuation(child.clone(), on_value, on_error);
        Spawner::default().spawn_or_panic(continuation);
        child
    }

    pub fn map_on<U, F, V, R>(
        &self,
        spawner: &Spawner,
        on_value: V,
        on_error: R,
    ) -> Result<MultiPromise<U, F>, Error>
    where
        U: Send + 'static,
        F: Send + 'static,
        V: FnMut(T) -> Result<U, F> + Send + 'static,
        R: FnOnce(E) -> F + Send + 'static,
    {
        let child = MultiPromise::new();
        spawner.spawn(self.continuation(child.clone(), on_value, on_error))?;
        Ok(child)
    }

    fn continuation<U, F, V, R>(
        &self,
        child: MultiPromise<U, F>,
        mut on_value: V,
        on_error: R,
    ) -> impl FnOnce() + Send + 'static
    where
        U: Send + 'static,
        F: Send + 'static,
        V: FnMut(T) -> Result<U, F> + Send + 'static,
        R: FnOnce(E) -> F + Send + 'static,
    {
        let parent = self.clone();
        move || {
            let failed = Cell::new(false);
            parent.receive(
                |value| {
                    if failed.get() {
                        return;
                    }
                    match on_value(value) {
                        Ok(mapped) => child.fulfill(mapped),
                        Err(err) => {
                            log::debug!("map callback failed, dropping the rest of the stream");
                            failed.set(true);
                            child.error(err);
                        }
                    }
                },
                |err| {
                    if !failed.get() {
                        log::debug!("forwarding stream error to mapped child");
                        child.error(on_error(err));
                    }
                },
            );
            child.complete();
        }
    }

    /// [`MultiPromise::map`] with errors passed through unchanged.
    pub fn then<U, V>(&self, on_value: V) -> MultiPromise<U, E>
    where
        U: Send + 'static,
        V: FnMut(T) -> Result<U, E> + Send + 'static,
    {
        self.map(on_value, |err| err)
    }

    pub fn then_on<U, V>(
        &self,
        spawner: &Spawner,
        on_value: V,
    ) -> Result<MultiPromise<U, E>, Error>
    where
        U: Send + 'static,
        V: FnMut(T) -> Result<U, E> + Send + 'static,
    {
        self.map_on(spawner, on_value, |err| err)
    }

    /// [`MultiPromise::map`] with values passed through unchanged.
    pub fn on_error<R>(&self, on_error: R) -> MultiPromise<T, E>
    where
        R: FnOnce(E) -> E + Send + 'static,
    {
        self.map(Ok, on_error)
    }

    pub fn on_error_on<R>(
        &self,
        spawner: &Spawner,
        on_error: R,
    ) -> Result<MultiPromise<T, E>, Error>
    where
        R: FnOnce(E) -> E + Send + 'static,
    {
        self.map_on(spawner, Ok, on_error)
    }
}

impl<T: Clone, E: Clone> Future for MultiPromise<T, E> {
    type Output = (Vec<T>, Option<E>);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state.lock();
        if state.done {
            return Poll::Ready((state.values.clone(), state.error.clone()));
        }
        if !state.waker.iter().any(|w| w.will_wake(cx.waker())) {
            state.waker.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
