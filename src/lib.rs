//! Blocking promises for threaded pipelines.
//!
//! [`Promise`] settles once with a value or an error. [`MultiPromise`] collects
//! any number of values and then ends, cleanly or with a sticky error. Both can
//! be chained with `then`, `on_error` and `map`; each link runs on its own
//! thread, reads the parent and writes a fresh child.
//!
//! ```
//! use multi_promise::MultiPromise;
//!
//! let numbers = MultiPromise::<i32, String>::new();
//! let doubled = numbers.then(|x| Ok(x * 2));
//! for x in 1..=3 {
//!     numbers.fulfill(x);
//! }
//! numbers.complete();
//! assert_eq!(doubled.wait(), (vec![2, 4, 6], None));
//! ```
pub mod multi;
pub mod promise;
pub mod spawn;

pub use multi::MultiPromise;
pub use promise::Promise;
pub use spawn::Spawner;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("promise already settled")]
    AlreadySettled,
    #[error("could not spawn continuation thread")]
    Spawn(#[from] std::io::Error),
}
