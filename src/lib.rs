//! Incrementally maintained list operators over observable lists.
//!
//! A [`StateList`] is the mutable root. Operators such as [`ActiveList::filter`],
//! [`ActiveList::order_by`] or [`ActiveList::group_by`] return derived lists that stay
//! equal to the corresponding bulk computation after every mutation of their sources.
//! Items implementing [`NotifyPropertyChanged`] can also be re-evaluated in place when a
//! property listed in a [`Watched`] set changes.
//!
//! ```
//! use active_list::StateList;
//!
//! let s = StateList::from_vec(vec![3, 1, 2]);
//! let sorted = s.to_active_list().order_by(|x| *x);
//! assert_eq!(sorted.to_vec(), [1, 2, 3]);
//!
//! s.push(0);
//! assert_eq!(sorted.to_vec(), [0, 1, 2, 3]);
//! ```

mod change;
mod error;
mod list;
mod ops;
mod property;
mod state_list;
mod subscription;
mod utils;
mod value;
mod watcher;

pub use change::*;
pub use error::*;
pub use list::*;
pub use ops::*;
pub use property::*;
pub use state_list::*;
pub use subscription::*;
pub use value::*;
