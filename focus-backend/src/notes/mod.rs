//! Notes core: the single-document store, the filesystem change
//! watcher, and the live-update broadcaster.
//!
//! Data flow: a write (ours or an external editor's) mutates the file,
//! the watcher debounces the resulting change signals, reads fresh
//! content, and hands one `ChangeEvent` to the broadcaster, which fans
//! it out to every subscribed tab.

pub mod broadcast;
pub mod store;
pub mod watcher;

pub use broadcast::{ChangeEvent, NoteBroadcaster};
pub use store::NotesStore;
pub use watcher::ChangeWatcher;
