//! Pluggable serialization method registry.
//!
//! A small process-wide table mapping a method name to a `(reader, writer)`
//! pair, so alternative wire formats can sit alongside the default
//! "tree-store" codec and be selected by name. The table is expected to be
//! populated once near process start and treated as read-only afterwards;
//! the `Mutex` below exists to make that startup race safe, not to support
//! a hot-swapping codec under concurrent load.

use std::sync::{Mutex, OnceLock};

use tracing::{debug, warn};

use crate::bitmap::BitmapTree;
use crate::codec::{self, BitmapReadSource, BitmapWriteSink, CodecError};

/// Upper bound on the number of registered methods, matching the small fixed
/// table size the original library allocates.
pub const MAX_METHODS: usize = 4;

/// The name under which the built-in tree-store codec registers itself.
pub const TREE_STORE_METHOD: &str = "tree-store";

pub(crate) type ReaderFn = fn(&mut dyn BitmapReadSource) -> Result<BitmapTree, CodecError>;
pub(crate) type WriterFn = fn(&BitmapTree, &mut dyn BitmapWriteSink);

/// Failure modes for registering or selecting a serialization method.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("serialization method table is full (max {MAX_METHODS})")]
    TableFull,
    #[error("no serialization method registered under {name:?}")]
    UnknownMethod { name: String },
}

struct Entry {
    name: &'static str,
    reader: ReaderFn,
    writer: WriterFn,
}

struct Registry {
    entries: Vec<Entry>,
    active: usize,
}

impl Registry {
    fn with_default() -> Self {
        Self {
            entries: vec![Entry {
                name: TREE_STORE_METHOD,
                reader: codec::read_tree_store,
                writer: codec::write_tree_store,
            }],
            active: 0,
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| Mutex::new(Registry::with_default()))
}

/// Registers a `(reader, writer)` pair under `name`. If `make_active` is set,
/// the newly registered method also becomes the active codec used by
/// [`BitmapTree::write`](crate::BitmapTree::write) and
/// [`BitmapTree::read`](crate::BitmapTree::read).
///
/// Registration is additive: registering the same `name` twice appends a
/// second entry rather than failing (matching the original library, which
/// never checks for a duplicate name). Selection and lookup always find the
/// first entry with a matching name. Fails only if the table already holds
/// `MAX_METHODS` entries.
pub fn register_method(
    name: &'static str,
    reader: ReaderFn,
    writer: WriterFn,
    make_active: bool,
) -> Result<(), RegistryError> {
    let mut reg = registry().lock().expect("registry mutex poisoned");
    if reg.entries.len() >= MAX_METHODS {
        return Err(RegistryError::TableFull);
    }
    reg.entries.push(Entry { name, reader, writer });
    debug!(name, make_active, "registered serialization method");
    if make_active {
        reg.active = reg.entries.len() - 1;
    }
    Ok(())
}

/// Switches the active codec to the one registered under `name`.
pub fn select_method(name: &str) -> Result<(), RegistryError> {
    let mut reg = registry().lock().expect("registry mutex poisoned");
    match reg.find(name) {
        Some(idx) => {
            reg.active = idx;
            debug!(name, "selected active serialization method");
            Ok(())
        }
        None => {
            warn!(name, "selected unknown serialization method");
            Err(RegistryError::UnknownMethod { name: name.into() })
        }
    }
}

/// The name of the currently active serialization method.
pub fn active_method() -> &'static str {
    let reg = registry().lock().expect("registry mutex poisoned");
    reg.entries[reg.active].name
}

pub(crate) fn active_reader() -> ReaderFn {
    let reg = registry().lock().expect("registry mutex poisoned");
    reg.entries[reg.active].reader
}

pub(crate) fn active_writer() -> WriterFn {
    let reg = registry().lock().expect("registry mutex poisoned");
    reg.entries[reg.active].writer
}

/// Held by every test (in this module or elsewhere in the crate) that
/// registers or selects a method, so the process-wide registry doesn't race
/// across test threads.
#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Number of currently registered methods. Test-only: lets tests fill the
/// table to its cap without hard-coding how many other tests in the same
/// binary have already registered something. Callers must hold [`TEST_LOCK`].
#[cfg(test)]
pub(crate) fn entry_count() -> usize {
    registry().lock().expect("registry mutex poisoned").entries.len()
}
