use std::fmt;
use std::sync::{Arc, Weak};

/// Identity of a supervised execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle owned by one thread or task that wants to be supervised.
///
/// The handle doubles as the unit's liveness token: if it is dropped while
/// the unit is still registered, the monitor treats the unit as terminated
/// and reports it. Move it into the thread/task it stands for so it drops
/// when that work ends, including by panic.
#[derive(Debug)]
pub struct UnitHandle {
    id: UnitId,
    alive: Arc<()>,
}

impl UnitHandle {
    pub(crate) fn new(id: UnitId) -> Self {
        Self { id, alive: Arc::new(()) }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub(crate) fn liveness(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }
}
