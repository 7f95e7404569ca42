use std::fmt;

use serde::Serialize;

/// Identity of a component kind.
///
/// A kind is a zero-payload tag naming a capability of the wrapped value.
/// Its position in the specialization tree, its requirements and its
/// conflicts all live in the [`KindRegistry`](crate::KindRegistry); the
/// identity itself is just a stable name, so it can be declared as a
/// `const` next to the blueprints producing it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Kind(&'static str);

impl Kind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}
