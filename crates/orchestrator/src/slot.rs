use std::fmt::{self, Display};

/// One of the two alternating node-set slots.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Slot {
    /// The slot a cluster is bootstrapped into.
    A,

    /// The alternate slot.
    B,
}

impl Slot {
    /// Both slots, in resolution order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Label of the slot as known to the fleet controller.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    /// First slot that is not the active one.
    #[must_use]
    pub fn complement_of(active: Option<&str>) -> Self {
        Self::ALL
            .into_iter()
            .find(|slot| Some(slot.as_str()) != active)
            .unwrap_or(Self::A)
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
