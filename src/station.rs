//! The ground stations and the quantities they record.

use std::fmt;
use strum_macros::{AsStaticStr, EnumIter, EnumString};

/// The fixed ground stations with sodar installations.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, AsStaticStr, EnumIter, Hash)]
pub enum Station {
    /// The McRae creek site.
    #[strum(to_string = "McRae", serialize = "mcrae", serialize = "MCRAE")]
    McRae,
    /// The primary meteorological site.
    #[strum(to_string = "Primet", serialize = "primet", serialize = "PRIMET")]
    Primet,
}

impl Station {
    /// The station's directory name under an archive root.
    pub fn as_static_str(self) -> &'static str {
        use strum::AsStaticRef;
        self.as_static()
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Station::*;

        match *self {
            McRae => write!(f, "{}", stringify!(McRae)),
            Primet => write!(f, "{}", stringify!(Primet)),
        }
    }
}

/// A measured variable, recorded across time and height.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, AsStaticStr, EnumIter, Hash)]
pub enum Quantity {
    /// Wind speed.
    #[strum(to_string = "speed", serialize = "SPEED")]
    Speed,
    /// Wind direction in angular degrees.
    #[strum(to_string = "direction", serialize = "DIRECTION")]
    Direction,
}

impl Quantity {
    /// The key a raw archive reader is queried with.
    pub fn as_static_str(self) -> &'static str {
        use strum::AsStaticRef;
        self.as_static()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_static_str())
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
