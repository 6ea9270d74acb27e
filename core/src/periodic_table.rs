use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chemical elements, numbered by their nuclear charge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum ElementType {
    H = 1,
    He,
    Li,
    Be,
    B,
    C,
    N,
    O,
    F,
    Ne,
    Na,
    Mg,
    Al,
    Si,
    P,
    S,
    Cl,
    Ar,
}

impl ElementType {
    const ALL: [ElementType; 18] = [
        Self::H,
        Self::He,
        Self::Li,
        Self::Be,
        Self::B,
        Self::C,
        Self::N,
        Self::O,
        Self::F,
        Self::Ne,
        Self::Na,
        Self::Mg,
        Self::Al,
        Self::Si,
        Self::P,
        Self::S,
        Self::Cl,
        Self::Ar,
    ];

    pub fn from_atomic_number(number: u32) -> Option<Self> {
        Self::ALL.get((number as usize).checked_sub(1)?).copied()
    }

    pub fn atomic_number(self) -> u32 {
        self as u32
    }
}

impl FromStr for ElementType {
    type Err = String;

    /// Accepts either an element symbol ("He") or an atomic number ("2"), which is how
    /// Basis Set Exchange files key their elements.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = value.parse::<u32>() {
            return Self::from_atomic_number(number)
                .ok_or_else(|| format!("unsupported atomic number {number}"));
        }

        Self::ALL
            .into_iter()
            .find(|element| format!("{element:?}").eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown element {value}"))
    }
}

impl TryFrom<String> for ElementType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
