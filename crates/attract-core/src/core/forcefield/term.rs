use std::ops::{Add, AddAssign};

/// Non-bonded energy split into its two components.
///
/// The total is defined as `vdw + coulomb` and never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    pub vdw: f64,
    pub coulomb: f64,
}

impl EnergyTerm {
    pub fn new(vdw: f64, coulomb: f64) -> Self {
        Self { vdw, coulomb }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.vdw + self.coulomb
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            vdw: self.vdw + rhs.vdw,
            coulomb: self.coulomb + rhs.coulomb,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.vdw += rhs.vdw;
        self.coulomb += rhs.coulomb;
    }
}
