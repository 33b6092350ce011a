use nalgebra::Point3;

pub const DEFAULT_TAG_DELIMITER: &str = ":";

/// Identity and force-field metadata of one particle.
///
/// Coordinates are not part of the property record: they live in the
/// [`CoordinateStore`](super::coords::CoordinateStore) of the owning body and are
/// combined with the property only when an [`Atom`] snapshot is taken.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomProperty {
    /// Atom type name (e.g., "CA", "N", "CB").
    pub atom_type: String,
    /// Chemical element symbol.
    pub element: String,
    /// Residue name (e.g., "LEU").
    pub residue_type: String,
    /// Chain identifier.
    pub chain_id: String,
    /// Residue sequence number; may be negative.
    pub residue_id: i32,
    /// Atom serial number.
    pub serial: i32,
    /// Partial charge in elementary charge units.
    pub charge: f64,
    /// Force-field category indexing the parameter table.
    pub type_id: usize,
}

impl Default for AtomProperty {
    fn default() -> Self {
        Self {
            atom_type: "X".to_string(),
            element: "X".to_string(),
            residue_type: "XXX".to_string(),
            chain_id: "X".to_string(),
            residue_id: 1,
            serial: 1,
            charge: 0.0,
            type_id: 0,
        }
    }
}

impl AtomProperty {
    pub fn new(atom_type: &str) -> Self {
        Self {
            atom_type: atom_type.to_string(),
            ..Self::default()
        }
    }

    /// Residue tag made of residue name, residue number and chain id.
    pub fn residue_tag(&self, delimiter: &str) -> String {
        format!(
            "{}{}{}{}{}",
            self.residue_type, delimiter, self.residue_id, delimiter, self.chain_id
        )
    }
}

/// A copied snapshot of one particle: its properties and effective coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub property: AtomProperty,
    pub coords: Point3<f64>,
}

impl Atom {
    pub fn new(property: AtomProperty, coords: Point3<f64>) -> Self {
        Self { property, coords }
    }

    pub fn distance_to(&self, other: &Atom) -> f64 {
        (self.coords - other.coords).norm()
    }
}
