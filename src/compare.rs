//! Rule-based comparison of two parsed attribute records.
//!
//! Any disagreement on a field set on both sides is a hard veto. Agreement on
//! enough identity fields is a decisive match. Everything else is left to the
//! web-evidence judge.

use serde::Serialize;

use crate::attributes::ProductAttributes;

/// Angles closer than this are treated as equal.
const ANGLE_TOLERANCE: f64 = 0.01;

/// Outcome of [`compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardVerdict {
    /// Whether the rules reached a conclusion on their own.
    pub decidable: bool,
    /// Same-product decision. Meaningless when `decidable` is false.
    pub same: bool,
    /// Veto reason for a decisive mismatch, empty otherwise.
    pub reasons: Vec<String>,
}

impl HardVerdict {
    fn mismatch(reason: &str) -> Self {
        Self {
            decidable: true,
            same: false,
            reasons: vec![reason.to_string()],
        }
    }

    fn matched() -> Self {
        Self {
            decidable: true,
            same: true,
            reasons: Vec::new(),
        }
    }

    fn undecidable() -> Self {
        Self {
            decidable: false,
            same: false,
            reasons: Vec::new(),
        }
    }
}

/// Applies the veto rules in order and returns the first that fires.
pub fn compare(a: &ProductAttributes, b: &ProductAttributes) -> HardVerdict {
    if differs(&a.material, &b.material) {
        return HardVerdict::mismatch("material mismatch");
    }
    if differs(&a.fitting_type, &b.fitting_type) {
        return HardVerdict::mismatch("type mismatch");
    }
    if differs(&a.schedule, &b.schedule) {
        return HardVerdict::mismatch("schedule mismatch");
    }
    if let (Some(x), Some(y)) = (a.angle_deg, b.angle_deg) {
        if (x - y).abs() > ANGLE_TOLERANCE {
            return HardVerdict::mismatch("angle mismatch");
        }
    }
    // ends are already deduplicated and sorted, so equality is set equality
    if !a.ends.is_empty() && !b.ends.is_empty() && a.ends != b.ends {
        return HardVerdict::mismatch("end type mismatch");
    }
    if !a.sizes.is_empty() && !b.sizes.is_empty() && !sizes_match(&a.sizes, &b.sizes) {
        return HardVerdict::mismatch("size mismatch");
    }

    let sizes_on_both = !a.sizes.is_empty() && !b.sizes.is_empty();
    let angle_on_both = a.angle_deg.is_some() && b.angle_deg.is_some();
    if a.shared_identity_keys(b) >= 2 && (sizes_on_both || angle_on_both) {
        return HardVerdict::matched();
    }
    HardVerdict::undecidable()
}

fn differs<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

fn sizes_match(a: &[String], b: &[String]) -> bool {
    match (a.len(), b.len()) {
        (3, 3) => {
            let mut left = a.to_vec();
            let mut right = b.to_vec();
            left.sort();
            right.sort();
            left == right
        }
        (2, 2) => a == b || (a[0] == b[1] && a[1] == b[0]),
        _ => a == b,
    }
}
