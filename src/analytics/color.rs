//! Picks a chart color for each expense category.

/// The colors used for expense categories unless another palette is configured.
pub const DEFAULT_PALETTE: [&str; 7] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6",
];

/// The label used for expenses whose category could not be found.
pub const UNCATEGORIZED_LABEL: &str = "Other";

/// Maps category names to colors from a fixed palette.
///
/// The same name always gets the same color, across requests and restarts, so that charts
/// drawn at different times agree with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorAssigner {
    palette: Vec<String>,
}

impl Default for ColorAssigner {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|color| color.to_string()).collect(),
        }
    }
}

impl ColorAssigner {
    /// Create a color assigner that picks from `palette`.
    ///
    /// Returns `None` if `palette` is empty.
    pub fn new(palette: Vec<String>) -> Option<Self> {
        if palette.is_empty() {
            None
        } else {
            Some(Self { palette })
        }
    }

    /// The colors this assigner picks from.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// The color for the category `category_name`.
    ///
    /// An empty name is treated as [UNCATEGORIZED_LABEL].
    pub fn color_for(&self, category_name: &str) -> &str {
        let name = if category_name.is_empty() {
            UNCATEGORIZED_LABEL
        } else {
            category_name
        };

        let index = name_hash(name).unsigned_abs() % self.palette.len() as u64;

        &self.palette[index as usize]
    }
}

/// A deterministic hash of `name` over its UTF-16 code units.
///
/// Each step computes `unit + ((hash << 5) - hash)`. The shift wraps like a 32-bit signed
/// integer, but the subtraction and addition do not, so the result can be wider than 32 bits.
pub fn name_hash(name: &str) -> i64 {
    name.encode_utf16().fold(0_i64, |hash, unit| {
        let shifted = i64::from((hash as i32).wrapping_shl(5));

        i64::from(unit).wrapping_add(shifted.wrapping_sub(hash))
    })
}
