/// Breast laterality of a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum Laterality {
    Unknown,
    Left,
    Right,
}

impl Laterality {
    /// Returns whether this laterality is unknown
    pub fn is_unknown(&self) -> bool {
        matches!(self, Laterality::Unknown)
    }

    /// Returns whether images of this breast are flipped left to right
    ///
    /// Right breasts are mirrored so that every normalized image has the
    /// chest wall on the same side.
    pub fn is_mirrored(&self) -> bool {
        matches!(self, Laterality::Right)
    }

    /// Returns the one-letter code used in the crosswalk and dataset files
    pub fn code(&self) -> &'static str {
        match self {
            Laterality::Left => "L",
            Laterality::Right => "R",
            Laterality::Unknown => "",
        }
    }

    /// Parses a one-letter laterality code ("L"/"R", any case, surrounding
    /// whitespace ignored). Anything else is `Unknown`.
    pub fn from_code(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("l") {
            Laterality::Left
        } else if s.eq_ignore_ascii_case("r") {
            Laterality::Right
        } else {
            Laterality::Unknown
        }
    }
}
