use crate::dataset::DatasetSummary;
use std::fmt;

/// Text report formatter for a built dataset
pub struct TextReport<'a> {
    summary: &'a DatasetSummary,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(summary: &'a DatasetSummary) -> Self {
        Self { summary }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        let (c, h, w) = s.image_shape;

        writeln!(f, "Dataset Summary")?;
        writeln!(f, "===============")?;
        writeln!(f)?;
        writeln!(f, "File:      {}", s.path.display())?;
        writeln!(f, "Images:    ({}, {}, {}, {})", s.rows, c, h, w)?;
        writeln!(f, "Labels:    ({}, 1)", s.rows)?;
        writeln!(f, "Meta:      ({}, {})", s.rows, s.meta_fields.len())?;
        writeln!(f, "Fields:    {}", s.meta_fields.join(", "))?;
        writeln!(f)?;

        writeln!(f, "Labels")?;
        writeln!(f, "------")?;
        writeln!(f, "Positive:  {}", s.stats.positive)?;
        writeln!(f, "Negative:  {}", s.stats.negative)?;
        writeln!(f, "Ratio:     {:.6}", s.positive_ratio)?;

        Ok(())
    }
}
