//! Rule and overlay table persistence port trait.

use crate::domain::error::MethodologyError;
use crate::domain::overlay::OverlayRecord;
use crate::domain::rule::{MethodologyRule, RuleRow};
use std::path::Path;

pub trait TablePort {
    fn write_rules(&self, rules: &[MethodologyRule], path: &Path) -> Result<(), MethodologyError>;

    fn write_overlays(
        &self,
        overlays: &[OverlayRecord],
        path: &Path,
    ) -> Result<(), MethodologyError>;

    /// Rows of a persisted rule table, MOB bounds parsed to integers.
    fn read_rules(&self, path: &Path) -> Result<Vec<RuleRow>, MethodologyError>;
}
