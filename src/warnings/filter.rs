//! Warning suppression policy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::WarningOptions;
use crate::domain::Warning;

/// Which warnings an action hides before reporting.
///
/// Built once per action execution and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningPolicy {
    hide_all: bool,
    hide_codes: BTreeSet<u32>,
}

impl WarningPolicy {
    /// Surface everything.
    pub fn show_all() -> Self {
        Self::default()
    }

    /// Surface nothing.
    pub fn hide_all() -> Self {
        Self {
            hide_all: true,
            hide_codes: BTreeSet::new(),
        }
    }

    /// Hide the listed codes, surface the rest.
    pub fn hiding_codes(codes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            hide_all: false,
            hide_codes: codes.into_iter().collect(),
        }
    }

    /// Combine an action's configured options with invocation options.
    ///
    /// The invocation's `hide_sql_warnings` overrides the action's; its
    /// codes are added to the action's codes.
    pub fn resolve(action: &WarningOptions, invocation: &WarningOptions) -> Self {
        let hide_all = invocation
            .hide_sql_warnings
            .or(action.hide_sql_warnings)
            .unwrap_or(false);

        let hide_codes = action
            .codes()
            .into_iter()
            .chain(invocation.codes())
            .collect();

        Self {
            hide_all,
            hide_codes,
        }
    }

    pub fn hides_all(&self) -> bool {
        self.hide_all
    }

    pub fn hidden_codes(&self) -> &BTreeSet<u32> {
        &self.hide_codes
    }

    /// Whether a single warning survives.
    pub fn allows(&self, warning: &Warning) -> bool {
        !self.hide_all && !self.hide_codes.contains(&warning.code)
    }

    /// The subsequence of `warnings` this policy lets through, in order.
    pub fn apply(&self, warnings: &[Warning]) -> Vec<Warning> {
        if self.hide_all {
            return Vec::new();
        }

        warnings
            .iter()
            .filter(|w| self.allows(w))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodeList;
    use crate::domain::WarningLevel;

    fn warning(code: u32, row: u64) -> Warning {
        Warning {
            code,
            message: format!("code {} at row {}", code, row),
            severity: WarningLevel::Warning,
            source_table: "events".to_string(),
            row_number: Some(row),
        }
    }

    fn sample() -> Vec<Warning> {
        vec![warning(1264, 1), warning(1366, 1), warning(1366, 2)]
    }

    #[test]
    fn test_hide_all_returns_nothing() {
        let policy = WarningPolicy::hide_all();
        assert!(policy.apply(&sample()).is_empty());
        assert!(policy.apply(&[]).is_empty());
    }

    #[test]
    fn test_show_all_is_identity() {
        let warnings = sample();
        assert_eq!(WarningPolicy::show_all().apply(&warnings), warnings);
    }

    #[test]
    fn test_hide_single_code() {
        let surfaced = WarningPolicy::hiding_codes([1366]).apply(&sample());
        assert_eq!(surfaced.len(), 1);
        assert_eq!(surfaced[0].code, 1264);
    }

    #[test]
    fn test_hide_every_present_code() {
        let surfaced = WarningPolicy::hiding_codes([1264, 1366]).apply(&sample());
        assert!(surfaced.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let warnings = vec![warning(1265, 3), warning(1264, 1), warning(1265, 2)];
        let surfaced = WarningPolicy::hiding_codes([1264]).apply(&warnings);
        let rows: Vec<_> = surfaced.iter().map(|w| w.row_number).collect();
        assert_eq!(rows, vec![Some(3), Some(2)]);
    }

    #[test]
    fn test_resolve_overrides_and_augments() {
        let action = WarningOptions {
            hide_sql_warnings: Some(true),
            hide_sql_warning_codes: Some(CodeList::One(1264)),
        };
        let invocation = WarningOptions {
            hide_sql_warnings: Some(false),
            hide_sql_warning_codes: Some(CodeList::Many(vec![1366, 1265])),
        };

        let policy = WarningPolicy::resolve(&action, &invocation);
        assert!(!policy.hides_all());
        assert_eq!(
            policy.hidden_codes().iter().copied().collect::<Vec<_>>(),
            vec![1264, 1265, 1366]
        );
    }

    #[test]
    fn test_resolve_defaults_to_show_all() {
        let policy = WarningPolicy::resolve(&WarningOptions::default(), &WarningOptions::default());
        assert_eq!(policy, WarningPolicy::show_all());
    }
}
