//! Shared result alias.
//!
//! Each crate defines its own domain error enums and propagates them as
//! rootcause reports; this alias keeps the signatures short.

use rootcause::Report;

/// A `Result` whose error is a rootcause report over context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ParseIdError, SubId};

    fn parse_sub_id(raw: &str) -> Result<SubId, ParseIdError> {
        Ok(raw.parse::<SubId>()?)
    }

    #[test]
    fn domain_errors_propagate_as_reports() {
        assert_eq!(parse_sub_id("7").unwrap(), SubId::new(7));

        let report = parse_sub_id("seven").unwrap_err();
        assert!(report.to_string().contains("failed to parse SubId"));
    }
}
