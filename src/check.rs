//! Check results and the helpers rules use to build them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        };
        f.write_str(label)
    }
}

/// What a check function returns: a status plus an optional diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl Status {
    pub fn pass() -> Self {
        Self {
            status: CheckStatus::Pass,
            info: None,
        }
    }

    pub fn warn(info: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            info: Some(info.into()),
        }
    }

    pub fn fail(info: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            info: Some(info.into()),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

impl From<bool> for Status {
    fn from(passed: bool) -> Self {
        Self {
            status: if passed {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            info: None,
        }
    }
}

/// One entry of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl Check {
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status: status.status,
            info: status.info,
        }
    }

    pub fn fail(id: impl Into<String>, info: impl Into<String>) -> Self {
        Self::new(id, Status::fail(info))
    }
}

/// What a value is compared against in [`basic_check`]
pub enum Expected<T> {
    Value(T),
    OneOf(Vec<T>),
    Matching(Box<dyn Fn(&T) -> bool + Send + Sync>),
}

impl<T> Expected<T> {
    pub fn eq(value: T) -> Self {
        Expected::Value(value)
    }

    pub fn one_of(values: impl IntoIterator<Item = T>) -> Self {
        Expected::OneOf(values.into_iter().collect())
    }

    pub fn matching(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Expected::Matching(Box::new(predicate))
    }
}

impl<T: PartialEq> Expected<T> {
    fn accepts(&self, value: &T) -> bool {
        match self {
            Expected::Value(expected) => expected == value,
            Expected::OneOf(values) => values.contains(value),
            Expected::Matching(predicate) => predicate(value),
        }
    }
}

/// Pass when `value` is what was expected, fail otherwise. `info` is attached
/// to the status either way.
pub fn basic_check<T: PartialEq>(value: T, expected: Expected<T>, info: Option<String>) -> Status {
    Status {
        info,
        ..Status::from(expected.accepts(&value))
    }
}

/// Start a [`ComplexCheck`] over `source`
pub fn complex_check<T>(source: T, checker: impl FnOnce(&T) -> bool) -> ComplexCheck {
    ComplexCheck {
        passed: checker(&source),
        warning: false,
        info_on_failure: None,
        info_on_success: None,
    }
}

/// A check with a custom comparator, an optional downgrade to `warn`, and
/// separate diagnostics for success and failure. No info is emitted unless one
/// was supplied for the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ComplexCheck {
    passed: bool,
    warning: bool,
    info_on_failure: Option<String>,
    info_on_success: Option<String>,
}

impl ComplexCheck {
    pub fn warning(mut self) -> Self {
        self.warning = true;
        self
    }

    pub fn on_failure(mut self, info: impl Into<String>) -> Self {
        self.info_on_failure = Some(info.into());
        self
    }

    pub fn on_success(mut self, info: impl Into<String>) -> Self {
        self.info_on_success = Some(info.into());
        self
    }

    pub fn status(self) -> Status {
        if self.passed {
            Status {
                status: CheckStatus::Pass,
                info: self.info_on_success,
            }
        } else {
            Status {
                status: if self.warning {
                    CheckStatus::Warn
                } else {
                    CheckStatus::Fail
                },
                info: self.info_on_failure,
            }
        }
    }
}

impl From<ComplexCheck> for Status {
    fn from(check: ComplexCheck) -> Self {
        check.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_check_value() {
        assert!(basic_check(4u8, Expected::eq(4), None).is_pass());
        let status = basic_check(3u8, Expected::eq(4), Some("3".to_string()));
        assert!(status.is_fail());
        assert_eq!(status.info.as_deref(), Some("3"));
    }

    #[test]
    fn test_basic_check_set_and_predicate() {
        assert!(basic_check(7u8, Expected::one_of([6, 7, 8]), None).is_pass());
        assert!(basic_check(3u8, Expected::one_of([6, 7, 8]), None).is_fail());
        assert!(basic_check(40u16, Expected::matching(|v| *v >= 36), None).is_pass());
    }

    #[test]
    fn test_complex_check_omits_info_when_absent() {
        let status = complex_check(10u64, |v| *v == 11).status();
        assert_eq!(status, Status::from(false));
        assert!(status.info.is_none());

        let json = serde_json::to_string(&Check::new("pointCount", status)).unwrap();
        assert_eq!(json, r#"{"id":"pointCount","status":"fail"}"#);
    }

    #[test]
    fn test_complex_check_warning_and_messages() {
        let status = complex_check(None::<u8>, |v| v.is_some())
            .warning()
            .on_failure("missing")
            .on_success("present")
            .status();
        assert_eq!(status, Status::warn("missing"));

        let status = complex_check(Some(1u8), |v| v.is_some())
            .warning()
            .on_success("present")
            .status();
        assert_eq!(status.status, CheckStatus::Pass);
        assert_eq!(status.info.as_deref(), Some("present"));
    }

    #[test]
    fn test_status_serialization() {
        let check = Check::fail("minorVersion", "3");
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["info"], "3");
        assert_eq!(CheckStatus::Warn.to_string(), "warn");
    }

    #[test]
    fn test_status_ordering() {
        assert!(CheckStatus::Pass < CheckStatus::Warn);
        assert!(CheckStatus::Warn < CheckStatus::Fail);
    }
}
