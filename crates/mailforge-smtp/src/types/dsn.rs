//! Delivery status notification requests (RFC 3461).

use std::fmt;

/// The `NOTIFY=` parameter of a `RCPT TO` command.
///
/// `NEVER` excludes every other condition, so a request that names it
/// alongside others collapses to `NEVER`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(try_from = "String")
)]
pub struct DsnNotify {
    never: bool,
    success: bool,
    failure: bool,
    delay: bool,
}

impl DsnNotify {
    /// No notifications under any condition.
    pub const NEVER: Self = Self {
        never: true,
        success: false,
        failure: false,
        delay: false,
    };

    /// Notify on successful delivery.
    pub const SUCCESS: Self = Self {
        never: false,
        success: true,
        failure: false,
        delay: false,
    };

    /// Notify on delivery failure.
    pub const FAILURE: Self = Self {
        never: false,
        success: false,
        failure: true,
        delay: false,
    };

    /// Notify when delivery is delayed.
    pub const DELAY: Self = Self {
        never: false,
        success: false,
        failure: false,
        delay: true,
    };

    /// Parses a comma separated list such as `SUCCESS,FAILURE`.
    ///
    /// Keywords are case-insensitive and surrounding whitespace is ignored.
    /// Returns `None` for an empty list or an unknown keyword.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let mut notify = Self::default();
        for keyword in s.split(',').map(str::trim) {
            let flag = match keyword.to_ascii_uppercase().as_str() {
                "NEVER" => Self::NEVER,
                "SUCCESS" => Self::SUCCESS,
                "FAILURE" => Self::FAILURE,
                "DELAY" => Self::DELAY,
                _ => return None,
            };
            notify = notify.union(flag);
        }
        Some(notify)
    }

    /// Combines two requests. `NEVER` on either side wins.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        if self.never || other.never {
            return Self::NEVER;
        }
        Self {
            never: false,
            success: self.success || other.success,
            failure: self.failure || other.failure,
            delay: self.delay || other.delay,
        }
    }

    /// Returns true if this is the `NEVER` request.
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.never
    }

    /// Returns true if no condition is requested.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !(self.never || self.success || self.failure || self.delay)
    }

    /// Renders the RCPT parameter, e.g. ` NOTIFY=SUCCESS,FAILURE`.
    ///
    /// Returns an empty string for an empty request.
    #[must_use]
    pub fn to_param(self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" NOTIFY={self}")
        }
    }
}

impl TryFrom<String> for DsnNotify {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid DSN notify list: {value}"))
    }
}

impl fmt::Display for DsnNotify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.never {
            return f.write_str("NEVER");
        }
        let keywords: Vec<&str> = [
            (self.success, "SUCCESS"),
            (self.failure, "FAILURE"),
            (self.delay, "DELAY"),
        ]
        .into_iter()
        .filter_map(|(set, keyword)| set.then_some(keyword))
        .collect();
        f.write_str(&keywords.join(","))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let notify = DsnNotify::parse("SUCCESS,FAILURE").unwrap();
        assert_eq!(notify.to_param(), " NOTIFY=SUCCESS,FAILURE");

        let notify = DsnNotify::parse(" delay , success ").unwrap();
        assert_eq!(notify.to_string(), "SUCCESS,DELAY");
    }

    #[test]
    fn test_never_wins() {
        assert_eq!(DsnNotify::parse("NEVER"), Some(DsnNotify::NEVER));
        assert_eq!(
            DsnNotify::parse("SUCCESS,NEVER").unwrap().to_param(),
            " NOTIFY=NEVER"
        );
        assert!(DsnNotify::FAILURE.union(DsnNotify::NEVER).is_never());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(DsnNotify::parse("SOMETIMES"), None);
        assert_eq!(DsnNotify::parse(""), None);
    }

    #[test]
    fn test_empty_request_renders_nothing() {
        assert!(DsnNotify::default().is_empty());
        assert_eq!(DsnNotify::default().to_param(), "");
    }
}
