//! The uniform operation result.

use serde::Serialize;

/// Outcome of a data-context operation that reached the backend.
///
/// Fields are private so every instance comes from one of the constructors below.
/// For single mutations the constructors keep `success` and a positive
/// affected-row count in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResult<T> {
    success: bool,
    message: String,
    payload: Option<T>,
}

impl<T> StatusResult<T> {
    /// A successful result carrying `payload`.
    pub fn ok(payload: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
        }
    }

    /// An unsuccessful result without payload.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// Transform the payload, keeping flag and message.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StatusResult<U> {
        StatusResult {
            success: self.success,
            message: self.message,
            payload: self.payload.map(f),
        }
    }
}

impl StatusResult<u64> {
    /// Wrap an affected-row count: success iff at least one row was affected.
    ///
    /// `verb` is the past tense of the operation ("inserted", "deleted", ...).
    pub fn from_affected(affected: u64, verb: &str) -> Self {
        let success = affected > 0;
        let message = if success {
            format!("{} {} row(s)", verb, affected)
        } else {
            format!("no rows {}", verb)
        };
        Self {
            success,
            message,
            payload: Some(affected),
        }
    }

    /// Aggregate a fan-out batch: success iff every item succeeded.
    ///
    /// The payload is the number of items that succeeded.
    pub fn from_fan_out(succeeded: u64, total: u64, verb: &str) -> Self {
        let success = succeeded == total;
        let message = if success {
            format!("{} {} item(s)", verb, total)
        } else {
            format!("{} {} of {} item(s)", verb, succeeded, total)
        };
        Self {
            success,
            message,
            payload: Some(succeeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_count_drives_success() {
        let done = StatusResult::from_affected(2, "inserted");
        assert!(done.success());
        assert_eq!(done.payload(), Some(&2));
        assert_eq!(done.message(), "inserted 2 row(s)");

        let none = StatusResult::from_affected(0, "deleted");
        assert!(!none.success());
        assert_eq!(none.message(), "no rows deleted");
    }

    #[test]
    fn test_fan_out_reports_partial_count() {
        let partial = StatusResult::from_fan_out(2, 3, "deleted");
        assert!(!partial.success());
        assert_eq!(partial.into_payload(), Some(2));
    }

    #[test]
    fn test_serializes_flat() {
        let status = StatusResult::ok("row", "found");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "message": "found", "payload": "row"})
        );
    }
}
