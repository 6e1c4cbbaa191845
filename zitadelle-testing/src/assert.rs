//! Assertion helpers for test bodies

use crate::error::TestFailure;

/// Compare `actual` with `expected`, failing the test with `message`.
///
/// The failure records the caller's location.
///
/// ```
/// use zitadelle_testing::assert_equal;
///
/// assert_eq!(assert_equal(1 + 2, 3, "ok"), Ok(true));
/// assert!(assert_equal(1 + 2, 4, "bad").is_err());
/// ```
#[track_caller]
pub fn assert_equal<A, E>(actual: A, expected: E, message: impl Into<String>) -> Result<bool, TestFailure>
where
    A: PartialEq<E>,
{
    if actual == expected {
        Ok(true)
    } else {
        Err(TestFailure::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_values_pass() {
        assert_eq!(assert_equal(1 + 2, 3, "ok"), Ok(true));
        assert_eq!(assert_equal("abc", "abc", "same"), Ok(true));
        assert_eq!(assert_equal(String::from("x"), "x", "mixed"), Ok(true));
        assert_eq!(assert_equal(vec![1.5, 2.0], vec![1.5, 2.0], "floats"), Ok(true));
    }

    #[test]
    fn test_unequal_values_fail_with_message() {
        let line = line!() + 1;
        let failure = assert_equal(1 + 2, 4, "bad").unwrap_err();
        assert_eq!(failure.message, "bad");
        assert_eq!(failure.to_string(), "bad");
        assert!(failure.location.file().ends_with("assert.rs"));
        assert_eq!(failure.location.line(), line);
    }
}
