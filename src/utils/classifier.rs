#![forbid(unsafe_code)]

use thiserror::Error;
use unicode_general_category::{get_general_category, GeneralCategory};

// ***************************************************************************
//                                Constants
// ***************************************************************************
pub const PROP_ARMSTRONG : &str = "armstrong";
pub const PROP_EVEN      : &str = "even";
pub const PROP_ODD       : &str = "odd";

// ***************************************************************************
//                             Validation Errors
// ***************************************************************************
/// Reasons a raw number token is rejected.  Each reason maps to the short
/// diagnostic token returned to callers in the fun_fact field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("number parameter is empty")]
    Empty,

    #[error("number parameter is alphabetic")]
    Alphabetic,

    #[error("number parameter is not a valid integer")]
    Invalid,
}

impl ValidationError {
    /// The diagnostic token placed in the response.
    pub fn token(&self) -> &'static str {
        match self {
            ValidationError::Empty => "null",
            ValidationError::Alphabetic => "alphabet",
            ValidationError::Invalid => "invalid",
        }
    }
}

// ***************************************************************************
//                              Classification
// ***************************************************************************
/// Everything we compute locally about a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub number: i64,
    pub is_prime: bool,
    pub is_perfect: bool,
    pub properties: Vec<String>,
    pub digit_sum: i64,
}

// ---------------------------------------------------------------------------
// validate:
// ---------------------------------------------------------------------------
/** Convert the raw query token into an integer.  The checks are ordered so
 * that an empty token is reported before an alphabetic one, and an alphabetic
 * one before any other parse failure.
 */
pub fn validate(raw: &str) -> Result<i64, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    if raw.chars().all(is_letter) {
        return Err(ValidationError::Alphabetic);
    }
    raw.parse::<i64>().map_err(|_| ValidationError::Invalid)
}

// ---------------------------------------------------------------------------
// classify:
// ---------------------------------------------------------------------------
pub fn classify(n: i64) -> Classification {
    Classification {
        number: n,
        is_prime: is_prime(n),
        is_perfect: is_perfect(n),
        properties: properties(n),
        digit_sum: sum_of_digits(n),
    }
}

// ---------------------------------------------------------------------------
// is_prime:
// ---------------------------------------------------------------------------
/** Trial division up to the integer square root.  The bound is checked as
 * i <= n / i so it never overflows and never depends on floating point.
 */
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }

    // Even divisors were ruled out above.
    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

// ---------------------------------------------------------------------------
// is_perfect:
// ---------------------------------------------------------------------------
/** A perfect number equals the sum of its proper divisors.  Divisors are
 * collected in pairs (i, n/i) so the loop stops at the square root.
 */
pub fn is_perfect(n: i64) -> bool {
    if n < 2 {
        return false;
    }

    let mut sum: i128 = 1;
    let mut i = 2;
    while i <= n / i {
        if n % i == 0 {
            sum += i as i128;
            let pair = n / i;
            if pair != i {
                sum += pair as i128;
            }
        }
        i += 1;
    }
    sum == n as i128
}

// ---------------------------------------------------------------------------
// is_armstrong:
// ---------------------------------------------------------------------------
/** True when n equals the sum of its digits each raised to the number of
 * digits.  Negative numbers are never Armstrong numbers, and neither are the
 * single digit numbers, which satisfy the equation trivially.
 */
pub fn is_armstrong(n: i64) -> bool {
    if n < 10 {
        return false;
    }

    let digits = decimal_digits(n.unsigned_abs());
    let width = digits.len() as u32;
    let sum: u128 = digits.iter().map(|d| (*d as u128).pow(width)).sum();
    sum == n as u128
}

// ---------------------------------------------------------------------------
// sum_of_digits:
// ---------------------------------------------------------------------------
pub fn sum_of_digits(n: i64) -> i64 {
    decimal_digits(n.unsigned_abs()).iter().map(|d| *d as i64).sum()
}

// ---------------------------------------------------------------------------
// properties:
// ---------------------------------------------------------------------------
/** Armstrong status (when present) always precedes the parity label. */
pub fn properties(n: i64) -> Vec<String> {
    let mut props = Vec::with_capacity(2);
    if is_armstrong(n) {
        props.push(PROP_ARMSTRONG.to_string());
    }
    if n % 2 == 0 {
        props.push(PROP_EVEN.to_string());
    } else {
        props.push(PROP_ODD.to_string());
    }
    props
}

// ***************************************************************************
//                          Private Functions
// ***************************************************************************
// Membership in the Unicode letter categories (Lu, Ll, Lt, Lm, Lo).  Letter
// numbers such as U+216B and combining or spacing marks are not letters.
fn is_letter(c: char) -> bool {
    matches!(get_general_category(c),
             GeneralCategory::UppercaseLetter
             | GeneralCategory::LowercaseLetter
             | GeneralCategory::TitlecaseLetter
             | GeneralCategory::ModifierLetter
             | GeneralCategory::OtherLetter)
}

// Base-10 digits, least significant first.  Zero has the single digit 0.
fn decimal_digits(mut n: u64) -> Vec<u8> {
    let mut digits = Vec::with_capacity(20);
    loop {
        digits.push((n % 10) as u8);
        n /= 10;
        if n == 0 {
            break;
        }
    }
    digits
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    // Reference primality for 0..limit using a sieve.
    fn sieve(limit: usize) -> Vec<bool> {
        let mut prime = vec![true; limit];
        prime[0] = false;
        prime[1] = false;
        let mut i = 2;
        while i * i < limit {
            if prime[i] {
                let mut j = i * i;
                while j < limit {
                    prime[j] = false;
                    j += i;
                }
            }
            i += 1;
        }
        prime
    }

    #[test]
    fn primes_match_sieve() {
        let expected = sieve(10_001);
        for (n, p) in expected.iter().enumerate() {
            assert_eq!(is_prime(n as i64), *p, "n = {}", n);
        }
    }

    #[test]
    fn primes_below_two_and_negatives() {
        assert!(!is_prime(-7));
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
    }

    #[test]
    fn primes_near_perfect_squares() {
        // 49 = 7*7 and 10403 = 101*103 sit exactly on or near the bound.
        assert!(!is_prime(49));
        assert!(!is_prime(10_403));
        assert!(!is_prime(3_037_000_493 * 3));
        assert!(is_prime(2_147_483_647));
        assert!(!is_prime(i64::MAX));
    }

    #[test]
    fn perfect_numbers() {
        assert!(is_perfect(6));
        assert!(is_perfect(28));
        assert!(is_perfect(496));
        assert!(is_perfect(8128));
        assert!(!is_perfect(12));
        assert!(!is_perfect(1));
        assert!(!is_perfect(-6));
        assert!(!is_perfect(16));
    }

    #[test]
    fn armstrong_numbers() {
        assert!(is_armstrong(153));
        assert!(is_armstrong(370));
        assert!(is_armstrong(371));
        assert!(is_armstrong(9474));
        assert!(is_armstrong(548_834));
        assert!(!is_armstrong(0));
        assert!(!is_armstrong(7));
        assert!(!is_armstrong(154));
        assert!(!is_armstrong(10));
        assert!(!is_armstrong(-153));
        assert!(!is_armstrong(-1));
        assert!(!is_armstrong(i64::MAX));
    }

    #[test]
    fn digit_sums() {
        assert_eq!(sum_of_digits(12345), 15);
        assert_eq!(sum_of_digits(0), 0);
        assert_eq!(sum_of_digits(-12345), 15);
        assert_eq!(sum_of_digits(371), 11);
        // 9223372036854775808
        assert_eq!(sum_of_digits(i64::MIN), 89);
    }

    #[test]
    fn property_labels() {
        assert_eq!(properties(4), vec!["even"]);
        assert_eq!(properties(153), vec!["armstrong", "odd"]);
        assert_eq!(properties(7), vec!["odd"]);
        assert_eq!(properties(11), vec!["odd"]);
        assert_eq!(properties(370), vec!["armstrong", "even"]);
        assert_eq!(properties(0), vec!["even"]);
        assert_eq!(properties(-3), vec!["odd"]);
    }

    #[test]
    fn validate_tokens() {
        assert_eq!(validate(""), Err(ValidationError::Empty));
        assert_eq!(validate("abc"), Err(ValidationError::Alphabetic));
        assert_eq!(validate("ñandú"), Err(ValidationError::Alphabetic));
        assert_eq!(validate("Ǆ"), Err(ValidationError::Alphabetic));
        assert_eq!(validate("数字"), Err(ValidationError::Alphabetic));
        // Roman numeral twelve is a letter number, not a letter.
        assert_eq!(validate("\u{216B}"), Err(ValidationError::Invalid));
        // Devanagari KA followed by the spacing vowel sign I.
        assert_eq!(validate("\u{0915}\u{093F}"), Err(ValidationError::Invalid));
        assert_eq!(validate("\u{0915}"), Err(ValidationError::Alphabetic));
        assert_eq!(validate("12a"), Err(ValidationError::Invalid));
        assert_eq!(validate("1.5"), Err(ValidationError::Invalid));
        assert_eq!(validate(" 12"), Err(ValidationError::Invalid));
        assert_eq!(validate("99999999999999999999"), Err(ValidationError::Invalid));
        assert_eq!(validate("371"), Ok(371));
        assert_eq!(validate("-42"), Ok(-42));
        assert_eq!(validate("+8"), Ok(8));
        assert_eq!(validate("0"), Ok(0));
    }

    #[test]
    fn validation_tokens() {
        assert_eq!(ValidationError::Empty.token(), "null");
        assert_eq!(ValidationError::Alphabetic.token(), "alphabet");
        assert_eq!(ValidationError::Invalid.token(), "invalid");
    }

    #[test]
    fn classify_371() {
        let c = classify(371);
        assert_eq!(c.number, 371);
        assert!(!c.is_prime);
        assert!(!c.is_perfect);
        assert_eq!(c.properties, vec!["armstrong", "odd"]);
        assert_eq!(c.digit_sum, 11);
    }
}
