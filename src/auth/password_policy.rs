/*!
 * # Password Policy Module
 *
 * Strength rules applied whenever a password is set: minimum length,
 * not entirely numeric, not a commonly used password and not too similar
 * to the account's username or email.
 */

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("This password is too short. It must contain at least {min_length} characters.")]
    TooShort { min_length: usize },

    #[error("This password is entirely numeric.")]
    EntirelyNumeric,

    #[error("This password is too common.")]
    CommonPassword,

    #[error("The password is too similar to the {attribute}.")]
    TooSimilar { attribute: &'static str },
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub reject_numeric: bool,
    pub prevent_common_passwords: bool,
    /// Similarity ratio (0.0..=1.0) at or above which a password is rejected.
    pub max_similarity: f64,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            reject_numeric: true,
            prevent_common_passwords: true,
            max_similarity: 0.7,
        }
    }
}

lazy_static! {
    static ref COMMON_PASSWORDS: HashSet<&'static str> = {
        let common = [
            "password", "123456", "123456789", "qwerty", "abc123", "password123",
            "admin", "letmein", "welcome", "monkey", "1234567890", "iloveyou",
            "princess", "rockyou", "1234567", "12345678", "password1", "123123",
            "football", "baseball", "welcome1", "jordan23", "superman", "michael",
            "pepper", "whatever", "trustno1", "ninja", "harley", "ranger",
            "shadow", "matthew", "hunter", "thomas", "summer", "robert", "buster",
            "jennifer", "jordan", "tigger", "andrew", "michelle", "sunshine",
            "danielle", "jessica", "zaq1zaq1", "qwerty123", "test123", "qwertyuiop",
            "qazwsx", "1qaz2wsx", "q1w2e3r4", "asdfghjkl", "zxcvbnm", "asdf1234",
            "111111", "000000", "11111111", "00000000", "12341234", "passw0rd",
            "p@ssw0rd", "dragon", "master", "freedom", "starwars", "computer",
            "internet", "changeme", "secret", "administrator", "welcome123",
            "iloveyou1", "football1", "baseball1", "password12", "qwerty12",
            "abcd1234", "1q2w3e4r", "1q2w3e4r5t", "aa123456", "mustang",
            "access", "flower", "cheese", "killer", "batman", "charlie",
        ];
        common.into_iter().collect()
    };

    static ref ATTRIBUTE_SPLIT: Regex = Regex::new(r"\W+").unwrap();
}

/// Ratio of matching characters between two strings, `2 * lcs / (len_a + len_b)`.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    2.0 * lcs as f64 / (a.len() + b.len()) as f64
}

impl PasswordPolicy {
    /// Validates `password`, collecting every violated rule.
    ///
    /// `attributes` pairs a human label ("username", "email address") with the
    /// account value it must not resemble. Empty values are skipped.
    pub fn validate(
        &self,
        password: &str,
        attributes: &[(&'static str, &str)],
    ) -> Result<(), Vec<PasswordPolicyError>> {
        let mut violations = Vec::new();

        if let Some(attribute) = self.similar_attribute(password, attributes) {
            violations.push(PasswordPolicyError::TooSimilar { attribute });
        }

        if password.chars().count() < self.min_length {
            violations.push(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if self.prevent_common_passwords
            && COMMON_PASSWORDS.contains(password.trim().to_lowercase().as_str())
        {
            violations.push(PasswordPolicyError::CommonPassword);
        }

        if self.reject_numeric
            && !password.is_empty()
            && password.chars().all(|c| c.is_ascii_digit())
        {
            violations.push(PasswordPolicyError::EntirelyNumeric);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn similar_attribute(
        &self,
        password: &str,
        attributes: &[(&'static str, &str)],
    ) -> Option<&'static str> {
        let password = password.to_lowercase();
        attributes
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .find(|(_, value)| {
                let value = value.to_lowercase();
                std::iter::once(value.as_str())
                    .chain(ATTRIBUTE_SPLIT.split(&value))
                    .filter(|part| !part.is_empty())
                    .any(|part| similarity_ratio(&password, part) >= self.max_similarity)
            })
            .map(|(label, _)| *label)
    }
}
