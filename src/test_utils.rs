//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a package symbol as it follows `CONFIG_PKG_USING_`
    pub fn package_symbol() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9]{0,6}(_[A-Z0-9]{1,6}){0,3}"
    }

    /// Generate a package directory name (lowercase, hyphen separated)
    pub fn package_dir_name() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,6}(-[a-z0-9]{1,6}){0,3}"
    }

    /// Generate a Kconfig option key
    pub fn kconfig_key() -> impl Strategy<Value = String> {
        "CONFIG_[A-Z]{1,8}"
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_package_symbol_generator(symbol in package_symbol()) {
            prop_assert!(!symbol.is_empty());
            prop_assert!(symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn test_package_dir_name_generator(name in package_dir_name()) {
            prop_assert!(!name.starts_with('-'));
            prop_assert!(!name.ends_with('-'));
        }

        #[test]
        fn test_kconfig_key_generator(key in kconfig_key()) {
            prop_assert!(key.starts_with("CONFIG_"));
            prop_assert!(!key.contains('='));
        }
    }
}
