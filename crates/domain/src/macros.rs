//! Domain macros for reducing boilerplate
//!
//! # Example
//!
//! ```
//! use storesync_domain::impl_wire_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum RunStatus {
//!     Pending,
//!     Running,
//! }
//!
//! impl_wire_conversions!(RunStatus {
//!     Pending => "pending",
//!     Running => "running",
//! });
//!
//! assert_eq!(RunStatus::Running.as_str(), "running");
//! assert_eq!("PENDING".parse::<RunStatus>(), Ok(RunStatus::Pending));
//! ```

/// Implements `as_str`, Display and FromStr for closed wire enums
///
/// This macro generates:
/// - `as_str()`: the canonical wire string stored in the database
/// - Display trait: writes the canonical string
/// - FromStr trait: parses case-insensitively back to the variant
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their wire strings
#[macro_export]
macro_rules! impl_wire_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical wire representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case($str) {
                    return Ok(Self::$variant);
                })+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
