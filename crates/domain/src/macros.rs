//! Macro for wire-named enums
//!
//! Categories and task statuses travel as lowercase strings in configuration
//! files, headers and server payloads. The macro below generates the
//! `as_str`/`Display`/`FromStr` trio from a single variant table so the three
//! can never disagree.
//!
//! # Example
//!
//! ```rust
//! use wbgate_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Region {
//!     North,
//!     South,
//! }
//!
//! impl_wire_name_conversions!(Region {
//!     North => "north",
//!     South => "south",
//! });
//!
//! assert_eq!(Region::North.as_str(), "north");
//! assert_eq!("SOUTH".parse::<Region>(), Ok(Region::South));
//! ```

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum.
///
/// Parsing trims surrounding whitespace and ignores ASCII case. The error
/// string names the enum and echoes the rejected input.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire name of this variant.
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

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lane {
        Fast,
        Slow,
    }

    impl_wire_name_conversions!(Lane {
        Fast => "fast",
        Slow => "slow",
    });

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Lane::Fast.to_string(), "fast");
        assert_eq!(Lane::Slow.as_str(), "slow");
    }

    #[test]
    fn parses_ignoring_case_and_padding() {
        assert_eq!(Lane::from_str("FAST").unwrap(), Lane::Fast);
        assert_eq!(Lane::from_str("  Slow ").unwrap(), Lane::Slow);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = Lane::from_str("medium").unwrap_err();
        assert!(err.contains("Invalid Lane: medium"));
        assert!(Lane::from_str("").is_err());
    }
}
