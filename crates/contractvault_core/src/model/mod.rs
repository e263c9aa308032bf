//! Domain model for the contract repository.
//!
//! # Responsibility
//! - Define canonical records persisted by the repository layer.
//! - Keep enumerations, lifecycle tables and field validation next to the
//!   data they constrain.
//!
//! # Invariants
//! - Every enumerated column round-trips through `as_str()`/`parse()` using
//!   the upper-case wire names stored in SQLite.
//! - Timestamps are Unix epoch milliseconds (UTC); calendar dates are
//!   `chrono::NaiveDate`.

use chrono::{DateTime, NaiveDate, Utc};

/// Declares a closed string enumeration stored as TEXT in SQLite.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable upper-case name used in storage and audit metadata.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }

            /// Parses the stable name; exact match only.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $( $text => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod approval;
pub mod audit;
pub mod contract;
pub mod document;
pub mod lookup;
pub mod principal;
pub mod review;
pub mod share;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// UTC calendar date of an epoch-millisecond timestamp.
pub fn date_of(timestamp: Timestamp) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .date_naive()
}

/// First epoch millisecond of a UTC calendar date.
pub fn start_of_day_millis(date: NaiveDate) -> Timestamp {
    date.and_hms_opt(0, 0, 0)
        .map(|value| value.and_utc().timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{date_of, start_of_day_millis};
    use chrono::NaiveDate;

    #[test]
    fn day_boundaries_round_trip() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let start = start_of_day_millis(day);
        assert_eq!(date_of(start), day);
        assert_eq!(date_of(start - 1), day.pred_opt().unwrap());
    }
}
