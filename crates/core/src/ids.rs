//! Typed record identifiers.
//!
//! Every identifier wraps a [`ShardableUuid`], so it renders canonically and maps onto a sharded
//! storage path. Distinct types stop a report id being passed where a request id is expected.

use crate::CoreResult;
use riskcare_uuid::ShardableUuid;
use std::fmt;
use std::str::FromStr;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(ShardableUuid);

        impl $name {
            /// Generates a fresh identifier.
            pub fn new() -> Self {
                Self(ShardableUuid::new())
            }

            /// Parses a canonical (32 lowercase hex) identifier.
            pub fn parse(input: &str) -> CoreResult<Self> {
                Ok(Self(ShardableUuid::parse(input)?))
            }

            pub fn shardable(&self) -> &ShardableUuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<ShardableUuid> for $name {
            fn from(id: ShardableUuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

record_id!(
    /// Identifier of a patient or doctor account.
    UserId
);
record_id!(
    /// Identifier of a stored prediction result.
    ResultId
);
record_id!(
    /// Identifier of a materialised report.
    ReportId
);
record_id!(
    /// Identifier of a review request.
    RequestId
);
record_id!(
    /// Identifier of a notification.
    NotificationId
);
