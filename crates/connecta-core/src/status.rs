//! Typed status vocabularies.
//!
//! Upstream records carry free-form status strings. Each collection gets a
//! closed vocabulary; anything outside it is kept as [`Status::Unknown`] and
//! an absent field is [`Status::Missing`], so neither silently lands in a
//! known category.

use std::fmt;

use serde::Serialize;

use crate::record::Record;

/// A closed set of status values for one collection.
pub trait Vocabulary: Sized + Copy + Eq + fmt::Debug {
    /// Parse an already-normalized token (lowercase, `-` separated).
    fn from_token(token: &str) -> Option<Self>;
    /// Canonical label.
    fn label(self) -> &'static str;
}

/// A parsed status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status<T> {
    Known(T),
    Unknown(String),
    Missing,
}

impl<T: Vocabulary> Status<T> {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Status::Missing;
        };
        let token = normalize_token(raw);
        if token.is_empty() {
            return Status::Missing;
        }
        match T::from_token(&token) {
            Some(known) => Status::Known(known),
            None => Status::Unknown(raw.trim().to_string()),
        }
    }

    /// Status of `record` at `field`.
    pub fn of(record: &Record, field: &str) -> Self {
        Self::parse(record.str_field(field))
    }

    pub fn is(&self, expected: T) -> bool {
        matches!(self, Status::Known(known) if *known == expected)
    }

    pub fn known(&self) -> Option<T> {
        match self {
            Status::Known(known) => Some(*known),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Known(known) => known.label(),
            Status::Unknown(_) => "unknown",
            Status::Missing => "missing",
        }
    }
}

fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl Vocabulary for $name {
            fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($label $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

vocabulary! {
    /// Account type of a user.
    UserType {
        Client => "client",
        Freelancer => "freelancer",
        Admin => "admin",
    }
}

vocabulary! {
    /// Job posting lifecycle.
    JobState {
        Open => "open" | "active",
        InProgress => "in-progress" | "inprogress" | "ongoing",
        Closed => "closed" | "filled" | "completed",
        Deleted => "deleted",
    }
}

vocabulary! {
    ProjectState {
        Pending => "pending",
        InProgress => "in-progress" | "inprogress" | "ongoing" | "active",
        Completed => "completed",
        Cancelled => "cancelled" | "canceled",
    }
}

vocabulary! {
    /// Proposal review state. A proposal the client has only viewed is
    /// still pending.
    ProposalState {
        Pending => "pending" | "viewed",
        Accepted => "accepted" | "approved",
        Rejected => "rejected" | "declined",
        Withdrawn => "withdrawn",
    }
}

vocabulary! {
    PaymentState {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed" | "successful" | "success" | "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
}

vocabulary! {
    ContractState {
        Active => "active",
        PendingSignature => "pending-signature" | "pending",
        Completed => "completed",
        Terminated => "terminated" | "cancelled" | "canceled",
    }
}

vocabulary! {
    SubscriptionState {
        Active => "active",
        Expired => "expired",
        Cancelled => "cancelled" | "canceled",
    }
}
