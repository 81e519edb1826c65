use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, ParseEnumError};

/// Lifecycle of a swap request.
///
/// `pending -> accepted -> completed` and `pending -> rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl SwapStatus {
    pub const ALL: [SwapStatus; 4] = [
        SwapStatus::Pending,
        SwapStatus::Accepted,
        SwapStatus::Rejected,
        SwapStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Only requests that never turned into an agreement can be withdrawn.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Pending | Self::Rejected)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("swap status", other)),
        }
    }
}

/// Which side of a swap request a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Requester,
    Provider,
}

impl Party {
    pub fn of(requester_id: Uuid, provider_id: Uuid, user_id: Uuid) -> Option<Party> {
        if user_id == provider_id {
            Some(Party::Provider)
        } else if user_id == requester_id {
            Some(Party::Requester)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The request already has the requested status.
    Unchanged,
    Apply,
}

/// Decide whether `party` may move a request from `current` to `next`.
///
/// Re-requesting the current status is a no-op for either party. Only the
/// provider answers a pending request; either party completes an accepted one.
pub fn check_transition(
    current: SwapStatus,
    next: SwapStatus,
    party: Option<Party>,
) -> Result<Transition, DomainError> {
    let party = party.ok_or_else(|| {
        DomainError::forbidden("Unauthorized to modify this request")
    })?;

    if current == next {
        return Ok(Transition::Unchanged);
    }

    match next {
        SwapStatus::Accepted | SwapStatus::Rejected => {
            if party != Party::Provider {
                return Err(DomainError::forbidden(
                    "Only the provider can accept or reject requests",
                ));
            }
            if current != SwapStatus::Pending {
                return Err(DomainError::invalid(format!(
                    "Cannot mark a {current} request as {next}"
                )));
            }
        }
        SwapStatus::Completed => {
            if current != SwapStatus::Accepted {
                return Err(DomainError::invalid(format!(
                    "Only accepted requests can be completed (request is {current})"
                )));
            }
        }
        SwapStatus::Pending => {
            return Err(DomainError::invalid(format!(
                "Cannot move a {current} request back to pending"
            )));
        }
    }

    Ok(Transition::Apply)
}

/// Only the requester may withdraw, and only while nothing was agreed.
pub fn check_delete(status: SwapStatus, party: Option<Party>) -> Result<(), DomainError> {
    if party != Some(Party::Requester) {
        return Err(DomainError::forbidden("Only the requester can delete requests"));
    }
    if !status.is_deletable() {
        return Err(DomainError::forbidden(format!(
            "Cannot delete a {status} request"
        )));
    }
    Ok(())
}

/// Which of the caller's requests to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    Incoming,
    Outgoing,
    #[default]
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_answers_pending() {
        let p = Some(Party::Provider);
        assert_eq!(
            check_transition(SwapStatus::Pending, SwapStatus::Accepted, p),
            Ok(Transition::Apply)
        );
        assert_eq!(
            check_transition(SwapStatus::Pending, SwapStatus::Rejected, p),
            Ok(Transition::Apply)
        );
    }

    #[test]
    fn requester_cannot_answer() {
        let r = Some(Party::Requester);
        assert!(matches!(
            check_transition(SwapStatus::Pending, SwapStatus::Accepted, r),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            check_transition(SwapStatus::Accepted, SwapStatus::Rejected, r),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn same_status_is_noop_for_either_party() {
        for party in [Party::Requester, Party::Provider] {
            assert_eq!(
                check_transition(SwapStatus::Accepted, SwapStatus::Accepted, Some(party)),
                Ok(Transition::Unchanged)
            );
        }
    }

    #[test]
    fn completion_requires_accepted() {
        for party in [Party::Requester, Party::Provider] {
            assert_eq!(
                check_transition(SwapStatus::Accepted, SwapStatus::Completed, Some(party)),
                Ok(Transition::Apply)
            );
            assert!(matches!(
                check_transition(SwapStatus::Pending, SwapStatus::Completed, Some(party)),
                Err(DomainError::InvalidOperation(_))
            ));
        }
        assert!(matches!(
            check_transition(SwapStatus::Rejected, SwapStatus::Completed, Some(Party::Provider)),
            Err(DomainError::InvalidOperation(_))
        ));
    }

    #[test]
    fn strangers_are_forbidden() {
        for next in SwapStatus::ALL {
            assert!(matches!(
                check_transition(SwapStatus::Pending, next, None),
                Err(DomainError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn terminal_states_stay_put() {
        assert!(check_transition(SwapStatus::Completed, SwapStatus::Pending, Some(Party::Provider)).is_err());
        assert!(check_transition(SwapStatus::Rejected, SwapStatus::Accepted, Some(Party::Provider)).is_err());
        assert!(SwapStatus::Completed.is_terminal());
        assert!(!SwapStatus::Accepted.is_terminal());
    }

    #[test]
    fn delete_rules() {
        assert!(check_delete(SwapStatus::Pending, Some(Party::Requester)).is_ok());
        assert!(check_delete(SwapStatus::Rejected, Some(Party::Requester)).is_ok());
        assert!(check_delete(SwapStatus::Accepted, Some(Party::Requester)).is_err());
        assert!(check_delete(SwapStatus::Pending, Some(Party::Provider)).is_err());
        assert!(check_delete(SwapStatus::Pending, None).is_err());
    }

    #[test]
    fn party_lookup() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(Party::of(a, b, a), Some(Party::Requester));
        assert_eq!(Party::of(a, b, b), Some(Party::Provider));
        assert_eq!(Party::of(a, b, c), None);
    }

    #[test]
    fn status_parses_its_own_names() {
        for s in SwapStatus::ALL {
            assert_eq!(s.as_str().parse::<SwapStatus>(), Ok(s));
        }
        assert!("done".parse::<SwapStatus>().is_err());
    }
}
