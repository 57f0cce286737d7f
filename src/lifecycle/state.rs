//! Request and match status machines.
//!
//! Every status change goes through `next`; a pair missing from the tables below is a
//! `Conflict`. Storage writes are guarded by the prior status, so the table also decides
//! which rows a conditional update is allowed to touch.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Status of a study request, as seen by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Pending,
    /// Legacy status; only read from old rows.
    Matched,
    Active,
    /// Legacy status; declines now send the request back to `Open`.
    Declined,
    Completed,
    Cancelled,
}

/// Something that happens to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// The student picked a teacher.
    TeacherSelected,
    TeacherAccepted,
    TeacherDeclined,
    /// The student withdrew before the teacher answered.
    PendingCancelled,
    MatchCancelled,
    MatchCompleted,
    /// The requester left the bubble.
    BubbleLeft,
    /// The teacher of the request's match left the bubble.
    TeacherLeft,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Pending => "pending",
            RequestStatus::Matched => "matched",
            RequestStatus::Active => "active",
            RequestStatus::Declined => "declined",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RequestStatus::Open),
            "pending" => Some(RequestStatus::Pending),
            "matched" => Some(RequestStatus::Matched),
            "active" => Some(RequestStatus::Active),
            "declined" => Some(RequestStatus::Declined),
            "completed" => Some(RequestStatus::Completed),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }

    /// Whether the owner may delete the request outright.
    pub fn is_deletable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Open
                | RequestStatus::Pending
                | RequestStatus::Declined
                | RequestStatus::Cancelled
        )
    }

    /// The status that follows `event`, or `Conflict` if the event is not allowed here.
    pub fn next(self, event: RequestEvent) -> Result<RequestStatus, AppError> {
        use RequestEvent as E;
        use RequestStatus as S;

        let next = match (self, event) {
            (S::Open, E::TeacherSelected) => S::Pending,
            (S::Pending, E::TeacherAccepted) => S::Active,
            (S::Pending, E::TeacherDeclined) => S::Open,
            (S::Pending, E::PendingCancelled) => S::Open,
            (S::Active, E::MatchCancelled) => S::Cancelled,
            (S::Active, E::MatchCompleted) => S::Completed,
            (S::Open | S::Pending | S::Matched | S::Active, E::BubbleLeft) => S::Cancelled,
            (S::Pending, E::TeacherLeft) => S::Open,
            (S::Active, E::TeacherLeft) => S::Cancelled,
            (from, event) => {
                return Err(AppError::Conflict(format!(
                    "Request is {} and cannot accept {:?}",
                    from.as_str(),
                    event
                )))
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a match, as seen by the teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Active,
    Declined,
    Completed,
    Cancelled,
}

/// Something that happens to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    Accepted,
    Declined,
    Cancelled,
    Completed,
    /// One of the participants left the bubble.
    BubbleLeft,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Active => "active",
            MatchStatus::Declined => "declined",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MatchStatus::Pending),
            "active" => Some(MatchStatus::Active),
            "declined" => Some(MatchStatus::Declined),
            "completed" => Some(MatchStatus::Completed),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending and active matches block a second match on the same request.
    pub fn is_live(&self) -> bool {
        matches!(self, MatchStatus::Pending | MatchStatus::Active)
    }

    pub fn next(self, event: MatchEvent) -> Result<MatchStatus, AppError> {
        use MatchEvent as E;
        use MatchStatus as S;

        let next = match (self, event) {
            (S::Pending, E::Accepted) => S::Active,
            (S::Pending, E::Declined) => S::Declined,
            (S::Active, E::Cancelled) => S::Cancelled,
            (S::Active, E::Completed) => S::Completed,
            (S::Pending | S::Active, E::BubbleLeft) => S::Cancelled,
            (from, event) => {
                return Err(AppError::Conflict(format!(
                    "Match is {} and cannot accept {:?}",
                    from.as_str(),
                    event
                )))
            }
        };
        Ok(next)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_happy_path() {
        let status = RequestStatus::Open;
        let status = status.next(RequestEvent::TeacherSelected).unwrap();
        assert_eq!(status, RequestStatus::Pending);
        let status = status.next(RequestEvent::TeacherAccepted).unwrap();
        assert_eq!(status, RequestStatus::Active);
        let status = status.next(RequestEvent::MatchCompleted).unwrap();
        assert_eq!(status, RequestStatus::Completed);
    }

    #[test]
    fn test_decline_and_withdraw_reopen_the_request() {
        assert_eq!(
            RequestStatus::Pending.next(RequestEvent::TeacherDeclined).unwrap(),
            RequestStatus::Open
        );
        assert_eq!(
            RequestStatus::Pending.next(RequestEvent::PendingCancelled).unwrap(),
            RequestStatus::Open
        );
    }

    #[test]
    fn test_terminal_statuses_reject_every_event() {
        let events = [
            RequestEvent::TeacherSelected,
            RequestEvent::TeacherAccepted,
            RequestEvent::TeacherDeclined,
            RequestEvent::PendingCancelled,
            RequestEvent::MatchCancelled,
            RequestEvent::MatchCompleted,
            RequestEvent::BubbleLeft,
            RequestEvent::TeacherLeft,
        ];
        for status in [RequestStatus::Completed, RequestStatus::Cancelled] {
            assert!(status.is_terminal());
            for event in events {
                assert!(matches!(status.next(event), Err(AppError::Conflict(_))));
            }
        }
    }

    #[test]
    fn test_selecting_twice_is_a_conflict() {
        let err = RequestStatus::Pending
            .next(RequestEvent::TeacherSelected)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_match_transitions() {
        assert_eq!(
            MatchStatus::Pending.next(MatchEvent::Accepted).unwrap(),
            MatchStatus::Active
        );
        assert_eq!(
            MatchStatus::Pending.next(MatchEvent::Declined).unwrap(),
            MatchStatus::Declined
        );
        assert!(MatchStatus::Pending.next(MatchEvent::Completed).is_err());
        assert!(MatchStatus::Declined.next(MatchEvent::Accepted).is_err());
        assert!(MatchStatus::Completed.next(MatchEvent::Cancelled).is_err());
        assert!(MatchStatus::Active.is_live());
        assert!(!MatchStatus::Declined.is_live());
    }

    #[test]
    fn test_stored_status_strings() {
        assert_eq!(RequestStatus::parse("cancelled"), Some(RequestStatus::Cancelled));
        assert_eq!(MatchStatus::Active.as_str(), "active");
        assert_eq!(RequestStatus::parse("OPEN"), None);
    }
}
