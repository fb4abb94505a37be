//! Who may do what.
//!
//! [`authorize`] is the single place permission rules live. It is a pure
//! function of the actor, the requested action and the ticket (when the action
//! targets one); every tracker entry point consults it before validating or
//! mutating anything.

use crate::directory::ActorContext;
use crate::error::{Result, TrackerError};
use crate::ticket::Ticket;
use crate::types::{Ntid, Role, TicketStatus};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateTicket,
    ViewTicket,
    ListTickets,
    EditTicket,
    AssignTicket,
    UpdateStatus,
    UpdateEta,
    AddComment,
    CancelTicket,
    DeleteTicket,
    ViewStatistics,
    EditUser(Ntid),
    ChangeRole(Ntid),
    DeactivateUser(Ntid),
    DeleteUser(Ntid),
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Action::ViewTicket | Action::ListTickets | Action::ViewStatistics
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateTicket => f.write_str("create ticket"),
            Action::ViewTicket => f.write_str("view ticket"),
            Action::ListTickets => f.write_str("list tickets"),
            Action::EditTicket => f.write_str("edit ticket"),
            Action::AssignTicket => f.write_str("assign ticket"),
            Action::UpdateStatus => f.write_str("update status"),
            Action::UpdateEta => f.write_str("update eta"),
            Action::AddComment => f.write_str("add comment"),
            Action::CancelTicket => f.write_str("cancel ticket"),
            Action::DeleteTicket => f.write_str("delete ticket"),
            Action::ViewStatistics => f.write_str("view statistics"),
            Action::EditUser(u) => write!(f, "edit user {u}"),
            Action::ChangeRole(u) => write!(f, "change role of {u}"),
            Action::DeactivateUser(u) => write!(f, "deactivate user {u}"),
            Action::DeleteUser(u) => write!(f, "delete user {u}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self, action: &Action) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(TrackerError::Unauthorized {
                action: action.to_string(),
                reason,
            }),
        }
    }
}

fn deny(reason: impl Into<String>) -> Decision {
    Decision::Deny(reason.into())
}

/// Rules are evaluated top to bottom; the first one that matches decides.
pub fn authorize(actor: &ActorContext, action: &Action, ticket: Option<&Ticket>) -> Decision {
    if !actor.active && !action.is_read() {
        return deny(format!("user {} is deactivated", actor.ntid));
    }

    if let (Action::UpdateStatus, Some(t)) = (action, ticket) {
        if t.status == TicketStatus::Open {
            return deny("an OPEN ticket must be assigned before its status can change");
        }
    }

    match actor.role {
        Role::Admin => {
            return match action {
                Action::DeactivateUser(target) | Action::DeleteUser(target)
                    if *target == actor.ntid =>
                {
                    deny("administrators cannot deactivate or delete themselves")
                }
                _ => Decision::Allow,
            };
        }
        Role::ScrumMaster => match action {
            Action::AssignTicket | Action::DeleteTicket | Action::EditUser(_) => {
                return Decision::Allow;
            }
            Action::DeleteUser(_) | Action::DeactivateUser(_) | Action::ChangeRole(_) => {
                return deny("only administrators manage user accounts");
            }
            Action::UpdateStatus
            | Action::UpdateEta
            | Action::AddComment
            | Action::EditTicket
            | Action::CancelTicket => {
                if ticket.is_some_and(|t| actor.oversees(t.account_id)) {
                    return Decision::Allow;
                }
            }
            _ => {}
        },
        Role::User | Role::Developer | Role::Manager => {}
    }

    if let Some(t) = ticket {
        if t.is_assignee(&actor.ntid)
            && matches!(
                action,
                Action::UpdateStatus | Action::UpdateEta | Action::AddComment | Action::EditTicket
            )
        {
            return Decision::Allow;
        }
        if t.is_creator(&actor.ntid)
            && matches!(
                action,
                Action::DeleteTicket | Action::AddComment | Action::EditTicket
            )
        {
            return Decision::Allow;
        }
    }

    match action {
        Action::CreateTicket
        | Action::ViewTicket
        | Action::ListTickets
        | Action::ViewStatistics => Decision::Allow,
        _ => match ticket {
            Some(_) => deny(format!(
                "{} ({}) neither created nor is assigned to this ticket",
                actor.ntid, actor.role
            )),
            None => deny(format!("role {} may not perform this action", actor.role)),
        },
    }
}

/// Whether `ticket` appears in `actor`'s ticket listing.
pub fn visible_in_listing(actor: &ActorContext, ticket: &Ticket) -> bool {
    let involved = ticket.is_creator(&actor.ntid) || ticket.is_assignee(&actor.ntid);
    match actor.role {
        Role::Admin => true,
        Role::ScrumMaster => actor.oversees(ticket.account_id) || involved,
        Role::Manager => ticket.account_id == actor.account_id || involved,
        Role::Developer => involved || ticket.status == TicketStatus::Open,
        Role::User => involved,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::NewTicket;
    use crate::types::{AccountId, Priority, RequestType, TicketId};
    use chrono::{Duration, Utc};

    fn ntid(s: &str) -> Ntid {
        Ntid::new(s).unwrap()
    }

    fn actor(name: &str, role: Role, account: u64) -> ActorContext {
        ActorContext {
            ntid: ntid(name),
            role,
            account_id: AccountId(account),
            overseen_accounts: vec![AccountId(account)],
            active: true,
        }
    }

    fn ticket(status: TicketStatus) -> Ticket {
        let now = Utc::now();
        let mut t = Ticket::new(
            NewTicket {
                title: "Broken report".into(),
                description: None,
                request_type: RequestType::BugFix,
                priority: Priority::Low,
                account_id: AccountId(1),
            },
            ntid("creator"),
            now,
        )
        .unwrap();
        t.id = TicketId(9);
        if status != TicketStatus::Open {
            t.assign(ntid("dev"), ntid("sam"), now + Duration::days(2), now)
                .unwrap();
            t.status = status;
        }
        t
    }

    #[test]
    fn status_update_on_open_denied_for_every_role() {
        let t = ticket(TicketStatus::Open);
        for role in [
            Role::User,
            Role::Developer,
            Role::Manager,
            Role::ScrumMaster,
            Role::Admin,
        ] {
            let a = actor("someone", role, 1);
            assert!(!authorize(&a, &Action::UpdateStatus, Some(&t)).is_allowed());
        }
        let creator = actor("creator", Role::User, 1);
        assert!(!authorize(&creator, &Action::UpdateStatus, Some(&t)).is_allowed());
    }

    #[test]
    fn admin_cannot_remove_self() {
        let admin = actor("root", Role::Admin, 1);
        assert!(!authorize(&admin, &Action::DeleteUser(ntid("root")), None).is_allowed());
        assert!(!authorize(&admin, &Action::DeactivateUser(ntid("root")), None).is_allowed());
        assert!(authorize(&admin, &Action::DeleteUser(ntid("other")), None).is_allowed());
        assert!(authorize(&admin, &Action::ChangeRole(ntid("root")), None).is_allowed());
    }

    #[test]
    fn scrum_master_scope() {
        let sm = actor("sam", Role::ScrumMaster, 1);
        let outsider = actor("sid", Role::ScrumMaster, 2);
        let t = ticket(TicketStatus::InProgress);

        assert!(authorize(&sm, &Action::AssignTicket, Some(&ticket(TicketStatus::Open))).is_allowed());
        assert!(authorize(&outsider, &Action::AssignTicket, Some(&t)).is_allowed());
        assert!(authorize(&sm, &Action::UpdateEta, Some(&t)).is_allowed());
        assert!(authorize(&sm, &Action::CancelTicket, Some(&t)).is_allowed());
        assert!(!authorize(&outsider, &Action::UpdateEta, Some(&t)).is_allowed());
        assert!(!authorize(&outsider, &Action::CancelTicket, Some(&t)).is_allowed());
        assert!(authorize(&outsider, &Action::DeleteTicket, Some(&t)).is_allowed());
        assert!(authorize(&sm, &Action::EditUser(ntid("dev")), None).is_allowed());
        assert!(!authorize(&sm, &Action::DeleteUser(ntid("dev")), None).is_allowed());
        assert!(!authorize(&sm, &Action::ChangeRole(ntid("dev")), None).is_allowed());
    }

    #[test]
    fn assignee_rights_regardless_of_role() {
        let dev = actor("dev", Role::User, 5);
        let t = ticket(TicketStatus::Assigned);
        for action in [
            Action::UpdateStatus,
            Action::UpdateEta,
            Action::AddComment,
            Action::EditTicket,
        ] {
            assert!(authorize(&dev, &action, Some(&t)).is_allowed(), "{action}");
        }
        assert!(!authorize(&dev, &Action::DeleteTicket, Some(&t)).is_allowed());
        assert!(!authorize(&dev, &Action::AssignTicket, Some(&t)).is_allowed());
        assert!(!authorize(&dev, &Action::CancelTicket, Some(&t)).is_allowed());
    }

    #[test]
    fn creator_may_delete_unrelated_user_may_not() {
        let t = ticket(TicketStatus::InProgress);
        let creator = actor("creator", Role::User, 1);
        let stranger = actor("stranger", Role::User, 1);
        assert!(authorize(&creator, &Action::DeleteTicket, Some(&t)).is_allowed());
        assert!(authorize(&creator, &Action::AddComment, Some(&t)).is_allowed());
        assert!(!authorize(&creator, &Action::UpdateEta, Some(&t)).is_allowed());

        let decision = authorize(&stranger, &Action::DeleteTicket, Some(&t));
        let err = decision.into_result(&Action::DeleteTicket).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Authorization);
        assert!(err.to_string().contains("delete ticket"));
    }

    #[test]
    fn inactive_actor_is_read_only() {
        let mut admin = actor("root", Role::Admin, 1);
        admin.active = false;
        let t = ticket(TicketStatus::Assigned);
        assert!(authorize(&admin, &Action::ViewTicket, Some(&t)).is_allowed());
        assert!(!authorize(&admin, &Action::CreateTicket, None).is_allowed());
        assert!(!authorize(&admin, &Action::UpdateEta, Some(&t)).is_allowed());
    }

    #[test]
    fn listing_visibility_by_role() {
        let open = ticket(TicketStatus::Open);
        let assigned = ticket(TicketStatus::Assigned);

        assert!(visible_in_listing(&actor("any", Role::Admin, 9), &assigned));
        assert!(visible_in_listing(&actor("sam", Role::ScrumMaster, 1), &assigned));
        assert!(!visible_in_listing(&actor("sid", Role::ScrumMaster, 2), &assigned));
        assert!(visible_in_listing(&actor("mia", Role::Manager, 1), &assigned));
        assert!(!visible_in_listing(&actor("max", Role::Manager, 2), &assigned));
        assert!(visible_in_listing(&actor("dan", Role::Developer, 2), &open));
        assert!(!visible_in_listing(&actor("dan", Role::Developer, 2), &assigned));
        assert!(visible_in_listing(&actor("dev", Role::Developer, 2), &assigned));
        assert!(visible_in_listing(&actor("creator", Role::User, 1), &assigned));
        assert!(!visible_in_listing(&actor("stranger", Role::User, 1), &open));
    }
}
