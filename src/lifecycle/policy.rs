//! Authorization policy
//!
//! One table maps each lifecycle operation to who may perform it. The
//! controller evaluates it through [`AuthorizationPolicy::evaluate`] before
//! touching any state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::core::{RoleId, UserId};
use crate::error::{DeskError, Result};
use crate::permissions::Permissions;
use crate::platform::Member;

/// Lifecycle operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Claim,
    Transfer,
    Rename,
    Move,
    RequestClose,
    ConfirmClose,
    AddParticipant,
    RemoveParticipant,
    BlacklistAppeal,
    SetupPanel,
}

impl Operation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Claim => "claim",
            Self::Transfer => "transfer",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::RequestClose => "request_close",
            Self::ConfirmClose => "confirm_close",
            Self::AddParticipant => "add_participant",
            Self::RemoveParticipant => "remove_participant",
            Self::BlacklistAppeal => "blacklist_appeal",
            Self::SetupPanel => "setup_panel",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        POLICY_TABLE
            .iter()
            .map(|(operation, _)| *operation)
            .find(|operation| operation.as_str() == s)
            .ok_or_else(|| DeskError::InvalidInput(format!("Unknown operation: {s}")))
    }
}

/// Who may perform an operation; any satisfied clause grants access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub anyone: bool,
    /// Holders of the operation's staff roles
    pub staff: bool,
    pub admin: bool,
    pub permission: Option<Permissions>,
    /// The ticket's current owner
    pub owner: bool,
    pub setup_users: bool,
}

impl Rule {
    pub const NOBODY: Self = Self {
        anyone: false,
        staff: false,
        admin: false,
        permission: None,
        owner: false,
        setup_users: false,
    };
}

pub const POLICY_TABLE: [(Operation, Rule); 11] = [
    (Operation::Create, Rule { anyone: true, ..Rule::NOBODY }),
    (Operation::Claim, Rule { staff: true, ..Rule::NOBODY }),
    (
        Operation::Transfer,
        Rule { staff: true, admin: true, ..Rule::NOBODY },
    ),
    (Operation::Rename, Rule { staff: true, ..Rule::NOBODY }),
    (
        Operation::Move,
        Rule { permission: Some(Permissions::MANAGE_CHANNELS), ..Rule::NOBODY },
    ),
    (
        Operation::RequestClose,
        Rule { staff: true, admin: true, owner: true, ..Rule::NOBODY },
    ),
    (
        Operation::ConfirmClose,
        Rule { staff: true, admin: true, owner: true, ..Rule::NOBODY },
    ),
    (Operation::AddParticipant, Rule { staff: true, ..Rule::NOBODY }),
    (
        Operation::RemoveParticipant,
        Rule {
            staff: true,
            permission: Some(Permissions::MANAGE_CHANNELS),
            owner: true,
            ..Rule::NOBODY
        },
    ),
    (Operation::BlacklistAppeal, Rule { staff: true, ..Rule::NOBODY }),
    (
        Operation::SetupPanel,
        Rule { admin: true, setup_users: true, ..Rule::NOBODY },
    ),
];

/// Result of evaluating the policy before the ticket is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Allowed only if the actor turns out to own the ticket
    OwnerOnly,
}

impl Access {
    /// Resolve an [`Access::OwnerOnly`] grant against the ticket's owner
    pub fn confirm_owner(self, operation: Operation, actor: &UserId, owner: &UserId) -> Result<()> {
        match self {
            Self::Granted => Ok(()),
            Self::OwnerOnly if actor == owner => Ok(()),
            Self::OwnerOnly => Err(DeskError::unauthorized(
                operation,
                "only staff or the ticket owner can do this",
            )),
        }
    }
}

/// Staff roles and per-operation overrides applied to [`POLICY_TABLE`]
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    staff_roles: Vec<RoleId>,
    role_overrides: HashMap<Operation, Vec<RoleId>>,
    setup_users: Vec<UserId>,
}

impl AuthorizationPolicy {
    pub fn new(staff_roles: Vec<RoleId>) -> Self {
        Self {
            staff_roles,
            ..Self::default()
        }
    }

    /// Use a different staff role set for one operation
    #[must_use]
    pub fn with_override(mut self, operation: Operation, roles: Vec<RoleId>) -> Self {
        self.role_overrides.insert(operation, roles);
        self
    }

    #[must_use]
    pub fn with_setup_users(mut self, users: Vec<UserId>) -> Self {
        self.setup_users = users;
        self
    }

    #[must_use]
    pub fn rule(operation: Operation) -> Rule {
        POLICY_TABLE
            .iter()
            .find(|(op, _)| *op == operation)
            .map_or(Rule::NOBODY, |(_, rule)| *rule)
    }

    /// Roles that count as staff for `operation`
    #[must_use]
    pub fn staff_roles(&self, operation: Operation) -> &[RoleId] {
        self.role_overrides
            .get(&operation)
            .unwrap_or(&self.staff_roles)
    }

    /// Whether the member holds a staff role for any operation
    #[must_use]
    pub fn is_staff(&self, member: &Member) -> bool {
        member.has_any_role(&self.staff_roles)
    }

    /// Check `member` against the rule for `operation`
    pub fn evaluate(&self, operation: Operation, member: &Member) -> Result<Access> {
        let rule = Self::rule(operation);

        let granted = rule.anyone
            || (rule.staff && member.has_any_role(self.staff_roles(operation)))
            || (rule.admin && member.is_admin())
            || rule
                .permission
                .is_some_and(|permission| member.has_permission(permission))
            || (rule.setup_users && self.setup_users.contains(&member.id));

        if granted {
            Ok(Access::Granted)
        } else if rule.owner {
            Ok(Access::OwnerOnly)
        } else {
            Err(DeskError::unauthorized(
                operation,
                format!("{} lacks the required role or permission", member.tag),
            ))
        }
    }
}
