use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Different privilege levels, as carried in the token's `rgt` claim.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Member = 0,
    Admin = 1,
    SuperAdmin = 2,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Member => "member",
                Self::Admin => "admin",
                Self::SuperAdmin => "super-admin",
            }
        )
    }
}

/// A class of user that a route can require.
pub trait Role {
    /// Shown in the refusal when the token's rights fall short.
    const NAME: &'static str;

    /// Does a principal with the given rights belong to this role?
    fn permits(rights: Rights) -> bool;
}

/// Any signed-in member, admins included.
pub enum Voter {}

impl Role for Voter {
    const NAME: &'static str = "member";

    fn permits(_rights: Rights) -> bool {
        true
    }
}

/// Admins and super-admins.
pub enum Admin {}

impl Role for Admin {
    const NAME: &'static str = "admin";

    fn permits(rights: Rights) -> bool {
        matches!(rights, Rights::Admin | Rights::SuperAdmin)
    }
}
