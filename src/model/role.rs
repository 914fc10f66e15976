use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin = 1,
    Admin = 2,
    Cashier = 3,
    Employee = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::SuperAdmin),
            2 => Some(Role::Admin),
            3 => Some(Role::Cashier),
            4 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// SUPER_ADMIN is the only role not bound to one enterprise.
    pub fn is_global(self) -> bool {
        self == Role::SuperAdmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_id_round_trip() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Cashier, Role::Employee] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Role::SuperAdmin.to_string(), "SUPER_ADMIN");
        assert_eq!(Role::from_str("CASHIER").ok(), Some(Role::Cashier));
        assert_eq!(
            serde_json::to_string(&Role::Admin).unwrap_or_default(),
            "\"ADMIN\""
        );
    }
}
