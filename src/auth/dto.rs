use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    House,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::House => "house",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "house" => Some(Role::House),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub area: String,
    pub address: String,
}

/// Raw `users` row. Role and profile fields stay optional in the store; the
/// usable shape is [`Profile`].
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub subject: String,
    pub email: String,
    pub role: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub area: Option<String>,
    pub address: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A profile is usable for ordering/listing only once role and name are both
/// present; everything gated on that is typed against [`CompleteProfile`]
/// instead of re-checking nulls.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Profile {
    Incomplete { id: Uuid, email: String },
    Complete(CompleteProfile),
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub phone: String,
    pub location: Option<Location>,
}

impl From<UserRow> for Profile {
    fn from(row: UserRow) -> Self {
        let role = row.role.as_deref().and_then(Role::parse);
        match (role, row.name) {
            (Some(role), Some(name)) => Profile::Complete(CompleteProfile {
                id: row.id,
                email: row.email,
                role,
                name,
                phone: row.phone.unwrap_or_default(),
                location: match (row.area, row.address) {
                    (Some(area), Some(address)) => Some(Location { area, address }),
                    _ => None,
                },
            }),
            _ => Profile::Incomplete {
                id: row.id,
                email: row.email,
            },
        }
    }
}

impl CompleteProfile {
    /// Role gate for the house-only and student-only surfaces.
    pub fn require_role(&self, role: Role) -> Result<(), crate::error::ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(crate::error::ApiError::Forbidden(format!(
                "this operation is only available to {} accounts",
                role.as_str()
            )))
        }
    }
}

impl Profile {
    pub fn id(&self) -> Uuid {
        match self {
            Profile::Incomplete { id, .. } => *id,
            Profile::Complete(p) => p.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ProfileDetailsRequest {
    pub name: String,
    pub phone: String,
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            subject: "sub-123".into(),
            email: "s@campus.edu".into(),
            role: None,
            name: None,
            phone: None,
            area: None,
            address: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn bare_row_is_incomplete() {
        assert!(matches!(Profile::from(row()), Profile::Incomplete { .. }));
    }

    #[test]
    fn role_without_name_is_still_incomplete() {
        let mut r = row();
        r.role = Some("student".into());
        assert!(matches!(Profile::from(r), Profile::Incomplete { .. }));
    }

    #[test]
    fn role_and_name_make_a_complete_profile() {
        let mut r = row();
        r.role = Some("house".into());
        r.name = Some("Ammas Kitchen".into());
        r.phone = Some("9876543210".into());
        r.area = Some("Kattangal".into());
        r.address = Some("House 12, NIT Rd".into());
        match Profile::from(r) {
            Profile::Complete(p) => {
                assert_eq!(p.role, Role::House);
                assert_eq!(p.name, "Ammas Kitchen");
                assert_eq!(p.location.unwrap().area, "Kattangal");
            }
            other => panic!("expected complete profile, got {other:?}"),
        }
    }

    #[test]
    fn unknown_role_string_is_ignored() {
        let mut r = row();
        r.role = Some("admin".into());
        r.name = Some("x".into());
        assert!(matches!(Profile::from(r), Profile::Incomplete { .. }));
    }
}
