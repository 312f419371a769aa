use serde::{Deserialize, Serialize};

use crate::state::Cadet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Cadet,
    Admin,
}

/// Identity returned by the auth endpoint, before it is matched to a cadet or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub platoon: Option<String>,
    #[serde(default)]
    pub squad: Option<u32>,
    #[serde(default)]
    pub cadet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    pub fn from_grant(grant: &AuthGrant, user: SessionUser) -> Self {
        Self {
            user,
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
        }
    }
}

/// A linked cadet record wins over the admin address; anything else is not a dashboard user.
pub fn resolve_user(
    identity: &AuthIdentity,
    cadet: Option<&Cadet>,
    admin_email: &str,
) -> Option<SessionUser> {
    if let Some(cadet) = cadet {
        return Some(SessionUser {
            id: identity.id.clone(),
            name: cadet.name.clone(),
            email: identity.email.clone(),
            role: Role::Cadet,
            platoon: Some(cadet.platoon.clone()),
            squad: Some(cadet.squad),
            cadet_id: Some(cadet.id.clone()),
        });
    }
    if !admin_email.is_empty() && identity.email.eq_ignore_ascii_case(admin_email) {
        return Some(SessionUser {
            id: identity.id.clone(),
            name: "Administrator".to_string(),
            email: identity.email.clone(),
            role: Role::Admin,
            platoon: None,
            squad: None,
            cadet_id: None,
        });
    }
    None
}
