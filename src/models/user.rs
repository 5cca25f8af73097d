//! User accounts, roles and the role to permission table.

use serde::{Deserialize, Serialize};

/// Account role. Wire values are the ones used by the dashboards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "responsable_recherche")]
    ResearchLead,
    #[serde(rename = "responsable_admin")]
    AdminLead,
    #[serde(rename = "secretaire")]
    Secretary,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::ResearchLead,
        Role::AdminLead,
        Role::Secretary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ResearchLead => "responsable_recherche",
            Role::AdminLead => "responsable_admin",
            Role::Secretary => "secretaire",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.as_str() == s)
    }

    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[Upload, View, Edit, Delete, ManageUsers, AllStats],
            Role::ResearchLead => &[View, ResearchStats, Export],
            Role::AdminLead => &[Upload, View, Edit, AdminStats],
            Role::Secretary => &[View, BasicUpload],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

/// Capability checked by handlers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Upload,
    View,
    Edit,
    Delete,
    ManageUsers,
    AllStats,
    ResearchStats,
    Export,
    AdminStats,
    BasicUpload,
}

/// Where an account stands in the admin approval workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

/// A stored user account.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub is_approved: bool,
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserAccount {
    /// Admins bypass approval; everyone else must be approved.
    pub fn may_log_in(&self) -> Result<(), &'static str> {
        if self.role != Role::Admin
            && (!self.is_approved || self.approval_status != ApprovalStatus::Approved)
        {
            return Err("Your account is awaiting administrator approval");
        }
        if !self.is_active {
            return Err("Your account has been deactivated");
        }
        Ok(())
    }
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
}

/// Request body for registration. Fields default to empty so missing ones
/// are reported as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: UserAccount,
}

/// Request body for the admin approval endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApprovalRequest {
    pub status: String,
}
