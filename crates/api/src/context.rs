use terminal_auth::StaffProfile;
use terminal_core::UserId;

/// Staff context for a request (authenticated identity + scope).
///
/// Present on every protected route; inserted by the auth middleware after
/// the token subject has been resolved against the staff directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffContext {
    profile: StaffProfile,
}

impl StaffContext {
    pub fn new(profile: StaffProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &StaffProfile {
        &self.profile
    }

    pub fn user_id(&self) -> &UserId {
        &self.profile.user_id
    }
}
