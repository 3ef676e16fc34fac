use crate::error::Result;
use crate::models::{AccountStatus, PageMeta, User, UserRole, UpdateUserStatusRequest, VerifyLawyerRequest};
use super::{Feedback, Store};

pub const USER_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminState {
    pub users: Vec<User>,
    pub users_meta: Option<PageMeta>,
    pub pending_lawyers: Vec<User>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    Pending,
    UsersLoaded {
        users: Vec<User>,
        meta: Option<PageMeta>,
    },
    PendingLawyersLoaded(Vec<User>),
    UserUpdated(User),
    /// Lawyer approved or rejected; either way it leaves the review queue.
    LawyerReviewed(User),
    Rejected(String),
}

impl AdminState {
    pub fn reduce(&mut self, action: AdminAction) {
        match action {
            AdminAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            AdminAction::UsersLoaded { users, meta } => {
                self.loading = false;
                self.users = users;
                self.users_meta = meta;
            }
            AdminAction::PendingLawyersLoaded(lawyers) => {
                self.loading = false;
                self.pending_lawyers = lawyers;
            }
            AdminAction::UserUpdated(user) => {
                self.loading = false;
                self.replace_user(user);
            }
            AdminAction::LawyerReviewed(user) => {
                self.loading = false;
                self.pending_lawyers.retain(|u| u.id != user.id);
                self.replace_user(user);
            }
            AdminAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
        }
    }

    fn replace_user(&mut self, user: User) {
        if let Some(existing) = self.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user;
        }
    }
}

impl Store {
    pub async fn fetch_users(&self, role: Option<UserRole>, page: u32) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("admin/users/{:?}/{}", role, page)) else {
            return Ok(());
        };
        self.run(
            "admin/users",
            Feedback::Read,
            |s| s.admin.reduce(AdminAction::Pending),
            async { self.api().get_users(role, page, USER_PAGE_SIZE).await?.into_page() },
            |s, (users, meta): &(Vec<User>, Option<PageMeta>)| {
                s.admin.reduce(AdminAction::UsersLoaded {
                    users: users.clone(),
                    meta: *meta,
                })
            },
            |s, message| s.admin.reduce(AdminAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn update_user_status(
        &self,
        user_id: &str,
        status: AccountStatus,
        reason: Option<String>,
    ) -> Result<User> {
        let request = UpdateUserStatusRequest { status, reason };
        self.run(
            "admin/update-user-status",
            Feedback::Mutation("User status updated"),
            |s| s.admin.reduce(AdminAction::Pending),
            async { self.api().update_user_status(user_id, &request).await?.into_data() },
            |s, user: &User| s.admin.reduce(AdminAction::UserUpdated(user.clone())),
            |s, message| s.admin.reduce(AdminAction::Rejected(message)),
        )
        .await
    }

    pub async fn fetch_pending_lawyers(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("admin/pending-lawyers".to_string()) else {
            return Ok(());
        };
        self.run(
            "admin/pending-lawyers",
            Feedback::Read,
            |s| s.admin.reduce(AdminAction::Pending),
            async { self.api().get_pending_lawyers().await?.into_data_or_default() },
            |s, lawyers: &Vec<User>| s.admin.reduce(AdminAction::PendingLawyersLoaded(lawyers.clone())),
            |s, message| s.admin.reduce(AdminAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn verify_lawyer(&self, lawyer_id: &str, approved: bool, reason: Option<String>) -> Result<User> {
        let request = VerifyLawyerRequest { approved, reason };
        let success = if approved { "Lawyer verified" } else { "Lawyer application rejected" };
        self.run(
            "admin/verify-lawyer",
            Feedback::Mutation(success),
            |s| s.admin.reduce(AdminAction::Pending),
            async { self.api().verify_lawyer(lawyer_id, &request).await?.into_data() },
            |s, user: &User| s.admin.reduce(AdminAction::LawyerReviewed(user.clone())),
            |s, message| s.admin.reduce(AdminAction::Rejected(message)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lawyer(id: &str) -> User {
        User {
            id: id.to_string(),
            role: UserRole::Lawyer,
            status: AccountStatus::Pending,
            ..User::default()
        }
    }

    #[test]
    fn reviewed_lawyer_leaves_queue_and_updates_listing() {
        let mut state = AdminState::default();
        state.reduce(AdminAction::UsersLoaded {
            users: vec![lawyer("l1"), lawyer("l2")],
            meta: None,
        });
        state.reduce(AdminAction::PendingLawyersLoaded(vec![lawyer("l1"), lawyer("l2")]));
        state.reduce(AdminAction::LawyerReviewed(User {
            is_verified: true,
            status: AccountStatus::Active,
            ..lawyer("l1")
        }));
        assert_eq!(state.pending_lawyers.len(), 1);
        assert_eq!(state.pending_lawyers[0].id, "l2");
        assert!(state.users[0].is_verified);
        assert_eq!(state.users[0].status, AccountStatus::Active);
    }
}
