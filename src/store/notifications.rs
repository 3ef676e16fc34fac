use crate::error::Result;
use crate::models::{Notification, PageMeta};
use super::{Feedback, Store};

pub const NOTIFICATION_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationsState {
    pub items: Vec<Notification>,
    pub meta: Option<PageMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationsAction {
    Pending,
    Loaded {
        items: Vec<Notification>,
        meta: Option<PageMeta>,
    },
    MarkedRead(String),
    MarkedAllRead,
    Rejected(String),
}

impl NotificationsState {
    pub fn reduce(&mut self, action: NotificationsAction) {
        match action {
            NotificationsAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            NotificationsAction::Loaded { items, meta } => {
                self.loading = false;
                self.items = items;
                self.meta = meta;
            }
            NotificationsAction::MarkedRead(id) => {
                if let Some(item) = self.items.iter_mut().find(|n| n.id == id) {
                    item.is_read = true;
                }
            }
            NotificationsAction::MarkedAllRead => {
                self.items.iter_mut().for_each(|n| n.is_read = true);
            }
            NotificationsAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
        }
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }
}

impl Store {
    pub async fn fetch_notifications(&self, page: u32) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("notifications/list/{}", page)) else {
            return Ok(());
        };
        self.run(
            "notifications/list",
            Feedback::Read,
            |s| s.notifications.reduce(NotificationsAction::Pending),
            async {
                self.api()
                    .get_notifications(page, NOTIFICATION_PAGE_SIZE)
                    .await?
                    .into_page()
            },
            |s, (items, meta): &(Vec<Notification>, Option<PageMeta>)| {
                s.notifications.reduce(NotificationsAction::Loaded {
                    items: items.clone(),
                    meta: *meta,
                })
            },
            |s, message| s.notifications.reduce(NotificationsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        self.run(
            "notifications/mark-read",
            Feedback::Read,
            |_| {},
            async { self.api().mark_notification_read(notification_id).await?.ensure_success() },
            |s, _: &()| s.notifications.reduce(NotificationsAction::MarkedRead(notification_id.to_string())),
            |s, message| s.notifications.reduce(NotificationsAction::Rejected(message)),
        )
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        self.run(
            "notifications/mark-all-read",
            Feedback::Mutation("All notifications marked as read"),
            |_| {},
            async { self.api().mark_all_notifications_read().await?.ensure_success() },
            |s, _: &()| s.notifications.reduce(NotificationsAction::MarkedAllRead),
            |s, message| s.notifications.reduce(NotificationsAction::Rejected(message)),
        )
        .await
    }
}
