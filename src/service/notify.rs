use tracing::{error, info, warn};

use crate::mail::{Mailer, OutgoingEmail};
use crate::model::notification::NewNotification;
use crate::model::user::User;
use crate::store::{Store, StoreResult};

/// Outcome of one fan-out. Failures never propagate; they are reported here.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub persisted: usize,
    pub emailed: usize,
    pub failures: Vec<String>,
}

impl Dispatch {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Non-blocking message for the API response, if anything went wrong.
    pub fn warning(&self) -> Option<String> {
        if self.is_clean() {
            None
        } else {
            Some(format!(
                "Saved, but notification delivery failed: {}",
                self.failures.join("; ")
            ))
        }
    }
}

/// Persists an in-app notification for every recipient and emails each of them.
pub async fn dispatch(
    store: &dyn Store,
    mailer: &dyn Mailer,
    sender_id: Option<u64>,
    recipients: &[User],
    subject: &str,
    message: &str,
) -> Dispatch {
    let mut outcome = Dispatch::default();

    for user in recipients {
        let notification = NewNotification {
            recipient_id: user.id,
            sender_id,
            subject: subject.to_string(),
            message: message.to_string(),
        };
        match store.create_notification(notification).await {
            Ok(_) => outcome.persisted += 1,
            Err(e) => {
                error!(error = %e, recipient_id = user.id, "Failed to create notification");
                outcome
                    .failures
                    .push(format!("in-app notification for {}", user.username));
            }
        }
    }

    for user in recipients.iter().filter(|u| !u.email.trim().is_empty()) {
        let greeting = format!("Hi {},\n\n{}\n\nStaffHub", user.display_name(), message);
        let email = OutgoingEmail::new(vec![user.email.clone()], subject, greeting).with_html_from_text();
        match mailer.send(&email).await {
            Ok(()) => outcome.emailed += 1,
            Err(e) => {
                warn!(error = %e, recipient = %user.email, "Failed to send notification email");
                outcome.failures.push(format!("email to {}", user.email));
            }
        }
    }

    info!(
        subject,
        persisted = outcome.persisted,
        emailed = outcome.emailed,
        failed = outcome.failures.len(),
        "Notification dispatched"
    );
    outcome
}

/// `dispatch` for recipients that still have to be looked up. A failed
/// lookup is reported in the outcome like any other delivery failure.
pub async fn dispatch_to(
    store: &dyn Store,
    mailer: &dyn Mailer,
    sender_id: Option<u64>,
    recipients: StoreResult<Vec<User>>,
    subject: &str,
    message: &str,
) -> Dispatch {
    match recipients {
        Ok(users) => dispatch(store, mailer, sender_id, &users, subject, message).await,
        Err(e) => {
            error!(error = %e, subject, "Failed to look up notification recipients");
            Dispatch {
                failures: vec!["recipient lookup".to_string()],
                ..Dispatch::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::RecordingMailer;
    use crate::model::role::Role;
    use crate::model::user::NewUser;
    use crate::store::memory::InMemoryStore;

    async fn staff(store: &InMemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{}@staffhub.test", name),
                role: Role::Staff,
                password_hash: "x".into(),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn persists_and_emails_every_recipient() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::default();
        let a = staff(&store, "alice").await;
        let b = staff(&store, "bob").await;

        let outcome = dispatch(&store, &mailer, None, &[a.clone(), b], "Hello", "Body").await;

        assert!(outcome.is_clean());
        assert_eq!((outcome.persisted, outcome.emailed), (2, 2));
        assert_eq!(store.count_unread(a.id).await.unwrap(), 1);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].text_body.contains("Body"));
    }

    #[actix_web::test]
    async fn mail_failure_is_reported_not_raised() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::failing();
        let a = staff(&store, "alice").await;

        let outcome = dispatch(&store, &mailer, None, &[a.clone()], "Hello", "Body").await;

        assert_eq!(outcome.persisted, 1);
        assert_eq!(outcome.emailed, 0);
        assert!(outcome.warning().unwrap().contains("alice@staffhub.test"));
        assert_eq!(store.count_unread(a.id).await.unwrap(), 1);
    }
}
