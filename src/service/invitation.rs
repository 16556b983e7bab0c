use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{check_new_password, hash_password};
use crate::config::Config;
use crate::error::{AppError, FieldErrors, StoreError};
use crate::mail::{Mailer, OutgoingEmail};
use crate::model::invitation::Invitation;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, is_valid_email};
use crate::models::RegisterReqDto;
use crate::store::Store;
use crate::utils::username_index::UsernameIndex;

const MAX_USERNAME_LEN: usize = 150;

/// Letters, digits and `@ . + - _`, like most account systems accept.
pub fn check_username(errors: &mut FieldErrors, username: &str) {
    if username.is_empty() {
        errors.add("username", "Username is required.");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add("username", format!("Username must be at most {} characters.", MAX_USERNAME_LEN));
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.add(
            "username",
            "Username may only contain letters, digits and @/./+/-/_ characters.",
        );
    }
}

/// Creates a single-use invitation and emails the registration link.
///
/// Returns a warning instead of failing when only the email could not be sent.
#[instrument(skip(store, mailer, config))]
pub async fn invite(
    store: &dyn Store,
    mailer: &dyn Mailer,
    config: &Config,
    email: &str,
) -> Result<(Invitation, Option<String>), AppError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::field("email", "Enter a valid email address."));
    }
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("A user with this email already exists".to_string()));
    }
    if store.invitation_email_exists(&email).await? {
        return Err(AppError::Conflict("This email has already been invited".to_string()));
    }

    let token = Uuid::new_v4().to_string();
    let invitation = store.create_invitation(&email, &token).await.map_err(|e| match e {
        StoreError::Conflict(_) => AppError::Conflict("This email has already been invited".to_string()),
        other => other.into(),
    })?;
    info!(invitation_id = invitation.id, "Invitation created");

    let link = config.site_link(&format!("register/{}", token));
    let body = format!(
        "Hello,\n\nYou have been invited to join StaffHub. Complete your registration here:\n\n{}\n\nThe link can be used once.",
        link
    );
    let message = OutgoingEmail::new(vec![email.clone()], "You're invited to StaffHub", body).with_html_from_text();

    let warning = match mailer.send(&message).await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "Failed to send invitation email");
            Some(format!("Invitation saved, but the email to {} could not be sent", email))
        }
    };
    Ok((invitation, warning))
}

pub async fn open_invitation(store: &dyn Store, token: &str) -> Result<Invitation, AppError> {
    store
        .find_open_invitation(token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid or already used invitation".to_string()))
}

/// Turns an open invitation into a staff account.
#[instrument(skip(store, index, dto), fields(username = %dto.username))]
pub async fn register(
    store: &dyn Store,
    index: &UsernameIndex,
    token: &str,
    dto: &RegisterReqDto,
) -> Result<User, AppError> {
    let invitation = open_invitation(store, token).await?;

    let username = dto.username.trim();
    let mut errors = FieldErrors::new();
    check_username(&mut errors, username);
    check_new_password(&mut errors, "password", &dto.password, &dto.confirm_password);
    errors.into_result()?;

    if !index.is_available(username, store).await {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = hash_password(&dto.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let user = store
        .register_invited(
            token,
            NewUser {
                username: username.to_string(),
                email: invitation.email,
                role: Role::Staff,
                password_hash,
                first_name: dto.first_name.trim().to_string(),
                last_name: dto.last_name.trim().to_string(),
            },
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => AppError::NotFound("Invalid or already used invitation".to_string()),
            other => other.into(),
        })?;

    index.mark_taken(&user.username).await;
    info!(user_id = user.id, "Staff account registered from invitation");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::RecordingMailer;
    use crate::store::memory::InMemoryStore;

    fn dto(username: &str) -> RegisterReqDto {
        RegisterReqDto {
            username: username.into(),
            password: "s3cret-pass".into(),
            confirm_password: "s3cret-pass".into(),
            first_name: "New".into(),
            last_name: "Hire".into(),
        }
    }

    #[actix_web::test]
    async fn invite_emails_a_registration_link() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::default();

        let (invitation, warning) = invite(&store, &mailer, &Config::for_tests(), " New@Staffhub.test ")
            .await
            .unwrap();

        assert!(warning.is_none());
        assert_eq!(invitation.email, "new@staffhub.test");
        let sent = mailer.sent();
        assert!(sent[0].text_body.contains(&format!("http://staffhub.test/register/{}", invitation.token)));
    }

    #[actix_web::test]
    async fn duplicate_emails_are_refused() {
        let store = InMemoryStore::new();
        let mailer = RecordingMailer::default();
        let config = Config::for_tests();
        store.seed_user("alice", Role::Staff, "x");

        let err = invite(&store, &mailer, &config, "alice@staffhub.test").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        invite(&store, &mailer, &config, "bob@staffhub.test").await.unwrap();
        let err = invite(&store, &mailer, &config, "bob@staffhub.test").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = invite(&store, &mailer, &config, "not-an-email").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn mail_failure_keeps_the_invitation() {
        let store = InMemoryStore::new();
        let (invitation, warning) = invite(
            &store,
            &RecordingMailer::failing(),
            &Config::for_tests(),
            "bob@staffhub.test",
        )
        .await
        .unwrap();
        assert!(warning.is_some());
        assert!(open_invitation(&store, &invitation.token).await.is_ok());
    }

    #[actix_web::test]
    async fn invitation_registers_exactly_one_account() {
        let store = InMemoryStore::new();
        let index = UsernameIndex::new();
        let (invitation, _) = invite(
            &store,
            &RecordingMailer::default(),
            &Config::for_tests(),
            "bob@staffhub.test",
        )
        .await
        .unwrap();

        let user = register(&store, &index, &invitation.token, &dto("bob")).await.unwrap();
        assert_eq!(user.email, "bob@staffhub.test");
        assert_eq!(user.role, Role::Staff);
        assert!(!index.is_available("bob", &store).await);

        let err = register(&store, &index, &invitation.token, &dto("bobby"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.find_user_by_username("bobby").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn taken_username_and_bad_input_are_rejected() {
        let store = InMemoryStore::new();
        let index = UsernameIndex::new();
        store.seed_user("alice", Role::Staff, "x");
        index.mark_taken("alice").await;
        let (invitation, _) = invite(
            &store,
            &RecordingMailer::default(),
            &Config::for_tests(),
            "bob@staffhub.test",
        )
        .await
        .unwrap();

        let err = register(&store, &index, &invitation.token, &dto("Alice")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = register(&store, &index, &invitation.token, &dto("bad name!"))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("username")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(open_invitation(&store, &invitation.token).await.is_ok());
    }
}
