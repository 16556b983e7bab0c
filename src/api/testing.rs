use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::test::TestRequest;
use actix_web::web::Data;

use crate::auth::jwt::generate_access_token;
use crate::config::Config;
use crate::mail::Mailer;
use crate::mail::testing::RecordingMailer;
use crate::model::user::User;
use crate::store::Store;
use crate::store::memory::InMemoryStore;
use crate::utils::username_index::UsernameIndex;

/// Shared state for handler tests; see `init_app!`.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub index: Data<UsernameIndex>,
    pub config: Config,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(RecordingMailer::default())
    }

    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            mailer: Arc::new(mailer),
            index: Data::new(UsernameIndex::new()),
            config: Config::for_tests(),
        }
    }

    pub fn config_data(&self) -> Data<Config> {
        Data::new(self.config.clone())
    }

    pub fn store_data(&self) -> Data<dyn Store> {
        let store: Arc<dyn Store> = self.store.clone();
        Data::from(store)
    }

    pub fn mailer_data(&self) -> Data<dyn Mailer> {
        let mailer: Arc<dyn Mailer> = self.mailer.clone();
        Data::from(mailer)
    }

    pub fn token(&self, user: &User) -> String {
        generate_access_token(
            user.id,
            user.username.clone(),
            user.role.id(),
            &self.config.jwt_secret,
            self.config.access_token_ttl,
        )
        .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    /// Request from a fixed peer address, which the rate limiter keys on.
    pub fn request(method: actix_web::http::Method, uri: &str) -> TestRequest {
        TestRequest::default()
            .method(method)
            .uri(uri)
            .peer_addr(Self::peer())
    }

    pub fn as_user(&self, method: actix_web::http::Method, uri: &str, user: &User) -> TestRequest {
        Self::request(method, uri)
            .insert_header(("Authorization", format!("Bearer {}", self.token(user))))
    }
}
