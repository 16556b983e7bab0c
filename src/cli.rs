use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::auth::password::{MIN_PASSWORD_LEN, hash_password};
use crate::error::FieldErrors;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, is_valid_email};
use crate::service::invitation::check_username;
use crate::store::Store;

#[derive(Debug, Parser)]
#[command(name = "staffhub", version, about = "Staff attendance and leave management service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
}

#[derive(Debug, Args)]
pub struct CreateAdminArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
}

pub async fn create_admin(store: &dyn Store, args: CreateAdminArgs) -> Result<User> {
    let email = args.email.trim().to_lowercase();
    let username = args.username.trim().to_string();

    let mut errors = FieldErrors::new();
    check_username(&mut errors, &username);
    if !errors.is_empty() {
        bail!("invalid username {:?}", username);
    }
    if !is_valid_email(&email) {
        bail!("invalid email {:?}", email);
    }
    if args.password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }
    if store.find_user_by_username(&username).await?.is_some() {
        bail!("username {:?} is already taken", username);
    }
    if store.find_user_by_email(&email).await?.is_some() {
        bail!("email {:?} is already registered", email);
    }

    let password_hash = hash_password(&args.password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?;
    let user = store
        .create_user(NewUser {
            username,
            email,
            role: Role::Admin,
            password_hash,
            first_name: args.first_name.trim().to_string(),
            last_name: args.last_name.trim().to_string(),
        })
        .await
        .context("failed to create admin")?;

    info!(user_id = user.id, username = %user.username, "Admin account created");
    Ok(user)
}
