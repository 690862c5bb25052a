//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! BS_PASSWORD='...' bs-cli user create -u carol -e carol@example.com -r root
//! ```

use brokeshop_core::{Email, Role, Username};
use brokeshop_storefront::services::{AuthError, AuthService};

use super::{CliError, connect};

/// Create an account with an explicit role.
///
/// # Returns
///
/// The ID of the created account.
pub async fn create(
    username: &str,
    email: &str,
    role: &str,
    password: &str,
) -> Result<i32, CliError> {
    let role: Role = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let username = Username::parse(username).map_err(AuthError::from)?;
    let email = Email::parse(email).map_err(AuthError::from)?;

    let pool = connect().await?;

    tracing::info!("Creating {role} account: {username} ({email})");
    let user = AuthService::new(&pool)
        .create_account(&username, &email, password, role)
        .await?;

    tracing::info!("Account created successfully! ID: {}", user.id);
    Ok(user.id.as_i32())
}
