//! User account commands

use adgate_directory::{IdType, NewUser, UserChanges};
use clap::{Args, Subcommand};
use serde_json::json;

use super::{connect, print_json, search_base};
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Look up a user
    Get(GetArgs),
    /// Create an enabled account with an initial password
    Create(CreateArgs),
    /// Replace a user's password and clear any lockout
    SetPassword(SetPasswordArgs),
    /// Replace attributes and optionally move the account
    Update(UpdateArgs),
}

#[derive(Args, Debug)]
pub struct Lookup {
    /// Identifier value
    pub id: String,

    /// Attribute the identifier refers to
    #[arg(long, default_value = "sAMAccountName")]
    pub id_type: IdType,

    /// Container to search under instead of the base DN
    #[arg(long)]
    pub search_base: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub lookup: Lookup,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Account name (sAMAccountName and CN)
    pub account: String,

    #[arg(long)]
    pub display_name: String,

    /// Container DN the account is created in
    #[arg(long)]
    pub org_unit: String,

    /// Account domain; defaults to LDAP_DOMAIN
    #[arg(long, default_value = "")]
    pub domain: String,

    #[arg(long, env = "ADGATE_USER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl std::fmt::Debug for CreateArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateArgs")
            .field("account", &self.account)
            .field("org_unit", &self.org_unit)
            .field("password", &"***REDACTED***")
            .finish_non_exhaustive()
    }
}

#[derive(Args)]
pub struct SetPasswordArgs {
    #[command(flatten)]
    pub lookup: Lookup,

    #[arg(long, env = "ADGATE_USER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl std::fmt::Debug for SetPasswordArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetPasswordArgs")
            .field("lookup", &self.lookup)
            .field("password", &"***REDACTED***")
            .finish()
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub lookup: Lookup,

    /// New sAMAccountName
    #[arg(long, default_value = "")]
    pub sam_account_name: String,

    #[arg(long, default_value = "")]
    pub display_name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub mail: String,

    /// Replacement proxy addresses (repeatable)
    #[arg(long = "proxy-address")]
    pub proxy_addresses: Vec<String>,

    #[arg(long, default_value_t = 0)]
    pub user_account_control: i64,

    /// Move the account under this container
    #[arg(long, default_value = "")]
    pub org_unit: String,
}

/// Execute user commands
pub async fn execute(args: UserArgs) -> CliResult<()> {
    let service = connect()?;
    let result = match args.command {
        UserCommands::Get(a) => {
            let lookup = a.lookup;
            service
                .get_user(&lookup.id, &lookup.id_type, search_base(&lookup.search_base))
                .await
                .map(|user| json!(user))
        }
        UserCommands::Create(a) => {
            let new_user = NewUser {
                account: a.account,
                display_name: a.display_name,
                org_unit: a.org_unit,
                password: a.password,
                domain: a.domain,
            };
            service
                .create_enabled_user(&new_user)
                .await
                .map(|()| json!({ "created": new_user.distinguished_name() }))
        }
        UserCommands::SetPassword(a) => {
            let lookup = a.lookup;
            service
                .set_user_password(
                    &lookup.id,
                    &lookup.id_type,
                    &a.password,
                    search_base(&lookup.search_base),
                )
                .await
                .map(|()| json!({ "status": "ok" }))
        }
        UserCommands::Update(a) => {
            let changes = UserChanges {
                sam_account_name: a.sam_account_name,
                display_name: a.display_name,
                description: a.description,
                user_account_control: a.user_account_control,
                proxy_addresses: a.proxy_addresses,
                mail: a.mail,
                org_unit: a.org_unit,
            };
            let lookup = a.lookup;
            service
                .update_user(
                    &lookup.id,
                    &lookup.id_type,
                    search_base(&lookup.search_base),
                    &changes,
                )
                .await
                .map(|user| json!(user))
        }
    };
    service.shutdown().await;

    print_json(&result?)
}
