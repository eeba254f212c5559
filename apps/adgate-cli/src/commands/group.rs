//! Group commands

use adgate_directory::ad::GROUP_TYPE_GLOBAL_SECURITY;
use adgate_directory::{GroupChanges, IdType, NewGroup};
use clap::{Args, Subcommand};
use serde_json::json;

use super::{connect, print_json, search_base};
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommands,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// Look up a group with its full member list
    Get(GetArgs),
    /// Create a group
    Create(CreateArgs),
    /// Replace attributes and optionally move the group
    Update(UpdateArgs),
    /// Add members; members already present are skipped
    AddMembers(MembersArgs),
    /// Remove members; non-members are skipped
    RemoveMembers(MembersArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub id: String,

    #[arg(long, default_value = "sAMAccountName")]
    pub id_type: IdType,

    #[arg(long)]
    pub search_base: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub account: String,

    /// Container DN the group is created in
    #[arg(long)]
    pub org_unit: String,

    #[arg(long, default_value = "")]
    pub display_name: String,

    /// Defaults to LDAP_DEFAULT_GROUP_DESCRIPTION
    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value_t = GROUP_TYPE_GLOBAL_SECURITY, allow_hyphen_values = true)]
    pub group_type: i64,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub get: GetArgs,

    #[arg(long, default_value = "")]
    pub display_name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub mail: String,

    #[arg(long = "proxy-address")]
    pub proxy_addresses: Vec<String>,

    #[arg(long, default_value = "")]
    pub org_unit: String,
}

#[derive(Args, Debug)]
pub struct MembersArgs {
    /// Group identifier
    pub group: String,

    /// Member identifiers
    #[arg(required = true, num_args = 1..)]
    pub members: Vec<String>,

    #[arg(long, default_value = "sAMAccountName")]
    pub group_id_type: IdType,

    #[arg(long, default_value = "sAMAccountName")]
    pub member_id_type: IdType,

    /// Container both the group and the members are searched under
    #[arg(long)]
    pub search_base: Option<String>,
}

/// Execute group commands
pub async fn execute(args: GroupArgs) -> CliResult<()> {
    let service = connect()?;
    let result = match args.command {
        GroupCommands::Get(a) => service
            .get_group(&a.id, &a.id_type, search_base(&a.search_base))
            .await
            .map(|group| json!(group)),
        GroupCommands::Create(a) => {
            let new_group = NewGroup {
                account: a.account,
                org_unit: a.org_unit,
                display_name: a.display_name,
                description: a.description,
                group_type: a.group_type,
            };
            service
                .create_group(&new_group)
                .await
                .map(|()| json!({ "created": new_group.distinguished_name() }))
        }
        GroupCommands::Update(a) => {
            let changes = GroupChanges {
                display_name: a.display_name,
                description: a.description,
                proxy_addresses: a.proxy_addresses,
                mail: a.mail,
                org_unit: a.org_unit,
            };
            service
                .update_group(
                    &a.get.id,
                    &a.get.id_type,
                    search_base(&a.get.search_base),
                    &changes,
                )
                .await
                .map(|group| json!(group))
        }
        GroupCommands::AddMembers(a) => service
            .add_group_members(
                &a.group,
                &a.group_id_type,
                &a.members,
                &a.member_id_type,
                search_base(&a.search_base),
            )
            .await
            .map(|update| json!({ "message": update.message(), "group": update.group })),
        GroupCommands::RemoveMembers(a) => service
            .remove_group_members(
                &a.group,
                &a.group_id_type,
                &a.members,
                &a.member_id_type,
                search_base(&a.search_base),
            )
            .await
            .map(|update| json!({ "message": update.message(), "group": update.group })),
    };
    service.shutdown().await;

    print_json(&result?)
}
