use clap::ValueEnum;
use privtree_engine::GrantChange;
use privtree_storage::PrivilegeKind;

use super::Context;

/// Which kind of holder a grant command targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HolderKind {
    User,
    Group,
    Resource,
}

pub async fn cmd_grant(
    ctx: &Context,
    node: &str,
    holder_kind: HolderKind,
    holder: &str,
    privilege: &str,
    enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let node_id = ctx.node(node).await?;
    let kind: PrivilegeKind = privilege.parse()?;

    let change = match holder_kind {
        HolderKind::User => {
            let user_id = ctx.user(holder).await?;
            ctx.engine
                .set_user_privilege(&requester, &node_id, &user_id, kind, enabled)
                .await?
        }
        HolderKind::Group => {
            let group_id = ctx.group(holder).await?;
            ctx.engine
                .set_group_privilege(&requester, &node_id, &group_id, kind, enabled)
                .await?
        }
        HolderKind::Resource => {
            let rg_id = ctx.resource_group(holder).await?;
            ctx.engine
                .set_resource_privilege(&requester, &node_id, &rg_id, kind, enabled)
                .await?
        }
    };

    match change {
        GrantChange::Added => println!("Granted {} to {} at {}", privilege, holder, node),
        GrantChange::Removed => println!("Revoked {} from {} at {}", privilege, holder, node),
        GrantChange::Unchanged => println!("No change"),
    }

    Ok(())
}

pub async fn cmd_bundle(
    ctx: &Context,
    node: &str,
    holder_kind: HolderKind,
    holder: &str,
    privileges: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let node_id = ctx.node(node).await?;
    let kinds = privileges
        .iter()
        .map(|p| p.parse::<PrivilegeKind>())
        .collect::<Result<Vec<_>, _>>()?;

    let added = match holder_kind {
        HolderKind::User => {
            let user_id = ctx.user(holder).await?;
            ctx.engine
                .add_user_grant_bundle(&requester, &node_id, &user_id, &kinds)
                .await?
        }
        HolderKind::Group => {
            let group_id = ctx.group(holder).await?;
            ctx.engine
                .add_group_grant_bundle(&requester, &node_id, &group_id, &kinds)
                .await?
        }
        HolderKind::Resource => {
            let rg_id = ctx.resource_group(holder).await?;
            ctx.engine
                .add_resource_grant_bundle(&requester, &node_id, &rg_id, &kinds)
                .await?
        }
    };

    println!("Added {} new grant(s) for {} at {}", added, holder, node);

    Ok(())
}
