use privtree_engine::Holder;
use privtree_storage::{Directory, PrivilegeKind, Store};

use super::Context;

/// Print the privilege picture at a node: direct grants, what cascades in,
/// and the effective result per holder.
pub async fn cmd_show(
    ctx: &Context,
    node: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let node_id = ctx.node(node).await?;
    let privileges = ctx.engine.get_effective_privileges(&node_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&privileges)?);
        return Ok(());
    }

    let effective = privileges.effective();
    if privileges.local.is_empty() && effective.is_empty() {
        println!("No privileges at {}", node);
        return Ok(());
    }

    println!("Privileges at {}:", node);
    let holders = privileges
        .local
        .iter()
        .map(|(h, _)| h)
        .chain(effective.iter().map(|(h, _)| h))
        .collect::<std::collections::BTreeSet<_>>();
    for holder in holders {
        let label = holder_label(ctx, holder).await?;
        let mut flags = Vec::new();
        if privileges.local.holds(holder, &PrivilegeKind::Block) {
            flags.push("block");
        }
        if privileges.local.holds(holder, &PrivilegeKind::Cascade) {
            flags.push("cascade");
        }
        let names: Vec<String> = effective
            .get(holder)
            .map(|set| set.iter().map(|k| k.to_string()).collect())
            .unwrap_or_default();

        println!("  {}", label);
        if !flags.is_empty() {
            println!("    Flags: {}", flags.join(", "));
        }
        println!("    Effective: {}", names.join(", "));
    }

    Ok(())
}

pub async fn cmd_check(
    ctx: &Context,
    user: &str,
    node: &str,
    privilege: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user(user).await?;
    let node_id = ctx.node(node).await?;
    let kind: PrivilegeKind = privilege.parse()?;

    let allowed = ctx.engine.has_privilege(&user_id, &node_id, &kind).await?;

    if allowed {
        println!("{} has {} at {}", user, privilege, node);
        Ok(())
    } else {
        Err(format!("{} does not have {} at {}", user, privilege, node).into())
    }
}

pub async fn cmd_privileges(
    ctx: &Context,
    user: &str,
    node: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user(user).await?;
    let node_id = ctx.node(node).await?;

    let names = ctx
        .engine
        .effective_privileges_for(&user_id, &node_id)
        .await?;

    if names.is_empty() {
        println!("{} has no privileges at {}", user, node);
        return Ok(());
    }

    println!("Privileges of {} at {}:", user, node);
    for name in names {
        println!("  {}", name);
    }

    Ok(())
}

pub async fn cmd_where(
    ctx: &Context,
    user: &str,
    privilege: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = ctx.user(user).await?;
    let kind: PrivilegeKind = privilege.parse()?;

    let nodes = ctx.engine.nodes_with_privilege(&user_id, &kind).await?;

    if nodes.is_empty() {
        println!("{} has {} nowhere", user, privilege);
        return Ok(());
    }

    println!("Nodes where {} has {}:", user, privilege);
    for node_id in nodes {
        let node = ctx.store.get_node(&node_id).await?;
        println!("  {} ({})", node.name, node.id);
    }

    Ok(())
}

async fn holder_label(ctx: &Context, holder: Holder) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match holder {
        Holder::User(id) => format!("user {}", ctx.store.get_user(&id).await?.name),
        Holder::Group(id) => format!("group {}", ctx.store.get_group(&id).await?.name),
        Holder::Resource(id) => {
            let rg = ctx.store.get_resource_group(&id).await?;
            format!("resource {}/{}", rg.resource_type, rg.name)
        }
    })
}
