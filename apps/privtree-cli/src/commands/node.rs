use privtree_engine::RevertToken;

use super::Context;

pub async fn cmd_node_create(
    ctx: &Context,
    parent: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let parent_id = ctx.node(parent).await?;

    let id = ctx
        .engine
        .create_child_node(&requester, &parent_id, name)
        .await?;

    println!("Created node: {}", name);
    println!("  ID: {}", id);

    Ok(())
}

pub async fn cmd_node_rename(
    ctx: &Context,
    node: &str,
    new_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let node_id = ctx.node(node).await?;

    ctx.engine.rename_node(&requester, &node_id, new_name).await?;

    println!("Renamed node {} to {}", node_id, new_name);

    Ok(())
}

pub async fn cmd_node_delete(ctx: &Context, node: &str) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let node_id = ctx.node(node).await?;

    let deleted = ctx.engine.delete_subtree(&requester, &node_id).await?;

    println!("Deleted {} node(s)", deleted.removed.len());
    println!("  Parent: {}", deleted.parent_id);

    Ok(())
}

/// Moves a node and prints the revert token as JSON on stdout.
pub async fn cmd_node_move(
    ctx: &Context,
    node: &str,
    new_parent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let node_id = ctx.node(node).await?;
    let new_parent_id = ctx.node(new_parent).await?;

    let token = ctx
        .engine
        .move_node(&requester, &node_id, &new_parent_id)
        .await?;

    eprintln!(
        "Moved node {} under {} (revertible until {})",
        node_id, new_parent_id, token.expires_at
    );
    println!("{}", serde_json::to_string(&token)?);

    Ok(())
}

pub async fn cmd_node_revert(ctx: &Context, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let requester = ctx.requester().await?;
    let token: RevertToken = serde_json::from_str(token)?;

    ctx.engine.revert_move(&requester, &token).await?;

    println!(
        "Moved node {} back under {}",
        token.node_id, token.old_parent_id
    );

    Ok(())
}

pub async fn cmd_node_tree(
    ctx: &Context,
    node: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let node_id = ctx.node(node).await?;
    let tree = ctx.engine.get_node_tree(&node_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", tree);
    }

    Ok(())
}
