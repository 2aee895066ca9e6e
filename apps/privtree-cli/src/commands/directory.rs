use privtree_storage::{
    CreateGroupParams, CreateResourceGroupParams, Directory, ResourceType, Store, StoreError,
};

use super::Context;

pub async fn cmd_init(
    ctx: &Context,
    admin: &str,
    root_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let admin_id = match ctx.store.get_user_by_name(admin).await {
        Ok(user) => user.id,
        Err(StoreError::NotFound) => {
            let id = ctx.store.create_user(admin).await?;
            println!("Created user: {}", admin);
            id
        }
        Err(e) => return Err(e.into()),
    };

    let root = ctx.engine.bootstrap(&admin_id, root_name).await?;

    println!("Initialized privilege tree");
    println!("  Root: {} ({})", root.name, root.id);
    println!("  Administrator: {}", admin);

    Ok(())
}

pub async fn cmd_user_create(ctx: &Context, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = ctx.store.create_user(name).await?;

    println!("Created user: {}", name);
    println!("  ID: {}", id);

    Ok(())
}

pub async fn cmd_group_create(
    ctx: &Context,
    name: String,
    description: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = ctx
        .store
        .create_group(&CreateGroupParams {
            name: name.clone(),
            description: description.clone(),
        })
        .await?;

    println!("Created group: {}", name);
    println!("  ID: {}", id);
    if let Some(description) = description {
        println!("  Description: {}", description);
    }

    Ok(())
}

pub async fn cmd_group_add_member(
    ctx: &Context,
    group: &str,
    user: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let group_id = ctx.group(group).await?;
    let user_id = ctx.user(user).await?;

    ctx.store.add_group_member(&group_id, &user_id).await?;

    println!("Added {} to group {}", user, group);

    Ok(())
}

pub async fn cmd_group_remove_member(
    ctx: &Context,
    group: &str,
    user: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let group_id = ctx.group(group).await?;
    let user_id = ctx.user(user).await?;

    ctx.store.remove_group_member(&group_id, &user_id).await?;

    println!("Removed {} from group {}", user, group);

    Ok(())
}

pub async fn cmd_resource_group_create(
    ctx: &Context,
    resource_type: &str,
    name: String,
    owner_group: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let resource_type: ResourceType = resource_type.parse()?;
    let owner_group_id = ctx.group(owner_group).await?;

    let id = ctx
        .store
        .create_resource_group(&CreateResourceGroupParams {
            resource_type,
            name: name.clone(),
            owner_group_id,
        })
        .await?;

    println!("Created resource group: {}/{}", resource_type, name);
    println!("  ID: {}", id);
    println!("  Owner group: {}", owner_group);

    Ok(())
}

pub async fn cmd_resource_group_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let groups = ctx.store.list_resource_groups().await?;

    if groups.is_empty() {
        println!("No resource groups found");
        return Ok(());
    }

    println!("Resource groups:");
    for rg in groups {
        let owner = ctx.store.get_group(&rg.owner_group_id).await?;
        println!(
            "  {}/{} (owner: {}) - {}",
            rg.resource_type, rg.name, owner.name, rg.id
        );
    }

    Ok(())
}
