mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::grant::HolderKind;
use commands::*;
use privtree_engine::EngineConfig;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "privtree")]
#[command(about = "Hierarchical privilege tree administration")]
struct Cli {
    /// Database URL (sqlite://...)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Path to the SQLite database file (defaults to ~/.privtree/store.db)
    #[arg(long, env = "PRIVTREE_DB_PATH")]
    db: Option<String>,

    /// User the command runs as
    #[arg(long = "as", env = "PRIVTREE_USER")]
    acting_as: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the root node and its first administrator
    Init {
        /// Administrator user name (created if missing)
        admin: String,

        /// Name of the root node
        #[arg(long, default_value = "root")]
        root_name: String,
    },
    /// User commands
    User {
        #[command(subcommand)]
        user_cmd: UserCommand,
    },
    /// User group commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Resource group commands
    ResourceGroup {
        #[command(subcommand)]
        resource_group_cmd: ResourceGroupCommand,
    },
    /// Tree node commands
    Node {
        #[command(subcommand)]
        node_cmd: NodeCommand,
    },
    /// Enable or disable one privilege for a holder at a node
    Grant {
        /// Node id or /path
        node: String,
        /// Holder kind
        #[arg(value_enum)]
        holder_kind: HolderKind,
        /// User, group or resource group name
        holder: String,
        /// Privilege name, or `block` / `cascade`
        privilege: String,
        /// Remove the privilege instead of adding it
        #[arg(long)]
        revoke: bool,
    },
    /// Add several privileges for a holder at a node at once
    Bundle {
        /// Node id or /path
        node: String,
        /// Holder kind
        #[arg(value_enum)]
        holder_kind: HolderKind,
        /// User, group or resource group name
        holder: String,
        /// Privilege names, `block` or `cascade`
        #[arg(required = true)]
        privileges: Vec<String>,
    },
    /// Show direct, cascaded and effective privileges at a node
    Show {
        /// Node id or /path
        node: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Exit non-zero unless the user holds the privilege at the node
    Check {
        /// User name
        user: String,
        /// Node id or /path
        node: String,
        /// Privilege name
        privilege: String,
    },
    /// List the privileges a user effectively holds at a node
    Privileges {
        /// User name
        user: String,
        /// Node id or /path
        node: String,
    },
    /// List every node where a user holds a privilege
    Where {
        /// User name
        user: String,
        /// Privilege name
        privilege: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a new user
    Create {
        /// User name
        name: String,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Create a new user group
    Create {
        /// Group name
        name: String,
        /// Group description
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// Add a user to a group
    AddMember {
        /// Group name
        group: String,
        /// User name
        user: String,
    },
    /// Remove a user from a group
    RemoveMember {
        /// Group name
        group: String,
        /// User name
        user: String,
    },
}

#[derive(Subcommand)]
enum ResourceGroupCommand {
    /// Create a new resource group
    Create {
        /// Resource type (computer, image, schedule, managementnode, addomain, serverprofile)
        resource_type: String,
        /// Resource group name
        name: String,
        /// Owning user group
        #[arg(long)]
        owner: String,
    },
    /// List resource groups
    List,
}

#[derive(Subcommand)]
enum NodeCommand {
    /// Create a child node
    Create {
        /// Parent node id or /path
        parent: String,
        /// Child name
        name: String,
    },
    /// Rename a node
    Rename {
        /// Node id or /path
        node: String,
        /// New name
        new_name: String,
    },
    /// Delete a node and everything below it
    Delete {
        /// Node id or /path
        node: String,
    },
    /// Move a node under a new parent; prints a revert token
    Move {
        /// Node id or /path
        node: String,
        /// New parent id or /path
        new_parent: String,
    },
    /// Undo a recent move using its revert token
    Revert {
        /// Token JSON printed by `node move`
        token: String,
    },
    /// Print the subtree below a node
    Tree {
        /// Node id or /path
        #[arg(default_value = "/")]
        node: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::open(cli.database_url, cli.db, cli.acting_as, config).await?;

    match cli.command {
        Command::Init { admin, root_name } => {
            cmd_init(&ctx, &admin, &root_name).await?;
        }
        Command::User { user_cmd } => match user_cmd {
            UserCommand::Create { name } => {
                cmd_user_create(&ctx, &name).await?;
            }
        },
        Command::Group { group_cmd } => match group_cmd {
            GroupCommand::Create { name, description } => {
                cmd_group_create(&ctx, name, description).await?;
            }
            GroupCommand::AddMember { group, user } => {
                cmd_group_add_member(&ctx, &group, &user).await?;
            }
            GroupCommand::RemoveMember { group, user } => {
                cmd_group_remove_member(&ctx, &group, &user).await?;
            }
        },
        Command::ResourceGroup { resource_group_cmd } => match resource_group_cmd {
            ResourceGroupCommand::Create {
                resource_type,
                name,
                owner,
            } => {
                cmd_resource_group_create(&ctx, &resource_type, name, &owner).await?;
            }
            ResourceGroupCommand::List => {
                cmd_resource_group_list(&ctx).await?;
            }
        },
        Command::Node { node_cmd } => match node_cmd {
            NodeCommand::Create { parent, name } => {
                cmd_node_create(&ctx, &parent, &name).await?;
            }
            NodeCommand::Rename { node, new_name } => {
                cmd_node_rename(&ctx, &node, &new_name).await?;
            }
            NodeCommand::Delete { node } => {
                cmd_node_delete(&ctx, &node).await?;
            }
            NodeCommand::Move { node, new_parent } => {
                cmd_node_move(&ctx, &node, &new_parent).await?;
            }
            NodeCommand::Revert { token } => {
                cmd_node_revert(&ctx, &token).await?;
            }
            NodeCommand::Tree { node, json } => {
                cmd_node_tree(&ctx, &node, json).await?;
            }
        },
        Command::Grant {
            node,
            holder_kind,
            holder,
            privilege,
            revoke,
        } => {
            cmd_grant(&ctx, &node, holder_kind, &holder, &privilege, !revoke).await?;
        }
        Command::Bundle {
            node,
            holder_kind,
            holder,
            privileges,
        } => {
            cmd_bundle(&ctx, &node, holder_kind, &holder, &privileges).await?;
        }
        Command::Show { node, json } => {
            cmd_show(&ctx, &node, json).await?;
        }
        Command::Check {
            user,
            node,
            privilege,
        } => {
            cmd_check(&ctx, &user, &node, &privilege).await?;
        }
        Command::Privileges { user, node } => {
            cmd_privileges(&ctx, &user, &node).await?;
        }
        Command::Where { user, privilege } => {
            cmd_where(&ctx, &user, &privilege).await?;
        }
    }

    Ok(())
}

// ────────────────────────────────────── Tests ──────────────────────────────────────
