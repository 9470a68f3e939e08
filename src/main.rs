//! Roster CLI - manage users, teams and team memberships
//!
//! Talks to the database named by `connection.url` in `app.properties`
//! (or `--database-url`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use roster_db::config::DEFAULT_PROPERTIES_FILE;
use roster_db::{DbManager, Team, User};
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SEPARATOR: &str = "===========================";

/// Roster - users, teams and who belongs where
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(about = "Roster - manage users, teams and team memberships")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Properties file containing connection.url
    #[arg(long, global = true, env = "ROSTER_CONFIG", default_value = DEFAULT_PROPERTIES_FILE)]
    config: PathBuf,

    /// Database URL (overrides the properties file)
    #[arg(long, global = true, env = "ROSTER_DATABASE_URL")]
    database_url: Option<String>,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the users, teams and users_teams tables
    Migrate,

    /// Run the scripted walkthrough against the configured database
    #[command(long_about = r#"
Run a scripted walkthrough: add users and teams, assign memberships in
transactions, delete a team (memberships cascade), rename a team, then
reset the database to a single user 'ivanov' and a single team 'teamA'.

Runs migrations first and seeds 'ivanov' and 'teamA' if they are missing.
    "#)]
    Demo,

    /// Manage users
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage teams
    Teams {
        #[command(subcommand)]
        action: TeamCommands,
    },

    /// Add a user to teams in one transaction (all or nothing)
    Assign {
        /// User login
        login: String,

        /// Team names
        #[arg(required = true)]
        teams: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// List all users
    List,
    /// Add a user
    Add { login: String },
    /// Delete users; stops at the first unknown login
    Delete {
        #[arg(required = true)]
        logins: Vec<String>,
    },
    /// List the teams a user belongs to
    Teams { login: String },
}

#[derive(Subcommand, Debug)]
enum TeamCommands {
    /// List all teams
    List,
    /// Add a team
    Add { name: String },
    /// Rename a team
    Rename { name: String, new_name: String },
    /// Delete a team and its memberships
    Delete { name: String },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

async fn open_manager(cli: &Cli) -> Result<DbManager> {
    if let Some(url) = &cli.database_url {
        info!("Connecting to database: {}", url);
        let db = roster_db::connect(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        return Ok(DbManager::new(db));
    }

    DbManager::from_properties(&cli.config)
        .await
        .with_context(|| format!("Failed to open database from {:?}", cli.config))
}

fn print_list<T: Display + Serialize>(items: &[T], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", item);
        }
    }
    Ok(())
}

async fn require_user(manager: &DbManager, login: &str) -> Result<User> {
    let user = manager.get_user(login).await;
    if !user.is_persisted() {
        bail!("No user with login '{}'", login);
    }
    Ok(user)
}

async fn require_team(manager: &DbManager, name: &str) -> Result<Team> {
    let team = manager.get_team(name).await;
    if !team.is_persisted() {
        bail!("No team named '{}'", name);
    }
    Ok(team)
}

async fn run_users(manager: &DbManager, action: UserCommands, json: bool) -> Result<()> {
    match action {
        UserCommands::List => print_list(&manager.find_all_users().await, json)?,
        UserCommands::Add { login } => {
            let mut user = User::new(login);
            if !manager.insert_user(&mut user).await {
                bail!("Failed to add user '{}'", user);
            }
            info!("Added user {} (id {})", user, user.id());
        }
        UserCommands::Delete { logins } => {
            let mut users = Vec::with_capacity(logins.len());
            for login in &logins {
                users.push(manager.get_user(login).await);
            }
            // Unknown logins become absent entries, which stop the delete there
            let entries = users.iter().map(|user| user.is_persisted().then_some(user));
            if !manager.delete_users(entries).await {
                bail!("Failed to delete all of {:?}", logins);
            }
        }
        UserCommands::Teams { login } => {
            let user = require_user(manager, &login).await?;
            print_list(&manager.get_user_teams(&user).await, json)?;
        }
    }
    Ok(())
}

async fn run_teams(manager: &DbManager, action: TeamCommands, json: bool) -> Result<()> {
    match action {
        TeamCommands::List => print_list(&manager.find_all_teams().await, json)?,
        TeamCommands::Add { name } => {
            let mut team = Team::new(name);
            if !manager.insert_team(&mut team).await {
                bail!("Failed to add team '{}'", team);
            }
            info!("Added team {} (id {})", team, team.id());
        }
        TeamCommands::Rename { name, new_name } => {
            let mut team = require_team(manager, &name).await?;
            team.set_name(new_name);
            if !manager.update_team(&team).await {
                bail!("Failed to rename team '{}'", name);
            }
        }
        TeamCommands::Delete { name } => {
            let team = require_team(manager, &name).await?;
            if !manager.delete_team(&team).await {
                bail!("Failed to delete team '{}'", name);
            }
        }
    }
    Ok(())
}

async fn run_assign(manager: &DbManager, login: &str, names: &[String]) -> Result<()> {
    let user = require_user(manager, login).await?;

    let mut teams = Vec::with_capacity(names.len());
    for name in names {
        teams.push(manager.get_team(name).await);
    }
    for team in teams.iter().filter(|team| !team.is_persisted()) {
        warn!("No team named '{}'", team);
    }

    let entries = teams.iter().map(|team| team.is_persisted().then_some(team));
    manager
        .set_teams_for_user(&user, entries)
        .await
        .with_context(|| format!("Failed to assign {:?} to '{}'", names, login))?;

    info!("Assigned {} to {:?}", user, names);
    Ok(())
}

async fn run_demo(manager: &DbManager, json: bool) -> Result<()> {
    roster_db::migrate(manager.connection())
        .await
        .context("Failed to run database migrations")?;

    // Starting state: users [ivanov], teams [teamA]
    if !manager.get_user("ivanov").await.is_persisted() {
        manager.insert_user(&mut User::new("ivanov")).await;
    }
    if !manager.get_team("teamA").await.is_persisted() {
        manager.insert_team(&mut Team::new("teamA")).await;
    }

    // Part 1: users ==> [ivanov, petrov, obama]
    manager.insert_user(&mut User::new("petrov")).await;
    manager.insert_user(&mut User::new("obama")).await;
    print_list(&manager.find_all_users().await, json)?;
    println!("{}", SEPARATOR);

    // Part 2: teams ==> [teamA, teamB, teamC]
    manager.insert_team(&mut Team::new("teamB")).await;
    manager.insert_team(&mut Team::new("teamC")).await;
    print_list(&manager.find_all_teams().await, json)?;
    println!("{}", SEPARATOR);

    // Part 3: memberships, one transaction per user
    let ivanov = manager.get_user("ivanov").await;
    let petrov = manager.get_user("petrov").await;
    let obama = manager.get_user("obama").await;

    let team_a = manager.get_team("teamA").await;
    let team_b = manager.get_team("teamB").await;
    let mut team_c = manager.get_team("teamC").await;

    manager.set_teams_for_user(&ivanov, [&team_a]).await?;
    manager.set_teams_for_user(&petrov, [&team_a, &team_b]).await?;
    manager
        .set_teams_for_user(&obama, [&team_a, &team_b, &team_c])
        .await?;

    for user in manager.find_all_users().await {
        print_list(&manager.get_user_teams(&user).await, json)?;
        println!("~~~~~");
    }

    // Part 4: memberships of teamA cascade away
    manager.delete_team(&team_a).await;

    // Part 5: teams ==> [teamB, teamX]
    team_c.set_name("teamX");
    manager.update_team(&team_c).await;
    print_list(&manager.find_all_teams().await, json)?;
    println!("{}", SEPARATOR);

    // Part 6: back to users [ivanov], teams [teamA]
    let users = manager.find_all_users().await;
    manager.delete_users(&users).await;
    for team in manager.find_all_teams().await {
        manager.delete_team(&team).await;
    }

    manager.insert_user(&mut User::new("ivanov")).await;
    manager.insert_team(&mut Team::new("teamA")).await;

    print_list(&manager.find_all_teams().await, json)?;
    print_list(&manager.find_all_users().await, json)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    let manager = open_manager(&cli).await?;
    let json = cli.json;

    match cli.command {
        Commands::Migrate => {
            roster_db::migrate(manager.connection())
                .await
                .context("Failed to run database migrations")?;
        }
        Commands::Demo => run_demo(&manager, json).await?,
        Commands::Users { action } => run_users(&manager, action, json).await?,
        Commands::Teams { action } => run_teams(&manager, action, json).await?,
        Commands::Assign { login, teams } => run_assign(&manager, &login, &teams).await?,
    }

    Ok(())
}
