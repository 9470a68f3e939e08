//! Integration tests for roster-db
//!
//! Tests manager operations with real SQLite in-memory database

use roster_db::{connect, entities::user_team, migrate, ConfigError, DbManager, Team, User};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use std::error::Error as _;
use std::io::Write;

/// Helper to create a manager over a migrated in-memory database
async fn setup_manager() -> DbManager {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    DbManager::new(db)
}

async fn insert_users(manager: &DbManager, range: std::ops::Range<usize>) -> Vec<User> {
    let mut users = Vec::new();
    for i in range {
        let mut user = User::new(format!("user{}", i));
        assert!(manager.insert_user(&mut user).await, "Failed to insert {}", user);
        users.push(user);
    }
    users
}

async fn insert_teams(manager: &DbManager, names: &[&str]) -> Vec<Team> {
    let mut teams = Vec::new();
    for name in names {
        let mut team = Team::new(*name);
        assert!(manager.insert_team(&mut team).await, "Failed to insert {}", team);
        teams.push(team);
    }
    teams
}

fn sorted_users(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.login().cmp(b.login()));
    users
}

fn sorted_teams(mut teams: Vec<Team>) -> Vec<Team> {
    teams.sort_by(|a, b| a.name().cmp(b.name()));
    teams
}

async fn membership_count(manager: &DbManager) -> u64 {
    user_team::Entity::find()
        .count(manager.connection())
        .await
        .expect("Failed to count memberships")
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));

    let result = migrate(&db).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_manager_from_properties_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# test database").unwrap();
    writeln!(file, "connection.url = sqlite::memory:").unwrap();

    let manager = DbManager::from_properties(file.path())
        .await
        .expect("Failed to open manager from properties");
    migrate(manager.connection()).await.expect("Failed to run migrations");

    let mut user = User::new("ivanov");
    assert!(manager.insert_user(&mut user).await);
    assert_eq!(manager.find_all_users().await, vec![user]);
}

#[tokio::test]
async fn test_manager_from_missing_properties_file() {
    let dir = tempfile::tempdir().unwrap();

    let err = DbManager::from_properties(dir.path().join("app.properties"))
        .await
        .expect_err("Missing properties file must fail");
    assert!(err.message().is_some());
    assert!(err.cause().is_none());

    let config_err = err
        .source()
        .and_then(|source| source.downcast_ref::<ConfigError>())
        .expect("Config error must be kept as the source");
    assert!(matches!(config_err, ConfigError::Io { .. }));
    assert!(config_err.source().is_some());
}

#[tokio::test]
async fn test_find_all_on_empty_tables() {
    let manager = setup_manager().await;

    assert!(manager.find_all_users().await.is_empty());
    assert!(manager.find_all_teams().await.is_empty());
}

#[tokio::test]
async fn test_insert_populates_id() {
    let manager = setup_manager().await;

    let mut user = User::new("ivanov");
    assert!(manager.insert_user(&mut user).await);
    assert!(user.is_persisted());

    let found = manager.get_user("ivanov").await;
    assert_eq!(found.id(), user.id());

    let mut team = Team::new("teamA");
    assert!(manager.insert_team(&mut team).await);
    assert!(team.is_persisted());
    assert_eq!(manager.get_team("teamA").await.id(), team.id());
}

#[tokio::test]
async fn test_find_all_users_round_trip() {
    let manager = setup_manager().await;

    let users = insert_users(&manager, 1..5).await;
    let from_db = sorted_users(manager.find_all_users().await);

    assert_eq!(users, from_db);
}

#[tokio::test]
async fn test_find_all_teams_round_trip() {
    let manager = setup_manager().await;

    let teams = insert_teams(&manager, &["team1", "team2", "team3", "team4"]).await;
    let from_db = sorted_teams(manager.find_all_teams().await);

    assert_eq!(teams, from_db);
    assert!(from_db.iter().all(Team::is_persisted));
}

#[tokio::test]
async fn test_duplicate_login_is_reported_as_false() {
    let manager = setup_manager().await;

    let mut first = User::new("petrov");
    assert!(manager.insert_user(&mut first).await);

    let mut second = User::new("petrov");
    assert!(!manager.insert_user(&mut second).await);
    assert!(!second.is_persisted());
    assert_eq!(manager.find_all_users().await.len(), 1);
}

#[tokio::test]
async fn test_get_miss_returns_unset_id() {
    let manager = setup_manager().await;

    let user = manager.get_user("nobody").await;
    assert_eq!(user.login(), "nobody");
    assert!(!user.is_persisted());

    let team = manager.get_team("noteam").await;
    assert_eq!(team.name(), "noteam");
    assert_eq!(team.id(), 0);
}

#[tokio::test]
async fn test_memberships_and_cascading_team_delete() {
    let manager = setup_manager().await;

    let users = insert_users(&manager, 0..5).await;
    let teams = insert_teams(&manager, &["team0", "team1", "team2", "team3", "team4"]).await;

    for (j, user) in users.iter().enumerate() {
        manager
            .set_teams_for_user(user, &teams[..=j])
            .await
            .expect("Failed to assign teams");
    }

    for (j, user) in users.iter().enumerate() {
        let user_teams = sorted_teams(manager.get_user_teams(user).await);
        assert_eq!(&teams[..=j], user_teams.as_slice());
    }

    assert!(manager.delete_team(&teams[0]).await);
    assert!(manager.delete_team(&teams[1]).await);
    assert!(manager.delete_team(&teams[3]).await);

    let user_teams = sorted_teams(manager.get_user_teams(&users[4]).await);
    assert_eq!(vec![teams[2].clone(), teams[4].clone()], user_teams);
}

#[tokio::test]
async fn test_duplicate_pair_rolls_back_whole_batch() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);
    let teams = insert_teams(&manager, &["A", "B", "C", "D"]).await;
    let (a, b, c, d) = (&teams[0], &teams[1], &teams[2], &teams[3]);

    manager.set_teams_for_user(&user, [a]).await.unwrap();
    assert_eq!(vec![a.clone()], manager.get_user_teams(&user).await);

    let err = manager
        .set_teams_for_user(&user, [b, c, d, a])
        .await
        .expect_err("Duplicate membership must fail the transaction");
    assert!(err.cause().is_some());
    assert!(err.source().is_some());
    assert_eq!(vec![a.clone()], manager.get_user_teams(&user).await);

    manager.set_teams_for_user(&user, [b]).await.unwrap();
    assert_eq!(
        vec![a.clone(), b.clone()],
        sorted_teams(manager.get_user_teams(&user).await)
    );

    let result = manager.set_teams_for_user(&user, [c, d, b]).await;
    assert!(result.is_err(), "Duplicate membership must fail the transaction");
    assert_eq!(
        vec![a.clone(), b.clone()],
        sorted_teams(manager.get_user_teams(&user).await)
    );

    manager.set_teams_for_user(&user, [c, d]).await.unwrap();
    assert_eq!(
        teams.clone(),
        sorted_teams(manager.get_user_teams(&user).await)
    );
}

#[tokio::test]
async fn test_absent_team_rolls_back_batch() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);
    let teams = insert_teams(&manager, &["A", "B"]).await;

    let err = manager
        .set_teams_for_user(&user, [Some(&teams[0]), None, Some(&teams[1])])
        .await
        .expect_err("Absent team must fail the transaction");

    assert!(err.cause().is_none());
    assert!(err.message().is_some());
    assert!(manager.get_user_teams(&user).await.is_empty());
    assert_eq!(membership_count(&manager).await, 0);
}

#[tokio::test]
async fn test_unknown_team_violates_foreign_key() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);
    let teams = insert_teams(&manager, &["A"]).await;
    let never_stored = Team::new("ghost");

    let result = manager
        .set_teams_for_user(&user, [&teams[0], &never_stored])
        .await;

    assert!(result.is_err());
    assert_eq!(membership_count(&manager).await, 0);
}

#[tokio::test]
async fn test_empty_batch_succeeds() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);

    let none: [&Team; 0] = [];
    assert!(manager.set_teams_for_user(&user, none).await.is_ok());
    assert!(manager.get_user_teams(&user).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_batches_for_same_pair() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);
    let teams = insert_teams(&manager, &["A", "B"]).await;
    let (a, b) = (teams[0].clone(), teams[1].clone());

    let only_a = {
        let manager = manager.clone();
        let (user, a) = (user.clone(), a.clone());
        tokio::spawn(async move { manager.set_teams_for_user(&user, [&a]).await })
    };
    let b_then_a = {
        let manager = manager.clone();
        let (user, a, b) = (user.clone(), a.clone(), b.clone());
        tokio::spawn(async move { manager.set_teams_for_user(&user, [&b, &a]).await })
    };

    let only_a = only_a.await.expect("Task panicked");
    let b_then_a = b_then_a.await.expect("Task panicked");
    assert!(
        only_a.is_ok() != b_then_a.is_ok(),
        "Exactly one batch must win: {:?} / {:?}",
        only_a,
        b_then_a
    );

    let expected = if only_a.is_ok() {
        vec![a.clone()]
    } else {
        vec![a.clone(), b.clone()]
    };
    assert_eq!(expected, sorted_teams(manager.get_user_teams(&user).await));
    assert_eq!(membership_count(&manager).await, expected.len() as u64);
}

#[tokio::test]
async fn test_update_team_is_visible_through_memberships() {
    let manager = setup_manager().await;

    let mut user = User::new("user");
    assert!(manager.insert_user(&mut user).await);
    let mut teams = insert_teams(&manager, &["A", "B"]).await;

    manager.set_teams_for_user(&user, &teams).await.unwrap();

    teams[0].set_name("Z");
    assert!(manager.update_team(&teams[0]).await);

    let user_teams = sorted_teams(manager.get_user_teams(&user).await);
    let names: Vec<&str> = user_teams.iter().map(Team::name).collect();
    assert_eq!(names, ["B", "Z"]);
    assert_eq!(user_teams, vec![teams[1].clone(), teams[0].clone()]);
    assert_eq!(user_teams[1].id(), teams[0].id());

    let all: Vec<String> = sorted_teams(manager.find_all_teams().await)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(all, ["B", "Z"]);

    assert!(manager.delete_team(&teams[1]).await);
    assert_eq!(vec![teams[0].clone()], manager.get_user_teams(&user).await);

    assert!(manager.delete_team(&teams[0]).await);
    assert!(manager.get_user_teams(&user).await.is_empty());
}

#[tokio::test]
async fn test_delete_users_cascades_memberships_only() {
    let manager = setup_manager().await;

    let users = insert_users(&manager, 0..3).await;
    let teams = insert_teams(&manager, &["A", "B"]).await;
    for user in &users {
        manager.set_teams_for_user(user, &teams).await.unwrap();
    }
    assert_eq!(membership_count(&manager).await, 6);

    assert!(manager.delete_users(&users[..2]).await);

    assert_eq!(vec![users[2].clone()], manager.find_all_users().await);
    assert_eq!(teams, sorted_teams(manager.find_all_teams().await));
    assert_eq!(membership_count(&manager).await, 2);
}

#[tokio::test]
async fn test_delete_users_stops_at_absent_entry() {
    let manager = setup_manager().await;

    let users = insert_users(&manager, 0..3).await;

    let deleted = manager
        .delete_users([Some(&users[0]), None, Some(&users[2])])
        .await;
    assert!(!deleted);

    // The first delete was already committed
    let remaining = sorted_users(manager.find_all_users().await);
    assert_eq!(remaining, vec![users[1].clone(), users[2].clone()]);
}

#[tokio::test]
async fn test_concurrent_managers_share_connection() {
    let manager = setup_manager().await;

    let mut handles = vec![];
    for i in 0..10 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let mut team = Team::new(format!("team{}", i));
            manager.insert_team(&mut team).await
        }));
    }

    for handle in handles {
        assert!(handle.await.expect("Task panicked"));
    }

    assert_eq!(manager.find_all_teams().await.len(), 10);
}
