use sqlx::SqlitePool;
use uvocbot_db::{
    AdminSettingsRepository, LogType, NewRoleMenu, PlanetsideSettings,
    PlanetsideSettingsRepository, RoleMenuRepository, RoleMenuRole,
};

#[tokio::test]
async fn guild_settings_are_isolated_per_guild() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let mut first = PlanetsideSettings::new(1);
    first.default_world_id = Some(13);
    first.base_capture_channel_id = Some(111);
    PlanetsideSettingsRepository::upsert(&pool, &first)
        .await
        .unwrap();

    PlanetsideSettingsRepository::add_tracked_outfit(&pool, 1, 900)
        .await
        .unwrap();
    PlanetsideSettingsRepository::add_tracked_outfit(&pool, 2, 900)
        .await
        .unwrap();

    let second = PlanetsideSettingsRepository::get(&pool, 2).await.unwrap();
    assert_eq!(second.default_world_id, None);
    assert!(second.tracked_outfit_ids.contains(&900));

    let subs = PlanetsideSettingsRepository::subscriptions_for_outfit(&pool, 900)
        .await
        .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].channel_id, 111);

    let mut admin = AdminSettingsRepository::get(&pool, 1).await.unwrap();
    admin.logging_channel_id = Some(5);
    admin.log_types.insert(LogType::MEMBER_LEAVE);
    AdminSettingsRepository::upsert(&pool, &admin).await.unwrap();
    assert!(
        AdminSettingsRepository::get(&pool, 2)
            .await
            .unwrap()
            .log_types
            .is_empty()
    );
}

#[tokio::test]
async fn role_menu_lifecycle() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let menu = RoleMenuRepository::create(
        &pool,
        &NewRoleMenu {
            guild_id: 1,
            channel_id: 2,
            author_id: 3,
            title: "Pings".to_string(),
            description: Some("Pick what you want to be pinged for".to_string()),
        },
    )
    .await
    .unwrap();

    RoleMenuRepository::add_role(
        &pool,
        menu.id,
        &RoleMenuRole {
            role_id: 40,
            label: "Ops".to_string(),
            emoji: Some("🎯".to_string()),
        },
    )
    .await
    .unwrap();

    assert!(RoleMenuRepository::remove_role(&pool, menu.id, 40).await.unwrap());
    let menu = RoleMenuRepository::get(&pool, menu.id).await.unwrap().unwrap();
    assert!(menu.roles.is_empty());
    assert_eq!(menu.description.as_deref(), Some("Pick what you want to be pinged for"));
}
