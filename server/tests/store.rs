use sqlx::sqlite::SqlitePoolOptions;
use tubeblog_pipeline::core::article::{Length, Tone};
use tubeblog_server::db::{self, DbPool};
use tubeblog_server::store::{ArticleStore, NewArticle, SaveRequest, SaveStatus, StoreError};

async fn setup_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::create_schema(&pool).await.unwrap();
    pool
}

async fn add_user(pool: &DbPool, username: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?, 'x', 0) RETURNING id",
    )
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn article(content: &str) -> NewArticle {
    NewArticle {
        title: "How sled works".to_string(),
        link: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        content: content.to_string(),
        tone: Tone::Technical,
        length: Length::Long,
    }
}

#[tokio::test]
async fn create_then_find_by_tuple() {
    let pool = setup_db().await;
    let user = add_user(&pool, "alice").await;
    let store = ArticleStore::new(pool);

    let post = store.create(user, &article("<p>v1</p>")).await.unwrap();
    assert_eq!(post.user_id, user);
    assert_eq!(post.tone, "technical");
    assert_eq!(post.length, "long");

    let found = store
        .find(user, &post.youtube_link, Tone::Technical, Length::Long)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, post.id);

    assert!(store
        .find(user, &post.youtube_link, Tone::Casual, Length::Long)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn second_create_for_same_tuple_is_a_duplicate() {
    let pool = setup_db().await;
    let user = add_user(&pool, "bob").await;
    let store = ArticleStore::new(pool);

    store.create(user, &article("<p>v1</p>")).await.unwrap();
    let err = store.create(user, &article("<p>v2</p>")).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));
}

#[tokio::test]
async fn update_content_changes_only_the_body() {
    let pool = setup_db().await;
    let user = add_user(&pool, "carol").await;
    let store = ArticleStore::new(pool);

    let post = store.create(user, &article("<p>v1</p>")).await.unwrap();
    let updated = store.update_content(&post, "<p>v2</p>").await.unwrap();

    assert_eq!(updated.id, post.id);
    assert_eq!(updated.generated_content, "<p>v2</p>");
    assert_eq!(updated.youtube_title, post.youtube_title);
    assert_eq!(updated.created_at, post.created_at);
}

#[tokio::test]
async fn delete_removes_exactly_one_row() {
    let pool = setup_db().await;
    let owner = add_user(&pool, "dave").await;
    let other = add_user(&pool, "erin").await;
    let store = ArticleStore::new(pool);

    let keep = store.create(owner, &article("<p>keep</p>")).await.unwrap();
    let mut second = article("<p>drop</p>");
    second.tone = Tone::Witty;
    let drop = store.create(owner, &second).await.unwrap();

    assert!(matches!(
        store.get_owned(other, drop.id).await,
        Err(StoreError::NotFound)
    ));

    store.delete(&drop).await.unwrap();
    assert!(matches!(store.delete(&drop).await, Err(StoreError::NotFound)));

    let remaining = store.list_for_user(owner, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep.id);
}

#[tokio::test]
async fn listing_is_scoped_to_the_user() {
    let pool = setup_db().await;
    let alice = add_user(&pool, "frank").await;
    let bob = add_user(&pool, "grace").await;
    let store = ArticleStore::new(pool);

    store.create(alice, &article("<p>a</p>")).await.unwrap();
    store.create(bob, &article("<p>b</p>")).await.unwrap();

    let posts = store.list_for_user(alice, Some("SLED")).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].generated_content, "<p>a</p>");
    assert!(store.list_for_user(alice, Some("redis")).await.unwrap().is_empty());
}

fn save_request(link: &str) -> SaveRequest {
    SaveRequest {
        title: "Concurrent".to_string(),
        content: "<p>body</p>".to_string(),
        link: link.to_string(),
        tone: None,
        length: None,
        force_update: false,
    }
}

async fn file_backed_store() -> (tempfile::TempDir, ArticleStore, i64) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("tubeblog.db").display());
    let pool = db::init_db(&url).await.unwrap();
    let user = add_user(&pool, "racer").await;
    (dir, ArticleStore::new(pool), user)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_of_one_tuple_create_exactly_once() {
    let (_dir, store, user) = file_backed_store().await;

    for round in 0..20 {
        let link = format!("https://youtu.be/round{:06}", round);
        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let store = store.clone();
                let request = save_request(&link);
                tokio::spawn(async move { store.save(user, &request).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap().expect("save must not fail under contention"));
        }

        let created = outcomes.iter().filter(|o| o.status == SaveStatus::Created).count();
        assert_eq!(created, 1, "round {}: {:?}", round, outcomes);
        assert!(outcomes.iter().all(|o| o.id == outcomes[0].id));
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.status, SaveStatus::Created | SaveStatus::Exists)));
    }

    assert_eq!(store.list_for_user(user, None).await.unwrap().len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_of_distinct_links_all_succeed() {
    let (_dir, store, user) = file_backed_store().await;

    let tasks: Vec<_> = (0..60)
        .map(|i| {
            let store = store.clone();
            let request = save_request(&format!("https://youtu.be/video{:06}", i));
            tokio::spawn(async move { store.save(user, &request).await })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap().expect("save must not fail under contention");
        assert_eq!(outcome.status, SaveStatus::Created);
    }
    assert_eq!(store.list_for_user(user, None).await.unwrap().len(), 60);
}

#[tokio::test]
async fn forced_save_updates_existing_row() {
    let pool = setup_db().await;
    let user = add_user(&pool, "updater").await;
    let store = ArticleStore::new(pool);

    let first = store.save(user, &save_request("https://youtu.be/dQw4w9WgXcQ")).await.unwrap();
    let mut forced = save_request("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    forced.content = "<p>new</p>".to_string();
    forced.force_update = true;
    let second = store.save(user, &forced).await.unwrap();

    assert_eq!(second.status, SaveStatus::Updated);
    assert_eq!(second.id, first.id);
    assert_eq!(store.get_owned(user, first.id).await.unwrap().generated_content, "<p>new</p>");
}
