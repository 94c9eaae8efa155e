use agora_core::{
    Badge, Clock, Comment, Datastore, FixedClock, LedgerConfig, Post, PostError, PostService, Profile,
    QuestionDraft, Role, Space, SpaceCache, SqliteDatastore, Tag,
};
use std::sync::Arc;

fn seed(store: &SqliteDatastore, clock: &FixedClock, ids: &[&str]) {
    for id in ids {
        store
            .create(&Profile::new(*id, *id, clock.now_millis()))
            .unwrap();
    }
}

fn profile(store: &SqliteDatastore, id: &str) -> Profile {
    store.read::<Profile>(id).unwrap().unwrap()
}

fn ask(posts: &PostService<'_, SqliteDatastore>, author: &Profile, tags: &[&str]) -> Post {
    posts
        .create_question(
            author,
            QuestionDraft {
                title: "Why?".to_string(),
                body: "Because".to_string(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
                space: None,
            },
        )
        .unwrap()
}

#[test]
fn replies_update_parent_answer_count() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let posts = PostService::new(&store, &config, &clock);

    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let reply = posts
        .create_reply(&profile(&store, "helper"), &question.id, "Try this")
        .unwrap();

    assert_eq!(reply.parent_id.as_deref(), Some(question.id.as_str()));
    assert_eq!(store.read::<Post>(&question.id).unwrap().unwrap().answer_count, 1);

    let err = posts
        .create_reply(&profile(&store, "helper"), &reply.id, "nested")
        .unwrap_err();
    assert!(matches!(err, PostError::NotAQuestion(_)));
}

#[test]
fn approving_and_undoing_an_answer_round_trips_rewards() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let answer = posts
        .create_reply(&profile(&store, "helper"), &question.id, "Try this")
        .unwrap();

    let approved = posts.approve_answer("asker", &question.id, &answer.id).unwrap();
    assert_eq!(approved.answer_id.as_deref(), Some(answer.id.as_str()));
    let helper = profile(&store, "helper");
    assert_eq!(helper.reputation, 10);
    assert!(helper.has_badge(Badge::Eureka));
    assert!(helper.has_badge(Badge::Noob));
    assert_eq!(profile(&store, "asker").reputation, 3);

    let undone = posts.approve_answer("asker", &question.id, &answer.id).unwrap();
    assert_eq!(undone.answer_id, None);
    let helper = profile(&store, "helper");
    assert_eq!(helper.reputation, 0);
    assert!(!helper.has_badge(Badge::Eureka));
    assert!(helper.has_badge(Badge::Noob));
    assert_eq!(profile(&store, "asker").reputation, 0);
}

#[test]
fn switching_accepted_answer_moves_rewards() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "first", "second"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let a1 = posts
        .create_reply(&profile(&store, "first"), &question.id, "one")
        .unwrap();
    let a2 = posts
        .create_reply(&profile(&store, "second"), &question.id, "two")
        .unwrap();

    posts.approve_answer("asker", &question.id, &a1.id).unwrap();
    posts.approve_answer("asker", &question.id, &a2.id).unwrap();

    assert_eq!(profile(&store, "first").reputation, 0);
    assert!(!profile(&store, "first").has_badge(Badge::Eureka));
    assert_eq!(profile(&store, "second").reputation, 10);
    assert!(profile(&store, "second").has_badge(Badge::Eureka));
    assert_eq!(profile(&store, "asker").reputation, 3);
}

#[test]
fn approving_own_answer_or_someone_elses_question_is_not_rewarded() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "outsider"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let own = posts
        .create_reply(&profile(&store, "asker"), &question.id, "self answer")
        .unwrap();

    let err = posts
        .approve_answer("outsider", &question.id, &own.id)
        .unwrap_err();
    assert!(matches!(err, PostError::Forbidden(_)));

    posts.approve_answer("asker", &question.id, &own.id).unwrap();
    let asker = profile(&store, "asker");
    assert_eq!(asker.reputation, 0);
    assert!(!asker.has_badge(Badge::Eureka));
}

#[test]
fn moderators_may_approve_on_any_question() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let mut moderator = Profile::new("mod", "Mod", clock.now_millis());
    moderator.role = Role::Moderator;
    store.create(&moderator).unwrap();
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let answer = posts
        .create_reply(&profile(&store, "helper"), &question.id, "fix")
        .unwrap();

    posts.approve_answer("mod", &question.id, &answer.id).unwrap();
    assert_eq!(profile(&store, "helper").reputation, 10);
    assert_eq!(profile(&store, "mod").reputation, 3);
}

#[test]
fn deleting_question_releases_tags_and_answers() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &["python", "rust"]);
    ask(&posts, &profile(&store, "asker"), &["rust"]);
    let answer = posts
        .create_reply(&profile(&store, "helper"), &question.id, "fix")
        .unwrap();
    let comment = Comment::new(&question.id, "helper", "which version?", clock.now_millis());
    store.create(&comment).unwrap();

    assert!(posts.delete_post(&question.id).unwrap());
    assert_eq!(store.read::<Comment>(&comment.id).unwrap(), None);

    assert_eq!(store.read::<Post>(&question.id).unwrap(), None);
    assert_eq!(store.read::<Post>(&answer.id).unwrap(), None);
    assert_eq!(store.read::<Tag>("python").unwrap(), None);
    assert_eq!(store.read::<Tag>("rust").unwrap().unwrap().count, 1);
    assert!(!posts.delete_post(&question.id).unwrap());
}

#[test]
fn deletion_ignores_minimum_tag_policy() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let mut config = LedgerConfig::default();
    config.tags.min_tags_per_post = 1;
    config.validate().unwrap();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &["rust"]);
    let answer = posts
        .create_reply(&profile(&store, "helper"), &question.id, "fix")
        .unwrap();

    assert!(posts.delete_post(&answer.id).unwrap());
    assert!(posts.delete_post(&question.id).unwrap());

    assert_eq!(store.read::<Post>(&question.id).unwrap(), None);
    assert_eq!(store.read::<Tag>("rust").unwrap(), None);
}

#[test]
fn deleting_accepted_answer_clears_it_on_the_question() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = FixedClock::at_date(2024, 5, 13);
    seed(&store, &clock, &["asker", "helper"]);
    let posts = PostService::new(&store, &config, &clock);
    let question = ask(&posts, &profile(&store, "asker"), &[]);
    let answer = posts
        .create_reply(&profile(&store, "helper"), &question.id, "fix")
        .unwrap();
    posts.approve_answer("asker", &question.id, &answer.id).unwrap();

    posts.delete_post(&answer.id).unwrap();

    let question = store.read::<Post>(&question.id).unwrap().unwrap();
    assert_eq!(question.answer_count, 0);
    assert_eq!(question.answer_id, None);
}

#[test]
fn unknown_space_falls_back_to_default() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let config = LedgerConfig::default();
    let clock = Arc::new(FixedClock::at_date(2024, 5, 13));
    store.create(&Space::new("s1", "Ops")).unwrap();
    let cache = SpaceCache::new(config.spaces.ttl_sec, clock.clone());
    let posts = PostService::new(&store, &config, clock.as_ref()).with_space_cache(&cache);
    let author = Profile::new("ann", "Ann", clock.now_millis());

    let known = posts
        .create_question(
            &author,
            QuestionDraft {
                space: Some("s1".to_string()),
                ..QuestionDraft::default()
            },
        )
        .unwrap();
    assert_eq!(known.space, "s1:Ops");

    let unknown = posts
        .create_question(
            &author,
            QuestionDraft {
                space: Some("s9:Gone".to_string()),
                ..QuestionDraft::default()
            },
        )
        .unwrap();
    assert_eq!(unknown.space, "default");
}
