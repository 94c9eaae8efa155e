use agora_core::config::{TagPolicy, VoteWindowConfig};
use agora_core::reconcile::jobs::{
    assign_spaces, delete_all_of_kind, delete_space, delete_tag, merge_questions, recount_tags,
    rename_space, rename_tag, set_custom_badge,
};
use agora_core::{
    export_all, import_all, BulkReconciler, Comment, Datastore, Document, Filter, ObjectKey,
    ObjectKind, PageScan, Pager, Patch, Post, Profile, ReconcileError, RepoError, RepoResult,
    SqliteDatastore, Space, Tag, UserSelection, VoteOutcome, VoteValue,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const NOW: i64 = 1_717_000_000_000;
const PAGE: u32 = 2;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn question(tags: &[&str]) -> Post {
    let mut post = Post::question("ann", "t", "b", NOW);
    post.tags = strings(tags);
    post
}

/// Delegates to SQLite but fails the `fail_on`-th page fetch.
struct FailingFetchStore {
    inner: SqliteDatastore,
    fail_on: usize,
    fetches: AtomicUsize,
}

impl FailingFetchStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: SqliteDatastore::open_in_memory().unwrap(),
            fail_on,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl Datastore for FailingFetchStore {
    fn create_documents(&self, docs: &[Document]) -> RepoResult<()> {
        self.inner.create_documents(docs)
    }

    fn read_documents(&self, keys: &[ObjectKey]) -> RepoResult<HashMap<ObjectKey, Document>> {
        self.inner.read_documents(keys)
    }

    fn update_documents(&self, docs: &[Document]) -> RepoResult<usize> {
        self.inner.update_documents(docs)
    }

    fn delete_all(&self, kind: ObjectKind, ids: &[String]) -> RepoResult<usize> {
        self.inner.delete_all(kind, ids)
    }

    fn find_documents(
        &self,
        kind: ObjectKind,
        filter: &Filter,
        pager: &mut Pager,
    ) -> RepoResult<Vec<Document>> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(RepoError::InvalidQuery("connection lost".to_string()));
        }
        self.inner.find_documents(kind, filter, pager)
    }

    fn count(&self, kind: ObjectKind, filter: &Filter) -> RepoResult<u64> {
        self.inner.count(kind, filter)
    }

    fn patch_all(&self, kind: ObjectKind, patches: &[Patch]) -> RepoResult<usize> {
        self.inner.patch_all(kind, patches)
    }

    fn vote(
        &self,
        target: &ObjectKey,
        voter_id: &str,
        value: VoteValue,
        window: VoteWindowConfig,
        now_millis: i64,
    ) -> RepoResult<VoteOutcome> {
        self.inner.vote(target, voter_id, value, window, now_millis)
    }
}

#[test]
fn failed_page_aborts_job_and_keeps_committed_pages() {
    let store = FailingFetchStore::new(3);
    let profiles: Vec<Profile> = (0..6)
        .map(|idx| Profile::new(format!("p{idx}"), "old", NOW))
        .collect();
    store.create_all(&profiles).unwrap();

    let err = BulkReconciler::new(&store, PAGE)
        .patch_each::<Profile, _>("rename_all", &Filter::All, |profile| {
            Some(Patch::new(profile.id.as_str()).set("name", "new"))
        })
        .unwrap_err();

    match err {
        ReconcileError::Aborted { job, pages, .. } => {
            assert_eq!(job, "rename_all");
            assert_eq!(pages, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    let names: Vec<String> = store
        .read_all::<Profile>(&strings(&["p0", "p1", "p2", "p3", "p4", "p5"]))
        .unwrap()
        .into_iter()
        .map(|profile| profile.name)
        .collect();
    assert_eq!(names, strings(&["new", "new", "new", "new", "old", "old"]));
}

#[test]
fn page_scan_visits_every_object_once() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let tags: Vec<Tag> = (0..5).map(|idx| Tag::new(format!("t{idx}"), 1)).collect();
    store.create_all(&tags).unwrap();

    let pages: Vec<Vec<Tag>> = PageScan::new(&store, ObjectKind::Tag, Filter::All, PAGE)
        .records::<Tag>()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
}

#[test]
fn rename_tag_rewrites_every_page_and_moves_the_record() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let posts: Vec<Post> = (0..5).map(|_| question(&["py", "web"])).collect();
    store.create_all(&posts).unwrap();
    store.create(&question(&["python"])).unwrap();
    store
        .create_all(&[Tag::new("py", 5), Tag::new("python", 1), Tag::new("web", 5)])
        .unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    let report = rename_tag(&bulk, "py", "Python").unwrap();

    assert_eq!(report.patched, 5);
    assert_eq!(report.pages, 3);
    assert_eq!(store.count(ObjectKind::Post, &Filter::tagged("py")).unwrap(), 0);
    assert_eq!(store.count(ObjectKind::Post, &Filter::tagged("python")).unwrap(), 6);
    assert_eq!(store.read::<Tag>("py").unwrap(), None);
    assert_eq!(store.read::<Tag>("python").unwrap().unwrap().count, 6);
    assert_eq!(store.read::<Tag>("web").unwrap().unwrap().count, 5);
}

#[test]
fn rename_tag_dedupes_when_post_already_has_target() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let post = question(&["py", "python"]);
    store.create(&post).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    rename_tag(&bulk, "py", "python").unwrap();

    let stored = store.read::<Post>(&post.id).unwrap().unwrap();
    assert_eq!(stored.tags, strings(&["python"]));
}

#[test]
fn delete_tag_strips_posts_and_record() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let post = question(&["spam", "rust"]);
    store.create(&post).unwrap();
    store.create(&Tag::new("spam", 1)).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    let report = delete_tag(&bulk, "spam").unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(
        store.read::<Post>(&post.id).unwrap().unwrap().tags,
        strings(&["rust"])
    );
}

#[test]
fn rename_space_updates_posts_profiles_and_space() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    store.create(&Space::new("s1", "Ops")).unwrap();
    let mut post = question(&[]);
    post.space = "s1:Ops".to_string();
    store.create(&post).unwrap();
    let mut ann = Profile::new("ann", "Ann", NOW);
    ann.spaces = strings(&["default", "s1:Ops"]);
    store.create(&ann).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    rename_space(&bulk, "s1", "Operations").unwrap();

    assert_eq!(store.read::<Post>(&post.id).unwrap().unwrap().space, "s1:Operations");
    assert_eq!(
        store.read::<Profile>("ann").unwrap().unwrap().spaces,
        strings(&["default", "s1:Operations"])
    );
    assert_eq!(store.read::<Space>("s1").unwrap().unwrap().name, "Operations");

    let err = rename_space(&bulk, "missing", "x").unwrap_err();
    assert!(matches!(err, ReconcileError::MissingTarget { .. }));
}

#[test]
fn delete_space_moves_posts_to_default() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    store.create(&Space::new("s1", "Ops")).unwrap();
    let mut post = question(&[]);
    post.space = "s1:Ops".to_string();
    store.create(&post).unwrap();
    let mut ann = Profile::new("ann", "Ann", NOW);
    ann.spaces = strings(&["s1:Ops"]);
    store.create(&ann).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    delete_space(&bulk, "s1").unwrap();

    assert_eq!(store.read::<Post>(&post.id).unwrap().unwrap().space, "default");
    assert!(store.read::<Profile>("ann").unwrap().unwrap().spaces.is_empty());
    assert_eq!(store.read::<Space>("s1").unwrap(), None);
}

#[test]
fn assign_spaces_is_idempotent() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    for id in ["a", "b", "c"] {
        store.create(&Profile::new(id, id, NOW)).unwrap();
    }
    let bulk = BulkReconciler::new(&store, PAGE);
    let spaces = strings(&["s1:Ops"]);

    let first = assign_spaces(&bulk, &UserSelection::All, &spaces).unwrap();
    let second = assign_spaces(&bulk, &UserSelection::All, &spaces).unwrap();

    assert_eq!(first.patched, 3);
    assert_eq!(second.patched, 0);
    assert_eq!(second.scanned, 3);
    assert_eq!(store.read::<Profile>("b").unwrap().unwrap().spaces, spaces);
}

#[test]
fn custom_badge_grant_and_revoke_target_selected_profiles() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    for id in ["a", "b", "c"] {
        store.create(&Profile::new(id, id, NOW)).unwrap();
    }
    let bulk = BulkReconciler::new(&store, PAGE);
    let selection = UserSelection::Ids(strings(&["a", "c"]));

    let granted = set_custom_badge(&bulk, &selection, "helper", true).unwrap();
    assert_eq!(granted.patched, 2);
    assert_eq!(
        store.read::<Profile>("a").unwrap().unwrap().custom_badges,
        strings(&["helper"])
    );
    assert!(store.read::<Profile>("b").unwrap().unwrap().custom_badges.is_empty());

    set_custom_badge(&bulk, &selection, "helper", false).unwrap();
    assert!(store.read::<Profile>("c").unwrap().unwrap().custom_badges.is_empty());
}

#[test]
fn merge_questions_moves_answers_and_unions_tags() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let mut source = question(&["python"]);
    source.answer_count = 2;
    let mut target = question(&["rust"]);
    target.answer_count = 1;
    store.create_all(&[source.clone(), target.clone()]).unwrap();
    store
        .create_all(&[Tag::new("python", 1), Tag::new("rust", 1)])
        .unwrap();
    let answers = [
        Post::reply(&source, "bob", "a", NOW),
        Post::reply(&source, "cid", "b", NOW),
    ];
    store.create_all(&answers).unwrap();
    let comment = Comment::new(source.id.as_str(), "bob", "nice", NOW);
    store.create(&comment).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    merge_questions(&bulk, TagPolicy::default(), &source.id, &target.id).unwrap();

    assert_eq!(store.read::<Post>(&source.id).unwrap(), None);
    let merged = store.read::<Post>(&target.id).unwrap().unwrap();
    assert_eq!(merged.answer_count, 3);
    assert_eq!(merged.tags, strings(&["rust", "python"]));
    assert_eq!(
        store
            .count(ObjectKind::Post, &Filter::eq("parent_id", target.id.as_str()))
            .unwrap(),
        2
    );
    assert_eq!(
        store.read::<Comment>(&comment.id).unwrap().unwrap().parent_id,
        target.id
    );
    assert_eq!(store.read::<Tag>("python").unwrap().unwrap().count, 1);
    assert_eq!(store.read::<Tag>("rust").unwrap().unwrap().count, 1);
}

#[test]
fn merge_questions_ignores_minimum_tag_policy() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let source = question(&["python"]);
    let target = question(&["rust"]);
    store.create_all(&[source.clone(), target.clone()]).unwrap();
    store
        .create_all(&[Tag::new("python", 1), Tag::new("rust", 1)])
        .unwrap();
    let policy = TagPolicy {
        min_tags_per_post: 1,
        ..TagPolicy::default()
    };

    merge_questions(&BulkReconciler::new(&store, PAGE), policy, &source.id, &target.id).unwrap();

    assert_eq!(store.read::<Post>(&source.id).unwrap(), None);
    assert_eq!(store.read::<Tag>("python").unwrap().unwrap().count, 1);
}

#[test]
fn recount_tags_repairs_every_kind_of_drift() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    store
        .create_all(&[question(&["rust"]), question(&["rust", "go"]), question(&["go"])])
        .unwrap();
    store
        .create_all(&[Tag::new("rust", 7), Tag::new("go", 2), Tag::new("stale", 4)])
        .unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    let report = recount_tags(&bulk).unwrap();

    assert_eq!(store.read::<Tag>("rust").unwrap().unwrap().count, 2);
    assert_eq!(store.read::<Tag>("go").unwrap().unwrap().count, 2);
    assert_eq!(store.read::<Tag>("stale").unwrap(), None);
    assert_eq!(report.patched, 1);
    assert_eq!(report.deleted, 1);

    store.create(&question(&["untracked"])).unwrap();
    let report = recount_tags(&bulk).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(store.read::<Tag>("untracked").unwrap().unwrap().count, 1);
}

#[test]
fn delete_all_of_kind_spans_pages() {
    let store = SqliteDatastore::open_in_memory().unwrap();
    let tags: Vec<Tag> = (0..5).map(|idx| Tag::new(format!("t{idx}"), 1)).collect();
    store.create_all(&tags).unwrap();
    store.create(&Profile::new("keep", "Keep", NOW)).unwrap();
    let bulk = BulkReconciler::new(&store, PAGE);

    let report = delete_all_of_kind(&bulk, ObjectKind::Tag).unwrap();

    assert_eq!(report.deleted, 5);
    assert_eq!(store.count(ObjectKind::Tag, &Filter::All).unwrap(), 0);
    assert_eq!(store.count(ObjectKind::Profile, &Filter::All).unwrap(), 1);
}

#[test]
fn export_then_import_restores_store_contents() {
    let source = SqliteDatastore::open_in_memory().unwrap();
    let post = question(&["rust"]);
    source.create(&post).unwrap();
    source.create(&Tag::new("rust", 1)).unwrap();
    source.create(&Profile::new("ann", "Ann", NOW)).unwrap();
    let backup = export_all(&BulkReconciler::new(&source, PAGE), NOW).unwrap();
    assert_eq!(backup.len(), 3);

    let target = SqliteDatastore::open_in_memory().unwrap();
    target.create(&Tag::new("leftover", 9)).unwrap();
    let report = import_all(&BulkReconciler::new(&target, PAGE), &backup).unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(report.deleted, 1);
    assert_eq!(target.read::<Tag>("leftover").unwrap(), None);
    assert_eq!(target.read::<Post>(&post.id).unwrap(), Some(post));
    assert_eq!(target.read::<Profile>("ann").unwrap().unwrap().name, "Ann");
}
