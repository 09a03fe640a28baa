use futures_util::TryStreamExt;
use horde::{
    Cursor, Error, Model, Results, View,
    bson::{Bson, Document, doc},
    store::memory,
};

#[derive(Debug, Model)]
#[model(views(public(name, email)))]
struct Member(Document);

#[derive(Debug, Model)]
struct Score(Document);

#[derive(Debug, Model)]
struct Rank(Document);

#[derive(Debug, Model)]
struct Step(Document);

#[derive(Debug, Model)]
struct Note(Document);

#[derive(Debug, Model)]
struct Post(Document);

async fn seed_values<M: Model>() {
    M::bind_database(memory::client().database("cursor"));

    M::insert_many(
        (1..=5)
            .map(|value| doc! { "_id": value, "value": value * 10 })
            .collect(),
    )
    .await
    .unwrap();
}

async fn seed_members() {
    Member::bind_database(memory::client().database("cursor"));

    Member::insert_many(vec![
        doc! { "_id": 1, "name": "kit", "email": "kit@example.com", "password": "a" },
        doc! { "_id": 2, "name": "sam", "password": "b" },
    ])
    .await
    .unwrap();
}

#[tokio::test]
async fn shaping_and_iteration() {
    seed_values::<Score>().await;

    let mut cursor = Score::find(doc! { "value": { "$gte": 20 } })
        .unwrap()
        .sort(doc! { "value": -1 })
        .unwrap()
        .skip(1)
        .unwrap()
        .limit(2)
        .unwrap();

    assert_eq!(cursor.count().await.unwrap(), 2);

    let first = cursor.first().await.unwrap().unwrap();
    assert_eq!(first.id(), Some(&Bson::Int32(4)));

    let scores = cursor.to_list(None).await.unwrap();
    let ids = scores.iter().map(|score| score.id().cloned()).collect::<Vec<_>>();
    assert_eq!(ids, vec![Some(Bson::Int32(4)), Some(Bson::Int32(3))]);

    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn indexing_fetches_through_a_clone() {
    seed_values::<Rank>().await;

    let cursor = Rank::find(()).unwrap().sort(doc! { "_id": 1 }).unwrap();

    let third = cursor.get(2).await.unwrap();
    assert_eq!(third.get("value"), Some(&Bson::Int32(30)));

    let error = cursor.get(5).await.unwrap_err();
    assert!(matches!(error, Error::IndexOutOfRange(5)));

    let error = cursor.get(-1).await.unwrap_err();
    assert!(matches!(error, Error::IndexOutOfRange(-1)));

    let limited = cursor.clone().limit(2).unwrap();
    assert!(matches!(limited.get(2).await, Err(Error::IndexOutOfRange(2))));
    assert!(limited.first().await.unwrap().is_some());

    let empty = Rank::find(doc! { "value": 0 }).unwrap();
    assert!(empty.first().await.unwrap().is_none());
}

#[tokio::test]
async fn started_cursors_cannot_be_reshaped() {
    seed_values::<Step>().await;

    let mut cursor = Step::find(()).unwrap();
    assert!(cursor.next().await.unwrap().is_some());

    assert!(matches!(cursor.clone().limit(1), Ok(_)));
    assert!(matches!(cursor.get(0).await, Err(Error::CursorUsed)));
    assert!(matches!(cursor.limit(1), Err(Error::CursorUsed)));
}

#[tokio::test]
async fn raw_cursors_and_streams() {
    Note::bind_database(memory::client().database("cursor"));
    Note::insert_many(vec![doc! { "_id": "a" }, doc! { "_id": "b" }])
        .await
        .unwrap();

    let mut raw = Cursor::raw(Note::get_collection().unwrap().find(doc! {}));
    assert_eq!(raw.next().await.unwrap(), Some(doc! { "_id": "a" }));

    let notes = Note::find(())
        .unwrap()
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].id(), Some(&Bson::from("b")));

    let cursor = Note::find(doc! { "_id": "a" }).unwrap();
    assert_eq!(cursor.delete().await.unwrap(), 1);
    assert_eq!(Note::count_documents(()).await.unwrap(), 1);
}

#[tokio::test]
async fn views_project_entities() {
    seed_members().await;

    let public = Member::find_view((), "public")
        .unwrap()
        .sort(doc! { "_id": 1 })
        .unwrap()
        .to_list(None)
        .await
        .unwrap();
    assert_eq!(
        public.into_vec(),
        vec![
            doc! { "name": "kit", "email": "kit@example.com" },
            doc! { "name": "sam", "email": Bson::Null },
        ]
    );

    Member::add_view("safe", View::defaults().exclude("password"));

    let member = Member::find_one(2).await.unwrap().unwrap();
    assert_eq!(member.view("safe").unwrap(), doc! { "_id": 2, "name": "sam" });
    assert_eq!(member.view("defaults").unwrap(), member.document().clone());

    assert!(matches!(
        Member::find_view((), "secret"),
        Err(Error::UnknownView(name)) if name == "secret"
    ));
}

#[tokio::test]
async fn results_distinct_and_view() {
    Post::bind_database(memory::client().database("cursor"));
    Post::insert_many(vec![
        doc! { "_id": 1, "tags": ["rust", "db"], "author": "kit" },
        doc! { "_id": 2, "tags": ["db", "orm"], "author": "kit" },
        doc! { "_id": 3, "author": "sam" },
    ])
    .await
    .unwrap();
    Post::add_view("byline", View::include(["author"]));

    let posts: Results<Post> = Post::find(())
        .unwrap()
        .sort(doc! { "_id": 1 })
        .unwrap()
        .to_list(None)
        .await
        .unwrap();

    assert_eq!(
        posts.distinct("tags"),
        vec![
            Bson::from("rust"),
            Bson::from("db"),
            Bson::from("orm"),
            Bson::Null
        ]
    );
    assert_eq!(
        posts.distinct("author"),
        vec![Bson::from("kit"), Bson::from("sam")]
    );

    let bylines = posts.view("byline").unwrap();
    assert_eq!(bylines[2], doc! { "author": "sam" });

    assert!(matches!(bylines.view("byline"), Err(Error::NotViewable)));
}
