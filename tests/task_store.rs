#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;

use anyhow::Result;
use proptest::prelude::*;

use tasklist_lib::model::{Task, TaskId, TaskUpdate};
use tasklist_lib::tasks::TaskStoreError;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn create_then_fetch_round_trip() -> Result<()> {
    let store = util::temp_store().await;
    let task = Task::new("Buy milk")
        .with_description("2 litres")
        .with_date(1_700_000_000_000);
    store.create(task.clone()).await?;

    let all = store.list_all().await?;
    assert_eq!(all, vec![task.clone()]);
    assert_eq!(store.get(task.id).await?, Some(task));
    Ok(())
}

#[tokio::test]
async fn duplicate_id_is_rejected() -> Result<()> {
    let store = util::temp_store().await;
    let task = Task::new("once");
    store.create(task.clone()).await?;

    let err = store
        .create(Task {
            title: "twice".into(),
            ..task.clone()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TaskStoreError::CreateFailed(_)));
    assert_eq!(store.count().await?, 1);
    assert_eq!(store.get(task.id).await?.unwrap().title, "once");
    Ok(())
}

#[tokio::test]
async fn blank_titles_are_refused_everywhere() -> Result<()> {
    let store = util::temp_store().await;
    assert!(matches!(
        store.create(Task::new("   ")).await,
        Err(TaskStoreError::InvalidTitle)
    ));
    assert!(matches!(
        store.create_many(vec![Task::new("ok"), Task::new("")]).await,
        Err(TaskStoreError::InvalidTitle)
    ));
    assert_eq!(store.count().await?, 0);

    let task = Task::new("real");
    store.create(task.clone()).await?;
    assert!(matches!(
        store.update(task.id, TaskUpdate::Title("\t".into())).await,
        Err(TaskStoreError::InvalidTitle)
    ));
    assert_eq!(store.get(task.id).await?.unwrap().title, "real");
    Ok(())
}

#[tokio::test]
async fn update_changes_only_the_named_field() -> Result<()> {
    let store = util::temp_store().await;
    let task = Task::new("Write report")
        .with_description("draft")
        .with_date(1_000);
    store.create(task.clone()).await?;

    store
        .update(task.id, TaskUpdate::Completed(true))
        .await?;
    let after = store.get(task.id).await?.unwrap();
    assert!(after.is_completed);
    assert_eq!(after.title, task.title);
    assert_eq!(after.description, task.description);
    assert_eq!(after.date, task.date);

    store
        .update(task.id, TaskUpdate::Description(None))
        .await?;
    store.update(task.id, TaskUpdate::Date(2_000)).await?;
    store
        .update(task.id, TaskUpdate::Title("Send report".into()))
        .await?;
    let after = store.get(task.id).await?.unwrap();
    assert_eq!(
        after,
        Task {
            id: task.id,
            title: "Send report".into(),
            description: None,
            date: 2_000,
            is_completed: true,
        }
    );
    Ok(())
}

#[tokio::test]
async fn missing_ids_report_not_found_and_leave_store_untouched() -> Result<()> {
    let store = util::temp_store().await;
    store
        .create_many(vec![
            Task::new("first").with_date(1),
            Task::new("second").with_date(2),
        ])
        .await?;
    let before = store.list_all().await?;
    let ghost = TaskId::new();

    match store.update(ghost, TaskUpdate::Completed(true)).await {
        Err(TaskStoreError::NotFound(id)) => assert_eq!(id, ghost),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(store.list_all().await?, before);

    match store.delete(ghost).await {
        Err(TaskStoreError::NotFound(id)) => assert_eq!(id, ghost),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(store.list_all().await?, before);
    assert_eq!(store.get(ghost).await?, None);
    Ok(())
}

#[tokio::test]
async fn description_update_leaves_other_fields_alone() -> Result<()> {
    let store = util::temp_store().await;
    let task = Task::new("Pack bags").with_date(5_000);
    store.create(task.clone()).await?;
    store.update(task.id, TaskUpdate::Completed(true)).await?;
    let before = store.get(task.id).await?.unwrap();

    store
        .update(task.id, TaskUpdate::Description(Some("passport first".into())))
        .await?;

    let after = store.get(task.id).await?.unwrap();
    assert_eq!(after.description.as_deref(), Some("passport first"));
    assert_eq!(after.title, before.title);
    assert_eq!(after.date, before.date);
    assert_eq!(after.is_completed, before.is_completed);
    Ok(())
}

#[tokio::test]
async fn delete_removes_only_the_target() -> Result<()> {
    let store = util::temp_store().await;
    let keep = Task::new("keep").with_date(1);
    let drop = Task::new("drop").with_date(2);
    store.create_many(vec![keep.clone(), drop.clone()]).await?;

    store.delete(drop.id).await?;
    assert_eq!(store.list_all().await?, vec![keep]);
    assert!(matches!(
        store.delete(drop.id).await,
        Err(TaskStoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn empty_batch_is_a_no_op() -> Result<()> {
    let store = util::temp_store().await;
    store.create_many(Vec::new()).await?;
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn batch_with_duplicate_ids_stores_nothing() -> Result<()> {
    let store = util::temp_store().await;
    let first = Task::new("first");
    let clash = Task {
        title: "clash".into(),
        ..first.clone()
    };
    let err = store
        .create_many(vec![Task::new("before"), first, clash, Task::new("after")])
        .await
        .unwrap_err();
    assert!(matches!(err, TaskStoreError::CreateFailed(_)));
    assert_eq!(store.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn list_is_newest_first() -> Result<()> {
    let store = util::temp_store().await;
    let old = Task::new("old").with_date(10);
    let new = Task::new("new").with_date(30);
    let mid = Task::new("mid").with_date(20);
    store.create(old.clone()).await?;
    store.create(new.clone()).await?;
    store.create(mid.clone()).await?;

    let titles: Vec<String> = store
        .list_all()
        .await?
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["new", "mid", "old"]);
    Ok(())
}

#[tokio::test]
async fn walkthrough_create_complete_delete() -> Result<()> {
    let store = util::temp_store().await;
    let a = Task::new("A").with_date(100);
    let b = Task::new("B").with_description("notes").with_date(200);
    store.create(a.clone()).await?;
    store.create(b.clone()).await?;

    let listed = store.list_all().await?;
    assert_eq!(listed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b.id, a.id]);

    store.update(a.id, TaskUpdate::Completed(true)).await?;
    store.delete(b.id).await?;

    let listed = store.list_all().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, a.id);
    assert!(listed[0].is_completed);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn listing_is_sorted_and_ids_are_unique(dates in proptest::collection::vec(-1_000_000i64..1_000_000, 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = util::temp_store().await;
            let tasks: Vec<Task> = dates
                .iter()
                .enumerate()
                .map(|(i, date)| Task::new(format!("task {i}")).with_date(*date))
                .collect();
            store.create_many(tasks).await.unwrap();

            let listed = store.list_all().await.unwrap();
            prop_assert_eq!(listed.len(), dates.len());
            prop_assert!(listed.windows(2).all(|w| w[0].date >= w[1].date));
            let ids: HashSet<TaskId> = listed.iter().map(|t| t.id).collect();
            prop_assert_eq!(ids.len(), listed.len());
            Ok(())
        })?;
    }
}
