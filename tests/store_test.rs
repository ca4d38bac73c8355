use batch_job_api::db::{self, JobStore, PgJobStore, StoreError};
use batch_job_api::models::job::{
    new_job_id, prepare_call_params, JobRecord, JobStatus, RequestStatus,
};
use futures::TryStreamExt;
use serde_json::json;

/// PostgreSQL document store round trip.
///
/// Note: requires a PostgreSQL instance reachable at `DATABASE_URL`.
#[tokio::test]
#[ignore] // Run with: cargo test --test store_test -- --ignored
async fn test_pg_job_store() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    let store = PgJobStore::new(pool);

    store.ping().await.expect("Ping failed");

    // Unique owner so repeated runs do not see each other's rows
    let owner = format!("store-test-{}", new_job_id());
    let job_id = new_job_id();
    let params = json!({"num_images": 4, "request_name": owner.clone()})
        .as_object()
        .cloned()
        .unwrap();
    let mut record = JobRecord::new(
        job_id.clone(),
        "web",
        JobStatus::new(RequestStatus::Created, "created"),
        prepare_call_params(&job_id, params, "awc"),
    );

    // 1. Create, then reject a duplicate
    store.create(&record).await.expect("Create failed");
    assert!(matches!(
        store.create(&record).await,
        Err(StoreError::Conflict(_))
    ));

    // 2. Read back
    let fetched = store.get(&job_id).await.unwrap().expect("Job missing");
    assert_eq!(fetched, record);
    assert!(store.get("no-such-job").await.unwrap().is_none());

    // 3. Replace the status document
    record.set_status(JobStatus::new(RequestStatus::Problem, "detection server down"));
    store.replace(&record).await.expect("Replace failed");
    let fetched = store.get(&job_id).await.unwrap().unwrap();
    assert_eq!(fetched.status.request_status, RequestStatus::Problem);

    // 4. Replacing a record that was never created
    let mut ghost = record.clone();
    ghost.id = new_job_id();
    assert!(matches!(
        store.replace(&ghost).await,
        Err(StoreError::Missing(_))
    ));

    // 5. List by owner, newest first
    let second_id = new_job_id();
    let second = JobRecord::new(
        second_id.clone(),
        "web",
        JobStatus::new(RequestStatus::Created, "created"),
        record.call_params.clone(),
    );
    store.create(&second).await.unwrap();

    let listed: Vec<JobRecord> = store.list_by_owner(owner).try_collect().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![second_id.as_str(), job_id.as_str()]);
}
