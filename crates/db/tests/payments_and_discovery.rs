//! Integration tests for payment records and the discovery feed.

use sqlx::PgPool;
use uuid::Uuid;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::payment::{PaymentProviderKind, PaymentStatus};
use vidgen_db::models::discovery::CreateDiscovery;
use vidgen_db::models::generation::{CreateGeneration, Generation, GenerationUpdate};
use vidgen_db::models::payment::CreatePayment;
use vidgen_db::models::project::CreateProject;
use vidgen_db::repositories::{DiscoveryRepo, GenerationRepo, PaymentRepo, ProjectRepo};

async fn completed_generation(pool: &PgPool, title: &str) -> Generation {
    let project = ProjectRepo::create(
        pool,
        Uuid::new_v4(),
        &CreateProject {
            title: Some(title.to_string()),
            image_url: Some("https://img.example/a.png".to_string()),
        },
    )
    .await
    .unwrap();
    let generation = GenerationRepo::create(
        pool,
        &CreateGeneration {
            project_id: project.id,
            user_id: project.user_id,
            prompt: format!("{title} prompt"),
            model_id: None,
            metadata: serde_json::json!({}),
        },
    )
    .await
    .unwrap();

    use GenerationStatus::*;
    for to in [Preparing, Generating, Processing] {
        GenerationRepo::transition(pool, generation.id, to, &GenerationUpdate::default())
            .await
            .unwrap()
            .unwrap();
    }
    GenerationRepo::transition(
        pool,
        generation.id,
        Completed,
        &GenerationUpdate {
            video_url: Some(format!("https://cdn.example/{title}.mp4")),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap()
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn payment_create_capture_and_history(pool: PgPool) {
    let user = Uuid::new_v4();
    let payment = PaymentRepo::create(
        &pool,
        &CreatePayment {
            user_id: user,
            provider: PaymentProviderKind::Mock,
            order_id: "MOCK-ORDER-1".to_string(),
            amount_cents: 2_500,
            currency: "USD".to_string(),
            tokens_purchased: 425,
            package_id: "standard".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.payment_id.is_none());

    let found = PaymentRepo::find_by_order_id(&pool, "MOCK-ORDER-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, payment.id);

    let captured = PaymentRepo::transition(
        &pool,
        payment.id,
        &[PaymentStatus::Pending],
        PaymentStatus::Succeeded,
        Some("TX-1"),
        &serde_json::json!({ "transaction_id": "TX-1" }),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(captured.status, PaymentStatus::Succeeded);
    assert_eq!(captured.payment_id.as_deref(), Some("TX-1"));
    assert_eq!(captured.metadata["transaction_id"], "TX-1");

    let history = PaymentRepo::list_by_user(&pool, user, 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(PaymentRepo::find_by_order_id(&pool, "nope").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn late_capture_failure_does_not_overwrite_success(pool: PgPool) {
    let user = Uuid::new_v4();
    let payment = PaymentRepo::create(
        &pool,
        &CreatePayment {
            user_id: user,
            provider: PaymentProviderKind::Paypal,
            order_id: "ORDER-RACE".to_string(),
            amount_cents: 1_000,
            currency: "USD".to_string(),
            tokens_purchased: 160,
            package_id: "basic".to_string(),
        },
    )
    .await
    .unwrap();
    let open = [PaymentStatus::Pending, PaymentStatus::Processing, PaymentStatus::Failed];

    // The first capture wins.
    PaymentRepo::transition(
        &pool,
        payment.id,
        &open,
        PaymentStatus::Succeeded,
        Some("TX-RACE"),
        &serde_json::json!({ "transaction_id": "TX-RACE" }),
    )
    .await
    .unwrap()
    .unwrap();

    // A second capture started from the same PENDING read is declined.
    let declined = PaymentRepo::transition(
        &pool,
        payment.id,
        &open,
        PaymentStatus::Failed,
        None,
        &serde_json::json!({ "capture_status": "UNPROCESSABLE_ENTITY" }),
    )
    .await
    .unwrap();
    assert!(declined.is_none());

    let stored = PaymentRepo::find_by_order_id(&pool, "ORDER-RACE")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Succeeded);
    assert_eq!(stored.payment_id.as_deref(), Some("TX-RACE"));
    assert!(stored.metadata.get("capture_status").is_none());
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn discovery_ordering_and_availability(pool: PgPool) {
    let admin = Uuid::new_v4();
    let first = completed_generation(&pool, "first").await;
    let second = completed_generation(&pool, "second").await;

    assert_eq!(DiscoveryRepo::list_available(&pool).await.unwrap().len(), 2);

    let a = DiscoveryRepo::create(
        &pool,
        &CreateDiscovery {
            generation_id: first.id,
            display_order: None,
        },
        admin,
    )
    .await
    .unwrap();
    let b = DiscoveryRepo::create(
        &pool,
        &CreateDiscovery {
            generation_id: second.id,
            display_order: None,
        },
        admin,
    )
    .await
    .unwrap();
    assert_eq!(a.display_order, 1);
    assert_eq!(b.display_order, 2);
    assert!(DiscoveryRepo::list_available(&pool).await.unwrap().is_empty());

    DiscoveryRepo::update_order(&pool, b.id, 0).await.unwrap().unwrap();
    let feed = DiscoveryRepo::list_videos(&pool).await.unwrap();
    assert_eq!(feed[0].generation_id, second.id);
    assert_eq!(feed[0].video_url.as_deref(), Some("https://cdn.example/second.mp4"));
    assert_eq!(feed[1].generation_id, first.id);

    assert!(DiscoveryRepo::delete(&pool, a.id).await.unwrap());
    assert!(DiscoveryRepo::find_by_id(&pool, a.id).await.unwrap().is_none());
    let available = DiscoveryRepo::list_available(&pool).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].project_title.as_deref(), Some("first"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn featuring_twice_violates_unique_constraint(pool: PgPool) {
    let generation = completed_generation(&pool, "dup").await;
    let input = CreateDiscovery {
        generation_id: generation.id,
        display_order: Some(3),
    };

    DiscoveryRepo::create(&pool, &input, Uuid::new_v4()).await.unwrap();
    let err = DiscoveryRepo::create(&pool, &input, Uuid::new_v4())
        .await
        .unwrap_err();

    match err {
        sqlx::Error::Database(db_err) => {
            assert_eq!(db_err.constraint(), Some("uq_discoveries_generation"))
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}
