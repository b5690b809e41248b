use chrono::{Duration, Utc};
use coachbook_common::models::{Booking, BookingStatus, PaymentProvider};
use coachbook_db::{
    BookingRepository, PaidUpsert, ProcessedEventRepository, SlotRepository, SqlBookingRepository,
    SqlProcessedEventRepository, SqlSlotRepository,
};

mod fixtures;
use fixtures::{day_at, file_db, memory_db, quarter_hours};

fn pending_booking(slot_id: i64, block: Vec<i64>) -> Booking {
    Booking {
        id: uuid::Uuid::new_v4().to_string(),
        slot_id,
        session_type: "VOD Review".to_string(),
        live_minutes: 60,
        block,
        status: BookingStatus::Pending,
        discord: "player#1234".to_string(),
        in_game: false,
        followups: 1,
        notes: None,
        amount_cents: None,
        currency: None,
        provider: None,
        provider_ref: None,
        payer_email: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn grid_insert_skips_existing_start_times() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());

    let first = slots.insert_grid(&quarter_hours(day_at(13, 0), 8), 15).await.unwrap();
    assert_eq!(first, 8);

    let second = slots.insert_grid(&quarter_hours(day_at(14, 0), 8), 15).await.unwrap();
    assert_eq!(second, 4, "13:00-13:45 overlap is skipped");

    let listed = slots.list_range(day_at(0, 0), day_at(23, 59)).await.unwrap();
    assert_eq!(listed.len(), 12);
    assert!(listed.windows(2).all(|w| w[0].start_time < w[1].start_time));
}

#[tokio::test]
async fn conditional_mark_only_counts_free_slots() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 4), 15).await.unwrap();
    let ids: Vec<i64> = slots
        .list_range(day_at(13, 0), day_at(14, 0))
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();

    let mut conn = db.pool().acquire().await.unwrap();
    let first = SqlSlotRepository::mark_taken_if_free_in(&mut conn, &ids[..2]).await.unwrap();
    assert_eq!(first, 2);
    let second = SqlSlotRepository::mark_taken_if_free_in(&mut conn, &ids).await.unwrap();
    assert_eq!(second, 2, "already taken slots do not transition again");
    drop(conn);

    let free = slots.list_free_range(day_at(13, 0), day_at(14, 0)).await.unwrap();
    assert!(free.is_empty());
}

#[tokio::test]
async fn holds_are_set_and_cleared() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 1), 15).await.unwrap();
    let slot = slots.list_range(day_at(13, 0), day_at(13, 15)).await.unwrap().remove(0);

    let until = Utc::now() + Duration::minutes(10);
    let mut conn = db.pool().acquire().await.unwrap();
    SqlSlotRepository::set_hold_in(&mut conn, slot.id, until, Some("K1")).await.unwrap();
    let held = SqlSlotRepository::find_by_id_in(&mut conn, slot.id).await.unwrap().unwrap();
    assert_eq!(held.hold_key.as_deref(), Some("K1"));
    assert_eq!(held.hold_until.map(|t| t.timestamp()), Some(until.timestamp()));

    SqlSlotRepository::clear_hold_in(&mut conn, slot.id).await.unwrap();
    let cleared = SqlSlotRepository::find_by_id_in(&mut conn, slot.id).await.unwrap().unwrap();
    assert!(cleared.hold_until.is_none());
    assert!(cleared.hold_key.is_none());
}

#[tokio::test]
async fn bulk_free_and_delete_use_half_open_ranges() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 8), 15).await.unwrap();

    let taken = slots.bulk_set_taken(day_at(13, 0), day_at(14, 0), true).await.unwrap();
    assert_eq!(taken, 4);
    let freed = slots.bulk_set_taken(day_at(13, 30), day_at(15, 0), false).await.unwrap();
    assert_eq!(freed, 6);
    let free = slots.list_free_range(day_at(13, 0), day_at(15, 0)).await.unwrap();
    assert_eq!(free.len(), 6);

    let deleted = slots.bulk_delete(day_at(14, 0), day_at(14, 30)).await.unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(slots.list_range(day_at(0, 0), day_at(23, 0)).await.unwrap().len(), 6);
}

#[tokio::test]
async fn ledger_reports_duplicates_without_failing() {
    let db = memory_db().await;
    let events = SqlProcessedEventRepository::new(db.clone());

    let mut tx = db.begin().await.unwrap();
    assert!(SqlProcessedEventRepository::try_insert_in(&mut tx, "evt_1", "stripe", Utc::now())
        .await
        .unwrap());
    assert!(!SqlProcessedEventRepository::try_insert_in(&mut tx, "evt_1", "stripe", Utc::now())
        .await
        .unwrap());
    tx.commit().await.unwrap();

    assert!(events.exists("evt_1").await.unwrap());
    assert!(!events.exists("evt_2").await.unwrap());
    assert_eq!(events.count().await.unwrap(), 1);
}

#[tokio::test]
async fn paid_upsert_updates_the_booking_for_the_same_anchor() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    let bookings = SqlBookingRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 4), 15).await.unwrap();
    let ids: Vec<i64> = slots
        .list_range(day_at(13, 0), day_at(14, 0))
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();

    let pending = pending_booking(ids[0], ids.clone());
    let mut conn = db.pool().acquire().await.unwrap();
    SqlBookingRepository::insert_in(&mut conn, &pending).await.unwrap();
    assert!(
        SqlBookingRepository::insert_in(&mut conn, &pending_booking(ids[0], ids.clone()))
            .await
            .is_err(),
        "one booking per anchor slot"
    );

    let mut paid = pending_booking(ids[0], ids.clone());
    paid.amount_cents = Some(6000);
    paid.currency = Some("eur".to_string());
    paid.provider = Some(PaymentProvider::Stripe);
    paid.provider_ref = Some("cs_test_1".to_string());
    paid.payer_email = Some("buyer@example.com".to_string());
    let stored_id = SqlBookingRepository::upsert_paid_in(&mut conn, &paid).await.unwrap();
    drop(conn);

    assert_eq!(
        stored_id,
        PaidUpsert::Recorded(pending.id.clone()),
        "existing row is updated, not replaced"
    );
    let booking = bookings.find_by_slot(ids[0]).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Paid);
    assert_eq!(booking.block, ids);
    assert_eq!(booking.amount_cents, Some(6000));
    assert_eq!(booking.provider, Some(PaymentProvider::Stripe));
    assert_eq!(bookings.count().await.unwrap(), 1);

    let listed = bookings.list_range(day_at(12, 0), day_at(14, 0)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(
        bookings.find_by_id(stored_id.booking_id()).await.unwrap().map(|b| b.slot_id),
        Some(ids[0])
    );
}

#[tokio::test]
async fn nullable_columns_read_back_as_none() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    let bookings = SqlBookingRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(9, 0), 2), 15).await.unwrap();

    let fresh = slots.list_range(day_at(9, 0), day_at(10, 0)).await.unwrap();
    assert_eq!(fresh.len(), 2);
    assert!(fresh.iter().all(|s| s.hold_until.is_none() && s.hold_key.is_none()));
    let by_id = slots.find_by_id(fresh[0].id).await.unwrap().unwrap();
    assert_eq!(by_id.hold_key, None);

    let pending = pending_booking(fresh[0].id, vec![fresh[0].id]);
    let mut conn = db.pool().acquire().await.unwrap();
    SqlBookingRepository::insert_in(&mut conn, &pending).await.unwrap();
    drop(conn);

    let stored = bookings.find_by_id(&pending.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.notes, None);
    assert_eq!(stored.amount_cents, None);
    assert_eq!(stored.currency, None);
    assert_eq!(stored.provider, None);
    assert_eq!(stored.provider_ref, None);
    assert_eq!(stored.payer_email, None);
}

#[tokio::test]
async fn second_payment_never_overwrites_the_first() {
    let db = memory_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    let bookings = SqlBookingRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 4), 15).await.unwrap();
    let ids: Vec<i64> = slots
        .list_range(day_at(13, 0), day_at(14, 0))
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();

    let mut first = pending_booking(ids[0], ids.clone());
    first.amount_cents = Some(6000);
    first.currency = Some("eur".to_string());
    first.provider = Some(PaymentProvider::Stripe);
    first.provider_ref = Some("cs_test_first".to_string());

    let mut second = pending_booking(ids[0], ids.clone());
    second.amount_cents = Some(7500);
    second.currency = Some("usd".to_string());
    second.provider = Some(PaymentProvider::Paypal);
    second.provider_ref = Some("ORDER-second".to_string());

    let mut conn = db.pool().acquire().await.unwrap();
    let recorded = SqlBookingRepository::upsert_paid_in(&mut conn, &first).await.unwrap();
    assert_eq!(recorded, PaidUpsert::Recorded(first.id.clone()));

    let refused = SqlBookingRepository::upsert_paid_in(&mut conn, &second).await.unwrap();
    assert_eq!(refused, PaidUpsert::AlreadyPaid(first.id.clone()));

    // The same payment again is not a second payment.
    let again = SqlBookingRepository::upsert_paid_in(&mut conn, &first).await.unwrap();
    assert_eq!(again, PaidUpsert::Recorded(first.id.clone()));
    drop(conn);

    let stored = bookings.find_by_slot(ids[0]).await.unwrap().unwrap();
    assert_eq!(stored.provider_ref.as_deref(), Some("cs_test_first"));
    assert_eq!(stored.amount_cents, Some(6000));
    assert_eq!(stored.currency.as_deref(), Some("eur"));
    assert_eq!(stored.provider, Some(PaymentProvider::Stripe));
    assert_eq!(bookings.count().await.unwrap(), 1);
}

#[tokio::test]
async fn write_transactions_on_a_shared_file_wait_their_turn() {
    let (db, path) = file_db().await;
    let slots = SqlSlotRepository::new(db.clone());
    slots.insert_grid(&quarter_hours(day_at(13, 0), 1), 15).await.unwrap();
    let id = slots.list_range(day_at(13, 0), day_at(14, 0)).await.unwrap()[0].id;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let db = db.clone();
        tasks.push(tokio::spawn(async move {
            let mut tx = db.begin_write().await?;
            let found = SqlSlotRepository::find_by_id_in(&mut tx, id).await?;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let marked = SqlSlotRepository::mark_taken_if_free_in(&mut tx, &[id]).await?;
            tx.commit()
                .await
                .map_err(|e| coachbook_db::DbError::TransactionError(e.to_string()))?;
            Ok::<_, coachbook_db::DbError>((found.is_some(), marked))
        }));
    }

    let mut winners = 0;
    for task in tasks {
        let (found, marked) = task.await.unwrap().expect("no busy errors");
        assert!(found);
        winners += marked;
    }
    assert_eq!(winners, 1);
    let _ = std::fs::remove_file(path);
}
