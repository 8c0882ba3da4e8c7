mod support;

use market_commit_engine::{
    domain_types::{LineInput, QuotationStatus, ScheduleStage},
    events::MarketEvent,
    traits::{CommitStore, MarketReads, StorageError},
    CommitError,
    QuotationDraft,
};
use support::{harness, money, Harness};

fn draft(lines: &[(&str, i64, u32)], deposit_percent: u8) -> QuotationDraft {
    QuotationDraft {
        buyer_id: "alice".into(),
        lines: lines
            .iter()
            .map(|(desc, cents, qty)| LineInput {
                description: desc.to_string(),
                unit_price: money(*cents),
                quantity: *qty,
            })
            .collect(),
        tax_rate_bps: 0,
        shipping: None,
        deposit_percent,
    }
}

async fn sent_quotation(h: &Harness) -> market_commit_engine::domain_types::Quotation {
    let created =
        h.engine.create_quotation(&"acme".into(), draft(&[("Bulk widgets", 3_333, 3)], 50)).await.unwrap();
    h.engine.send_quotation(&"acme".into(), &created.record.id).await.unwrap().record
}

#[tokio::test]
async fn drafting_computes_reconciled_totals() {
    let h = harness().await;
    let committed =
        h.engine.create_quotation(&"acme".into(), draft(&[("Bulk widgets", 3_333, 3)], 50)).await.unwrap();
    let q = &committed.record;
    assert_eq!(q.status, QuotationStatus::Draft);
    assert_eq!(q.totals.subtotal(), money(9_999));
    // Half-up split: the deposit gets the extra cent.
    assert_eq!(q.totals.deposit(), money(5_000));
    assert_eq!(q.totals.balance(), money(4_999));

    let items = h.store.fetch_quotation_items(&q.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].line_total, money(9_999));
}

#[tokio::test]
async fn empty_drafts_are_rejected() {
    let h = harness().await;
    let err = h.engine.create_quotation(&"acme".into(), draft(&[], 0)).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn only_the_issuing_seller_may_edit_a_draft() {
    let h = harness().await;
    let created =
        h.engine.create_quotation(&"acme".into(), draft(&[("Widgets", 1_000, 5)], 0)).await.unwrap();

    let err = h
        .engine
        .update_quotation(&"globex".into(), &created.record.id, draft(&[("Widgets", 1, 1)], 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::NotFound(_)));

    let updated = h
        .engine
        .update_quotation(&"acme".into(), &created.record.id, draft(&[("Widgets", 2_000, 5)], 0))
        .await
        .unwrap();
    assert_eq!(updated.record.totals.subtotal(), money(10_000));
    assert_eq!(updated.record.version, created.record.version + 1);
}

#[tokio::test]
async fn sent_quotations_can_no_longer_be_edited_or_resent() {
    let h = harness().await;
    let q = sent_quotation(&h).await;
    assert_eq!(q.status, QuotationStatus::Sent);

    let err = h
        .engine
        .update_quotation(&"acme".into(), &q.id, draft(&[("Widgets", 1, 1)], 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
    let err = h.engine.send_quotation(&"acme".into(), &q.id).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(_)));
}

#[tokio::test]
async fn accepting_creates_the_payment_schedule() {
    let h = harness().await;
    let q = sent_quotation(&h).await;

    let committed = h.engine.accept_quotation(&"alice".into(), &q.id).await.unwrap();
    assert_eq!(committed.record.status, QuotationStatus::Accepted);

    let schedule = h.store.fetch_payment_schedules(&q.id).await.unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule[0].stage, ScheduleStage::Deposit);
    assert_eq!(schedule[0].amount, money(5_000));
    assert_eq!(schedule[1].stage, ScheduleStage::Balance);
    assert_eq!(schedule[1].amount, money(4_999));

    match &committed.effects.events[0] {
        MarketEvent::QuotationAccepted(ev) => assert_eq!(ev.schedule.len(), 2),
        other => panic!("unexpected event {}", other.name()),
    }
}

#[tokio::test]
async fn accepting_is_buyer_only_and_single_shot() {
    let h = harness().await;
    let q = sent_quotation(&h).await;

    let err = h.engine.accept_quotation(&"mallory".into(), &q.id).await.unwrap_err();
    assert!(matches!(err, CommitError::NotFound(_)));

    h.engine.accept_quotation(&"alice".into(), &q.id).await.unwrap();
    let err = h.engine.accept_quotation(&"alice".into(), &q.id).await.unwrap_err();
    assert!(matches!(err, CommitError::Validation(msg) if msg.contains("already accepted")));
}

#[tokio::test]
async fn a_retried_accept_never_duplicates_schedule_rows() {
    let h = harness().await;
    let q = sent_quotation(&h).await;
    h.engine.accept_quotation(&"alice".into(), &q.id).await.unwrap();

    // Replay the accept at the store level, as a crashed-and-retried caller would.
    let current = h.store.fetch_quotation(&q.id).await.unwrap().unwrap();
    let (_, schedule) =
        h.store.commit_quotation_accept(&q.id, current.version, Vec::new()).await.unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(h.store.fetch_payment_schedules(&q.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn stale_writers_are_rejected() {
    let h = harness().await;
    let created =
        h.engine.create_quotation(&"acme".into(), draft(&[("Widgets", 1_000, 5)], 0)).await.unwrap();
    let stale_version = created.record.version;
    h.engine.send_quotation(&"acme".into(), &created.record.id).await.unwrap();

    let err = h
        .store
        .commit_quotation_status(&created.record.id, stale_version, QuotationStatus::Declined)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}
