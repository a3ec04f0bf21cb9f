use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};

use stockroom_catalog::{Product, ProductId, ProductVariant, VariantId};
use stockroom_core::{TenantId, UserId};
use stockroom_infra::{InMemoryInventoryStore, InventoryStore, NewReceipt, NewReceiptItem};
use stockroom_inventory::{ReceiptType, number};

const ITEMS_PER_RECEIPT: usize = 16;

async fn seeded_store(tenant_id: TenantId) -> (InMemoryInventoryStore, Vec<VariantId>) {
    let store = InMemoryInventoryStore::new();
    let now = Utc::now();

    let product_id = ProductId::new();
    store
        .create_product(
            tenant_id,
            Product::new(product_id, tenant_id, None, "Bench Product".to_string(), now).unwrap(),
        )
        .await
        .unwrap();

    let mut variants = Vec::with_capacity(ITEMS_PER_RECEIPT);
    for i in 0..ITEMS_PER_RECEIPT {
        let variant_id = VariantId::new();
        store
            .create_variant(
                tenant_id,
                ProductVariant::new(
                    variant_id,
                    tenant_id,
                    product_id,
                    format!("Variant {i}"),
                    None,
                    now,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        variants.push(variant_id);
    }

    (store, variants)
}

fn bench_confirmation(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("confirm_stock_in_receipt_16_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tenant_id = TenantId::new();
                let actor_id = UserId::new();
                let (store, variants) = seeded_store(tenant_id).await;

                let receipt = store
                    .create_receipt(
                        tenant_id,
                        NewReceipt {
                            receipt_type: ReceiptType::StockIn,
                            notes: None,
                            items: variants
                                .iter()
                                .map(|&variant_id| NewReceiptItem {
                                    variant_id,
                                    quantity: 5,
                                    unit_cost: 100,
                                })
                                .collect(),
                            actor_id,
                            occurred_at: Utc::now(),
                        },
                    )
                    .await
                    .unwrap();

                store
                    .confirm_receipt(tenant_id, receipt.id(), actor_id, Utc::now())
                    .await
                    .unwrap()
            })
        })
    });
}

fn bench_number_sequencing(c: &mut Criterion) {
    let day = Utc::now().date_naive();
    let current = number::format_number(ReceiptType::StockIn, day, 4821);

    c.bench_function("next_receipt_number", |b| {
        b.iter(|| number::next_number(ReceiptType::StockIn, day, Some(current.as_str())))
    });
}

criterion_group!(benches, bench_confirmation, bench_number_sequencing);
criterion_main!(benches);
