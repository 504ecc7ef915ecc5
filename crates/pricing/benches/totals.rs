use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use shopdocs_core::{LineItemId, Money};
use shopdocs_pricing::{Discount, LineItem, LineItemInput, LineItemKind, compute_with_discount};

fn items(n: usize) -> Vec<LineItem> {
    (0..n)
        .map(|i| {
            LineItem::new(
                LineItemId::new(),
                LineItemInput {
                    kind: LineItemKind::Product,
                    reference_id: None,
                    description: format!("item {i}"),
                    quantity: Decimal::new((i as i64 % 7) + 1, 0),
                    unit_price: Money::from_minor(1999 + i as i64),
                    discount_percent: Some(Decimal::new(5, 0)),
                    discount_amount: None,
                    tax_percent: Some(Decimal::new(16, 0)),
                    notes: None,
                },
            )
            .unwrap()
        })
        .collect()
}

fn bench_totals(c: &mut Criterion) {
    let small = items(10);
    let large = items(500);
    let discount = Discount::Percent(Decimal::new(10, 0));

    c.bench_function("totals_10_items", |b| {
        b.iter(|| compute_with_discount(black_box(&small), Some(&discount)))
    });
    c.bench_function("totals_500_items", |b| {
        b.iter(|| compute_with_discount(black_box(&large), Some(&discount)))
    });
}

criterion_group!(benches, bench_totals);
criterion_main!(benches);
