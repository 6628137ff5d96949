use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CartValidator, CatalogEntry, InMemoryCatalog, OrderComposer, PricingCalculator,
    RawCartItem, RawCartSubmission, ShippingOrigin,
};
use rust_decimal::Decimal;

fn bench_selling_price(c: &mut Criterion) {
    let calc = PricingCalculator::default();
    let origin = ShippingOrigin::new("AMAZON_UAE");

    c.bench_function("pricing/selling_price", |b| {
        b.iter(|| {
            calc.selling_price(
                Decimal::from(100),
                Decimal::ONE,
                &origin,
                Decimal::from(20),
            )
        });
    });
}

fn raw_cart(vendors: usize, items_per_vendor: usize) -> RawCartSubmission {
    let items = (0..vendors)
        .flat_map(|v| {
            (0..items_per_vendor).map(move |i| {
                RawCartItem::new(&format!("SKU-{i}"), &format!("vendor-{v}"), 2)
            })
        })
        .collect();

    RawCartSubmission {
        recipient_name: Some("Bench".to_string()),
        recipient_phone: Some("0500".to_string()),
        recipient_address: Some("Dubai".to_string()),
        payment_method: Some("COD".to_string()),
        delivery_fee: Some(serde_json::json!(10)),
        is_atomic: Some(false),
        items: Some(items),
        ..Default::default()
    }
}

fn bench_validate(c: &mut Criterion) {
    let validator = CartValidator::new();
    let raw = raw_cart(5, 10);

    c.bench_function("cart/validate_50_items", |b| {
        b.iter(|| validator.validate(raw.clone()).unwrap());
    });
}

fn bench_compose(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let catalog = InMemoryCatalog::new();
    for i in 0..10 {
        catalog.insert(
            format!("SKU-{i}"),
            None,
            CatalogEntry {
                base_price: Decimal::new(1999 + i, 2),
                weight_kg: Decimal::new(250, 3),
                origin: ShippingOrigin::new("ALIEXPRESS"),
                markup_percent: Decimal::from(15),
            },
        );
    }
    let composer = OrderComposer::new(catalog, PricingCalculator::default());
    let cart = CartValidator::new().validate(raw_cart(5, 10)).unwrap();

    c.bench_function("composer/compose_5_vendors_50_items", |b| {
        b.iter(|| {
            rt.block_on(async { composer.compose(&cart).await.unwrap() });
        });
    });
}

criterion_group!(benches, bench_selling_price, bench_validate, bench_compose);
criterion_main!(benches);
